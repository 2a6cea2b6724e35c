//! # Unit of Work
//!
//! One transaction plus the set of entity identities it manages. An entity loaded or persisted
//! through a unit of work is managed by it; anything else is detached and has to be attached
//! (resolved by identity) before it can be removed.
//!
//! Every unit of work ends committed or rolled back. One that is dropped while still open is
//! rolled back by sqlx when its transaction is dropped, which also returns the connection to
//! the pool.

use std::collections::HashSet;
use std::fmt;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::warn;

use crate::error::{HarnessError, HarnessResult};
use crate::logging::log_unit_of_work;
use crate::models::{Customer, NewCustomer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOfWorkState::Open => write!(f, "open"),
            UnitOfWorkState::Committed => write!(f, "committed"),
            UnitOfWorkState::RolledBack => write!(f, "rolled_back"),
        }
    }
}

pub struct UnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    state: UnitOfWorkState,
    read_only: bool,
    managed: HashSet<i64>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("state", &self.state)
            .field("read_only", &self.read_only)
            .field("managed", &self.managed)
            .finish()
    }
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &PgPool, read_only: bool) -> HarnessResult<Self> {
        let mut tx = pool.begin().await.map_err(|e| match e {
            sqlx::Error::PoolClosed => {
                HarnessError::ClosedBinding("connection pool is closed".to_string())
            }
            other => HarnessError::transaction("begin", other),
        })?;

        if read_only {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(|e| HarnessError::transaction("begin read-only", e))?;
        }

        Ok(Self {
            tx: Some(tx),
            state: UnitOfWorkState::Open,
            read_only,
            managed: HashSet::new(),
        })
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn managed_count(&self) -> usize {
        self.managed.len()
    }

    fn conn(&mut self, operation: &str) -> HarnessResult<&mut PgConnection> {
        let state = self.state;
        self.tx.as_deref_mut().ok_or_else(|| {
            HarnessError::transaction(operation, format!("unit of work is already {state}"))
        })
    }

    /// Insert a transient entity; the returned instance carries its assigned identity and is managed
    pub async fn persist(&mut self, new_customer: &NewCustomer) -> HarnessResult<Customer> {
        let customer = Customer::create(self.conn("persist")?, new_customer)
            .await
            .map_err(|e| HarnessError::transaction("persist", e))?;
        self.managed.insert(customer.id);
        Ok(customer)
    }

    /// Look up by identity; a found row becomes managed
    pub async fn find(&mut self, id: i64) -> HarnessResult<Option<Customer>> {
        let found = Customer::find_by_id(self.conn("find")?, id)
            .await
            .map_err(|e| HarnessError::transaction("find", e))?;
        if let Some(customer) = &found {
            self.managed.insert(customer.id);
        }
        Ok(found)
    }

    pub async fn find_by_email(&mut self, email: &str) -> HarnessResult<Option<Customer>> {
        let found = Customer::find_by_email(self.conn("find_by_email")?, email)
            .await
            .map_err(|e| HarnessError::transaction("find_by_email", e))?;
        if let Some(customer) = &found {
            self.managed.insert(customer.id);
        }
        Ok(found)
    }

    pub async fn list_all(&mut self) -> HarnessResult<Vec<Customer>> {
        let customers = Customer::list_all(self.conn("list_all")?)
            .await
            .map_err(|e| HarnessError::transaction("list_all", e))?;
        self.managed.extend(customers.iter().map(|c| c.id));
        Ok(customers)
    }

    pub async fn count(&mut self) -> HarnessResult<i64> {
        Customer::count(self.conn("count")?)
            .await
            .map_err(|e| HarnessError::transaction("count", e))
    }

    /// Whether `customer` is managed by this unit of work
    pub fn contains(&self, customer: &Customer) -> bool {
        self.managed.contains(&customer.id)
    }

    /// Attach-or-fetch: the managed instance for `customer`'s identity, reloading it when the
    /// handle came from another unit of work
    pub async fn attach(&mut self, customer: &Customer) -> HarnessResult<Customer> {
        if self.contains(customer) {
            return Ok(customer.clone());
        }

        self.find(customer.id)
            .await?
            .ok_or(HarnessError::EntityNotFound { id: customer.id })
    }

    /// Delete a managed entity, and only that entity
    pub async fn remove(&mut self, customer: &Customer) -> HarnessResult<()> {
        if !self.contains(customer) {
            return Err(HarnessError::DetachedEntity { id: customer.id });
        }

        let deleted = Customer::delete(self.conn("remove")?, customer.id)
            .await
            .map_err(|e| HarnessError::transaction("remove", e))?;
        self.managed.remove(&customer.id);

        if deleted {
            Ok(())
        } else {
            Err(HarnessError::EntityNotFound { id: customer.id })
        }
    }

    pub async fn delete_all(&mut self) -> HarnessResult<u64> {
        let deleted = Customer::delete_all(self.conn("delete_all")?)
            .await
            .map_err(|e| HarnessError::transaction("delete_all", e))?;
        self.managed.clear();
        Ok(deleted)
    }

    pub async fn commit(&mut self) -> HarnessResult<()> {
        let tx = self.tx.take().ok_or_else(|| {
            HarnessError::transaction("commit", format!("unit of work is already {}", self.state))
        })?;

        match tx.commit().await {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                log_unit_of_work("commit", self.read_only, self.managed.len(), "committed");
                Ok(())
            }
            Err(e) => {
                self.state = UnitOfWorkState::RolledBack;
                log_unit_of_work("commit", self.read_only, self.managed.len(), "failed");
                Err(HarnessError::transaction("commit", e))
            }
        }
    }

    pub async fn rollback(&mut self) -> HarnessResult<()> {
        let tx = self.tx.take().ok_or_else(|| {
            HarnessError::transaction("rollback", format!("unit of work is already {}", self.state))
        })?;

        self.state = UnitOfWorkState::RolledBack;
        let result = tx
            .rollback()
            .await
            .map_err(|e| HarnessError::transaction("rollback", e));
        log_unit_of_work(
            "rollback",
            self.read_only,
            self.managed.len(),
            if result.is_ok() { "rolled_back" } else { "failed" },
        );
        result
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(
                managed_entities = self.managed.len(),
                read_only = self.read_only,
                "Unit of work dropped while open; rolling back"
            );
        }
    }
}
