use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};

/// Customer is the entity the harness persists, verifies and deletes
/// Maps to `customers` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

/// New Customer for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewCustomer {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }
}

impl Default for NewCustomer {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl Customer {
    pub const TABLE: &'static str = "customers";

    /// Columns `validate` schema mode requires
    pub const COLUMNS: &'static [&'static str] =
        &["id", "first_name", "last_name", "email", "created_at"];

    pub const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS customers (
            id BIGSERIAL PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT NOW()
        )
    "#;

    pub const DROP_TABLE_SQL: &'static str = "DROP TABLE IF EXISTS customers";

    /// Insert a customer; the identity comes from the sequence, never from the caller
    pub async fn create(
        conn: &mut PgConnection,
        new_customer: &NewCustomer,
    ) -> Result<Customer, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (first_name, last_name, email)
            VALUES ($1, $2, $3)
            RETURNING id, first_name, last_name, email, created_at
            "#,
        )
        .bind(&new_customer.first_name)
        .bind(&new_customer.last_name)
        .bind(&new_customer.email)
        .fetch_one(conn)
        .await
    }

    /// Find a customer by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, first_name, last_name, email, created_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Find a customer by its natural key
    pub async fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, first_name, last_name, email, created_at
            FROM customers
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await
    }

    /// List all customers in insertion order
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, first_name, last_name, email, created_at
            FROM customers
            ORDER BY id
            "#,
        )
        .fetch_all(conn)
        .await
    }

    pub async fn count(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers")
            .fetch_one(conn)
            .await
    }

    /// Delete a customer
    pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every customer, returning how many rows went away
    pub async fn delete_all(conn: &mut PgConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers").execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Whether the descriptive fields match what was requested at creation
    pub fn matches(&self, expected: &NewCustomer) -> bool {
        self.first_name == expected.first_name
            && self.last_name == expected.last_name
            && self.email == expected.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(first: &str, last: &str, email: &str) -> Customer {
        Customer {
            id: 1,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_matches_compares_descriptive_fields() {
        let expected = NewCustomer::new("John", "Doe", "jdoe@gmail.com");
        assert!(customer("John", "Doe", "jdoe@gmail.com").matches(&expected));
        assert!(!customer("John", "Smith", "jdoe@gmail.com").matches(&expected));
    }

    #[test]
    fn test_new_customer_deserializes_from_config_shape() {
        let fixture: NewCustomer = serde_json::from_value(serde_json::json!({
            "first_name": "Initial",
            "last_name": "User",
            "email": "initial.user@example.com"
        }))
        .unwrap();
        assert_eq!(fixture, NewCustomer::new("Initial", "User", "initial.user@example.com"));
    }
}
