//! # Persistence Layer
//!
//! Binds the entity model to a provisioned database.
//!
//! ## Key Components
//!
//! - [`binding`] - Session-wide pool, schema lifecycle, unit-of-work factory
//! - [`unit_of_work`] - Transactional scope with an identity set of managed entities
//! - [`schema`] - Create / update / validate / drop of the entity table
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ephemeral_harness::models::NewCustomer;
//! use ephemeral_harness::persistence::{PersistenceBinding, PersistenceOptions};
//! use ephemeral_harness::provisioner::ConnectionInfo;
//!
//! # async fn example(info: &ConnectionInfo) -> ephemeral_harness::HarnessResult<()> {
//! let binding = PersistenceBinding::open(info, PersistenceOptions::default()).await?;
//!
//! let mut uow = binding.new_unit_of_work().await?;
//! let customer = uow.persist(&NewCustomer::new("John", "Doe", "jdoe@gmail.com")).await?;
//! uow.commit().await?;
//!
//! let mut verify = binding.new_read_only_unit_of_work().await?;
//! assert!(verify.find(customer.id).await?.is_some());
//! verify.rollback().await?;
//!
//! binding.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod schema;
pub mod unit_of_work;

pub use binding::{PersistenceBinding, PersistenceOptions};
pub use unit_of_work::{UnitOfWork, UnitOfWorkState};
