pub mod customer;

// Re-export models for easy access
pub use customer::{Customer, NewCustomer};
