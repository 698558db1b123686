//! Infrastructure layer: storage adapters for the portal.

pub mod store;

pub use store::{InMemoryPortalStore, PostgresPortalStore};
