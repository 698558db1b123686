//! `PortalStore` adapters.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPortalStore;
pub use postgres::PostgresPortalStore;
