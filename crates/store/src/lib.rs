//! Storage layer for the order core.
//!
//! Two backends implement the same traits: [`InMemoryStore`] for tests and
//! single-process deployments, and [`PostgresStore`] for durable storage.
//! Both commit placements and cancellations as single atomic units.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{DashboardStats, Page, PageRequest};
pub use store::{
    CartStore, InventoryStore, OrderRepository, Placement, StatusTransition, Store, StoreExt,
};
