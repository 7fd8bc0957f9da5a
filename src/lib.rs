//! Grocery ordering service
//!
//! Customers browse a product catalog, place orders from a basket and revise
//! them until the order is completed. Administrators manage the catalog,
//! move orders through their lifecycle and pull filtered reports and CSV
//! exports.
//!
//! ## Layout
//! - `domain`: aggregates, value objects, pricing and order events
//! - `store`: persistence traits with PostgreSQL and in-memory backends
//! - `services`: application logic used by the handlers
//! - `api`: axum router, extractors and authentication

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod store;

pub use api::{router, AppState};
pub use config::Config;
pub use error::{ApiResult, AppError};
pub use services::Services;
pub use store::{MemoryStore, PgStore, Stores};
