//! Storage layer: DuckDB for records, the filesystem for uploaded files.

mod error;
pub use error::StoreError;

mod schema;
mod store;
pub use store::{DashboardCounts, Scope, Store};

pub mod media;
pub use media::Media;

mod clients;
mod compliance;
mod documents;
mod integrations;
mod matters;
mod users;
mod workflows;

pub use integrations::DUPLICATE_SERVICE;
pub use matters::DUPLICATE_PROTOCOL;
pub use workflows::{DUPLICATE_STEP_ORDER, DUPLICATE_WORKFLOW};

#[cfg(test)]
mod testing;
