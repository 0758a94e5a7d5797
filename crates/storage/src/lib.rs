mod api;
pub mod backend;
mod error;
mod metrics;
mod proposal_history;
mod store;

pub use api::{PrefixResult, StorageBackend, StorageReadView, StorageWriteBatch, Table};
pub use error::{Error, PruneFailure};
pub use proposal_history::PruneReport;
pub use store::Store;

/// Error type returned by storage backends.
pub use api::Error as BackendError;
