//! Shared error types for the services crate.

use thiserror::Error;

use cmdcards_core::model::DatasetError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while fetching the flashcard dataset.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("dataset source unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
