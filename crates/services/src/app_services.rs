use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::data_loader::{DataLoader, DataSource};
use crate::error::AppServicesError;
use crate::progress_store::ProgressStore;

/// Assembles the data loader and progress store the front end works with.
#[derive(Clone)]
pub struct AppServices {
    loader: Arc<DataLoader>,
    progress: ProgressStore,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        source: Arc<dyn DataSource>,
        clock: Clock,
        offline_cache: bool,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, source, clock, offline_cache))
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        source: Arc<dyn DataSource>,
        clock: Clock,
        offline_cache: bool,
    ) -> Self {
        let progress = ProgressStore::new(Arc::clone(&storage.kv), clock);
        let mut loader = DataLoader::new(source);
        if offline_cache {
            loader = loader.with_offline_cache(progress.clone());
        }

        Self {
            loader: Arc::new(loader),
            progress,
        }
    }

    #[must_use]
    pub fn loader(&self) -> Arc<DataLoader> {
        Arc::clone(&self.loader)
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }
}
