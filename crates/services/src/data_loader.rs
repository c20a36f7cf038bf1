use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cmdcards_core::model::{Command, Dataset, SectionListing};

use crate::error::DataLoadError;
use crate::progress_store::{DEFAULT_CACHE_MAX_AGE_HOURS, ProgressStore};

//
// ─── SOURCES ───────────────────────────────────────────────────────────────────
//

/// Where the static dataset comes from.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch and parse the whole dataset.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` if the resource cannot be read or parsed.
    async fn fetch(&self) -> Result<Dataset, DataLoadError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Dataset stored as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn fetch(&self) -> Result<Dataset, DataLoadError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DataLoadError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(Dataset::from_json(&raw)?)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Upper bound for one dataset request, connect through body.
pub const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Dataset served over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
    url: String,
    timeout: std::time::Duration,
}

impl HttpDataSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: HTTP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self) -> Result<Dataset, DataLoadError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataLoadError::HttpStatus(status));
        }
        let raw = response.text().await?;
        Ok(Dataset::from_json(&raw)?)
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

/// In-memory dataset; counts fetches so memoization can be observed.
#[derive(Debug, Default)]
pub struct StaticDataSource {
    dataset: Option<Dataset>,
    fetches: AtomicUsize,
}

impl StaticDataSource {
    #[must_use]
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Some(dataset),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose every fetch fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for StaticDataSource {
    async fn fetch(&self) -> Result<Dataset, DataLoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.dataset
            .clone()
            .ok_or_else(|| DataLoadError::Unavailable("static source has no data".into()))
    }

    fn location(&self) -> String {
        "static".into()
    }
}

/// Pick a source from a CLI/env value: URLs go over HTTP, anything else is a path.
#[must_use]
pub fn source_for(location: &str) -> Arc<dyn DataSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpDataSource::new(location))
    } else {
        Arc::new(FileDataSource::new(location))
    }
}

//
// ─── LOADER ────────────────────────────────────────────────────────────────────
//

struct OfflineCache {
    store: ProgressStore,
    max_age: Duration,
}

/// Fetches the dataset once and serves sections and commands from memory.
///
/// Build one per process and share it behind an `Arc`.
pub struct DataLoader {
    source: Arc<dyn DataSource>,
    memo: Mutex<Option<Arc<Dataset>>>,
    offline: Option<OfflineCache>,
}

impl DataLoader {
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            memo: Mutex::new(None),
            offline: None,
        }
    }

    /// Copy every successful fetch into `store`, and fall back to that copy
    /// when a fetch fails while the copy is younger than the default max age.
    #[must_use]
    pub fn with_offline_cache(mut self, store: ProgressStore) -> Self {
        self.offline = Some(OfflineCache {
            store,
            max_age: Duration::hours(DEFAULT_CACHE_MAX_AGE_HOURS),
        });
        self
    }

    /// The memoized dataset, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` if the fetch fails and no usable offline copy exists.
    pub async fn dataset(&self) -> Result<Arc<Dataset>, DataLoadError> {
        let mut memo = self.memo.lock().await;
        if let Some(dataset) = memo.as_ref() {
            return Ok(Arc::clone(dataset));
        }

        let dataset = match self.source.fetch().await {
            Ok(dataset) => {
                info!(
                    source = %self.source.location(),
                    sections = dataset.sections().len(),
                    "dataset loaded"
                );
                if let Some(offline) = &self.offline {
                    offline.store.save_dataset(&dataset).await;
                }
                dataset
            }
            Err(err) => {
                warn!(source = %self.source.location(), error = %err, "dataset fetch failed");
                match self.offline_copy().await {
                    Some(dataset) => dataset,
                    None => return Err(err),
                }
            }
        };

        let dataset = Arc::new(dataset);
        *memo = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    async fn offline_copy(&self) -> Option<Dataset> {
        let offline = self.offline.as_ref()?;
        if !offline.store.is_cache_valid(offline.max_age).await {
            return None;
        }
        let dataset = offline.store.load_dataset().await?;
        info!("using offline dataset copy");
        Some(dataset)
    }

    /// Sections in dataset order with their command counts.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` if the dataset cannot be loaded.
    pub async fn get_sections(&self) -> Result<Vec<SectionListing>, DataLoadError> {
        Ok(self.dataset().await?.listings())
    }

    /// Commands of the section titled `title`, empty if there is none.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` if the dataset cannot be loaded.
    pub async fn get_commands_by_section(&self, title: &str) -> Result<Vec<Command>, DataLoadError> {
        Ok(self.dataset().await?.commands_for(title).to_vec())
    }

    /// Forget the memoized dataset; the next call fetches again.
    pub async fn clear_cache(&self) {
        *self.memo.lock().await = None;
        debug!("dataset memo cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdcards_core::model::Section;
    use cmdcards_core::time::fixed_clock;
    use storage::repository::{InMemoryRepository, KeyValueRepository};

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Section::new(
                "Networking",
                vec![
                    Command::new("Show interfaces", "ip a"),
                    Command::new("Test reachability", "ping host"),
                ],
            ),
            Section::new("Files", vec![Command::new("List files", "ls")]),
        ])
    }

    #[tokio::test]
    async fn memoizes_after_first_fetch() {
        let source = Arc::new(StaticDataSource::new(dataset()));
        let loader = DataLoader::new(Arc::clone(&source) as Arc<dyn DataSource>);

        loader.get_sections().await.unwrap();
        loader.get_commands_by_section("Files").await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        loader.clear_cache().await;
        loader.get_sections().await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn sections_and_commands_follow_dataset_order() {
        let loader = DataLoader::new(Arc::new(StaticDataSource::new(dataset())));
        let sections = loader.get_sections().await.unwrap();
        assert_eq!(
            sections,
            vec![
                SectionListing {
                    title: "Networking".into(),
                    command_count: 2
                },
                SectionListing {
                    title: "Files".into(),
                    command_count: 1
                },
            ]
        );

        let commands = loader.get_commands_by_section("Networking").await.unwrap();
        assert_eq!(commands, dataset().sections()[0].commands().to_vec());
        assert!(
            loader
                .get_commands_by_section("Unknown")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn failure_propagates_and_is_not_memoized() {
        let source = Arc::new(StaticDataSource::unavailable());
        let loader = DataLoader::new(Arc::clone(&source) as Arc<dyn DataSource>);

        assert!(matches!(
            loader.get_sections().await,
            Err(DataLoadError::Unavailable(_))
        ));
        assert!(loader.get_sections().await.is_err());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn offline_copy_covers_failed_fetch() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = ProgressStore::new(repo, fixed_clock());

        let online = DataLoader::new(Arc::new(StaticDataSource::new(dataset())))
            .with_offline_cache(store.clone());
        online.get_sections().await.unwrap();

        let offline =
            DataLoader::new(Arc::new(StaticDataSource::unavailable())).with_offline_cache(store);
        let sections = offline.get_sections().await.unwrap();
        assert_eq!(sections.len(), 2);
    }

    #[tokio::test]
    async fn stale_offline_copy_is_ignored() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = ProgressStore::new(
            Arc::clone(&repo) as Arc<dyn KeyValueRepository>,
            fixed_clock(),
        );
        store.save_dataset(&dataset()).await;

        let mut later = fixed_clock();
        later.advance(Duration::hours(48));
        let stale_store = ProgressStore::new(repo, later);
        let loader = DataLoader::new(Arc::new(StaticDataSource::unavailable()))
            .with_offline_cache(stale_store);
        assert!(loader.get_sections().await.is_err());
    }

    #[test]
    fn source_for_picks_transport() {
        assert_eq!(
            source_for("https://example.com/data.json").location(),
            "https://example.com/data.json"
        );
        assert_eq!(source_for("data/data.json").location(), "data/data.json");
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        // Accepts the connection but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/data.json", listener.local_addr().unwrap());
        let source =
            HttpDataSource::new(url).with_timeout(std::time::Duration::from_millis(100));

        let err = source.fetch().await.unwrap_err();
        match err {
            DataLoadError::Http(inner) => assert!(inner.is_timeout()),
            other => panic!("expected a timeout, got {other:?}"),
        }
        drop(listener);
    }
}
