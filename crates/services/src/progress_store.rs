use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use cmdcards_core::model::{Dataset, ProgressMap, ProgressRecord};
use storage::repository::{KeyValueRepository, StorageKey};

use crate::Clock;

/// Default age after which the offline dataset copy is considered stale.
pub const DEFAULT_CACHE_MAX_AGE_HOURS: i64 = 24;

/// Best-effort persistence for per-section progress and the offline dataset copy.
///
/// Nothing here returns an error. Failed reads behave like "nothing stored"
/// and failed writes are dropped; both are logged.
#[derive(Clone)]
pub struct ProgressStore {
    repo: Arc<dyn KeyValueRepository>,
    clock: Clock,
}

impl ProgressStore {
    #[must_use]
    pub fn new(repo: Arc<dyn KeyValueRepository>, clock: Clock) -> Self {
        Self { repo, clock }
    }

    /// Upsert the record for `section`, stamping it with the current time.
    pub async fn save(&self, section: &str, record: ProgressRecord) {
        let mut all = self.load_all().await;
        all.insert(section.to_owned(), record.stamped(self.clock.now()));

        let blob = match serde_json::to_string(&all) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(section, error = %err, "failed to serialize progress");
                return;
            }
        };
        match self.repo.set(StorageKey::UserProgress, &blob).await {
            Ok(()) => debug!(section, "progress saved"),
            Err(err) => warn!(section, error = %err, "failed to save progress"),
        }
    }

    pub async fn load(&self, section: &str) -> Option<ProgressRecord> {
        self.load_all().await.remove(section)
    }

    /// Every stored record. A missing or unreadable blob yields an empty map.
    pub async fn load_all(&self) -> ProgressMap {
        let raw = match self.repo.get(StorageKey::UserProgress).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressMap::new(),
            Err(err) => {
                warn!(error = %err, "failed to read progress");
                return ProgressMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "stored progress is corrupt; ignoring it");
            ProgressMap::new()
        })
    }

    pub async fn clear_section(&self, section: &str) {
        let mut all = self.load_all().await;
        all.remove(section);

        let blob = match serde_json::to_string(&all) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(section, error = %err, "failed to serialize progress");
                return;
            }
        };
        if let Err(err) = self.repo.set(StorageKey::UserProgress, &blob).await {
            warn!(section, error = %err, "failed to clear section progress");
        }
    }

    /// Remove progress, the dataset copy and its timestamp.
    pub async fn clear_all(&self) {
        for key in StorageKey::ALL {
            if let Err(err) = self.repo.remove(key).await {
                warn!(%key, error = %err, "failed to clear stored value");
            }
        }
    }

    /// Keep a copy of the dataset and stamp `last_updated`.
    pub async fn save_dataset(&self, dataset: &Dataset) {
        let blob = match dataset.to_json() {
            Ok(blob) => blob,
            Err(err) => {
                warn!(error = %err, "failed to serialize dataset");
                return;
            }
        };
        if let Err(err) = self.repo.set(StorageKey::FlashcardData, &blob).await {
            warn!(error = %err, "failed to save dataset copy");
            return;
        }
        let stamp = self.clock.now().to_rfc3339();
        if let Err(err) = self.repo.set(StorageKey::LastUpdated, &stamp).await {
            warn!(error = %err, "failed to stamp dataset copy");
        }
    }

    pub async fn load_dataset(&self) -> Option<Dataset> {
        let raw = match self.repo.get(StorageKey::FlashcardData).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "failed to read dataset copy");
                return None;
            }
        };
        Dataset::from_json(&raw)
            .map_err(|err| warn!(error = %err, "stored dataset copy is corrupt"))
            .ok()
    }

    /// True when the dataset copy was stamped less than `max_age` ago.
    pub async fn is_cache_valid(&self, max_age: Duration) -> bool {
        let raw = match self.repo.get(StorageKey::LastUpdated).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(err) => {
                warn!(error = %err, "failed to read cache stamp");
                return false;
            }
        };
        let Ok(stamp) = DateTime::parse_from_rfc3339(&raw) else {
            warn!(stamp = %raw, "unparsable cache stamp");
            return false;
        };
        self.clock.now() - stamp.with_timezone(&Utc) < max_age
    }
}
