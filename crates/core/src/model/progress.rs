use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored progress for one section.
///
/// Indices refer to positions in the section's unfiltered command list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRecord {
    pub current_index: usize,
    pub completed_card_indices: BTreeSet<usize>,
    pub wrong_card_indices: BTreeSet<usize>,
    pub score: u32,
    pub completed_cards: usize,
    pub total_cards: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Copy of this record stamped with `now`.
    #[must_use]
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.last_updated = Some(now);
        self
    }

    /// Completed indices that still fit a section of `total` commands.
    #[must_use]
    pub fn completed_within(&self, total: usize) -> usize {
        self.completed_card_indices
            .iter()
            .filter(|i| **i < total)
            .count()
    }
}

/// The whole persisted blob: section title to record.
pub type ProgressMap = BTreeMap<String, ProgressRecord>;
