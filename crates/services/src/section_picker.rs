use tracing::info;

use cmdcards_core::review::percentage;

use crate::data_loader::DataLoader;
use crate::error::DataLoadError;
use crate::progress_store::ProgressStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

impl SectionProgress {
    #[must_use]
    pub fn empty(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            percentage: 0,
        }
    }
}

/// One row of the section list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOverview {
    pub title: String,
    pub command_count: usize,
    pub progress: SectionProgress,
}

/// Section list annotated with stored progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPickerVm {
    sections: Vec<SectionOverview>,
}

impl SectionPickerVm {
    /// # Errors
    ///
    /// Returns `DataLoadError` if the dataset cannot be loaded.
    pub async fn load(loader: &DataLoader, store: &ProgressStore) -> Result<Self, DataLoadError> {
        let listings = loader.get_sections().await?;
        let stored = store.load_all().await;

        let sections = listings
            .into_iter()
            .map(|listing| {
                let total = listing.command_count;
                let progress = stored.get(&listing.title).map_or_else(
                    || SectionProgress::empty(total),
                    |record| {
                        let completed = record.completed_within(total);
                        SectionProgress {
                            completed,
                            total,
                            percentage: percentage(completed, total),
                        }
                    },
                );
                SectionOverview {
                    title: listing.title,
                    command_count: total,
                    progress,
                }
            })
            .collect();

        Ok(Self { sections })
    }

    #[must_use]
    pub fn sections(&self) -> &[SectionOverview] {
        &self.sections
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SectionOverview> {
        self.sections.get(index)
    }

    /// Clear the section's stored progress once `confirm` agrees, then zero
    /// the displayed row without reloading. Returns whether it was reset.
    pub async fn reset(
        &mut self,
        store: &ProgressStore,
        title: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> bool {
        if !confirm(title) {
            return false;
        }
        store.clear_section(title).await;
        for row in self.sections.iter_mut().filter(|row| row.title == title) {
            row.progress = SectionProgress::empty(row.command_count);
        }
        info!(section = title, "section progress reset");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cmdcards_core::model::{Command, Dataset, ProgressRecord, Section};
    use cmdcards_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    use crate::data_loader::StaticDataSource;

    fn fixture() -> (DataLoader, ProgressStore) {
        let dataset = Dataset::new(vec![
            Section::new(
                "Networking",
                vec![
                    Command::new("Show interfaces", "ip a"),
                    Command::new("Test reachability", "ping host"),
                    Command::new("Show routes", "ip route"),
                ],
            ),
            Section::new("Files", vec![Command::new("List files", "ls")]),
        ]);
        let loader = DataLoader::new(Arc::new(StaticDataSource::new(dataset)));
        let store = ProgressStore::new(Arc::new(InMemoryRepository::new()), fixed_clock());
        (loader, store)
    }

    fn completed(indices: &[usize]) -> ProgressRecord {
        ProgressRecord {
            completed_card_indices: indices.iter().copied().collect(),
            ..ProgressRecord::default()
        }
    }

    #[tokio::test]
    async fn annotates_sections_with_progress() {
        let (loader, store) = fixture();
        store.save("Networking", completed(&[0, 1])).await;

        let vm = SectionPickerVm::load(&loader, &store).await.unwrap();
        assert_eq!(vm.sections().len(), 2);
        assert_eq!(
            vm.sections()[0].progress,
            SectionProgress {
                completed: 2,
                total: 3,
                percentage: 67
            }
        );
        assert_eq!(vm.sections()[1].progress, SectionProgress::empty(1));
    }

    #[tokio::test]
    async fn declined_reset_keeps_progress() {
        let (loader, store) = fixture();
        store.save("Networking", completed(&[0])).await;
        let mut vm = SectionPickerVm::load(&loader, &store).await.unwrap();

        assert!(!vm.reset(&store, "Networking", |_| false).await);
        assert!(store.load("Networking").await.is_some());
        assert_eq!(vm.sections()[0].progress.completed, 1);
    }

    #[tokio::test]
    async fn confirmed_reset_clears_and_zeroes_row() {
        let (loader, store) = fixture();
        store.save("Networking", completed(&[0])).await;
        store.save("Files", completed(&[0])).await;
        let mut vm = SectionPickerVm::load(&loader, &store).await.unwrap();

        let mut asked = None;
        let reset = vm
            .reset(&store, "Networking", |title| {
                asked = Some(title.to_owned());
                true
            })
            .await;

        assert!(reset);
        assert_eq!(asked.as_deref(), Some("Networking"));
        assert!(store.load("Networking").await.is_none());
        assert_eq!(vm.sections()[0].progress, SectionProgress::empty(3));
        assert_eq!(vm.sections()[1].progress.completed, 1);
    }
}
