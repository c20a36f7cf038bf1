#![forbid(unsafe_code)]

pub mod app_services;
pub mod data_loader;
pub mod error;
pub mod progress_store;
pub mod review_session;
pub mod section_picker;

pub use cmdcards_core::Clock;
pub use cmdcards_core::review::ReviewMode;

pub use app_services::AppServices;
pub use data_loader::{
    DataLoader, DataSource, FileDataSource, HttpDataSource, StaticDataSource, source_for,
};
pub use error::{AppServicesError, DataLoadError};
pub use progress_store::ProgressStore;
pub use review_session::{
    CardView, CompletedEntry, PendingAdvance, ReviewScreen, ReviewSession, SessionOpen,
};
pub use section_picker::{SectionOverview, SectionPickerVm, SectionProgress};
