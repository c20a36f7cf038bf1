mod command;
mod progress;

pub use command::{Command, Dataset, DatasetError, Section, SectionListing};
pub use progress::{ProgressMap, ProgressRecord};
