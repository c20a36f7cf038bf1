use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DatasetError {
    #[error("dataset is not valid JSON: {0}")]
    Parse(String),
}

//
// ─── COMMAND ───────────────────────────────────────────────────────────────────
//

/// One flashcard: the description is the question, the syntax the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    description: String,
    syntax: String,
}

impl Command {
    #[must_use]
    pub fn new(description: impl Into<String>, syntax: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            syntax: syntax.into(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn syntax(&self) -> &str {
        &self.syntax
    }

    /// Short description used by the completed-cards browser.
    ///
    /// Keeps the first 50 characters and always appends `...`.
    #[must_use]
    pub fn preview(&self) -> String {
        let head: String = self.description.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

const PREVIEW_CHARS: usize = 50;

//
// ─── SECTION ───────────────────────────────────────────────────────────────────
//

/// A named group of commands studied together. The title is the progress key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    title: String,
    #[serde(default)]
    commands: Vec<Command>,
}

impl Section {
    #[must_use]
    pub fn new(title: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            title: title.into(),
            commands,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn listing(&self) -> SectionListing {
        SectionListing {
            title: self.title.clone(),
            command_count: self.commands.len(),
        }
    }
}

/// Title plus command count, as shown on the section list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionListing {
    pub title: String,
    pub command_count: usize,
}

//
// ─── DATASET ───────────────────────────────────────────────────────────────────
//

/// The whole static resource: `{ "sections": [ { "title", "commands" } ] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    sections: Vec<Section>,
}

impl Dataset {
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Parse the JSON resource.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::Parse` if the text is not a valid dataset document.
    pub fn from_json(raw: &str) -> Result<Self, DatasetError> {
        serde_json::from_str(raw).map_err(|err| DatasetError::Parse(err.to_string()))
    }

    /// Serialize back to the resource shape.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::Parse` if serialization fails.
    pub fn to_json(&self) -> Result<String, DatasetError> {
        serde_json::to_string(self).map_err(|err| DatasetError::Parse(err.to_string()))
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn listings(&self) -> Vec<SectionListing> {
        self.sections.iter().map(Section::listing).collect()
    }

    /// First section whose title matches exactly.
    #[must_use]
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Commands for `title` in original order, or an empty slice if unknown.
    #[must_use]
    pub fn commands_for(&self, title: &str) -> &[Command] {
        self.section(title).map_or(&[], Section::commands)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
