use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use cmdcards_core::model::Command;
use cmdcards_core::review::{AdvanceToken, ReviewAction, ReviewMode, ReviewState};

use crate::data_loader::DataLoader;
use crate::error::DataLoadError;
use crate::progress_store::ProgressStore;

/// Delay between marking a card and moving to the next one.
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(600);

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// What the review screen shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewScreen {
    Card(CardView),
    /// Wrong-only review with no wrong cards left.
    NoWrongCards,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    /// 0-based position in the visible list.
    pub position: usize,
    pub visible_len: usize,
    pub original_index: usize,
    pub description: String,
    pub syntax: String,
    pub flipped: bool,
    pub completed: bool,
    pub wrong: bool,
    pub mode: ReviewMode,
}

/// One row of the completed-cards browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedEntry {
    pub original_index: usize,
    pub preview: String,
}

/// Outcome of opening a section.
pub enum SessionOpen {
    Ready(ReviewSession),
    Empty,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Review of one section: the pure state machine plus write-through persistence.
///
/// Every transition that moves the cursor, switches mode or touches the
/// completed/wrong sets is saved before the call returns.
pub struct ReviewSession {
    title: String,
    commands: Arc<[Command]>,
    state: ReviewState,
    store: ProgressStore,
    advance_delay: Duration,
}

impl ReviewSession {
    /// Load the section's commands and restore stored progress.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` if the dataset cannot be loaded.
    pub async fn open(
        loader: &DataLoader,
        store: &ProgressStore,
        title: &str,
    ) -> Result<SessionOpen, DataLoadError> {
        let commands = loader.get_commands_by_section(title).await?;
        if commands.is_empty() {
            debug!(section = title, "section has no commands");
            return Ok(SessionOpen::Empty);
        }

        let state = match store.load(title).await {
            Some(record) => ReviewState::restore(commands.len(), &record),
            None => ReviewState::new(commands.len()),
        };
        debug!(
            section = title,
            current = state.current_index(),
            completed = state.completed().len(),
            wrong = state.wrong().len(),
            "review session opened"
        );

        Ok(SessionOpen::Ready(Self {
            title: title.to_owned(),
            commands: commands.into(),
            state,
            store: store.clone(),
            advance_delay: DEFAULT_ADVANCE_DELAY,
        }))
    }

    #[must_use]
    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
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
    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.state.score()
    }

    #[must_use]
    pub fn progress_percentage(&self) -> u32 {
        self.state.progress_percentage()
    }

    #[must_use]
    pub fn screen(&self) -> ReviewScreen {
        if self.state.is_wrong_mode_exhausted() {
            return ReviewScreen::NoWrongCards;
        }
        let Some(original) = self.state.current_original() else {
            return ReviewScreen::NoWrongCards;
        };
        let command = &self.commands[original];
        ReviewScreen::Card(CardView {
            position: self.state.current_index(),
            visible_len: self.state.visible_len(),
            original_index: original,
            description: command.description().to_owned(),
            syntax: command.syntax().to_owned(),
            flipped: self.state.is_flipped(),
            completed: self.state.completed().contains(original),
            wrong: self.state.wrong().contains(original),
            mode: self.state.mode(),
        })
    }

    /// Completed cards in original order.
    #[must_use]
    pub fn completed_entries(&self) -> Vec<CompletedEntry> {
        self.state
            .completed()
            .iter()
            .filter_map(|i| {
                self.commands.get(i).map(|cmd| CompletedEntry {
                    original_index: i,
                    preview: cmd.preview(),
                })
            })
            .collect()
    }

    /// Apply one action, persisting when needed. Returns a token to schedule
    /// an auto-advance with, if the action was a mark.
    pub async fn dispatch(&mut self, action: ReviewAction) -> Option<AdvanceToken> {
        let transition = self.state.apply(action);
        self.state = transition.state;
        if transition.persist {
            self.store.save(&self.title, self.state.to_record()).await;
        }
        transition.advance
    }

    pub async fn flip(&mut self) {
        self.dispatch(ReviewAction::Flip).await;
    }

    pub async fn mark_correct(&mut self) -> Option<PendingAdvance> {
        let delay = self.advance_delay;
        self.dispatch(ReviewAction::MarkCorrect)
            .await
            .map(|token| PendingAdvance::new(token, delay))
    }

    pub async fn mark_wrong(&mut self) -> Option<PendingAdvance> {
        let delay = self.advance_delay;
        self.dispatch(ReviewAction::MarkWrong)
            .await
            .map(|token| PendingAdvance::new(token, delay))
    }

    pub async fn next(&mut self) {
        self.dispatch(ReviewAction::Next).await;
    }

    pub async fn previous(&mut self) {
        self.dispatch(ReviewAction::Previous).await;
    }

    pub async fn reset(&mut self) {
        self.dispatch(ReviewAction::Reset).await;
    }

    /// Switch review mode. Entering wrong mode with no wrong cards does nothing.
    pub async fn set_mode(&mut self, mode: ReviewMode) {
        self.dispatch(ReviewAction::SetMode(mode)).await;
    }

    pub async fn toggle_wrong_mode(&mut self) {
        let mode = match self.state.mode() {
            ReviewMode::All => ReviewMode::Wrong,
            ReviewMode::Wrong => ReviewMode::All,
        };
        self.set_mode(mode).await;
    }

    /// Jump to a completed card by original index, back in all mode.
    pub async fn jump_to(&mut self, original_index: usize) {
        self.dispatch(ReviewAction::JumpTo(original_index)).await;
    }

    /// Fire a pending auto-advance. Stale tokens are ignored.
    pub async fn advance(&mut self, token: AdvanceToken) {
        self.dispatch(ReviewAction::Advance(token)).await;
    }
}

//
// ─── AUTO-ADVANCE ──────────────────────────────────────────────────────────────
//

/// An auto-advance waiting for its deadline.
///
/// Dropping it cancels it; firing it after other navigation is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAdvance {
    token: AdvanceToken,
    deadline: Instant,
}

impl PendingAdvance {
    #[must_use]
    pub fn new(token: AdvanceToken, delay: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + delay,
        }
    }

    #[must_use]
    pub fn token(&self) -> AdvanceToken {
        self.token
    }

    /// Sleep until the deadline and hand the token back.
    pub async fn elapsed(self) -> AdvanceToken {
        tokio::time::sleep_until(self.deadline).await;
        self.token
    }
}
