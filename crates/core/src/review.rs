//! Pure review state machine for one section.
//!
//! `ReviewState::apply` never mutates: it returns a new state plus the side
//! effects the caller has to carry out (persist the record, schedule an
//! auto-advance).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::model::ProgressRecord;

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// Which cards are visible: the whole deck or only the ones marked wrong.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReviewMode {
    #[default]
    All,
    Wrong,
}

//
// ─── INDEX SET ─────────────────────────────────────────────────────────────────
//

/// Immutable, cheaply cloned set of original card indices.
///
/// `with`/`without` hand back a new set and leave `self` untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexSet(Arc<BTreeSet<usize>>);

impl IndexSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(&self, index: usize) -> Self {
        if self.0.contains(&index) {
            return self.clone();
        }
        let mut next = BTreeSet::clone(&self.0);
        next.insert(index);
        Self(Arc::new(next))
    }

    #[must_use]
    pub fn without(&self, index: usize) -> Self {
        if !self.0.contains(&index) {
            return self.clone();
        }
        let mut next = BTreeSet::clone(&self.0);
        next.remove(&index);
        Self(Arc::new(next))
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn to_btree(&self) -> BTreeSet<usize> {
        BTreeSet::clone(&self.0)
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

//
// ─── ACTIONS ───────────────────────────────────────────────────────────────────
//

/// Handle for a pending auto-advance.
///
/// Only honoured while no navigation or newer mark happened since it was
/// issued, and while the marked card is still the one under the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceToken {
    generation: u64,
    position: usize,
    card: usize,
}

impl AdvanceToken {
    /// Visible position the cursor was on when the card was marked.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Original index of the marked card.
    #[must_use]
    pub fn card(&self) -> usize {
        self.card
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewAction {
    Flip,
    MarkCorrect,
    MarkWrong,
    Next,
    Previous,
    Reset,
    SetMode(ReviewMode),
    /// Jump to a completed card by original index.
    JumpTo(usize),
    Advance(AdvanceToken),
}

/// Result of applying an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: ReviewState,
    /// Cursor, mode or one of the sets changed; the record must be rewritten.
    pub persist: bool,
    /// Set after a mark; fire `ReviewAction::Advance` with it after the delay.
    pub advance: Option<AdvanceToken>,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewState {
    total: usize,
    current_index: usize,
    flipped: bool,
    mode: ReviewMode,
    completed: IndexSet,
    wrong: IndexSet,
    generation: u64,
}

impl ReviewState {
    /// Fresh state for a section with `total` commands.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            current_index: 0,
            flipped: false,
            mode: ReviewMode::All,
            completed: IndexSet::new(),
            wrong: IndexSet::new(),
            generation: 0,
        }
    }

    /// Rebuild from a stored record.
    ///
    /// Indices that no longer fit the command list are dropped and an
    /// out-of-range cursor restarts at 0.
    #[must_use]
    pub fn restore(total: usize, record: &ProgressRecord) -> Self {
        let completed = record
            .completed_card_indices
            .iter()
            .copied()
            .filter(|i| *i < total)
            .collect();
        let wrong = record
            .wrong_card_indices
            .iter()
            .copied()
            .filter(|i| *i < total)
            .collect();
        let current_index = if record.current_index < total {
            record.current_index
        } else {
            0
        };

        Self {
            current_index,
            completed,
            wrong,
            ..Self::new(total)
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Cursor into the visible list.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    #[must_use]
    pub fn mode(&self) -> ReviewMode {
        self.mode
    }

    #[must_use]
    pub fn completed(&self) -> &IndexSet {
        &self.completed
    }

    #[must_use]
    pub fn wrong(&self) -> &IndexSet {
        &self.wrong
    }

    /// Visible position to original index, in visible order.
    #[must_use]
    pub fn visible_indices(&self) -> Vec<usize> {
        match self.mode {
            ReviewMode::All => (0..self.total).collect(),
            ReviewMode::Wrong => self.wrong.iter().collect(),
        }
    }

    #[must_use]
    pub fn visible_len(&self) -> usize {
        match self.mode {
            ReviewMode::All => self.total,
            ReviewMode::Wrong => self.wrong.len(),
        }
    }

    /// Original index of the card under the cursor, if any card is visible.
    #[must_use]
    pub fn current_original(&self) -> Option<usize> {
        match self.mode {
            ReviewMode::All => (self.current_index < self.total).then_some(self.current_index),
            ReviewMode::Wrong => self.wrong.iter().nth(self.current_index),
        }
    }

    /// Wrong-only review with nothing left to review.
    #[must_use]
    pub fn is_wrong_mode_exhausted(&self) -> bool {
        self.mode == ReviewMode::Wrong && self.wrong.is_empty()
    }

    #[must_use]
    pub fn can_enter_wrong_mode(&self) -> bool {
        !self.wrong.is_empty()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        score(self.completed.len(), self.wrong.len(), self.total)
    }

    #[must_use]
    pub fn progress_percentage(&self) -> u32 {
        percentage(self.completed.len(), self.total)
    }

    /// Record to persist. The cursor is stored as 0 while in wrong mode.
    #[must_use]
    pub fn to_record(&self) -> ProgressRecord {
        let current_index = match self.mode {
            ReviewMode::All => self.current_index,
            ReviewMode::Wrong => 0,
        };
        ProgressRecord {
            current_index,
            completed_card_indices: self.completed.to_btree(),
            wrong_card_indices: self.wrong.to_btree(),
            score: self.score(),
            completed_cards: self.completed.len(),
            total_cards: self.total,
            last_updated: None,
        }
    }

    #[must_use]
    pub fn apply(&self, action: ReviewAction) -> Transition {
        let mut next = self.clone();
        let mut advance = None;

        match action {
            ReviewAction::Flip => {
                if let Some(original) = self.current_original() {
                    next.flipped = !self.flipped;
                    if next.flipped {
                        next.completed = self.completed.with(original);
                    }
                }
            }
            ReviewAction::MarkCorrect | ReviewAction::MarkWrong => {
                if let Some(original) = self.current_original() {
                    next.wrong = if action == ReviewAction::MarkWrong {
                        self.wrong.with(original)
                    } else {
                        self.wrong.without(original)
                    };
                    next.completed = self.completed.with(original);
                    next.flipped = false;
                    next.generation += 1;
                    next.current_index = next
                        .current_index
                        .min(next.visible_len().saturating_sub(1));
                    advance = Some(AdvanceToken {
                        generation: next.generation,
                        position: next.current_index,
                        card: original,
                    });
                }
            }
            ReviewAction::Next => {
                next.generation += 1;
                if self.current_index + 1 < self.visible_len() {
                    next.current_index += 1;
                    next.flipped = false;
                }
            }
            ReviewAction::Previous => {
                next.generation += 1;
                if self.current_index > 0 {
                    next.current_index -= 1;
                    next.flipped = false;
                }
            }
            ReviewAction::Reset => {
                next.completed = IndexSet::new();
                next.wrong = IndexSet::new();
                next.current_index = 0;
                next.flipped = false;
                next.mode = ReviewMode::All;
                next.generation += 1;
            }
            ReviewAction::SetMode(mode) => {
                let allowed = mode == ReviewMode::All || self.can_enter_wrong_mode();
                if mode != self.mode && allowed {
                    next.mode = mode;
                    next.current_index = 0;
                    next.flipped = false;
                    next.generation += 1;
                }
            }
            ReviewAction::JumpTo(original) => {
                if original < self.total && self.completed.contains(original) {
                    next.mode = ReviewMode::All;
                    next.current_index = original;
                    next.flipped = false;
                    next.generation += 1;
                }
            }
            ReviewAction::Advance(token) => {
                // A correct mark in wrong mode slides the next wrong card
                // under the cursor; that card has not been shown yet.
                let current = token.generation == self.generation
                    && token.position == self.current_index
                    && self.current_original() == Some(token.card);
                if current && self.current_index + 1 < self.visible_len() {
                    next.current_index += 1;
                    next.flipped = false;
                    next.generation += 1;
                }
            }
        }

        let persist = !next.same_persisted_state(self);
        Transition {
            state: next,
            persist,
            advance,
        }
    }

    fn same_persisted_state(&self, other: &Self) -> bool {
        self.current_index == other.current_index
            && self.mode == other.mode
            && self.completed == other.completed
            && self.wrong == other.wrong
    }
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// `round(max(0, (completed - wrong) / total * 100))`, 0 for an empty section.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn score(completed: usize, wrong: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let raw = (completed as f64 - wrong as f64) / total as f64 * 100.0;
    raw.max(0.0).round() as u32
}

/// `round(part / total * 100)`, 0 for an empty section.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
