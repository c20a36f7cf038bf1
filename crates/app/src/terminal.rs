//! Line-oriented terminal front end: section list and review screen.

use std::io::{self, Write};
use std::time::Duration;

use tokio::io::{AsyncBufRead, Lines};
use tracing::{debug, warn};

use cmdcards_core::review::AdvanceToken;
use services::{
    AppServices, CardView, PendingAdvance, ReviewMode, ReviewScreen, ReviewSession,
    SectionOverview, SectionPickerVm, SessionOpen,
};

const LOAD_FAILED: &str = "Failed to load commands. Please try again.";
const NO_COMMANDS: &str = "No commands found";
const BAR_WIDTH: usize = 20;

const REVIEW_HELP: &str = "\
  Enter/f  flip          c  correct      w  wrong
  n/p      next/prev     reset           wrong  wrong-only review
  all      all cards     list            j <n>  jump to completed #n
  b        back          q  quit";

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
enum ListInput {
    Open(usize),
    Reset(usize),
    Quit,
    Unknown,
}

fn parse_list_input(line: &str) -> ListInput {
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("q" | "quit"), None, None) => ListInput::Quit,
        (Some("r" | "reset"), Some(n), None) => parse_ordinal(n).map_or(ListInput::Unknown, ListInput::Reset),
        (Some(n), None, None) => parse_ordinal(n).map_or(ListInput::Unknown, ListInput::Open),
        _ => ListInput::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReviewInput {
    Flip,
    Correct,
    Wrong,
    Next,
    Previous,
    Reset,
    ToggleWrong,
    All,
    List,
    Jump(usize),
    Help,
    Back,
    Quit,
    Unknown,
}

fn parse_review_input(line: &str) -> ReviewInput {
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (None | Some("f" | "flip"), None, None) => ReviewInput::Flip,
        (Some("c" | "correct"), None, None) => ReviewInput::Correct,
        (Some("w"), None, None) => ReviewInput::Wrong,
        (Some("n" | "next"), None, None) => ReviewInput::Next,
        (Some("p" | "prev"), None, None) => ReviewInput::Previous,
        (Some("reset"), None, None) => ReviewInput::Reset,
        (Some("wrong"), None, None) => ReviewInput::ToggleWrong,
        (Some("all"), None, None) => ReviewInput::All,
        (Some("list"), None, None) => ReviewInput::List,
        (Some("j" | "jump"), Some(n), None) => {
            parse_ordinal(n).map_or(ReviewInput::Unknown, ReviewInput::Jump)
        }
        (Some("h" | "help" | "?"), None, None) => ReviewInput::Help,
        (Some("b" | "back"), None, None) => ReviewInput::Back,
        (Some("q" | "quit"), None, None) => ReviewInput::Quit,
        _ => ReviewInput::Unknown,
    }
}

/// 1-based number typed by the user to a 0-based index.
fn parse_ordinal(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()?.checked_sub(1)
}

fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn progress_bar(percentage: u32) -> String {
    let filled = (percentage.min(100) as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn section_row(ordinal: usize, row: &SectionOverview) -> String {
    format!(
        "{:>3}. {} ({} commands) {} {}% ({}/{})",
        ordinal,
        row.title,
        row.command_count,
        progress_bar(row.progress.percentage),
        row.progress.percentage,
        row.progress.completed,
        row.progress.total,
    )
}

fn mode_label(mode: ReviewMode) -> &'static str {
    match mode {
        ReviewMode::All => "all cards",
        ReviewMode::Wrong => "wrong only",
    }
}

fn card_lines(card: &CardView) -> Vec<String> {
    let mut lines = vec![format!(
        "Card {}/{} ({}){}{}",
        card.position + 1,
        card.visible_len,
        mode_label(card.mode),
        if card.completed { " [seen]" } else { "" },
        if card.wrong { " [wrong]" } else { "" },
    )];
    lines.push(format!("  {}", card.description));
    if card.flipped {
        lines.push(format!("  $ {}", card.syntax));
    } else {
        lines.push("  (Enter to flip)".to_owned());
    }
    lines
}

//
// ─── LOOP ──────────────────────────────────────────────────────────────────────
//

enum Flow {
    Back,
    Quit,
}

enum Event {
    Line(Option<String>),
    Advance(AdvanceToken),
}

/// Interactive loop over any line source and writer.
pub struct Terminal<R, W> {
    input: Lines<R>,
    out: W,
    services: AppServices,
    advance_delay: Duration,
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    #[must_use]
    pub fn new(input: Lines<R>, out: W, services: AppServices, advance_delay: Duration) -> Self {
        Self {
            input,
            out,
            services,
            advance_delay,
        }
    }

    /// Hand back the writer, e.g. to inspect a transcript.
    #[must_use]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until the user quits or input ends.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading input or writing output fails.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            let Some(mut vm) = self.load_sections().await? else {
                return Ok(());
            };
            let Some(title) = self.pick_section(&mut vm).await? else {
                return Ok(());
            };
            match self.review(&title).await? {
                Flow::Back => {}
                Flow::Quit => return Ok(()),
            }
        }
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.out.flush()?;
        self.input.next_line().await
    }

    async fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.out, "{text}")?;
        self.read_line().await
    }

    /// Load the section list, offering a retry on failure. `None` means quit.
    async fn load_sections(&mut self) -> io::Result<Option<SectionPickerVm>> {
        loop {
            let loader = self.services.loader();
            match SectionPickerVm::load(&loader, self.services.progress()).await {
                Ok(vm) => return Ok(Some(vm)),
                Err(err) => {
                    warn!(error = %err, "section list failed to load");
                    writeln!(self.out, "{LOAD_FAILED}")?;
                    match self.prompt("[r]etry or [q]uit: ").await? {
                        Some(answer) if answer.trim() == "r" => loader.clear_cache().await,
                        _ => return Ok(None),
                    }
                }
            }
        }
    }

    fn render_sections(&mut self, vm: &SectionPickerVm) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Sections")?;
        if vm.sections().is_empty() {
            writeln!(self.out, "  {NO_COMMANDS}")?;
        }
        for (i, row) in vm.sections().iter().enumerate() {
            writeln!(self.out, "{}", section_row(i + 1, row))?;
        }
        writeln!(self.out, "Type <n> to study, r <n> to reset, q to quit.")
    }

    /// Section list screen. Returns the chosen title, or `None` to quit.
    async fn pick_section(&mut self, vm: &mut SectionPickerVm) -> io::Result<Option<String>> {
        self.render_sections(vm)?;
        loop {
            let Some(line) = self.prompt("> ").await? else {
                return Ok(None);
            };
            match parse_list_input(&line) {
                ListInput::Quit => return Ok(None),
                ListInput::Open(index) => match vm.get(index) {
                    Some(row) => return Ok(Some(row.title.clone())),
                    None => writeln!(self.out, "No section #{}", index + 1)?,
                },
                ListInput::Reset(index) => {
                    let Some(title) = vm.get(index).map(|row| row.title.clone()) else {
                        writeln!(self.out, "No section #{}", index + 1)?;
                        continue;
                    };
                    let question = format!("Reset progress for \"{title}\"? [y/N] ");
                    let confirmed = self.prompt(&question).await?.is_some_and(|a| is_yes(&a));
                    let store = self.services.progress().clone();
                    if vm.reset(&store, &title, |_| confirmed).await {
                        writeln!(self.out, "Progress for \"{title}\" cleared.")?;
                    }
                    self.render_sections(vm)?;
                }
                ListInput::Unknown => {
                    writeln!(self.out, "Type a section number, r <n>, or q.")?;
                }
            }
        }
    }

    fn render_review(&mut self, session: &ReviewSession, show_completed: bool) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "== {} ==  progress {}% {}  score {}",
            session.title(),
            session.progress_percentage(),
            progress_bar(session.progress_percentage()),
            session.score(),
        )?;
        match session.screen() {
            ReviewScreen::Card(card) => {
                for line in card_lines(&card) {
                    writeln!(self.out, "{line}")?;
                }
            }
            ReviewScreen::NoWrongCards => {
                writeln!(self.out, "No wrong cards left to review.")?;
                writeln!(self.out, "Type `all` to review every card or `b` to go back.")?;
            }
        }
        if show_completed {
            let entries = session.completed_entries();
            writeln!(self.out, "Completed cards:")?;
            if entries.is_empty() {
                writeln!(self.out, "  none yet")?;
            }
            for (i, entry) in entries.iter().enumerate() {
                writeln!(
                    self.out,
                    "{:>3}. #{} {}",
                    i + 1,
                    entry.original_index + 1,
                    entry.preview
                )?;
            }
        }
        Ok(())
    }

    /// Review screen for one section.
    async fn review(&mut self, title: &str) -> io::Result<Flow> {
        let loader = self.services.loader();
        let opened = match ReviewSession::open(&loader, self.services.progress(), title).await {
            Ok(opened) => opened,
            Err(err) => {
                warn!(section = title, error = %err, "section failed to load");
                writeln!(self.out, "{LOAD_FAILED}")?;
                return Ok(Flow::Back);
            }
        };
        let mut session = match opened {
            SessionOpen::Ready(session) => session.with_advance_delay(self.advance_delay),
            SessionOpen::Empty => {
                writeln!(self.out, "{NO_COMMANDS}")?;
                return Ok(Flow::Back);
            }
        };

        let mut pending: Option<PendingAdvance> = None;
        let mut show_completed = false;
        self.render_review(&session, show_completed)?;

        loop {
            self.out.flush()?;
            let event = match pending {
                Some(advance) => tokio::select! {
                    token = advance.elapsed() => Event::Advance(token),
                    line = self.input.next_line() => Event::Line(line?),
                },
                None => Event::Line(self.input.next_line().await?),
            };

            let line = match event {
                Event::Advance(token) => {
                    pending = None;
                    session.advance(token).await;
                    self.render_review(&session, show_completed)?;
                    continue;
                }
                Event::Line(None) => return Ok(Flow::Quit),
                Event::Line(Some(line)) => line,
            };

            match parse_review_input(&line) {
                ReviewInput::Flip => session.flip().await,
                ReviewInput::Correct => {
                    if let Some(advance) = session.mark_correct().await {
                        pending = Some(advance);
                        writeln!(self.out, "Marked correct.")?;
                    }
                }
                ReviewInput::Wrong => {
                    if let Some(advance) = session.mark_wrong().await {
                        pending = Some(advance);
                        writeln!(self.out, "Marked wrong.")?;
                    }
                }
                ReviewInput::Next => {
                    pending = None;
                    session.next().await;
                }
                ReviewInput::Previous => {
                    pending = None;
                    session.previous().await;
                }
                ReviewInput::Reset => {
                    pending = None;
                    session.reset().await;
                }
                ReviewInput::ToggleWrong => {
                    if session.state().mode() == ReviewMode::All
                        && !session.state().can_enter_wrong_mode()
                    {
                        writeln!(self.out, "No wrong cards to review.")?;
                        continue;
                    }
                    pending = None;
                    session.toggle_wrong_mode().await;
                }
                ReviewInput::All => {
                    pending = None;
                    session.set_mode(ReviewMode::All).await;
                }
                ReviewInput::List => show_completed = !show_completed,
                ReviewInput::Jump(ordinal) => {
                    let Some(entry) = session.completed_entries().get(ordinal).cloned() else {
                        writeln!(self.out, "No completed card #{}", ordinal + 1)?;
                        continue;
                    };
                    pending = None;
                    session.jump_to(entry.original_index).await;
                }
                ReviewInput::Help => {
                    writeln!(self.out, "{REVIEW_HELP}")?;
                    continue;
                }
                ReviewInput::Back => return Ok(Flow::Back),
                ReviewInput::Quit => return Ok(Flow::Quit),
                ReviewInput::Unknown => {
                    debug!(input = line.as_str(), "unrecognized review input");
                    writeln!(self.out, "Unknown command, type h for help.")?;
                    continue;
                }
            }
            self.render_review(&session, show_completed)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cmdcards_core::model::{Command, Dataset, Section};
    use cmdcards_core::time::fixed_clock;
    use services::StaticDataSource;
    use storage::repository::Storage;
    use tokio::io::AsyncBufReadExt;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Section::new(
                "Networking",
                vec![
                    Command::new("Show interfaces", "ip a"),
                    Command::new("Test reachability", "ping host"),
                    Command::new("Show routes", "ip route"),
                ],
            ),
            Section::new("Empty", vec![]),
        ])
    }

    fn services(source: StaticDataSource, storage: &Storage) -> AppServices {
        AppServices::from_storage(storage, Arc::new(source), fixed_clock(), false)
    }

    async fn drive(script: &str, services: AppServices, delay: Duration) -> String {
        let input = script.as_bytes().lines();
        let mut terminal = Terminal::new(input, Vec::new(), services, delay);
        terminal.run().await.unwrap();
        String::from_utf8(terminal.into_output()).unwrap()
    }

    #[test]
    fn parses_list_input() {
        assert_eq!(parse_list_input("2"), ListInput::Open(1));
        assert_eq!(parse_list_input(" r 1 "), ListInput::Reset(0));
        assert_eq!(parse_list_input("q"), ListInput::Quit);
        assert_eq!(parse_list_input("0"), ListInput::Unknown);
        assert_eq!(parse_list_input("open"), ListInput::Unknown);
    }

    #[test]
    fn parses_review_input() {
        assert_eq!(parse_review_input(""), ReviewInput::Flip);
        assert_eq!(parse_review_input("w"), ReviewInput::Wrong);
        assert_eq!(parse_review_input("wrong"), ReviewInput::ToggleWrong);
        assert_eq!(parse_review_input("j 3"), ReviewInput::Jump(2));
        assert_eq!(parse_review_input("j"), ReviewInput::Unknown);
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0), format!("[{}]", "-".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(100), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(50).matches('#').count(), BAR_WIDTH / 2);
    }

    #[tokio::test]
    async fn lists_sections_and_quits() {
        let storage = Storage::in_memory();
        let out = drive(
            "q\n",
            services(StaticDataSource::new(dataset()), &storage),
            Duration::ZERO,
        )
        .await;
        assert!(out.contains("1. Networking (3 commands)"));
        assert!(out.contains("2. Empty (0 commands)"));
    }

    #[tokio::test]
    async fn empty_section_reports_no_commands() {
        let storage = Storage::in_memory();
        let out = drive(
            "2\nq\n",
            services(StaticDataSource::new(dataset()), &storage),
            Duration::ZERO,
        )
        .await;
        assert!(out.contains(NO_COMMANDS));
    }

    #[tokio::test]
    async fn load_failure_offers_retry() {
        let storage = Storage::in_memory();
        let out = drive(
            "q\n",
            services(StaticDataSource::unavailable(), &storage),
            Duration::ZERO,
        )
        .await;
        assert!(out.contains(LOAD_FAILED));
        assert!(out.contains("[r]etry"));
    }

    #[tokio::test]
    async fn flip_and_mark_persist_progress() {
        let storage = Storage::in_memory();
        let app = services(StaticDataSource::new(dataset()), &storage);
        let store = app.progress().clone();

        let out = drive("1\nf\nw\nb\nq\n", app, Duration::from_secs(60)).await;
        assert!(out.contains("$ ip a"));
        assert!(out.contains("Marked wrong."));

        let record = store.load("Networking").await.unwrap();
        assert!(record.completed_card_indices.contains(&0));
        assert!(record.wrong_card_indices.contains(&0));
        assert!(out.contains("1. Networking (3 commands)"));
        assert!(out.contains("33% (1/3)"));
    }

    #[tokio::test]
    async fn marking_auto_advances_after_delay() {
        let storage = Storage::in_memory();
        let app = services(StaticDataSource::new(dataset()), &storage);
        let store = app.progress().clone();

        let (mut writer, reader) = tokio::io::duplex(256);
        let input = tokio::io::BufReader::new(reader).lines();
        let mut terminal = Terminal::new(input, Vec::new(), app, Duration::from_millis(10));

        let feeder = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            writer.write_all(b"1\nc\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            writer.write_all(b"q\n").await.unwrap();
        });
        terminal.run().await.unwrap();
        feeder.await.unwrap();

        let out = String::from_utf8(terminal.into_output()).unwrap();
        assert!(out.contains("Card 2/3"));
        assert_eq!(store.load("Networking").await.unwrap().current_index, 1);
    }

    #[tokio::test]
    async fn wrong_mode_needs_wrong_cards() {
        let storage = Storage::in_memory();
        let out = drive(
            "1\nwrong\nq\n",
            services(StaticDataSource::new(dataset()), &storage),
            Duration::ZERO,
        )
        .await;
        assert!(out.contains("No wrong cards to review."));
    }

    #[tokio::test]
    async fn jump_to_completed_card_from_list() {
        let storage = Storage::in_memory();
        let app = services(StaticDataSource::new(dataset()), &storage);
        let store = app.progress().clone();

        let out = drive("1\nn\nn\nf\nlist\nj 1\nq\n", app, Duration::ZERO).await;
        assert!(out.contains("Completed cards:"));
        assert!(out.contains("1. #3 Show routes..."));
        assert_eq!(store.load("Networking").await.unwrap().current_index, 2);
    }

    #[tokio::test]
    async fn marks_report_only_when_a_card_was_marked() {
        let storage = Storage::in_memory();
        let out = drive(
            "1\nw\nwrong\nc\nc\nw\nq\n",
            services(StaticDataSource::new(dataset()), &storage),
            Duration::from_secs(60),
        )
        .await;
        assert!(out.contains("No wrong cards left to review."));
        assert_eq!(out.matches("Marked correct.").count(), 1);
        assert_eq!(out.matches("Marked wrong.").count(), 1);
    }

    #[tokio::test]
    async fn review_reset_clears_without_prompting() {
        let storage = Storage::in_memory();
        let app = services(StaticDataSource::new(dataset()), &storage);
        let store = app.progress().clone();

        let out = drive("1\nf\nn\nreset\nq\n", app, Duration::ZERO).await;
        assert!(!out.contains("[y/N]"));

        let record = store.load("Networking").await.unwrap();
        assert!(record.completed_card_indices.is_empty());
        assert_eq!(record.current_index, 0);
    }

    #[tokio::test]
    async fn section_reset_requires_confirmation() {
        let storage = Storage::in_memory();
        let app = services(StaticDataSource::new(dataset()), &storage);
        let store = app.progress().clone();

        let out = drive("1\nf\nb\nr 1\nn\nr 1\ny\nq\n", app, Duration::ZERO).await;
        assert!(out.contains("Reset progress for \"Networking\"? [y/N]"));
        assert!(out.contains("Progress for \"Networking\" cleared."));
        assert!(store.load("Networking").await.is_none());
    }
}
