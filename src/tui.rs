#[path = "tui_helpers.rs"]
mod helpers;
#[path = "tui_render.rs"]
mod render;

use self::helpers::{PromptInput, edit_prompt_buffer};
use crate::keymap::{Command, HELP_LINES, KeyDispatcher, Pane};
use crate::registry::{AddOutcome, Registry, StreamField, default_stream_name};
use crate::settings::{CommandTemplate, Settings, ThemePalette};
use crate::store::{RecordStore, StreamId, StreamRecord};
use crate::supervisor::{PlayerOutput, Supervisor, SupervisorError};
use crate::viewport::{Direction, ListViewport, ScrollViewport, page_height_for};
use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures_util::{FutureExt, Stream, StreamExt};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use std::io;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on how long the loop sleeps without input, so exited players are noticed.
const INPUT_TIMEOUT: Duration = Duration::from_secs(1);
/// Player lines handled in one wake-up before input gets another turn.
const MAX_OUTPUT_BURST: usize = 64;

static THEME: OnceLock<ThemePalette> = OnceLock::new();

pub async fn run_tui<S: RecordStore>(registry: Registry<S>, settings: Settings) -> Result<()> {
    let _ = THEME.set(settings.palette);

    let mut terminal = init_terminal()?;
    let height = terminal
        .size()
        .context("failed reading terminal size")?
        .height;
    let mut app = App::new(registry, &settings, height);
    info!(
        streams = app.registry.streams().len(),
        profiles = app.commands.len(),
        "dashboard started"
    );

    let mut events = EventStream::new();
    let run_result = run_loop(&mut terminal, &mut app, &mut events).await;
    app.supervisor.shutdown();
    let restore_result = restore_terminal(&mut terminal);

    run_result?;
    restore_result?;
    Ok(())
}

enum Wake {
    Terminal(Option<io::Result<Event>>),
    Player(PlayerOutput),
    Tick,
}

async fn run_loop<S, B, E>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    events: &mut E,
) -> Result<()>
where
    S: RecordStore,
    B: Backend,
    E: Stream<Item = io::Result<Event>> + Unpin,
{
    let mut running = true;

    while running {
        app.apply_pending_resize();
        app.reap_finished();

        let redraw = std::mem::replace(&mut app.redraw, Redraw::Nothing);
        if redraw == Redraw::Full {
            terminal.clear().context("failed clearing terminal")?;
        }
        if redraw != Redraw::Nothing {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed drawing TUI frame")?;
        }

        let wake = tokio::select! {
            event = events.next() => Wake::Terminal(event),
            output = app.supervisor.next_output() => Wake::Player(output),
            () = tokio::time::sleep(INPUT_TIMEOUT) => Wake::Tick,
        };

        match wake {
            Wake::Terminal(None) => {
                debug!("terminal event stream closed");
                running = false;
            }
            Wake::Terminal(Some(event)) => {
                let event = event.context("failed reading input")?;
                match app.handle_event(event) {
                    AppCommand::None => {}
                    AppCommand::Quit => running = false,
                }
            }
            Wake::Player(output) => {
                app.show_player_output(&output);
                for _ in 0..MAX_OUTPUT_BURST {
                    let Some(output) = app.supervisor.next_output().now_or_never() else {
                        break;
                    };
                    app.show_player_output(&output);
                }
            }
            Wake::Tick => {}
        }
    }

    Ok(())
}

type AppTerminal = Terminal<CrosstermBackend<io::Stdout>>;

fn active_theme() -> &'static ThemePalette {
    THEME.get_or_init(ThemePalette::default)
}

fn init_terminal() -> Result<AppTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("failed creating terminal")
}

fn restore_terminal(terminal: &mut AppTerminal) -> Result<()> {
    disable_raw_mode().context("failed disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed leaving alternate screen")?;
    terminal.show_cursor().context("failed showing cursor")?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum AppCommand {
    None,
    Quit,
}

/// How much of the screen a change invalidated. Scopes merge upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Redraw {
    Nothing,
    Status,
    Footer,
    Row,
    Pane,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirmation {
    Delete(StreamId),
    Reset(StreamId),
}

impl Confirmation {
    fn verb(self) -> &'static str {
        match self {
            Self::Delete(_) => "Delete",
            Self::Reset(_) => "Reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Filter,
    NewStream,
    Edit { id: StreamId, field: StreamField },
    Confirm(Confirmation),
}

#[derive(Debug)]
struct Prompt {
    kind: PromptKind,
    label: String,
    buffer: String,
}

struct App<S: RecordStore> {
    registry: Registry<S>,
    supervisor: Supervisor,
    commands: Vec<CommandTemplate>,
    command_index: usize,
    pane: Pane,
    list: ListViewport,
    help: ScrollViewport,
    keys: KeyDispatcher,
    prompt: Option<Prompt>,
    footer: String,
    status: String,
    pending_resize: Option<u16>,
    redraw: Redraw,
}

impl<S: RecordStore> App<S> {
    fn new(registry: Registry<S>, settings: &Settings, terminal_height: u16) -> Self {
        let commands = if settings.commands.is_empty() {
            Settings::default().commands
        } else {
            settings.commands.clone()
        };
        let page_height = page_height_for(terminal_height);

        let mut app = Self {
            registry,
            supervisor: Supervisor::new(settings.max_players),
            commands,
            command_index: 0,
            pane: Pane::Streams,
            list: ListViewport::new(page_height),
            help: ScrollViewport::new(page_height),
            keys: KeyDispatcher::default(),
            prompt: None,
            footer: String::new(),
            status: String::new(),
            pending_resize: None,
            redraw: Redraw::Full,
        };
        app.show_position();
        app
    }

    fn request(&mut self, scope: Redraw) {
        self.redraw = self.redraw.max(scope);
    }

    fn selected(&self) -> Option<&StreamRecord> {
        self.registry.filtered_at(self.list.row())
    }

    fn handle_event(&mut self, event: Event) -> AppCommand {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Resize(_, height) => {
                self.request_resize(height);
                AppCommand::None
            }
            _ => AppCommand::None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> AppCommand {
        if let Some(prompt) = self.prompt.take() {
            self.handle_prompt_key(prompt, &key);
            return AppCommand::None;
        }

        let Some(command) = self.keys.dispatch(&key) else {
            return AppCommand::None;
        };
        if !command.available_in(self.pane) {
            return AppCommand::None;
        }
        match self.pane {
            Pane::Streams => self.run_stream_command(command),
            Pane::Help => {
                self.run_help_command(command);
                AppCommand::None
            }
        }
    }

    fn run_stream_command(&mut self, command: Command) -> AppCommand {
        match command {
            Command::MoveUp => self.step(Direction::Up),
            Command::MoveDown => self.step(Direction::Down),
            Command::JumpTop => self.jump_to(0),
            Command::JumpBottom => {
                let last = self.registry.filtered_len().saturating_sub(1);
                self.jump_to(last);
            }
            Command::Filter => self.open_prompt(PromptKind::Filter, "Filter: ".to_owned()),
            Command::ClearFilter => self.clear_filter(),
            Command::Quit => {
                self.supervisor.shutdown();
                return AppCommand::Quit;
            }
            Command::Play => self.play_selected(),
            Command::Stop => self.stop_selected(),
            Command::ResetCounters => self.confirm_selected(Confirmation::Reset),
            Command::DeleteStream => self.confirm_selected(Confirmation::Delete),
            Command::Edit(field) => self.edit_selected(field),
            Command::ShowCommand => self.show_command(),
            Command::CycleCommand => {
                self.command_index = (self.command_index + 1) % self.commands.len();
                self.show_command();
            }
            Command::AddStream => self.open_prompt(
                PromptKind::NewStream,
                "New stream URL (empty to cancel): ".to_owned(),
            ),
            Command::ShowHelp => self.show_help(),
            Command::Back => {}
        }
        AppCommand::None
    }

    fn run_help_command(&mut self, command: Command) {
        let content = HELP_LINES.len();
        match command {
            Command::MoveUp => self.help.page(Direction::Up, content),
            Command::MoveDown => self.help.page(Direction::Down, content),
            Command::JumpTop => self.help.jump(Direction::Up, content),
            Command::JumpBottom => self.help.jump(Direction::Down, content),
            Command::Quit | Command::Back => {
                self.show_streams();
                return;
            }
            _ => return,
        }
        self.request(Redraw::Pane);
    }

    fn step(&mut self, direction: Direction) {
        if self.list.step(direction, self.registry.filtered_len()) {
            self.show_position();
        }
    }

    fn jump_to(&mut self, row: usize) {
        self.list.jump_to(row, self.registry.filtered_len());
        self.show_position();
    }

    fn show_position(&mut self) {
        let footer = match self.selected() {
            Some(stream) => format!(
                "{}/{} {} {}",
                self.list.row() + 1,
                self.registry.filtered_len(),
                stream.url,
                stream.resolution
            ),
            None => "Ready".to_owned(),
        };
        self.footer = footer;
        self.request(Redraw::Footer);
    }

    fn show_help(&mut self) {
        self.pane = Pane::Help;
        self.help.jump(Direction::Up, HELP_LINES.len());
        self.request(Redraw::Full);
    }

    fn show_streams(&mut self) {
        self.pane = Pane::Streams;
        self.show_position();
        self.request(Redraw::Full);
    }

    fn show_command(&mut self) {
        let Some(template) = self.commands.get(self.command_index) else {
            return;
        };
        self.footer = format!(
            "{}/{} {}",
            self.command_index + 1,
            self.commands.len(),
            template.display()
        );
        self.request(Redraw::Footer);
    }

    fn open_prompt(&mut self, kind: PromptKind, label: String) {
        self.prompt = Some(Prompt {
            kind,
            label,
            buffer: String::new(),
        });
        self.request(Redraw::Footer);
    }

    fn confirm_selected(&mut self, confirmation: fn(StreamId) -> Confirmation) {
        let Some(stream) = self.selected() else {
            return;
        };
        let confirmation = confirmation(stream.id);
        let label = format!("{} stream {}? y/[n]", confirmation.verb(), stream.name);
        self.open_prompt(PromptKind::Confirm(confirmation), label);
    }

    fn edit_selected(&mut self, field: StreamField) {
        let Some(id) = self.selected().map(|stream| stream.id) else {
            return;
        };
        self.open_prompt(
            PromptKind::Edit { id, field },
            format!("{} (empty to cancel): ", field.label()),
        );
    }

    fn handle_prompt_key(&mut self, mut prompt: Prompt, key: &KeyEvent) {
        if let PromptKind::Confirm(confirmation) = prompt.kind {
            if key.code == KeyCode::Char('y') {
                self.apply_confirmation(confirmation);
            } else {
                self.show_position();
            }
            return;
        }

        match edit_prompt_buffer(&mut prompt.buffer, key) {
            PromptInput::Submit => self.submit_prompt(&prompt),
            PromptInput::Cancel => self.show_position(),
            PromptInput::Edited | PromptInput::Ignored => {
                self.prompt = Some(prompt);
                self.request(Redraw::Footer);
            }
        }
    }

    fn submit_prompt(&mut self, prompt: &Prompt) {
        let text = prompt.buffer.trim();
        match prompt.kind {
            PromptKind::Filter => self.apply_filter(text),
            PromptKind::NewStream => self.add_stream(text),
            PromptKind::Edit { id, field } => self.apply_edit(id, field, text),
            PromptKind::Confirm(confirmation) => self.apply_confirmation(confirmation),
        }
    }

    fn apply_filter(&mut self, text: &str) {
        if text.is_empty() {
            self.clear_filter();
            return;
        }
        let matches = self.registry.set_filter(text);
        self.list.reset();
        self.status = format!("New filter: {} ({matches} matches)", self.registry.filter());
        self.show_position();
        self.request(Redraw::Pane);
    }

    fn clear_filter(&mut self) {
        self.registry.set_filter("");
        self.list.reset();
        "Filter cleared".clone_into(&mut self.status);
        self.show_position();
        self.request(Redraw::Pane);
    }

    fn add_stream(&mut self, url: &str) {
        if url.is_empty() {
            self.show_position();
            return;
        }
        let Some(name) = default_stream_name(url) else {
            self.status = format!("Cannot derive a stream name from {url}");
            self.show_position();
            return;
        };

        let target_row = match self.registry.add(&name, url, None) {
            Ok(AddOutcome::Added(id)) => {
                info!(stream_id = id, %url, "stream added");
                match self.registry.filtered_position(id) {
                    Some(row) => {
                        self.status = format!("Added stream {name}");
                        row
                    }
                    None => {
                        self.status = format!(
                            "Added stream {name} (hidden by filter '{}')",
                            self.registry.filter()
                        );
                        self.list.row()
                    }
                }
            }
            Ok(AddOutcome::Existing(id)) => {
                if let Some(existing) = self.registry.get(id) {
                    self.status = format!("Stream already exists: {}", existing.name);
                }
                self.registry
                    .filtered_position(id)
                    .unwrap_or(self.list.row())
            }
            Err(err) => {
                self.report_failure("save streams", &err);
                self.registry.filtered_len().saturating_sub(1)
            }
        };
        self.list.jump_to(target_row, self.registry.filtered_len());
        self.show_position();
        self.request(Redraw::Pane);
    }

    fn apply_edit(&mut self, id: StreamId, field: StreamField, value: &str) {
        if value.is_empty() {
            self.show_position();
            return;
        }
        let listed_before = self.registry.filtered_len();
        match self.registry.edit(id, field, value) {
            Ok(true) => self.request(Redraw::Row),
            Ok(false) => {}
            Err(err) => {
                self.report_failure("save streams", &err);
                self.request(Redraw::Row);
            }
        }
        if self.registry.filtered_len() != listed_before {
            self.list.clamp(self.registry.filtered_len());
            self.request(Redraw::Pane);
        }
        self.show_position();
    }

    fn apply_confirmation(&mut self, confirmation: Confirmation) {
        match confirmation {
            Confirmation::Delete(id) => {
                match self.registry.delete(id) {
                    Ok(Some(removed)) => {
                        info!(stream_id = id, url = %removed.url, "stream deleted");
                        self.status = format!("Deleted stream {}", removed.name);
                    }
                    Ok(None) => {}
                    Err(err) => self.report_failure("save streams", &err),
                }
                self.list.clamp(self.registry.filtered_len());
                self.request(Redraw::Pane);
            }
            Confirmation::Reset(id) => {
                if let Err(err) = self.registry.reset_counters(id) {
                    self.report_failure("save streams", &err);
                }
                self.request(Redraw::Row);
            }
        }
        self.show_position();
    }

    fn play_selected(&mut self) {
        let Some(stream) = self.selected() else {
            return;
        };
        let (id, url, resolution) = (stream.id, stream.url.clone(), stream.resolution.clone());
        let Some(template) = self.commands.get(self.command_index) else {
            return;
        };

        match self.supervisor.launch(id, &url, &resolution, template) {
            Ok(_) => {
                if let Err(err) = self.registry.bump(id, true) {
                    self.report_failure("save streams", &err);
                }
                self.request(Redraw::Row);
            }
            Err(err) => {
                warn!(stream_id = id, error = %err, "launch refused");
                self.footer = launch_failure_message(&err);
                self.request(Redraw::Footer);
            }
        }
    }

    fn stop_selected(&mut self) {
        let Some(id) = self.selected().map(|stream| stream.id) else {
            return;
        };
        if self.supervisor.stop(id).is_some() {
            self.request(Redraw::Row);
            self.show_position();
        }
    }

    /// Drops exited players from the supervisor and announces each one.
    fn reap_finished(&mut self) {
        for id in self.supervisor.reap() {
            let Some(row) = self.registry.filtered_position(id) else {
                continue;
            };
            if let Some(stream) = self.registry.filtered_at(row) {
                let footer = format!("Stream {} has stopped", stream.name);
                self.footer = footer;
            }
            self.request(Redraw::Row);
        }
    }

    fn show_player_output(&mut self, output: &PlayerOutput) {
        let line = output.line.trim_end();
        if line.trim().is_empty() {
            return;
        }
        line.clone_into(&mut self.status);
        self.request(Redraw::Status);
    }

    fn request_resize(&mut self, terminal_height: u16) {
        self.pending_resize = Some(terminal_height);
    }

    fn apply_pending_resize(&mut self) {
        let Some(terminal_height) = self.pending_resize.take() else {
            return;
        };
        let page_height = page_height_for(terminal_height);
        self.list.resize(page_height, self.registry.filtered_len());
        self.help.resize(page_height);
        debug!(
            page_height = self.list.page_height(),
            offset = self.list.offset(),
            row = self.list.row(),
            "viewport resized"
        );
        self.request(Redraw::Full);
    }

    fn report_failure(&mut self, action: &str, err: &anyhow::Error) {
        warn!("failed to {action}: {err:#}");
        self.status = format!("Failed to {action}: {err:#}");
        self.request(Redraw::Status);
    }
}

fn launch_failure_message(err: &SupervisorError) -> String {
    match err {
        SupervisorError::DuplicateLaunch { .. } => "This stream is already playing".to_owned(),
        SupervisorError::CapacityExceeded { max_size } => {
            format!("Too many streams playing (max {max_size})")
        }
        SupervisorError::SpawnFailed { source, .. } => format!("Faulty command line: {source}"),
        SupervisorError::EmptyCommand => "Faulty command line: command is empty".to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::tests::{MemoryStore, record};
    use crate::settings::ResolutionPolicy;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    fn app_with(records: Vec<StreamRecord>, settings: &Settings) -> App<MemoryStore> {
        let registry =
            Registry::load(MemoryStore::with(records), ResolutionPolicy::default()).unwrap();
        App::new(registry, settings, 24)
    }

    fn sample_app() -> App<MemoryStore> {
        app_with(
            vec![record(1, "alpha", 5), record(2, "bravo", 3), record(3, "charlie", 1)],
            &Settings::default(),
        )
    }

    fn shell_settings(script: &str) -> Settings {
        Settings {
            commands: vec![CommandTemplate::from_words(vec![
                "sh".to_owned(),
                "-c".to_owned(),
                script.to_owned(),
            ])],
            ..Settings::default()
        }
    }

    fn press<S: RecordStore>(app: &mut App<S>, code: KeyCode) -> AppCommand {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text<S: RecordStore>(app: &mut App<S>, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn selected_name<S: RecordStore>(app: &App<S>) -> String {
        app.selected().map(|s| s.name.clone()).unwrap_or_default()
    }

    #[test]
    fn starts_on_first_row_with_position_footer() {
        let app = sample_app();
        assert_eq!(app.pane, Pane::Streams);
        assert_eq!(app.footer, "1/3 http://example.com/alpha best");
        assert_eq!(app.redraw, Redraw::Full);
    }

    #[test]
    fn empty_catalog_reports_ready_and_ignores_commands() {
        let mut app = app_with(Vec::new(), &Settings::default());
        assert_eq!(app.footer, "Ready");

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('j'));

        assert!(app.prompt.is_none());
        assert!(app.supervisor.is_empty());
        assert_eq!(app.footer, "Ready");
    }

    #[test]
    fn navigation_updates_footer_only() {
        let mut app = sample_app();
        app.redraw = Redraw::Nothing;

        press(&mut app, KeyCode::Char('j'));
        assert_eq!(selected_name(&app), "bravo");
        assert_eq!(app.footer, "2/3 http://example.com/bravo best");
        assert_eq!(app.redraw, Redraw::Footer);

        press(&mut app, KeyCode::Char('G'));
        assert_eq!(selected_name(&app), "charlie");
        press(&mut app, KeyCode::Down);
        assert_eq!(selected_name(&app), "charlie");

        press(&mut app, KeyCode::Char('g'));
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(selected_name(&app), "alpha");
        press(&mut app, KeyCode::Up);
        assert_eq!(app.list.row(), 0);
    }

    #[test]
    fn filter_prompt_narrows_and_clear_restores() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('G'));

        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.prompt.as_ref().map(|p| p.label.as_str()), Some("Filter: "));
        type_text(&mut app, "RAV");
        press(&mut app, KeyCode::Enter);

        assert!(app.prompt.is_none());
        assert_eq!(app.registry.filtered_len(), 1);
        assert_eq!(app.list.row(), 0);
        assert_eq!(app.status, "New filter: rav (1 matches)");
        assert_eq!(selected_name(&app), "bravo");

        press(&mut app, KeyCode::Char('F'));
        assert_eq!(app.status, "Filter cleared");
        assert_eq!(app.registry.filtered_len(), 3);
        assert!(app.redraw >= Redraw::Pane);
    }

    #[test]
    fn escape_cancels_prompt_without_side_effects() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('f'));
        type_text(&mut app, "zzz");
        press(&mut app, KeyCode::Esc);

        assert!(app.prompt.is_none());
        assert_eq!(app.registry.filtered_len(), 3);
        assert!(app.registry.filter().is_empty());
    }

    #[test]
    fn prompt_swallows_command_keys() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(press(&mut app, KeyCode::Char('q')), AppCommand::None);
        assert_eq!(app.prompt.as_ref().map(|p| p.buffer.as_str()), Some("q"));
    }

    #[test]
    fn adding_stream_derives_name_and_selects_it() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "https://www.twitch.tv/newcomer");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.registry.streams().len(), 4);
        assert_eq!(selected_name(&app), "newcomer");
        assert_eq!(app.list.row(), 3);
        assert_eq!(app.registry.store().records.len(), 4);
        assert_eq!(app.status, "Added stream newcomer");
    }

    #[test]
    fn empty_url_cancels_add() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.registry.streams().len(), 3);
        assert_eq!(app.registry.store().saves, 0);
    }

    #[test]
    fn adding_stream_hidden_by_filter_keeps_cursor() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('f'));
        type_text(&mut app, "bra");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "https://www.twitch.tv/newcomer");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.registry.streams().len(), 4);
        assert_eq!(app.registry.filtered_len(), 1);
        assert_eq!(selected_name(&app), "bravo");
        assert_eq!(app.status, "Added stream newcomer (hidden by filter 'bra')");
    }

    #[test]
    fn editing_row_out_of_filter_moves_cursor_back() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('f'));
        type_text(&mut app, "r");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.registry.filtered_len(), 2);
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(selected_name(&app), "charlie");
        app.redraw = Redraw::Nothing;

        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "zed");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.registry.filtered_len(), 2);

        press(&mut app, KeyCode::Char('u'));
        type_text(&mut app, "http://example.com/zed");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.registry.filtered_len(), 1);
        assert_eq!(app.list.row(), 0);
        assert_eq!(selected_name(&app), "bravo");
        assert!(app.redraw >= Redraw::Pane);
        assert_eq!(app.registry.get(3).unwrap().name, "zed");
    }

    #[test]
    fn adding_known_url_selects_existing_record() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "http://example.com/bravo");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.registry.streams().len(), 3);
        assert_eq!(selected_name(&app), "bravo");
        assert_eq!(app.status, "Stream already exists: bravo");
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('G'));

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(
            app.prompt.as_ref().map(|p| p.label.as_str()),
            Some("Delete stream charlie? y/[n]")
        );
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.registry.streams().len(), 3);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.registry.streams().len(), 2);
        assert_eq!(app.list.row(), 1);
        assert_eq!(selected_name(&app), "bravo");
        assert_eq!(app.status, "Deleted stream charlie");
    }

    #[test]
    fn edit_and_reset_change_selected_record() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(
            app.prompt.as_ref().map(|p| p.label.as_str()),
            Some("Resolution (empty to cancel): ")
        );
        type_text(&mut app, "720p");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.registry.get(1).unwrap().resolution, "720p");
        assert_eq!(app.footer, "1/3 http://example.com/alpha 720p");

        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.registry.get(1).unwrap().name, "alpha");

        press(&mut app, KeyCode::Char('c'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.registry.get(1).unwrap().seen_count, 0);
        assert_eq!(app.registry.store().records.len(), 3);
    }

    #[test]
    fn failed_save_is_reported_on_status_line() {
        let registry = Registry::load(
            MemoryStore {
                records: vec![record(1, "alpha", 1)],
                fail_saves: true,
                ..MemoryStore::default()
            },
            ResolutionPolicy::default(),
        )
        .unwrap();
        let mut app = App::new(registry, &Settings::default(), 24);

        press(&mut app, KeyCode::Char('u'));
        type_text(&mut app, "http://elsewhere/alpha");
        press(&mut app, KeyCode::Enter);

        assert!(app.status.starts_with("Failed to save streams"));
        assert_eq!(app.registry.get(1).unwrap().url, "http://elsewhere/alpha");
    }

    #[test]
    fn help_pane_only_navigates_and_returns() {
        let mut app = app_with(Vec::new(), &Settings::default());
        app.list.resize(10, 0);
        app.help.resize(10);

        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.pane, Pane::Help);

        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.help.offset(), 10);
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.help.offset(), HELP_LINES.len() - 9);

        press(&mut app, KeyCode::Char('a'));
        assert!(app.prompt.is_none());

        assert_eq!(press(&mut app, KeyCode::Char('q')), AppCommand::None);
        assert_eq!(app.pane, Pane::Streams);

        press(&mut app, KeyCode::Char('h'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.pane, Pane::Streams);
    }

    #[test]
    fn command_profiles_cycle() {
        let settings = Settings {
            commands: vec![
                CommandTemplate::parse("streamlink").unwrap(),
                CommandTemplate::parse("streamlink -p mpv").unwrap(),
            ],
            ..Settings::default()
        };
        let mut app = app_with(vec![record(1, "alpha", 1)], &settings);

        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.footer, "1/2 streamlink");
        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.footer, "2/2 streamlink -p mpv");
        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.footer, "1/2 streamlink");
    }

    #[test]
    fn resize_is_applied_on_next_iteration() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('G'));
        app.redraw = Redraw::Nothing;

        app.handle_event(Event::Resize(80, 5));
        assert_eq!(app.list.page_height(), 21);

        app.apply_pending_resize();
        assert_eq!(app.list.page_height(), 2);
        assert_eq!(app.list.row(), 2);
        assert!(app.list.visible_range(3).contains(&2));
        assert_eq!(app.redraw, Redraw::Full);
    }

    #[test]
    fn player_output_lands_on_status_line() {
        let mut app = sample_app();
        app.redraw = Redraw::Nothing;

        app.show_player_output(&PlayerOutput {
            id: 1,
            line: "   ".to_owned(),
        });
        assert_eq!(app.redraw, Redraw::Nothing);

        app.show_player_output(&PlayerOutput {
            id: 1,
            line: "[cli][info] Opening stream: 720p".to_owned(),
        });
        assert_eq!(app.status, "[cli][info] Opening stream: 720p");
        assert_eq!(app.redraw, Redraw::Status);
    }

    #[test]
    fn quit_from_streams_pane_ends_session() {
        let mut app = sample_app();
        assert_eq!(press(&mut app, KeyCode::Char('q')), AppCommand::Quit);
    }

    #[tokio::test]
    async fn playing_launches_once_and_counts_view() {
        let mut app = app_with(vec![record(1, "alpha", 0)], &shell_settings("sleep 30"));

        press(&mut app, KeyCode::Enter);
        assert!(app.supervisor.contains(1));
        assert_eq!(app.registry.get(1).unwrap().seen_count, 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.footer, "This stream is already playing");
        assert_eq!(app.supervisor.len(), 1);
        assert_eq!(app.registry.get(1).unwrap().seen_count, 1);

        press(&mut app, KeyCode::Char('s'));
        assert!(app.supervisor.is_empty());
        assert_eq!(press(&mut app, KeyCode::Char('q')), AppCommand::Quit);
    }

    #[tokio::test]
    async fn faulty_command_is_reported() {
        let settings = Settings {
            commands: vec![CommandTemplate::parse("/nonexistent/player-binary").unwrap()],
            ..Settings::default()
        };
        let mut app = app_with(vec![record(1, "alpha", 0)], &settings);

        press(&mut app, KeyCode::Enter);

        assert!(app.footer.starts_with("Faulty command line: "));
        assert!(app.supervisor.is_empty());
        assert_eq!(app.registry.get(1).unwrap().seen_count, 0);
    }

    #[tokio::test]
    async fn exited_player_is_announced() {
        let mut app = app_with(vec![record(1, "alpha", 0)], &shell_settings("exit 0"));
        press(&mut app, KeyCode::Enter);

        for _ in 0..250 {
            app.reap_finished();
            if app.supervisor.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(app.supervisor.is_empty());
        assert_eq!(app.footer, "Stream alpha has stopped");
    }

    fn scripted_keys(
        script: Vec<(Duration, KeyCode)>,
    ) -> impl Stream<Item = io::Result<Event>> + Unpin {
        Box::pin(
            futures_util::stream::iter(script).then(|(delay, code)| async move {
                tokio::time::sleep(delay).await;
                Ok(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
            }),
        )
    }

    fn screen_lines(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_owned())
                    .collect::<String>()
            })
            .collect()
    }

    #[tokio::test]
    async fn loop_shows_output_announces_exit_and_quits() {
        let mut app = app_with(
            vec![record(1, "alpha", 0)],
            &shell_settings("echo hi; exit 0"),
        );
        let mut terminal = Terminal::new(TestBackend::new(70, 10)).unwrap();
        let mut events = scripted_keys(vec![
            (Duration::ZERO, KeyCode::Enter),
            (Duration::from_millis(2500), KeyCode::Char('q')),
        ]);

        tokio::time::timeout(
            Duration::from_secs(10),
            run_loop(&mut terminal, &mut app, &mut events),
        )
        .await
        .expect("loop should quit on q")
        .unwrap();

        assert_eq!(app.status, "hi");
        assert_eq!(app.footer, "Stream alpha has stopped");
        assert!(app.supervisor.is_empty());
        let screen = screen_lines(&terminal);
        assert!(screen[8].starts_with("Stream alpha has stopped"));
        assert!(screen[9].starts_with("hi"));
    }

    #[tokio::test]
    async fn loop_keeps_latest_player_line_on_status() {
        let mut app = app_with(
            vec![record(1, "alpha", 0)],
            &shell_settings("printf 'one\\ntwo\\nthree\\n'; sleep 30"),
        );
        press(&mut app, KeyCode::Enter);
        let mut terminal = Terminal::new(TestBackend::new(70, 10)).unwrap();
        let mut events = scripted_keys(vec![(Duration::from_millis(800), KeyCode::Char('q'))]);

        run_loop(&mut terminal, &mut app, &mut events).await.unwrap();

        assert_eq!(app.status, "three");
        assert!(app.supervisor.contains(1));
        app.supervisor.shutdown();
    }

    #[tokio::test]
    async fn loop_ends_when_terminal_events_close() {
        let mut app = sample_app();
        let mut terminal = Terminal::new(TestBackend::new(70, 10)).unwrap();
        let mut events = futures_util::stream::empty::<io::Result<Event>>();

        run_loop(&mut terminal, &mut app, &mut events).await.unwrap();

        let screen = screen_lines(&terminal);
        assert!(screen[2].contains("alpha"));
        assert_eq!(app.redraw, Redraw::Nothing);
    }

    #[tokio::test]
    async fn idle_tick_reaps_exited_player() {
        let mut app = app_with(
            vec![record(1, "alpha", 0)],
            &shell_settings("exec 1>&- 2>&-; sleep 0.2"),
        );
        press(&mut app, KeyCode::Enter);
        let mut terminal = Terminal::new(TestBackend::new(70, 10)).unwrap();
        let mut events = scripted_keys(vec![(Duration::from_millis(2500), KeyCode::Char('q'))]);

        run_loop(&mut terminal, &mut app, &mut events).await.unwrap();

        assert!(app.supervisor.is_empty());
        assert_eq!(app.footer, "Stream alpha has stopped");
    }

    #[test]
    fn launch_errors_map_to_footer_messages() {
        assert_eq!(
            launch_failure_message(&SupervisorError::CapacityExceeded { max_size: 10 }),
            "Too many streams playing (max 10)"
        );
        assert_eq!(
            launch_failure_message(&SupervisorError::DuplicateLaunch { id: 3 }),
            "This stream is already playing"
        );
    }
}
