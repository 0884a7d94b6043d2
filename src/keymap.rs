use crate::registry::StreamField;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pane {
    Streams,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveUp,
    MoveDown,
    Filter,
    ClearFilter,
    JumpTop,
    JumpBottom,
    Quit,
    Play,
    Stop,
    ResetCounters,
    Edit(StreamField),
    ShowCommand,
    CycleCommand,
    AddStream,
    DeleteStream,
    ShowHelp,
    Back,
}

impl Command {
    /// Secondary panes only understand navigation and leaving.
    #[must_use]
    pub fn available_in(self, pane: Pane) -> bool {
        match pane {
            Pane::Streams => true,
            Pane::Help => matches!(
                self,
                Self::MoveUp
                    | Self::MoveDown
                    | Self::JumpTop
                    | Self::JumpBottom
                    | Self::Quit
                    | Self::Back
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Run(Command),
    /// First half of `gg`.
    TopPrefix,
}

const BINDINGS: &[(KeyCode, Binding)] = &[
    (KeyCode::Up, Binding::Run(Command::MoveUp)),
    (KeyCode::Char('k'), Binding::Run(Command::MoveUp)),
    (KeyCode::Down, Binding::Run(Command::MoveDown)),
    (KeyCode::Char('j'), Binding::Run(Command::MoveDown)),
    (KeyCode::Char('f'), Binding::Run(Command::Filter)),
    (KeyCode::Char('F'), Binding::Run(Command::ClearFilter)),
    (KeyCode::Char('g'), Binding::TopPrefix),
    (KeyCode::Char('G'), Binding::Run(Command::JumpBottom)),
    (KeyCode::Char('q'), Binding::Run(Command::Quit)),
    (KeyCode::Enter, Binding::Run(Command::Play)),
    (KeyCode::Char('s'), Binding::Run(Command::Stop)),
    (KeyCode::Char('c'), Binding::Run(Command::ResetCounters)),
    (KeyCode::Char('n'), Binding::Run(Command::Edit(StreamField::Name))),
    (KeyCode::Char('r'), Binding::Run(Command::Edit(StreamField::Resolution))),
    (KeyCode::Char('u'), Binding::Run(Command::Edit(StreamField::Url))),
    (KeyCode::Char('l'), Binding::Run(Command::ShowCommand)),
    (KeyCode::Char('L'), Binding::Run(Command::CycleCommand)),
    (KeyCode::Char('a'), Binding::Run(Command::AddStream)),
    (KeyCode::Char('d'), Binding::Run(Command::DeleteStream)),
    (KeyCode::Char('h'), Binding::Run(Command::ShowHelp)),
    (KeyCode::Char('?'), Binding::Run(Command::ShowHelp)),
    (KeyCode::Esc, Binding::Run(Command::Back)),
];

/// Lines shown on the help pane, in display order. `None` renders a blank line.
pub const HELP_LINES: &[Option<(&str, &str)>] = &[
    Some(("STREAM MANAGEMENT", "")),
    None,
    Some(("Enter", "start stream")),
    Some(("s", "stop stream")),
    Some(("r", "change stream resolution")),
    Some(("n", "change stream name")),
    Some(("u", "change stream URL")),
    Some(("c", "reset stream view count")),
    Some(("a", "add stream")),
    Some(("d", "delete stream")),
    None,
    Some(("l", "show command line")),
    Some(("L", "cycle command line")),
    None,
    None,
    Some(("NAVIGATION", "")),
    None,
    Some(("k/up", "up one line")),
    Some(("j/down", "down one line")),
    Some(("f", "filter streams")),
    Some(("F", "clear filter")),
    Some(("gg", "go to top")),
    Some(("G", "go to bottom")),
    Some(("h/?", "show this help")),
    Some(("q", "quit")),
];

/// Turns key presses into commands, holding the one-shot state of two-key sequences.
#[derive(Debug, Default)]
pub struct KeyDispatcher {
    pending_top: bool,
}

impl KeyDispatcher {
    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending_top
    }

    /// A pending `g` is consumed by the next key: a second `g` jumps to the top, anything
    /// else drops it and is dispatched normally.
    pub fn dispatch(&mut self, key: &KeyEvent) -> Option<Command> {
        let was_pending = std::mem::take(&mut self.pending_top);
        match lookup(key)? {
            Binding::TopPrefix if was_pending => Some(Command::JumpTop),
            Binding::TopPrefix => {
                self.pending_top = true;
                None
            }
            Binding::Run(command) => Some(command),
        }
    }
}

fn lookup(key: &KeyEvent) -> Option<Binding> {
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return None;
    }
    BINDINGS
        .iter()
        .find(|(code, _)| *code == key.code)
        .map(|(_, binding)| *binding)
}
