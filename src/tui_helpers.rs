use crate::store::StreamRecord;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const ID_FIELD_WIDTH: usize = 6;
const NAME_FIELD_WIDTH: usize = 22;
const RES_FIELD_WIDTH: usize = 12;
const VIEWS_FIELD_WIDTH: usize = 7;

pub(crate) const PLAYING_MARKER: char = '>';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptInput {
    Submit,
    Cancel,
    Edited,
    Ignored,
}

pub(crate) fn stream_header() -> String {
    format!(
        "{:^id$}|{:^name$}|{:^res$}|{:^views$}| Status",
        "ID",
        "Name",
        "Resolution",
        "Views",
        id = ID_FIELD_WIDTH,
        name = NAME_FIELD_WIDTH,
        res = RES_FIELD_WIDTH,
        views = VIEWS_FIELD_WIDTH,
    )
}

pub(crate) fn format_stream_row(stream: &StreamRecord, playing: bool) -> String {
    let indicator = if playing { PLAYING_MARKER } else { ' ' };
    format!(
        "{:>id$}|{:<name$}|{:<res$}|{:>views$}|  {indicator}",
        format!("{} ", stream.id),
        fit(&format!(" {}", stream.name), NAME_FIELD_WIDTH),
        fit(&format!(" {}", stream.resolution), RES_FIELD_WIDTH),
        format!("{} ", stream.seen_count),
        id = ID_FIELD_WIDTH,
        name = NAME_FIELD_WIDTH,
        res = RES_FIELD_WIDTH,
        views = VIEWS_FIELD_WIDTH,
    )
}

/// Applies one key to a prompt line editor.
pub(crate) fn edit_prompt_buffer(buffer: &mut String, key: &KeyEvent) -> PromptInput {
    match key.code {
        KeyCode::Enter => PromptInput::Submit,
        KeyCode::Esc => PromptInput::Cancel,
        KeyCode::Backspace => {
            let _ = buffer.pop();
            PromptInput::Edited
        }
        KeyCode::Char(c) => {
            if key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
            {
                return PromptInput::Ignored;
            }
            buffer.push(c);
            PromptInput::Edited
        }
        _ => PromptInput::Ignored,
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn fit(text: &str, width: usize) -> &str {
    truncate_chars(text, width)
}
