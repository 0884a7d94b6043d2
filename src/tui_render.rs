use super::helpers::{PLAYING_MARKER, format_stream_row, stream_header, truncate_chars};
use super::{App, active_theme};
use crate::keymap::{HELP_LINES, Pane};
use crate::store::RecordStore;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

const HELP_FOOTER: &str = " ESC or 'q' to return to main menu";
const EMPTY_CATALOG_HINT: [&str; 4] = [
    "It seems you don't have any stream yet,",
    "hit 'a' to add a new one.",
    "",
    "Hit '?' for help.",
];

impl<S: RecordStore> App<S> {
    pub(super) fn draw(&self, frame: &mut Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.draw_title(frame, layout[0]);
        match self.pane {
            Pane::Streams => {
                self.draw_stream_header(frame, layout[1]);
                self.draw_streams(frame, layout[2]);
            }
            Pane::Help => {
                let header = Paragraph::new(Line::styled(
                    " Help",
                    Style::default()
                        .fg(color_text())
                        .add_modifier(Modifier::BOLD),
                ));
                frame.render_widget(header, layout[1]);
                self.draw_help(frame, layout[2]);
            }
        }
        self.draw_footer(frame, layout[3]);
        self.draw_status(frame, layout[4]);
    }

    fn draw_title(&self, frame: &mut Frame<'_>, area: Rect) {
        let mut title = format!(
            " {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        if !self.supervisor.is_empty() {
            title.push_str(&format!(
                "  {PLAYING_MARKER} {}/{} playing",
                self.supervisor.len(),
                self.supervisor.max_size()
            ));
        }
        let bar = Paragraph::new(Line::from(vec![Span::raw(title)])).style(
            Style::default()
                .fg(color_text())
                .add_modifier(Modifier::REVERSED | Modifier::BOLD),
        );
        frame.render_widget(bar, area);
    }

    fn draw_stream_header(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.registry.is_empty() {
            return;
        }
        let header = Paragraph::new(Line::styled(
            stream_header(),
            Style::default()
                .fg(color_muted())
                .add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(header, area);
    }

    fn draw_streams(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.registry.is_empty() {
            let mut lines = vec![Line::default(); 3];
            lines.extend(
                EMPTY_CATALOG_HINT
                    .iter()
                    .map(|text| Line::styled(*text, Style::default().fg(color_muted()))),
            );
            frame.render_widget(Paragraph::new(lines), area);
            return;
        }

        let cursor = self.list.row();
        let lines = self
            .list
            .visible_range(self.registry.filtered_len())
            .filter_map(|row| self.registry.filtered_at(row).map(|stream| (row, stream)))
            .map(|(row, stream)| {
                let playing = self.supervisor.contains(stream.id);
                let mut style = Style::default().fg(if playing {
                    color_success()
                } else {
                    color_text()
                });
                if row == cursor {
                    style = style
                        .fg(color_highlight())
                        .add_modifier(Modifier::REVERSED);
                }
                Line::styled(format_stream_row(stream, playing), style)
            })
            .collect::<Vec<_>>();

        if lines.is_empty() {
            let notice = format!(
                " No stream matches '{}'. Hit 'F' to clear the filter.",
                self.registry.filter()
            );
            frame.render_widget(
                Paragraph::new(Line::styled(notice, Style::default().fg(color_muted()))),
                area,
            );
            return;
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_help(&self, frame: &mut Frame<'_>, area: Rect) {
        let lines = HELP_LINES
            .iter()
            .skip(self.help.offset())
            .take(self.help.visible_rows())
            .map(|entry| match entry {
                None => Line::default(),
                Some((heading, "")) => Line::styled(
                    format!(" {heading}"),
                    Style::default()
                        .fg(color_accent())
                        .add_modifier(Modifier::BOLD),
                ),
                Some((key, description)) => Line::from(vec![
                    Span::styled(
                        format!("   {key:<8}"),
                        Style::default()
                            .fg(color_accent())
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!(": {description}"), Style::default().fg(color_text())),
                ]),
            })
            .collect::<Vec<_>>();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect) {
        if let Some(prompt) = &self.prompt {
            let text = format!("{}{}", prompt.label, prompt.buffer);
            let cursor_x = u16::try_from(text.chars().count())
                .unwrap_or(u16::MAX)
                .min(area.width.saturating_sub(1));
            frame.render_widget(
                Paragraph::new(Line::styled(text, Style::default().fg(color_text()))),
                area,
            );
            frame.set_cursor_position(Position::new(area.x + cursor_x, area.y));
            return;
        }

        let footer = match self.pane {
            Pane::Streams => self.footer.as_str(),
            Pane::Help => HELP_FOOTER,
        };
        frame.render_widget(
            Paragraph::new(Line::styled(footer, message_style(footer))),
            area,
        );
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let status = truncate_chars(&self.status, usize::from(area.width));
        frame.render_widget(
            Paragraph::new(Line::styled(status, message_style(status))),
            area,
        );
    }
}

fn color_text() -> Color {
    active_theme().text
}

fn color_muted() -> Color {
    active_theme().muted
}

fn color_accent() -> Color {
    active_theme().accent
}

fn color_highlight() -> Color {
    active_theme().highlight
}

fn color_success() -> Color {
    active_theme().success
}

fn color_warning() -> Color {
    active_theme().warning
}

fn color_error() -> Color {
    active_theme().error
}

fn message_style(message: &str) -> Style {
    let lower = message.to_ascii_lowercase();
    if lower.contains("fail") || lower.contains("faulty") || lower.contains("error") {
        Style::default().fg(color_error())
    } else if lower.contains("already") || lower.contains("too many") || lower.contains("stopped")
    {
        Style::default().fg(color_warning())
    } else if lower.contains("added") || lower.contains("deleted") || lower.contains("filter") {
        Style::default().fg(color_success())
    } else {
        Style::default().fg(color_muted())
    }
}
