//! TUI rendering for ratatui applications.

use agent_console_core::{LogCategory, LogRecord, Role, format_timestamp};
use agent_console_session::SessionView;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// What a key press asks the application to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Replace the input buffer.
    Edit(String),
    /// Submit the input buffer.
    Submit,
    ScrollUp,
    ScrollDown,
    Quit,
}

/// Translate a key event against the current input buffer.
///
/// Editing is refused while processing, like a disabled input field.
#[must_use]
pub fn key_action(key: &KeyEvent, input: &str, processing: bool) -> Option<KeyAction> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Up => Some(KeyAction::ScrollUp),
        KeyCode::Down => Some(KeyAction::ScrollDown),
        _ if processing => None,
        KeyCode::Char(c)
            if key.modifiers == KeyModifiers::NONE || key.modifiers == KeyModifiers::SHIFT =>
        {
            let mut next = input.to_string();
            next.push(c);
            Some(KeyAction::Edit(next))
        }
        KeyCode::Backspace => {
            let mut next = input.to_string();
            next.pop()?;
            Some(KeyAction::Edit(next))
        }
        KeyCode::Enter if !input.trim().is_empty() => Some(KeyAction::Submit),
        _ => None,
    }
}

/// Terminal color for a record category.
#[must_use]
pub const fn category_color(category: LogCategory) -> Color {
    match category {
        LogCategory::Navigate => Color::Cyan,
        LogCategory::Click => Color::Magenta,
        LogCategory::Type => Color::LightBlue,
        LogCategory::Highlight => Color::Yellow,
        LogCategory::Snapshot => Color::Blue,
        LogCategory::Planning => Color::LightMagenta,
        LogCategory::Init => Color::Gray,
        LogCategory::User => Color::White,
        LogCategory::Error => Color::Red,
        LogCategory::Complete => Color::Green,
        LogCategory::Shutdown => Color::DarkGray,
        LogCategory::Default => Color::Reset,
    }
}

/// One timeline record as a styled line.
#[must_use]
pub fn record_line(record: &LogRecord) -> Line<'static> {
    let style = Style::default().fg(category_color(record.category()));
    Line::from(vec![
        Span::styled(
            format!("[{}] ", format_timestamp(record.timestamp())),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("[{}] ", record.level()),
            style.add_modifier(Modifier::BOLD),
        ),
        Span::styled(record.message().to_string(), style),
    ])
}

/// Draw the whole console: chat panel on the left, Mission Control on the right.
///
/// `scroll_back` counts lines up from the newest record.
pub fn render_console(f: &mut Frame, view: &SessionView, records: &[LogRecord], scroll_back: u16) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(f.area());

    render_chat(f, columns[0], view);
    render_timeline(f, columns[1], records, scroll_back);
}

fn render_chat(f: &mut Frame, area: Rect, view: &SessionView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Transcript
            Constraint::Length(3), // Input
            Constraint::Length(1), // Diagnostic
        ])
        .split(area);

    let lines: Vec<Line> = if view.transcript.is_empty() {
        vec![
            Line::from(Span::styled(
                "Welcome",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Your web automation agent."),
            Line::from(""),
            Line::from("Try asking:"),
            Line::from("  \"Navigate to google.com\""),
            Line::from("  \"Search for AI news\""),
            Line::from("  \"Click the first result\""),
        ]
    } else {
        view.transcript
            .iter()
            .map(|entry| match entry.role {
                Role::User => Line::from(vec![
                    Span::styled("you  ", Style::default().fg(Color::Yellow)),
                    Span::raw(entry.content.as_str()),
                ]),
                Role::Assistant => Line::from(vec![
                    Span::styled("agent ", Style::default().fg(Color::Green)),
                    Span::raw(entry.content.as_str()),
                ]),
            })
            .collect()
    };

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Chat"))
        .wrap(Wrap { trim: false });
    f.render_widget(transcript, rows[0]);

    let processing = view.state.is_processing();
    let (indicator, input_style) = if processing {
        ("⟳", Style::default().fg(Color::DarkGray))
    } else {
        ("→", Style::default().fg(Color::Yellow))
    };
    let input = Paragraph::new(Line::from(vec![
        Span::styled(view.input.as_str(), input_style),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Command {indicator}")),
    );
    f.render_widget(input, rows[1]);

    if !processing {
        let width = u16::try_from(view.input.chars().count()).unwrap_or(u16::MAX);
        f.set_cursor_position((
            rows[1].x.saturating_add(width).saturating_add(1),
            rows[1].y + 1,
        ));
    }

    if let Some(diagnostic) = &view.last_diagnostic {
        let line = Paragraph::new(Span::styled(
            diagnostic.as_str(),
            Style::default().fg(Color::Red),
        ));
        f.render_widget(line, rows[2]);
    }
}

fn render_timeline(f: &mut Frame, area: Rect, records: &[LogRecord], scroll_back: u16) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("⚙ MISSION CONTROL");

    if records.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from("Awaiting agent activity..."),
            Line::from(Span::styled(
                "Logs will appear here in real-time",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let lines: Vec<Line> = records.iter().map(record_line).collect();
    let visible = area.height.saturating_sub(2);
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    // Auto-scroll to the bottom unless the user scrolled back.
    let offset = total.saturating_sub(visible).saturating_sub(scroll_back);

    let timeline = Paragraph::new(lines).block(block).scroll((offset, 0));
    f.render_widget(timeline, area);
}
