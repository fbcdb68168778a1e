//! Popup query input, shown when giti is started on a terminal without a query.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

const PLACEHOLDER: &str = "describe a git operation, e.g. undo last commit but keep changes";

/// Result of the popup interaction.
#[derive(Debug, PartialEq, Eq)]
pub enum TuiResult {
    Query(String),
    /// Escape, Ctrl+C, or Enter on an empty line.
    Cancelled,
}

/// Show the popup and return what the user typed.
pub fn run_tui() -> Result<TuiResult> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_input_loop(&mut terminal);

    // Restore the terminal even when the loop failed.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_input_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<TuiResult> {
    let mut input = Input::default();

    loop {
        terminal.draw(|frame| draw_ui(frame, &input))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Enter => return Ok(submit(input.value())),
                KeyCode::Esc => return Ok(TuiResult::Cancelled),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(TuiResult::Cancelled);
                }
                _ => {
                    input.handle_event(&Event::Key(key));
                }
            }
        }
    }
}

fn submit(value: &str) -> TuiResult {
    let query = value.trim();
    if query.is_empty() {
        TuiResult::Cancelled
    } else {
        TuiResult::Query(query.to_string())
    }
}

fn draw_ui(frame: &mut Frame, input: &Input) {
    let size = frame.area();

    let popup_width = size.width.saturating_sub(4).min(80);
    let popup_area = centered_rect(popup_width, 3, size);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" giti ")
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .title_bottom(Line::from(" Enter: translate  Esc: cancel ").right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner_area = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let input_width = inner_area.width as usize;
    let value = input.value();
    let cursor_pos = input.visual_cursor();

    // Keep the cursor visible on long input.
    let scroll = (cursor_pos + 1).saturating_sub(input_width);

    let line = if value.is_empty() {
        Line::from(Span::styled(
            PLACEHOLDER.chars().take(input_width).collect::<String>(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible: String = value.chars().skip(scroll).take(input_width).collect();
        Line::from(Span::styled(visible, Style::default().fg(Color::White)))
    };

    frame.render_widget(Paragraph::new(line), inner_area);
    frame.set_cursor_position((inner_area.x + cursor_pos.saturating_sub(scroll) as u16, inner_area.y));
}

/// A `width` x `height` rectangle centered in `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((area.width.saturating_sub(width)) / 2),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}
