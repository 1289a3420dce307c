//! TUI Views module
//!
//! Contains the panes shown for each phase, plus the activity strip.

mod approval;
mod question;
mod session;

pub use approval::ApprovalView;
pub use question::QuestionView;
pub use session::render_session;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use super::activity::ActivityLog;

/// Render the newest activity entries that fit in `area`.
pub fn render_activity(frame: &mut Frame, area: Rect, log: &ActivityLog) {
    let rows = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = log
        .recent(rows)
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!(" {} ", entry.level.icon()),
                    Style::default().fg(entry.level.color()),
                ),
                Span::raw(entry.message.clone()),
                Span::styled(
                    format!("  {}", entry.relative_time()),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        })
        .collect();
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Activity "));
    frame.render_widget(widget, area);
}

/// Flatten a test buffer into newline-separated rows.
#[cfg(test)]
pub(crate) fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
    let width = buffer.area.width as usize;
    buffer
        .content()
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::activity::ActivityLevel;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_activity_shows_newest_entries() {
        let mut log = ActivityLog::new();
        for i in 0..10 {
            log.push(ActivityLevel::Info, format!("event {}", i));
        }
        let mut terminal = Terminal::new(TestBackend::new(50, 5)).unwrap();
        terminal.draw(|f| render_activity(f, f.area(), &log)).unwrap();
        let screen = buffer_text(terminal.backend().buffer());
        assert!(screen.contains("event 9"));
        assert!(screen.contains("event 7"));
        assert!(!screen.contains("event 6"));
    }
}
