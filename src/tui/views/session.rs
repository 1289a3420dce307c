//! Session View - shown while waiting for the agent
//!
//! Task counts, unread inbox, and the answers most recently sent back.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::models::{Answer, SessionSummary};

pub fn render_session(
    frame: &mut Frame,
    area: Rect,
    summary: Option<&SessionSummary>,
    submitted: &[Answer],
    submitting: bool,
) {
    let mut lines: Vec<Line> = Vec::new();

    if submitting {
        lines.push(Line::from(Span::styled(
            "Sending answers to the agent...",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Waiting for the agent",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(""));

    if let Some(summary) = summary {
        lines.push(Line::from(vec![
            Span::styled("Tasks  ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{} remaining  ", summary.remaining)),
            Span::styled(
                format!("{} in progress  ", summary.in_progress),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(
                format!("{} completed  ", summary.completed),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!("{} blocked", summary.blocked),
                Style::default().fg(Color::Red),
            ),
        ]));
        lines.push(Line::from(format!(
            "Notes  {}    Unread messages  {}",
            summary.notes, summary.unread
        )));
        if summary.complete {
            lines.push(Line::from(Span::styled(
                "✓ Session complete",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
        }
    }

    if !submitted.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Last answers",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (i, answer) in submitted.iter().enumerate() {
            let shown = if answer.is_empty() {
                "(skipped)".to_string()
            } else {
                answer.to_string()
            };
            lines.push(Line::from(format!("  {}. {}", i + 1, shown)));
        }
    }

    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Session "));
    frame.render_widget(body, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::views::buffer_text;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_renders_summary_and_answers() {
        let summary = SessionSummary {
            name: "demo".into(),
            remaining: 2,
            in_progress: 1,
            completed: 3,
            blocked: 0,
            notes: 4,
            unread: 1,
            complete: true,
        };
        let answers = vec![Answer::Text("Red".into()), Answer::Text(String::new())];
        let mut terminal = Terminal::new(TestBackend::new(80, 14)).unwrap();
        terminal
            .draw(|f| render_session(f, f.area(), Some(&summary), &answers, false))
            .unwrap();
        let screen = buffer_text(terminal.backend().buffer());
        assert!(screen.contains("2 remaining"));
        assert!(screen.contains("Unread messages  1"));
        assert!(screen.contains("Session complete"));
        assert!(screen.contains("1. Red"));
        assert!(screen.contains("2. (skipped)"));
    }
}
