//! Approval View - final content awaiting accept or reject

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};

pub struct ApprovalView {
    /// Lines scrolled past the top
    pub scroll: u16,
    /// Typing rejection feedback instead of scrolling
    pub editing_feedback: bool,
}

impl Default for ApprovalView {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalView {
    pub fn new() -> Self {
        Self {
            scroll: 0,
            editing_feedback: false,
        }
    }

    pub fn reset(&mut self) {
        self.scroll = 0;
        self.editing_feedback = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, content: &str, feedback: &str) {
        let feedback_height = if self.editing_feedback { 3 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(feedback_height)])
            .split(area);

        let body = Paragraph::new(content.to_string())
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Approve final content? ")
                    .title_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            );
        frame.render_widget(body, chunks[0]);

        if self.editing_feedback {
            let input = Paragraph::new(format!("{}_", feedback)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Feedback for the agent (Enter to reject, Esc to go back) "),
            );
            frame.render_widget(input, chunks[1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::views::buffer_text;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_renders_content_and_feedback_box() {
        let mut view = ApprovalView::new();
        let mut terminal = Terminal::new(TestBackend::new(70, 12)).unwrap();
        terminal
            .draw(|f| view.render(f, f.area(), "# Spec\nbody", ""))
            .unwrap();
        let screen = buffer_text(terminal.backend().buffer());
        assert!(screen.contains("# Spec"));
        assert!(!screen.contains("Feedback"));

        view.editing_feedback = true;
        terminal
            .draw(|f| view.render(f, f.area(), "# Spec", "more tests"))
            .unwrap();
        let screen = buffer_text(terminal.backend().buffer());
        assert!(screen.contains("more tests_"));
    }

    #[test]
    fn test_scroll_saturates() {
        let mut view = ApprovalView::new();
        view.scroll_up(3);
        assert_eq!(view.scroll, 0);
        view.scroll_down(5);
        view.scroll_up(2);
        assert_eq!(view.scroll, 3);
    }
}
