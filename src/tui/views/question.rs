//! Question View - one structured question at a time
//!
//! Shows the question, its options with selection markers, the free-text
//! answer, and any validation notice from the controller.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::models::{Answer, Question};

/// Cursor state for the options of the question on screen
pub struct QuestionView {
    /// Highlighted option index
    pub selected: usize,
    pub list_state: ListState,
    /// Question index the cursor belongs to
    question_index: Option<usize>,
}

impl Default for QuestionView {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionView {
    pub fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            selected: 0,
            list_state,
            question_index: None,
        }
    }

    /// Reset the cursor when a different question comes on screen.
    pub fn sync(&mut self, index: usize) {
        if self.question_index != Some(index) {
            self.question_index = Some(index);
            self.selected = 0;
            self.list_state.select(Some(0));
        }
    }

    /// Forget the current question (after submit or cancel).
    pub fn reset(&mut self) {
        self.question_index = None;
        self.selected = 0;
        self.list_state.select(Some(0));
    }

    pub fn select_next(&mut self, option_count: usize) {
        if option_count == 0 {
            return;
        }
        self.selected = (self.selected + 1).min(option_count - 1);
        self.list_state.select(Some(self.selected));
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.list_state.select(Some(self.selected));
    }

    /// Render the view
    pub fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        position: (usize, usize),
        question: &Question,
        draft: &Answer,
        notice: Option<&str>,
    ) {
        let (index, total) = position;
        let title = match &question.header {
            Some(header) => format!(" Question {}/{} · {} ", index + 1, total, header),
            None => format!(" Question {}/{} ", index + 1, total),
        };
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let option_rows = question.options.len() as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(2),              // Question text
                Constraint::Length(option_rows), // Options
                Constraint::Length(2),           // Free-text answer
                Constraint::Length(1),           // Notice
            ])
            .split(inner);

        let mut text = vec![Line::from(Span::styled(
            question.question.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if !question.required {
            text.push(Line::from(Span::styled(
                "(optional)",
                Style::default().fg(Color::DarkGray),
            )));
        }
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), chunks[0]);

        if !question.options.is_empty() {
            let items: Vec<ListItem> = question
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| {
                    let chosen = draft.contains(&option.label);
                    let marker = match (question.multi_select, chosen) {
                        (true, true) => "[x]",
                        (true, false) => "[ ]",
                        (false, true) => "(•)",
                        (false, false) => "( )",
                    };
                    let cursor = if i == self.selected { ">" } else { " " };
                    let mut spans = vec![
                        Span::raw(format!("{} {} ", cursor, marker)),
                        Span::styled(
                            option.label.clone(),
                            if chosen {
                                Style::default().fg(Color::Green)
                            } else {
                                Style::default()
                            },
                        ),
                    ];
                    if let Some(ref description) = option.description {
                        spans.push(Span::styled(
                            format!("  {}", description),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect();
            let list = List::new(items)
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
            frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
        }

        // Free text is only meaningful when it isn't just a chosen option.
        if let Answer::Text(typed) = draft {
            let is_option = question.options.iter().any(|o| &o.label == typed);
            if !is_option || question.options.is_empty() {
                let answer = Paragraph::new(Line::from(vec![
                    Span::styled("Answer: ", Style::default().fg(Color::Cyan)),
                    Span::raw(format!("{}_", typed)),
                ]));
                frame.render_widget(answer, chunks[2]);
            }
        }

        if let Some(notice) = notice {
            let notice = Paragraph::new(Span::styled(
                notice.to_string(),
                Style::default().fg(Color::Red),
            ));
            frame.render_widget(notice, chunks[3]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::views::buffer_text;
    use ratatui::backend::TestBackend;

    fn draw(
        view: &mut QuestionView,
        question: &Question,
        draft: &Answer,
        notice: Option<&str>,
    ) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 14)).unwrap();
        terminal
            .draw(|f| view.render(f, f.area(), (0, 2), question, draft, notice))
            .unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn test_renders_options_with_markers() {
        let question = Question::new("Pick a color").with_options(["Red", "Blue"]);
        let mut view = QuestionView::new();
        let screen = draw(&mut view, &question, &Answer::Text("Blue".into()), None);
        assert!(screen.contains("Question 1/2"));
        assert!(screen.contains("> ( ) Red"));
        assert!(screen.contains("(•) Blue"));
        assert!(!screen.contains("Answer:"));
    }

    #[test]
    fn test_multi_select_and_notice() {
        let question = Question::new("Toppings").with_options(["Ham", "Olives"]).multi();
        let mut view = QuestionView::new();
        let screen = draw(
            &mut view,
            &question,
            &Answer::Choices(vec!["Olives".into()]),
            Some("an answer is required"),
        );
        assert!(screen.contains("[ ] Ham"));
        assert!(screen.contains("[x] Olives"));
        assert!(screen.contains("an answer is required"));
    }

    #[test]
    fn test_free_text_answer() {
        let question = Question::new("Name?").optional();
        let mut view = QuestionView::new();
        let screen = draw(&mut view, &question, &Answer::Text("Ada".into()), None);
        assert!(screen.contains("(optional)"));
        assert!(screen.contains("Answer: Ada_"));
    }

    #[test]
    fn test_cursor_resets_per_question() {
        let mut view = QuestionView::new();
        view.sync(0);
        view.select_next(3);
        view.select_next(3);
        view.select_next(3);
        assert_eq!(view.selected, 2);
        view.sync(0);
        assert_eq!(view.selected, 2);
        view.sync(1);
        assert_eq!(view.selected, 0);
    }
}
