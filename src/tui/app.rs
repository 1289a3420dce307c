//! TUI Application - main event loop and terminal management
//!
//! This module contains the core TUI application logic including:
//! - Terminal setup and restoration
//! - Event loop over keys, pending interactions and server events
//! - Key mapping onto [`PhaseController`] inputs

use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::activity::{ActivityLevel, ActivityLog};
use super::views::{ApprovalView, QuestionView, render_activity, render_session};
use crate::mcp::{PendingInteraction, ServerEvent};
use crate::models::{Answer, SessionSummary};
use crate::phase::{Phase, PhaseCommand, PhaseController, PhaseMsg, UserInput};
use crate::storage::SessionStore;
use crate::Result;

/// Page size for scrolling approval content
const PAGE: u16 = 10;

/// Local text entry that is not part of an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    /// Writing an inbox message for the agent
    Composing(String),
}

/// TUI Application state
pub struct TuiApp {
    controller: PhaseController,
    store: Arc<SessionStore>,
    session: String,
    url: String,
    summary: Option<SessionSummary>,
    activity: ActivityLog,
    question_view: QuestionView,
    approval_view: ApprovalView,
    mode: InputMode,
    should_quit: bool,
}

impl TuiApp {
    pub fn new(store: Arc<SessionStore>, session: &str, url: &str) -> Self {
        let mut app = Self {
            controller: PhaseController::new(),
            store,
            session: session.to_string(),
            url: url.to_string(),
            summary: None,
            activity: ActivityLog::new(),
            question_view: QuestionView::new(),
            approval_view: ApprovalView::new(),
            mode: InputMode::Normal,
            should_quit: false,
        };
        app.refresh_summary();
        app
    }

    fn refresh_summary(&mut self) {
        match self.store.summary(&self.session) {
            Ok(summary) => self.summary = Some(summary),
            Err(e) => tracing::warn!(error = %e, "failed to load session summary"),
        }
    }

    /// Feed a message to the controller, keeping view state in step.
    fn update(&mut self, msg: PhaseMsg) -> Option<PhaseCommand> {
        let arriving = matches!(msg, PhaseMsg::Request(_));
        let before = self.controller.pending_id();
        let command = self.controller.update(msg);
        let after = self.controller.pending_id();

        if arriving && after.is_some() && after != before {
            self.activity
                .push(ActivityLevel::Warning, "agent is waiting for you");
        }
        if before.is_some() && after.is_none() {
            self.question_view.reset();
            self.approval_view.reset();
            if let Some(notice) = self.controller.notice() {
                self.activity.push(ActivityLevel::Warning, notice);
            }
        }
        command
    }

    fn on_server_event(&mut self, event: ServerEvent) {
        self.activity.record(&event);
        self.refresh_summary();
    }

    /// Handle keyboard events
    fn handle_key(&mut self, key: KeyEvent) -> Option<PhaseCommand> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }

        if let InputMode::Composing(ref mut text) = self.mode {
            match key.code {
                KeyCode::Enter => {
                    let body = std::mem::take(text);
                    self.mode = InputMode::Normal;
                    self.send_message(&body);
                }
                KeyCode::Esc => self.mode = InputMode::Normal,
                KeyCode::Backspace => {
                    text.pop();
                }
                KeyCode::Char(c) => text.push(c),
                _ => {}
            }
            return None;
        }

        match self.controller.phase() {
            Phase::WaitingForAgent | Phase::SubmittingAnswers => {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                    KeyCode::Char('m') => self.mode = InputMode::Composing(String::new()),
                    KeyCode::Char('r') => self.refresh_summary(),
                    _ => {}
                }
                None
            }
            Phase::PresentingQuestion(_) => self.handle_question_key(key),
            Phase::AwaitingApproval => self.handle_approval_key(key),
        }
    }

    fn handle_question_key(&mut self, key: KeyEvent) -> Option<PhaseCommand> {
        let (index, question, draft) = self.controller.current_question()?;
        self.question_view.sync(index);
        let option_count = question.options.len();
        let multi = question.multi_select;
        let typed_own_answer = match draft {
            Answer::Text(text) => {
                !text.trim().is_empty() && !question.options.iter().any(|o| o.label == *text)
            }
            Answer::Choices(_) => false,
        };

        let input = match key.code {
            KeyCode::Esc => {
                return self.update(PhaseMsg::Cancel("dismissed by the human".into()));
            }
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                UserInput::Submit
            }
            KeyCode::Up if option_count > 0 => {
                self.question_view.select_previous();
                return None;
            }
            KeyCode::Down if option_count > 0 => {
                self.question_view.select_next(option_count);
                return None;
            }
            KeyCode::Char(' ') if option_count > 0 => UserInput::Toggle(self.question_view.selected),
            KeyCode::Enter if option_count > 0 && !multi && !typed_own_answer => {
                // Choose the highlighted option, then advance.
                let _ = self.update(PhaseMsg::Input(UserInput::Choose(self.question_view.selected)));
                UserInput::Next
            }
            KeyCode::Enter | KeyCode::Tab => UserInput::Next,
            KeyCode::BackTab => UserInput::Back,
            KeyCode::Backspace => UserInput::Backspace,
            KeyCode::Char(c) => UserInput::Type(c),
            _ => return None,
        };
        let command = self.update(PhaseMsg::Input(input));
        if let Some((index, _, _)) = self.controller.current_question() {
            self.question_view.sync(index);
        }
        command
    }

    fn handle_approval_key(&mut self, key: KeyEvent) -> Option<PhaseCommand> {
        if self.approval_view.editing_feedback {
            let input = match key.code {
                KeyCode::Enter => UserInput::Reject(None),
                KeyCode::Esc => {
                    self.approval_view.editing_feedback = false;
                    UserInput::SetText(String::new())
                }
                KeyCode::Backspace => UserInput::Backspace,
                KeyCode::Char(c) => UserInput::Type(c),
                _ => return None,
            };
            return self.update(PhaseMsg::Input(input));
        }

        match key.code {
            KeyCode::Char('a') | KeyCode::Char('y') => {
                self.activity.push(ActivityLevel::Success, "approved");
                self.update(PhaseMsg::Input(UserInput::Approve))
            }
            KeyCode::Char('r') | KeyCode::Char('n') => {
                self.approval_view.editing_feedback = true;
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.approval_view.scroll_down(1);
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.approval_view.scroll_up(1);
                None
            }
            KeyCode::PageDown => {
                self.approval_view.scroll_down(PAGE);
                None
            }
            KeyCode::PageUp => {
                self.approval_view.scroll_up(PAGE);
                None
            }
            KeyCode::Esc => self.update(PhaseMsg::Cancel("dismissed by the human".into())),
            _ => None,
        }
    }

    fn send_message(&mut self, body: &str) {
        match self.store.inbox_send(&self.session, body) {
            Ok(_) => {
                self.activity.push(ActivityLevel::Info, "message sent to agent");
                self.refresh_summary();
            }
            Err(e) => self.activity.push(ActivityLevel::Error, e.to_string()),
        }
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Min(6),    // Main content
                Constraint::Length(6), // Activity
                Constraint::Length(3), // Status bar
            ])
            .split(area);

        self.render_title_bar(frame, chunks[0]);

        match self.controller.phase() {
            Phase::PresentingQuestion(_) => {
                if let Some((index, question, draft)) = self.controller.current_question() {
                    self.question_view.sync(index);
                    let total = self.controller.questions().len();
                    self.question_view.render(
                        frame,
                        chunks[1],
                        (index, total),
                        question,
                        draft,
                        self.controller.notice(),
                    );
                }
            }
            Phase::AwaitingApproval => {
                let content = self.controller.approval_content().unwrap_or_default();
                let feedback = self.controller.feedback().unwrap_or_default();
                self.approval_view.render(frame, chunks[1], content, feedback);
            }
            phase => render_session(
                frame,
                chunks[1],
                self.summary.as_ref(),
                self.controller.submitted_answers(),
                phase == Phase::SubmittingAnswers,
            ),
        }

        render_activity(frame, chunks[2], &self.activity);
        self.render_status_bar(frame, chunks[3]);
    }

    /// Render the title bar with the endpoint URL
    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let (indicator, color) = match self.controller.phase() {
            Phase::WaitingForAgent | Phase::SubmittingAnswers => ("●", Color::Green),
            Phase::PresentingQuestion(_) | Phase::AwaitingApproval => ("◆", Color::Yellow),
        };
        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", self.session),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("| "),
            Span::styled(self.url.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(indicator, Style::default().fg(color)),
        ]))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    /// Render the status bar with keybindings
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let hint = match (&self.mode, self.controller.phase()) {
            (InputMode::Composing(text), _) => format!(" Message: {}_   Enter:Send  Esc:Cancel", text),
            (_, Phase::PresentingQuestion(_)) => {
                " ↑/↓:Option  Space:Toggle  Enter/Tab:Next  Shift+Tab:Back  Ctrl+S:Submit  Esc:Dismiss"
                    .to_string()
            }
            (_, Phase::AwaitingApproval) if self.approval_view.editing_feedback => {
                " Type feedback  Enter:Reject  Esc:Back".to_string()
            }
            (_, Phase::AwaitingApproval) => {
                " a:Approve  r:Reject with feedback  j/k/PgUp/PgDn:Scroll  Esc:Dismiss".to_string()
            }
            _ => " m:Message agent  r:Refresh  q:Quit".to_string(),
        };
        let status = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(status, area);
    }
}

/// Setup the terminal for TUI mode
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

/// Restore the terminal to normal mode
fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Run the TUI until the human quits or `cancel` fires.
///
/// Whatever interaction is on screen when the loop ends is answered with
/// `Cancelled`.
pub async fn run_tui(
    store: Arc<SessionStore>,
    session: &str,
    url: &str,
    mut requests: mpsc::UnboundedReceiver<PendingInteraction>,
    mut events: broadcast::Receiver<ServerEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut app = TuiApp::new(store, session, url);
    let mut deliveries: FuturesUnordered<BoxFuture<'static, PhaseMsg>> = FuturesUnordered::new();

    let mut terminal = setup_terminal()?;

    let outcome: Result<()> = async {
        loop {
            terminal.draw(|f| app.render(f))?;

            let command = tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    let mut command = None;
                    while command.is_none() && event::poll(Duration::from_millis(0))? {
                        if let Event::Key(key) = event::read()? {
                            if key.kind == KeyEventKind::Press {
                                command = app.handle_key(key);
                            }
                        }
                    }
                    command.or_else(|| app.update(PhaseMsg::Tick))
                }
                Some(pending) = requests.recv() => app.update(PhaseMsg::Request(pending)),
                Ok(event) = events.recv() => {
                    app.on_server_event(event);
                    None
                }
                Some(delivered) = deliveries.next(), if !deliveries.is_empty() => app.update(delivered),
                _ = cancel.cancelled() => {
                    app.should_quit = true;
                    None
                }
            };
            if let Some(command) = command {
                deliveries.push(Box::pin(command.run()));
            }

            if app.should_quit {
                break;
            }
        }
        Ok::<(), crate::Error>(())
    }
    .await;

    if let Some(command) = app.update(PhaseMsg::Cancel("interface closed".into())) {
        deliveries.push(Box::pin(command.run()));
    }
    while let Some(delivered) = deliveries.next().await {
        app.update(delivered);
    }

    restore_terminal()?;
    outcome
}
