//! Human-side state machine answering pending interactions.
//!
//! The controller is a plain value updated one [`PhaseMsg`] at a time. An
//! update never blocks and never performs I/O: when an answer is ready it is
//! returned as a [`PhaseCommand`] for the caller to run, and the outcome comes
//! back as [`PhaseMsg::Delivered`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::mcp::{InteractionPayload, InteractionResult, PendingInteraction, Responder};
use crate::models::{Answer, Question};

/// How often [`drive`] checks whether the waiting call has gone away.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForAgent,
    PresentingQuestion(usize),
    SubmittingAnswers,
    AwaitingApproval,
}

/// An edit or decision from the human.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Replace the free-text answer (or feedback while approving)
    SetText(String),
    Type(char),
    Backspace,
    /// Select option `i` (toggles on multi-select questions)
    Choose(usize),
    Toggle(usize),
    Next,
    Back,
    Submit,
    Approve,
    /// Reject the submission; `None` uses the typed feedback, if any
    Reject(Option<String>),
}

#[derive(Debug)]
pub enum PhaseMsg {
    Request(PendingInteraction),
    Input(UserInput),
    Tick,
    Delivered { id: Uuid, ok: bool },
    Cancel(String),
}

/// Side effect requested by an update.
#[derive(Debug)]
pub enum PhaseCommand {
    Deliver(Delivery),
}

impl PhaseCommand {
    pub async fn run(self) -> PhaseMsg {
        match self {
            PhaseCommand::Deliver(delivery) => delivery.run().await,
        }
    }
}

/// A result bound for one request's conduit.
#[derive(Debug)]
pub struct Delivery {
    responder: Responder,
    result: InteractionResult,
}

impl Delivery {
    pub fn id(&self) -> Uuid {
        self.responder.id()
    }

    pub fn result(&self) -> &InteractionResult {
        &self.result
    }

    pub async fn run(self) -> PhaseMsg {
        let id = self.responder.id();
        let ok = match self.responder.send(self.result) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%id, error = %err, "answer could not be delivered");
                false
            }
        };
        PhaseMsg::Delivered { id, ok }
    }
}

#[derive(Debug)]
struct QuestionSet {
    questions: Vec<Question>,
    answers: Vec<Answer>,
    draft: Answer,
}

#[derive(Debug)]
enum Current {
    Questions {
        session: String,
        set: QuestionSet,
        responder: Responder,
    },
    Approval {
        session: String,
        content: String,
        feedback: String,
        responder: Responder,
    },
}

impl Current {
    fn responder(&self) -> &Responder {
        match self {
            Current::Questions { responder, .. } | Current::Approval { responder, .. } => responder,
        }
    }

    fn into_responder(self) -> Responder {
        match self {
            Current::Questions { responder, .. } | Current::Approval { responder, .. } => responder,
        }
    }
}

/// Presents one interaction at a time and routes the human's answer back.
#[derive(Debug)]
pub struct PhaseController {
    phase: Phase,
    current: Option<Current>,
    /// Answers of the last submitted question set, kept for display
    submitted: Vec<Answer>,
    notice: Option<String>,
    last_delivery: Option<(Uuid, bool)>,
}

impl Default for PhaseController {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseController {
    pub fn new() -> Self {
        Self {
            phase: Phase::WaitingForAgent,
            current: None,
            submitted: Vec::new(),
            notice: None,
            last_delivery: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handle one message. Returns the side effect to run, if any.
    pub fn update(&mut self, msg: PhaseMsg) -> Option<PhaseCommand> {
        match msg {
            PhaseMsg::Request(pending) => self.on_request(pending),
            PhaseMsg::Input(input) => self.on_input(input),
            PhaseMsg::Tick => {
                self.on_tick();
                None
            }
            PhaseMsg::Delivered { id, ok } => {
                self.last_delivery = Some((id, ok));
                if self.phase == Phase::SubmittingAnswers {
                    self.phase = Phase::WaitingForAgent;
                }
                if !ok {
                    self.notice = Some("The agent was no longer waiting for that answer".into());
                }
                None
            }
            PhaseMsg::Cancel(reason) => {
                let current = self.current.take()?;
                self.phase = Phase::WaitingForAgent;
                Some(deliver(
                    current.into_responder(),
                    InteractionResult::Cancelled(reason),
                ))
            }
        }
    }

    fn on_request(&mut self, pending: PendingInteraction) -> Option<PhaseCommand> {
        // A caller that already gave up no longer holds the screen.
        self.on_tick();
        if self.current.is_some() {
            tracing::warn!(id = %pending.id(), "refusing interaction while another is presented");
            let (_, responder) = pending.into_parts();
            return Some(deliver(
                responder,
                InteractionResult::Cancelled("another interaction is already being presented".into()),
            ));
        }

        let (ticket, responder) = pending.into_parts();
        self.notice = None;
        match ticket.payload {
            InteractionPayload::Questions(questions) if questions.is_empty() => {
                Some(deliver(responder, InteractionResult::Answers(Vec::new())))
            }
            InteractionPayload::Questions(questions) => {
                let answers: Vec<Answer> = questions.iter().map(Question::empty_answer).collect();
                let draft = answers[0].clone();
                self.current = Some(Current::Questions {
                    session: ticket.session,
                    set: QuestionSet {
                        questions,
                        answers,
                        draft,
                    },
                    responder,
                });
                self.phase = Phase::PresentingQuestion(0);
                None
            }
            InteractionPayload::Approval { content } => {
                self.current = Some(Current::Approval {
                    session: ticket.session,
                    content,
                    feedback: String::new(),
                    responder,
                });
                self.phase = Phase::AwaitingApproval;
                None
            }
        }
    }

    fn on_input(&mut self, input: UserInput) -> Option<PhaseCommand> {
        match (self.phase, input) {
            (Phase::PresentingQuestion(index), input) => self.on_question_input(index, input),
            (Phase::AwaitingApproval, input) => self.on_approval_input(input),
            _ => None,
        }
    }

    fn on_question_input(&mut self, index: usize, input: UserInput) -> Option<PhaseCommand> {
        let Some(Current::Questions { set, .. }) = self.current.as_mut() else {
            return None;
        };
        let question = &set.questions[index];

        match input {
            UserInput::SetText(text) => set.draft = Answer::Text(text),
            UserInput::Type(c) => match &mut set.draft {
                Answer::Text(text) => text.push(c),
                Answer::Choices(_) => {}
            },
            UserInput::Backspace => {
                if let Answer::Text(text) = &mut set.draft {
                    text.pop();
                }
            }
            UserInput::Choose(i) | UserInput::Toggle(i) => {
                let Some(option) = question.options.get(i) else {
                    return None;
                };
                if question.multi_select {
                    set.draft.toggle(&option.label, &question.options);
                } else {
                    set.draft = Answer::Text(option.label.clone());
                }
            }
            UserInput::Back => {
                set.answers[index] = set.draft.clone();
                if index > 0 {
                    set.draft = set.answers[index - 1].clone();
                    self.phase = Phase::PresentingQuestion(index - 1);
                }
                self.notice = None;
            }
            UserInput::Next => {
                if let Err(err) = question.validate(&set.draft) {
                    self.notice = Some(err.to_string());
                    return None;
                }
                set.answers[index] = set.draft.clone();
                self.notice = None;
                if index + 1 < set.questions.len() {
                    set.draft = set.answers[index + 1].clone();
                    self.phase = Phase::PresentingQuestion(index + 1);
                } else {
                    return self.submit(index);
                }
            }
            UserInput::Submit => return self.submit(index),
            UserInput::Approve | UserInput::Reject(_) => {}
        }
        None
    }

    /// Persist the draft, validate every answer and hand the list off for
    /// delivery.
    fn submit(&mut self, index: usize) -> Option<PhaseCommand> {
        let Some(Current::Questions { set, .. }) = self.current.as_mut() else {
            return None;
        };
        set.answers[index] = set.draft.clone();

        let invalid = set
            .questions
            .iter()
            .zip(&set.answers)
            .enumerate()
            .find_map(|(i, (q, a))| q.validate(a).err().map(|e| (i, e)));
        if let Some((i, err)) = invalid {
            set.draft = set.answers[i].clone();
            self.phase = Phase::PresentingQuestion(i);
            self.notice = Some(err.to_string());
            return None;
        }

        let Some(Current::Questions { set, responder, .. }) = self.current.take() else {
            return None;
        };
        self.submitted = set.answers.clone();
        self.phase = Phase::SubmittingAnswers;
        self.notice = None;
        Some(deliver(responder, InteractionResult::Answers(set.answers)))
    }

    fn on_approval_input(&mut self, input: UserInput) -> Option<PhaseCommand> {
        let Some(Current::Approval { feedback, .. }) = self.current.as_mut() else {
            return None;
        };
        let result = match input {
            UserInput::SetText(text) => {
                *feedback = text;
                return None;
            }
            UserInput::Type(c) => {
                feedback.push(c);
                return None;
            }
            UserInput::Backspace => {
                feedback.pop();
                return None;
            }
            UserInput::Approve => InteractionResult::Approved,
            UserInput::Reject(given) => {
                let text = given.unwrap_or_else(|| feedback.clone());
                let feedback = Some(text.trim().to_string()).filter(|t| !t.is_empty());
                InteractionResult::Rejected { feedback }
            }
            _ => return None,
        };
        let current = self.current.take()?;
        self.phase = Phase::WaitingForAgent;
        Some(deliver(current.into_responder(), result))
    }

    fn on_tick(&mut self) {
        let closed = self
            .current
            .as_ref()
            .is_some_and(|c| c.responder().is_closed());
        if closed {
            if let Some(current) = self.current.take() {
                tracing::info!(id = %current.responder().id(), "agent stopped waiting");
            }
            self.phase = Phase::WaitingForAgent;
            self.notice = Some("The agent stopped waiting for an answer".into());
        }
    }

    // Accessors for rendering

    pub fn session(&self) -> Option<&str> {
        match self.current.as_ref()? {
            Current::Questions { session, .. } | Current::Approval { session, .. } => {
                Some(session)
            }
        }
    }

    pub fn pending_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(|c| c.responder().id())
    }

    pub fn questions(&self) -> &[Question] {
        match &self.current {
            Some(Current::Questions { set, .. }) => &set.questions,
            _ => &[],
        }
    }

    /// The question on screen with its in-progress answer.
    pub fn current_question(&self) -> Option<(usize, &Question, &Answer)> {
        let Phase::PresentingQuestion(index) = self.phase else {
            return None;
        };
        match &self.current {
            Some(Current::Questions { set, .. }) => {
                Some((index, set.questions.get(index)?, &set.draft))
            }
            _ => None,
        }
    }

    /// Persisted answers of the set being presented.
    pub fn answers(&self) -> &[Answer] {
        match &self.current {
            Some(Current::Questions { set, .. }) => &set.answers,
            _ => &[],
        }
    }

    pub fn submitted_answers(&self) -> &[Answer] {
        &self.submitted
    }

    pub fn approval_content(&self) -> Option<&str> {
        match &self.current {
            Some(Current::Approval { content, .. }) => Some(content),
            _ => None,
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        match &self.current {
            Some(Current::Approval { feedback, .. }) => Some(feedback),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn last_delivery(&self) -> Option<(Uuid, bool)> {
        self.last_delivery
    }
}

impl Drop for PhaseController {
    fn drop(&mut self) {
        if let Some(current) = self.current.take() {
            let responder = current.into_responder();
            let _ = responder.send(InteractionResult::Cancelled("interface closed".into()));
        }
    }
}

fn deliver(responder: Responder, result: InteractionResult) -> PhaseCommand {
    PhaseCommand::Deliver(Delivery { responder, result })
}

/// Run a controller without a screen: requests come from the server, inputs
/// from any producer. Returns when `cancel` fires or the request channel
/// closes; whatever is still pending is cancelled.
///
/// With `inputs` closed this only holds requests open until cancellation.
pub async fn drive(
    mut controller: PhaseController,
    mut requests: mpsc::UnboundedReceiver<PendingInteraction>,
    mut inputs: mpsc::UnboundedReceiver<UserInput>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut inputs_open = true;

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => PhaseMsg::Cancel("shutting down".into()),
            request = requests.recv() => match request {
                Some(pending) => {
                    log_request(&pending);
                    PhaseMsg::Request(pending)
                }
                None => PhaseMsg::Cancel("interaction server went away".into()),
            },
            input = inputs.recv(), if inputs_open => match input {
                Some(input) => PhaseMsg::Input(input),
                None => {
                    inputs_open = false;
                    continue;
                }
            },
            _ = ticker.tick() => PhaseMsg::Tick,
        };
        let finished = matches!(msg, PhaseMsg::Cancel(_));

        if let Some(command) = controller.update(msg) {
            let delivered = command.run().await;
            controller.update(delivered);
        }
        if finished {
            requests.close();
            while let Ok(pending) = requests.try_recv() {
                let _ = pending.respond(InteractionResult::Cancelled("shutting down".into()));
            }
            return;
        }
    }
}

fn log_request(pending: &PendingInteraction) {
    let ticket = pending.ticket();
    match &ticket.payload {
        InteractionPayload::Questions(questions) => {
            for (i, q) in questions.iter().enumerate() {
                tracing::info!(session = %ticket.session, id = %ticket.id, index = i, question = %q.question, "question from agent");
            }
        }
        InteractionPayload::Approval { content } => {
            tracing::info!(session = %ticket.session, id = %ticket.id, bytes = content.len(), "approval requested");
        }
    }
}
