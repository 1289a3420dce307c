//! Rendezvous between blocked tool calls and the human-facing controller.
//!
//! A synchronous tool call publishes a [`PendingInteraction`] on the request
//! channel and waits on a one-shot conduit for the matching [`Reply`]. The
//! consumer (normally a [`PhaseController`](crate::phase::PhaseController))
//! answers through the [`Responder`] half. Each conduit serves exactly one
//! request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{Answer, Question};
use crate::{Error, Result};

/// Which synchronous tool a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Questions,
    Approval,
}

/// What the agent is asking the human for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionPayload {
    Questions(Vec<Question>),
    Approval { content: String },
}

impl InteractionPayload {
    pub fn kind(&self) -> InteractionKind {
        match self {
            InteractionPayload::Questions(_) => InteractionKind::Questions,
            InteractionPayload::Approval { .. } => InteractionKind::Approval,
        }
    }
}

/// The human's response to an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionResult {
    /// One answer per question, in question order
    Answers(Vec<Answer>),
    Approved,
    Rejected { feedback: Option<String> },
    Cancelled(String),
}

/// What travels back over the conduit, tagged with the request id.
#[derive(Debug)]
pub struct Reply {
    pub id: Uuid,
    pub result: InteractionResult,
}

/// Identity and payload of a pending interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionTicket {
    pub id: Uuid,
    pub session: String,
    pub payload: InteractionPayload,
}

/// Sending half of a request's one-shot result conduit.
#[derive(Debug)]
pub struct Responder {
    id: Uuid,
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The waiting tool call has gone away (cancelled, timed out, or the
    /// client disconnected).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Deliver the result. Fails with `Cancelled` if nobody is waiting anymore.
    pub fn send(self, result: InteractionResult) -> Result<()> {
        let id = self.id;
        self.tx.send(Reply { id, result }).map_err(|_| {
            Error::Cancelled(format!(
                "interaction {} is no longer awaiting an answer",
                id
            ))
        })
    }
}

/// A synchronous tool call waiting on a human response.
#[derive(Debug)]
pub struct PendingInteraction {
    ticket: InteractionTicket,
    responder: Responder,
}

impl PendingInteraction {
    /// Build a request and the receiving half of its conduit.
    pub fn new(session: &str, payload: InteractionPayload) -> (Self, oneshot::Receiver<Reply>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let pending = Self {
            ticket: InteractionTicket {
                id,
                session: session.to_string(),
                payload,
            },
            responder: Responder { id, tx },
        };
        (pending, rx)
    }

    pub fn id(&self) -> Uuid {
        self.ticket.id
    }

    pub fn ticket(&self) -> &InteractionTicket {
        &self.ticket
    }

    pub fn kind(&self) -> InteractionKind {
        self.ticket.payload.kind()
    }

    pub fn into_parts(self) -> (InteractionTicket, Responder) {
        (self.ticket, self.responder)
    }

    /// Answer directly, consuming the request.
    pub fn respond(self, result: InteractionResult) -> Result<()> {
        self.responder.send(result)
    }
}

/// Registry enforcing one outstanding synchronous interaction per session.
#[derive(Debug, Clone, Default)]
struct InFlight {
    inner: Arc<Mutex<HashMap<String, (Uuid, InteractionKind)>>>,
}

impl InFlight {
    fn acquire(&self, session: &str, id: Uuid, kind: InteractionKind) -> Result<InFlightGuard> {
        let mut slots = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((existing, existing_kind)) = slots.get(session) {
            tracing::warn!(
                session,
                pending = %existing,
                pending_kind = ?existing_kind,
                rejected_kind = ?kind,
                "rejecting second synchronous interaction"
            );
            return Err(Error::SingleFlightViolation(session.to_string()));
        }
        slots.insert(session.to_string(), (id, kind));
        Ok(InFlightGuard {
            registry: self.clone(),
            session: session.to_string(),
            id,
        })
    }

    fn pending(&self, session: &str) -> Option<(Uuid, InteractionKind)> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .copied()
    }
}

/// Releases the single-flight slot on every exit path, including drop of the
/// waiting future.
struct InFlightGuard {
    registry: InFlight,
    session: String,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slots = self
            .registry
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slots.get(&self.session).is_some_and(|(id, _)| *id == self.id) {
            slots.remove(&self.session);
        }
    }
}

/// Publishes pending interactions and waits for their results.
#[derive(Debug, Clone)]
pub struct Interactions {
    in_flight: InFlight,
    requests: mpsc::UnboundedSender<PendingInteraction>,
    response_timeout: Option<Duration>,
}

impl Interactions {
    /// Create the hub and the receiving end of its request channel.
    pub fn new(
        response_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<PendingInteraction>) {
        let (requests, rx) = mpsc::unbounded_channel();
        let hub = Self {
            in_flight: InFlight::default(),
            requests,
            response_timeout,
        };
        (hub, rx)
    }

    /// The outstanding interaction for `session`, if any.
    pub fn pending(&self, session: &str) -> Option<(Uuid, InteractionKind)> {
        self.in_flight.pending(session)
    }

    /// Publish a request and wait until it is answered, `cancel` fires, or the
    /// optional response timeout elapses.
    pub async fn request(
        &self,
        session: &str,
        payload: InteractionPayload,
        cancel: &CancellationToken,
    ) -> Result<InteractionResult> {
        let (pending, rx) = PendingInteraction::new(session, payload);
        let id = pending.id();
        let _slot = self.in_flight.acquire(session, id, pending.kind())?;

        tracing::info!(session, %id, kind = ?pending.kind(), "waiting for human response");
        if self.requests.send(pending).is_err() {
            return Err(Error::Cancelled(
                "no interaction consumer is attached".to_string(),
            ));
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled("interaction server stopped".to_string())),
            reply = self.await_reply(id, rx) => reply,
        };

        match &outcome {
            Ok(_) => tracing::info!(session, %id, "interaction answered"),
            Err(err) => tracing::warn!(session, %id, error = %err, "interaction ended without an answer"),
        }
        outcome
    }

    async fn await_reply(
        &self,
        id: Uuid,
        rx: oneshot::Receiver<Reply>,
    ) -> Result<InteractionResult> {
        let received = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| {
                Error::Cancelled(format!("no response within {}s", limit.as_secs()))
            })?,
            None => rx.await,
        };

        let reply = received.map_err(|_| {
            Error::Cancelled("interaction was dropped before an answer arrived".to_string())
        })?;
        if reply.id != id {
            return Err(Error::Cancelled(format!(
                "stray answer for interaction {} (expected {})",
                reply.id, id
            )));
        }
        match reply.result {
            InteractionResult::Cancelled(reason) => Err(Error::Cancelled(reason)),
            result => Ok(result),
        }
    }
}
