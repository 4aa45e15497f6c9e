use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use unolingo_llm::{ReplyRequest, Responder};

use crate::coordinator::{SendRejection, SendTicket, SendTransitionRejection};
use crate::manager::{ChatViewState, Completion, SessionManager};
use crate::message::SessionId;

/// Result of one `send` as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Ignored by the entry guard; nothing changed.
    Rejected(SendRejection),
    Replied {
        session_id: SessionId,
    },
    Failed {
        session_id: SessionId,
        diagnostic: String,
    },
    /// The completion no longer matched the send in flight.
    Stale(SendTransitionRejection),
}

/// Drives sends against a responder while the presentation layer keeps using the
/// shared manager.
#[derive(Clone)]
pub struct ChatClient {
    manager: Arc<Mutex<SessionManager>>,
    responder: Arc<dyn Responder>,
}

impl ChatClient {
    pub fn new(manager: SessionManager, responder: Arc<dyn Responder>) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            responder,
        }
    }

    pub fn manager(&self) -> &Arc<Mutex<SessionManager>> {
        &self.manager
    }

    pub fn responder_id(&self) -> &str {
        self.responder.id()
    }

    pub async fn view(&self) -> ChatViewState {
        self.manager.lock().await.view()
    }

    pub async fn select_session(&self, session_id: Option<SessionId>) -> bool {
        self.manager.lock().await.select_session(session_id)
    }

    pub async fn new_chat(&self) {
        self.manager.lock().await.new_chat();
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        self.manager.lock().await.set_draft(text);
    }

    /// Submits `text`, waits for the responder and delivers its outcome.
    ///
    /// The manager lock is released while the remote call is pending.
    pub async fn send(&self, text: &str) -> SendOutcome {
        match self.submit(text).await {
            Ok(ticket) => self.deliver(ticket).await,
            Err(rejection) => SendOutcome::Rejected(rejection),
        }
    }

    /// Accepts `text` as the next user turn. The turn is already visible in the
    /// view when this returns `Ok`.
    pub async fn submit(&self, text: &str) -> Result<SendTicket, SendRejection> {
        self.manager.lock().await.submit(text)
    }

    /// Calls the responder for an accepted `ticket` and records the reply.
    pub async fn deliver(&self, ticket: SendTicket) -> SendOutcome {
        let request = ReplyRequest::new(ticket.prompt.clone(), ticket.session_id.to_string());
        let reply = self.responder.respond(request).await;
        if let Err(error) = &reply {
            tracing::warn!(
                ticket = %ticket.id,
                session_id = %ticket.session_id,
                responder = self.responder.id(),
                error = %error,
                "responder call failed"
            );
        }

        let completed = {
            let mut manager = self.manager.lock().await;
            manager.complete(&ticket, reply)
        };
        match completed {
            Ok(Completion::Resolved { session_id }) => SendOutcome::Replied { session_id },
            Ok(Completion::Failed {
                session_id,
                diagnostic,
            }) => SendOutcome::Failed {
                session_id,
                diagnostic,
            },
            Err(rejection) => SendOutcome::Stale(rejection),
        }
    }

    /// Runs [`ChatClient::send`] on a Tokio task.
    pub fn spawn_send(&self, text: impl Into<String>) -> JoinHandle<SendOutcome> {
        let client = self.clone();
        let text = text.into();
        tokio::spawn(async move { client.send(&text).await })
    }
}
