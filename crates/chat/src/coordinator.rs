use std::fmt;
use std::time::{Duration, Instant};

use crate::message::SessionId;

/// Default minimum spacing between two accepted sends.
pub const DEFAULT_MIN_SEND_INTERVAL: Duration = Duration::from_millis(200);

/// Identifier for one accepted send. Never reused within a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Everything the remote call needs, plus the key its completion must present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub id: TicketId,
    pub session_id: SessionId,
    pub prompt: String,
}

/// Lifecycle of the one send the coordinator allows at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    Sending(SendTicket),
    Resolved(TicketId),
    Failed { ticket_id: TicketId, diagnostic: String },
}

/// State transition input for the send lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTransition {
    Start(SendTicket),
    Resolve(TicketId),
    Fail { ticket_id: TicketId, diagnostic: String },
    Settle,
}

/// Rejection reason for illegal send transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTransitionRejection {
    AlreadySending { active: TicketId, attempted: TicketId },
    NoActiveSend,
    TicketMismatch { active: TicketId, attempted: TicketId },
}

pub type SendTransitionResult = Result<SendState, SendTransitionRejection>;

/// Why a submit was ignored. None of these are shown to the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendRejection {
    EmptyInput,
    AlreadySending { active: TicketId },
    Cooldown { remaining: Duration },
}

impl SendState {
    pub fn is_sending(&self) -> bool {
        matches!(self, Self::Sending(_))
    }

    pub fn active_ticket(&self) -> Option<&SendTicket> {
        match self {
            Self::Sending(ticket) => Some(ticket),
            Self::Idle | Self::Resolved(_) | Self::Failed { .. } => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// A new send may start from any settled state. `Resolve`/`Fail` must name the
    /// ticket currently in flight exactly.
    pub fn apply(&self, transition: SendTransition) -> SendTransitionResult {
        match transition {
            SendTransition::Start(ticket) => self.apply_start(ticket),
            SendTransition::Resolve(ticket_id) => {
                self.apply_finish(ticket_id, || Self::Resolved(ticket_id))
            }
            SendTransition::Fail {
                ticket_id,
                diagnostic,
            } => self.apply_finish(ticket_id, || Self::Failed {
                ticket_id,
                diagnostic,
            }),
            SendTransition::Settle => Ok(Self::Idle),
        }
    }

    fn apply_start(&self, ticket: SendTicket) -> SendTransitionResult {
        match self {
            Self::Sending(active) => Err(SendTransitionRejection::AlreadySending {
                active: active.id,
                attempted: ticket.id,
            }),
            Self::Idle | Self::Resolved(_) | Self::Failed { .. } => Ok(Self::Sending(ticket)),
        }
    }

    fn apply_finish(
        &self,
        ticket_id: TicketId,
        next: impl FnOnce() -> Self,
    ) -> SendTransitionResult {
        match self {
            Self::Sending(active) if active.id == ticket_id => Ok(next()),
            Self::Sending(active) => Err(SendTransitionRejection::TicketMismatch {
                active: active.id,
                attempted: ticket_id,
            }),
            Self::Idle | Self::Resolved(_) | Self::Failed { .. } => {
                Err(SendTransitionRejection::NoActiveSend)
            }
        }
    }
}

/// Single-flight guard: one send in flight, spaced by a minimum interval.
#[derive(Debug, Clone)]
pub struct SendCoordinator {
    state: SendState,
    min_interval: Duration,
    last_accepted_at: Option<Instant>,
    next_ticket_id: u64,
}

impl Default for SendCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SEND_INTERVAL)
    }
}

impl SendCoordinator {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: SendState::Idle,
            min_interval,
            last_accepted_at: None,
            next_ticket_id: 1,
        }
    }

    pub fn state(&self) -> &SendState {
        &self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state.is_sending()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Checks the entry guard without changing anything.
    pub fn check_ready(&self, now: Instant) -> Result<(), SendRejection> {
        if let Some(active) = self.state.active_ticket() {
            return Err(SendRejection::AlreadySending { active: active.id });
        }

        if let Some(last_accepted_at) = self.last_accepted_at {
            let elapsed = now.saturating_duration_since(last_accepted_at);
            if elapsed < self.min_interval {
                return Err(SendRejection::Cooldown {
                    remaining: self.min_interval - elapsed,
                });
            }
        }

        Ok(())
    }

    /// Moves to `Sending` with a fresh ticket for `session_id`.
    pub fn start(
        &mut self,
        session_id: SessionId,
        prompt: impl Into<String>,
        now: Instant,
    ) -> Result<SendTicket, SendRejection> {
        self.check_ready(now)?;

        let ticket = SendTicket {
            id: TicketId(self.next_ticket_id),
            session_id,
            prompt: prompt.into(),
        };
        self.state = self
            .state
            .apply(SendTransition::Start(ticket.clone()))
            .map_err(|rejection| match rejection {
                SendTransitionRejection::AlreadySending { active, .. }
                | SendTransitionRejection::TicketMismatch { active, .. } => {
                    SendRejection::AlreadySending { active }
                }
                SendTransitionRejection::NoActiveSend => SendRejection::AlreadySending {
                    active: ticket.id,
                },
            })?;

        // Reserve the id immediately so a later send never reuses it.
        self.next_ticket_id = self.next_ticket_id.saturating_add(1);
        self.last_accepted_at = Some(now);
        Ok(ticket)
    }

    /// Delivers the completion event of `ticket_id` and returns to `Idle`.
    ///
    /// `Err(diagnostic)` records a failed send. Returns the terminal state that
    /// was passed through (`Resolved` or `Failed`).
    pub fn finish(
        &mut self,
        ticket_id: TicketId,
        outcome: Result<(), String>,
    ) -> SendTransitionResult {
        let transition = match outcome {
            Ok(()) => SendTransition::Resolve(ticket_id),
            Err(diagnostic) => SendTransition::Fail {
                ticket_id,
                diagnostic,
            },
        };
        let terminal = self.state.apply(transition)?;
        self.state = terminal.apply(SendTransition::Settle)?;
        Ok(terminal)
    }
}
