//! Image-grounded chat sessions.
//!
//! At most one session is active. Uploading a new image discards the current
//! session, its history, and its remote handle. Each session gets a fresh
//! [`SessionToken`], and every continuation compares its token with the
//! active one before touching state, so answers for a discarded session are
//! dropped.

use crate::chat::{ConversationService, SessionSeed};
use crate::image::UploadedImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sent with the image when a session is created.
pub const PRIMING_INSTRUCTION: &str = "This is the image we will be discussing. \
Please confirm you see it by responding with \"OK\".";

/// The invisible first turn that makes the model acknowledge the image.
pub const PRIMING_MESSAGE: &str = " ";

/// Shown when a session could not be started.
pub const PRIMING_FAILED_MESSAGE: &str = "Could not start analysis session. Please try again.";

/// Shown in place of a reply when a turn fails.
pub const TURN_FAILED_MESSAGE: &str = "Sorry, I couldn't respond. Please try again.";

/// Identifies one session for the lifetime of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(u64);

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Where the active session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session bound.
    Idle,
    /// Waiting for the model to acknowledge the image.
    Priming,
    /// Accepting user turns.
    Ready,
    /// A user turn is outstanding.
    AwaitingResponse,
    /// Priming failed; only a new upload leaves this state.
    Failed,
}

/// Who a turn is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Typed by the user.
    User,
    /// Returned by the model.
    Model,
    /// Local failure notice shown where a reply would have been.
    Error,
}

/// One entry of the visible conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who the text belongs to.
    pub speaker: Speaker,
    /// Turn text.
    pub text: String,
}

impl Turn {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// A model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Model,
            text: text.into(),
        }
    }

    /// A synthetic failure notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Error,
            text: text.into(),
        }
    }
}

/// Result of [`AnalyzeSessions::start_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimingOutcome {
    /// The session accepts turns.
    Ready,
    /// Priming failed; the session stays unusable.
    Failed {
        /// User-facing message.
        message: String,
    },
    /// Another upload replaced this session before priming finished.
    Superseded,
}

/// Result of [`AnalyzeSessions::submit_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty text or no ready session; nothing happened.
    Ignored,
    /// The model answered.
    Replied(String),
    /// The exchange failed; an error turn was appended.
    Failed(String),
    /// The session was replaced while the reply was outstanding.
    Discarded,
}

/// Read-only copy of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Active session, if any.
    pub token: Option<SessionToken>,
    /// Lifecycle state.
    pub state: SessionState,
    /// The image under discussion.
    pub image: Option<UploadedImage>,
    /// Visible turns in order.
    pub turns: Vec<Turn>,
    /// Session-level error message (priming failure).
    pub notice: Option<String>,
}

impl SessionView {
    /// True when the user may type a turn.
    pub fn input_enabled(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// True while a reply placeholder should be shown.
    pub fn awaiting_reply(&self) -> bool {
        self.state == SessionState::AwaitingResponse
    }
}

struct ActiveSession<H> {
    token: SessionToken,
    state: SessionState,
    image: UploadedImage,
    turns: Vec<Turn>,
    handle: Option<Arc<H>>,
    notice: Option<String>,
}

struct Inner<H> {
    epoch: u64,
    active: Option<ActiveSession<H>>,
}

impl<H> Inner<H> {
    /// The active session, if it is still the one `token` refers to.
    fn current(&mut self, token: SessionToken) -> Option<&mut ActiveSession<H>> {
        self.active.as_mut().filter(|s| s.token == token)
    }
}

/// Owns the single active analyze session.
///
/// Methods take `&self` and never hold the internal lock across an await,
/// so the manager can be shared (`Arc`) between tasks.
pub struct AnalyzeSessions<C: ConversationService> {
    service: Arc<C>,
    inner: Mutex<Inner<C::Handle>>,
}

impl<C: ConversationService> AnalyzeSessions<C> {
    /// Creates an idle manager.
    pub fn new(service: Arc<C>) -> Self {
        Self {
            service,
            inner: Mutex::new(Inner {
                epoch: 0,
                active: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C::Handle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds a new session to `image`, discarding any previous one, and
    /// primes it.
    pub async fn start_session(&self, image: UploadedImage) -> PrimingOutcome {
        let token = {
            let mut inner = self.lock();
            inner.epoch += 1;
            let token = SessionToken(inner.epoch);
            if let Some(previous) = inner.active.take() {
                tracing::info!(previous = %previous.token, "discarding analyze session");
            }
            inner.active = Some(ActiveSession {
                token,
                state: SessionState::Priming,
                image: image.clone(),
                turns: Vec::new(),
                handle: None,
                notice: None,
            });
            token
        };
        tracing::info!(%token, mime = %image.mime_type, "priming analyze session");

        let seed = SessionSeed {
            image,
            instruction: PRIMING_INSTRUCTION.to_string(),
        };
        let primed = match self.service.create_session(&seed).await {
            Ok(handle) => {
                let handle = Arc::new(handle);
                let ack = self.service.send_turn(&handle, PRIMING_MESSAGE).await;
                ack.map(|_| handle)
            }
            Err(e) => Err(e),
        };

        let mut inner = self.lock();
        let Some(session) = inner.current(token) else {
            tracing::debug!(%token, "priming finished for a discarded session");
            return PrimingOutcome::Superseded;
        };

        match primed {
            Ok(handle) => {
                session.handle = Some(handle);
                session.state = SessionState::Ready;
                tracing::info!(%token, "analyze session ready");
                PrimingOutcome::Ready
            }
            Err(e) => {
                tracing::warn!(%token, "priming failed: {e}");
                session.state = SessionState::Failed;
                session.notice = Some(PRIMING_FAILED_MESSAGE.to_string());
                PrimingOutcome::Failed {
                    message: PRIMING_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }

    /// Sends a user turn in the active session.
    ///
    /// Ignored when `text` is blank or the session is not ready.
    pub async fn submit_turn(&self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }

        let (token, handle) = {
            let mut inner = self.lock();
            let Some(session) = inner.active.as_mut() else {
                return TurnOutcome::Ignored;
            };
            let handle = match (&session.handle, session.state) {
                (Some(handle), SessionState::Ready) => Arc::clone(handle),
                _ => return TurnOutcome::Ignored,
            };
            session.turns.push(Turn::user(text));
            session.state = SessionState::AwaitingResponse;
            (session.token, handle)
        };
        tracing::debug!(%token, chars = text.len(), "sending analyze turn");

        let reply = self.service.send_turn(&handle, text).await;

        let mut inner = self.lock();
        let Some(session) = inner.current(token) else {
            tracing::warn!(%token, "dropping reply for a discarded session");
            return TurnOutcome::Discarded;
        };
        session.state = SessionState::Ready;
        match reply {
            Ok(reply) => {
                session.turns.push(Turn::model(reply.clone()));
                TurnOutcome::Replied(reply)
            }
            Err(e) => {
                tracing::warn!(%token, "analyze turn failed: {e}");
                session.turns.push(Turn::error(TURN_FAILED_MESSAGE));
                TurnOutcome::Failed(TURN_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Discards the active session, if any.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        if let Some(previous) = inner.active.take() {
            tracing::info!(previous = %previous.token, "analyze session reset");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock()
            .active
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    /// Copy of the active session for rendering.
    pub fn snapshot(&self) -> SessionView {
        let inner = self.lock();
        match &inner.active {
            Some(session) => SessionView {
                token: Some(session.token),
                state: session.state,
                image: Some(session.image.clone()),
                turns: session.turns.clone(),
                notice: session.notice.clone(),
            },
            None => SessionView {
                token: None,
                state: SessionState::Idle,
                image: None,
                turns: Vec::new(),
                notice: None,
            },
        }
    }
}
