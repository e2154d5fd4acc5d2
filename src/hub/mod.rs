//! # Broadcast Hub
//!
//! The hub is the single owner of shared chat state: the registry of live
//! sessions, the [`HistoryBuffer`] and the [`IdentityPool`]. All of it sits
//! behind one async mutex, so every state-mutating step (register, naming,
//! message, disconnect) runs as one critical section and a history snapshot
//! never observes a half-applied append.
//!
//! ## Fan-out
//!
//! ```text
//!                     ┌──────────────────────────┐
//!  Session A ───────► │  Hub (Mutex<HubState>)   │ ──try_send──► queue A ──► writer A ──► socket
//!  Session B ───────► │  - registry (join order) │ ──try_send──► queue B ──► writer B ──► socket
//!                     │  - history               │ ──try_send──► queue C ──► writer C ──► socket
//!                     │  - identity pool         │
//!                     └──────────────────────────┘
//! ```
//!
//! Each session owns a bounded outbound queue drained by its own writer task.
//! The hub never awaits a socket: a full or closed queue evicts that session
//! from the registry, which closes the queue, ends the writer task and lets
//! the connection run its normal disconnect path.

use crate::error::{ChatError, ChatResult};
use crate::history::{DEFAULT_HISTORY_CAPACITY, HistoryBuffer};
use crate::identity::{Color, DEFAULT_PALETTE, IdentityPool};
use crate::protocol::{ChatMessage, ServerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque handle of one live connection
pub type SessionId = Uuid;

/// Sending half of a session's outbound queue of encoded JSON frames
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Hub construction parameters
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of messages replayed to new sessions
    pub history_capacity: usize,
    /// Colors handed out to named sessions
    pub palette: Vec<Color>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            palette: DEFAULT_PALETTE.iter().map(|c| Color::from(*c)).collect(),
        }
    }
}

/// Point-in-time counters exposed by the stats endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    pub sessions: usize,
    pub named_sessions: usize,
    pub history_len: usize,
    pub free_colors: usize,
}

struct Registered {
    id: SessionId,
    outbound: Outbound,
    named: bool,
}

struct HubState {
    sessions: Vec<Registered>,
    history: HistoryBuffer,
    pool: IdentityPool,
}

impl HubState {
    fn position(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    /// Queues `frame` for one session, evicting it if the queue refuses
    fn send_to(&mut self, index: usize, frame: Arc<str>) -> bool {
        let result = self.sessions[index].outbound.try_send(frame);
        match result {
            Ok(()) => true,
            Err(e) => {
                let evicted = self.sessions.remove(index);
                log_eviction(evicted.id, &e);
                false
            }
        }
    }
}

fn log_eviction<T>(id: SessionId, err: &TrySendError<T>) {
    match err {
        TrySendError::Full(_) => {
            warn!("Outbound queue full, evicting session: {}", id)
        }
        TrySendError::Closed(_) => {
            debug!("Outbound queue closed, evicting session: {}", id)
        }
    }
}

/// Cloneable handle to the shared chat state
#[derive(Clone)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
}

impl Hub {
    /// Creates a hub with a shuffled identity pool
    pub fn new(config: HubConfig) -> Self {
        Self::from_parts(
            IdentityPool::new(config.palette),
            HistoryBuffer::new(config.history_capacity),
        )
    }

    pub fn from_parts(pool: IdentityPool, history: HistoryBuffer) -> Self {
        let state = HubState {
            sessions: Vec::new(),
            history,
            pool,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Adds a session to the registry and replays history to it.
    ///
    /// The history frame is queued before the lock is released, so it always
    /// precedes any `message` broadcast the session receives.
    pub async fn register(&self, id: SessionId, outbound: Outbound) -> ChatResult<()> {
        let mut state = self.state.lock().await;
        state.sessions.push(Registered {
            id,
            outbound,
            named: false,
        });
        let index = state.sessions.len() - 1;

        if !state.history.is_empty() {
            let snapshot = state.history.snapshot();
            let count = snapshot.len();
            let frame = ServerEvent::History(snapshot).encode()?;
            if state.send_to(index, frame) {
                info!("Sent {} history messages to session: {}", count, id);
            }
        }

        info!(
            "Registered session: {} (total sessions: {})",
            id,
            state.sessions.len()
        );
        Ok(())
    }

    /// Removes a session from the registry; no-op when already gone
    pub async fn deregister(&self, id: SessionId) {
        let mut state = self.state.lock().await;
        if let Some(index) = state.position(id) {
            state.sessions.remove(index);
            info!(
                "Deregistered session: {} (total sessions: {})",
                id,
                state.sessions.len()
            );
        }
    }

    /// Assigns a color to a session that just chose its name and tells only
    /// that session about it.
    ///
    /// When the pool is empty the session is rejected: it is sent an `error`
    /// event and dropped from the registry, which closes its connection.
    pub async fn assign_color(&self, id: SessionId) -> ChatResult<Color> {
        let mut state = self.state.lock().await;
        let index = state.position(id).ok_or(ChatError::UnknownSession(id))?;

        let Some(color) = state.pool.acquire() else {
            let err = ChatError::IdentityPoolExhausted(state.pool.capacity());
            warn!("Rejecting session {}: {}", id, err);
            let frame = ServerEvent::Error(err.to_string()).encode()?;
            let _ = state.sessions[index].outbound.try_send(frame);
            state.sessions.remove(index);
            return Err(err);
        };

        let frame = match ServerEvent::Color(color.clone()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                state.pool.release(color);
                return Err(e);
            }
        };
        if !state.send_to(index, frame) {
            state.pool.release(color);
            return Err(ChatError::TransportFailure(format!(
                "could not deliver color to session {id}"
            )));
        }
        state.sessions[index].named = true;
        Ok(color)
    }

    /// Appends `message` to history and broadcasts it to every registered
    /// session, the sender included, as one atomic step.
    pub async fn on_message(&self, id: SessionId, message: ChatMessage) -> ChatResult<()> {
        let mut state = self.state.lock().await;
        if state.position(id).is_none() {
            return Err(ChatError::UnknownSession(id));
        }

        let frame = ServerEvent::Message(message.clone()).encode()?;
        state.history.append(message);

        let mut delivered = 0;
        state.sessions.retain(|session| {
            match session.outbound.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    log_eviction(session.id, &e);
                    false
                }
            }
        });

        debug!(
            "Broadcast message from session {} to {} sessions",
            id, delivered
        );
        Ok(())
    }

    /// Disconnect path: returns the session's color (if it ever got one) and
    /// deregisters it, in one critical section.
    pub async fn disconnect(&self, id: SessionId, color: Option<Color>) {
        let mut state = self.state.lock().await;
        if let Some(color) = color {
            info!("Releasing color {} from session: {}", color, id);
            state.pool.release(color);
        }
        if let Some(index) = state.position(id) {
            state.sessions.remove(index);
        }
        info!(
            "Session disconnected: {} (total sessions: {})",
            id,
            state.sessions.len()
        );
    }

    /// Current history contents
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.state.lock().await.history.snapshot()
    }

    pub async fn is_registered(&self, id: SessionId) -> bool {
        self.state.lock().await.position(id).is_some()
    }

    pub async fn stats(&self) -> HubStats {
        let state = self.state.lock().await;
        HubStats {
            sessions: state.sessions.len(),
            named_sessions: state.sessions.iter().filter(|s| s.named).count(),
            history_len: state.history.len(),
            free_colors: state.pool.available(),
        }
    }
}
