//! Per-connection state machine.
//!
//! ```text
//! AwaitingName ──first text frame──► Active ──close──► (gone)
//!      │                                                 ▲
//!      └──────────────────close──────────────────────────┘
//! ```
//!
//! A session only talks to the [`Hub`]; it never reaches another session.

use crate::error::ChatResult;
use crate::hub::{Hub, Outbound, SessionId};
use crate::identity::Color;
use crate::protocol::{ChatMessage, sanitize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, first frame not received yet
    AwaitingName,
    /// Named and holding a color from the identity pool
    Active { name: String, color: Color },
}

pub struct Session {
    id: SessionId,
    state: SessionState,
    hub: Hub,
}

impl Session {
    /// Creates a session and registers it with the hub, which replays history
    /// into `outbound`.
    pub async fn open(hub: Hub, outbound: Outbound) -> ChatResult<Self> {
        let id = Uuid::new_v4();
        hub.register(id, outbound).await?;
        Ok(Self {
            id,
            state: SessionState::AwaitingName,
            hub,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handles one inbound text frame.
    ///
    /// An error means the session cannot continue (rejected by the identity
    /// pool, or already evicted by the hub) and the connection should close.
    pub async fn on_text(&mut self, text: &str) -> ChatResult<()> {
        match &self.state {
            SessionState::AwaitingName => {
                let name = sanitize(text);
                let color = self.hub.assign_color(self.id).await?;
                info!("User is known as: {} with {} color", name, color);
                self.state = SessionState::Active { name, color };
            }
            SessionState::Active { name, color } => {
                info!("Received message from {}: {}", name, text);
                let message = ChatMessage::new(name, color, text);
                self.hub.on_message(self.id, message).await?;
            }
        }
        Ok(())
    }

    /// Disconnect path. Consumes the session so it runs exactly once.
    pub async fn close(self) {
        let color = match self.state {
            SessionState::Active { color, .. } => Some(color),
            SessionState::AwaitingName => None,
        };
        self.hub.disconnect(self.id, color).await;
    }
}
