//! Per-connection session state.

use std::time::Instant;

use tokio::sync::mpsc;

use super::events::ServerFrame;
use super::rate_limit::FixedWindow;

/// The hub's record of one connected client. Owned by the hub's session
/// table; the socket task holds only the receiving half of `tx`.
pub struct Session {
    /// Opaque 24-hex-digit id, unique for the process lifetime.
    pub id: String,
    /// Claimed display name; `None` until `setName` succeeds.
    pub name: Option<String>,
    /// Current room, set while ringing or connected.
    pub room_id: Option<String>,
    /// When the last frame arrived from this client.
    pub last_frame_at: Instant,
    /// Inbound frame budget.
    pub window: FixedWindow,
    tx: mpsc::UnboundedSender<String>,
}

impl Session {
    pub fn new(id: String, tx: mpsc::UnboundedSender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            name: None,
            room_id: None,
            last_frame_at: now,
            window: FixedWindow::new(now),
            tx,
        }
    }

    /// Enqueue a frame for delivery to this client. Errors (closed channel)
    /// are dropped; the disconnect path cleans the session up.
    pub fn send(&self, frame: &ServerFrame) {
        if let Ok(json) = serde_json::to_string(frame) {
            let _ = self.tx.send(json);
        }
    }

    /// Whether the outbound channel can still accept frames.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Display name, or the empty string for anonymous sessions.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}
