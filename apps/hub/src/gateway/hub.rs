//! The shared tables: sessions, name index, rooms, push subscriptions.
//!
//! All four move together under one mutex — name claims must observe the
//! session table atomically, and room membership is tied to session records.
//! The lock is never held across I/O; outbound frames go through each
//! session's unbounded sender and push-sink calls happen after release.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;

use super::events::{PresenceUser, ServerFrame};
use super::session::Session;
use super::stats::{StatsBase, VoiceStats};

/// A call room: a set of session ids that agreed to exchange media. Members
/// reference sessions by id only; the session table owns the records.
pub struct Room {
    pub id: String,
    pub members: HashSet<String>,
}

/// Everything the hub mutates, behind [`Hub`]'s single lock.
pub struct HubState {
    pub sessions: HashMap<String, Session>,
    /// Display name → session id. Invariant: bijective with the named
    /// subset of `sessions`.
    pub names: HashMap<String, String>,
    pub rooms: HashMap<String, Room>,
    pub push_subs: HashMap<String, Value>,
}

/// Why a name claim failed.
#[derive(Debug, PartialEq, Eq)]
pub enum ClaimError {
    Taken,
}

impl HubState {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            names: HashMap::new(),
            rooms: HashMap::new(),
            push_subs: HashMap::new(),
        }
    }

    /// Insert a freshly accepted session. No name, no broadcast.
    pub fn attach(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Bind `name` to the session, releasing any previous name it held.
    /// The name must already be canonical (validated and trimmed).
    pub fn claim(&mut self, session_id: &str, name: String) -> Result<String, ClaimError> {
        match self.names.get(&name) {
            Some(holder) if holder.as_str() != session_id => return Err(ClaimError::Taken),
            _ => {}
        }
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Err(ClaimError::Taken);
        };
        if let Some(old) = session.name.take() {
            self.names.remove(&old);
        }
        session.name = Some(name.clone());
        self.names.insert(name.clone(), session_id.to_string());
        Ok(name)
    }

    /// Remove the session and clear its name binding. Idempotent; returns
    /// the removed record so the caller can finish room/push cleanup.
    pub fn release(&mut self, session_id: &str) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        if let Some(name) = session.name.as_deref() {
            // Only clear the index entry if it still points at us: a rename
            // race must not evict the new holder.
            if self.names.get(name).map(String::as_str) == Some(session_id) {
                self.names.remove(name);
            }
        }
        Some(session)
    }

    /// Ordered presence snapshot of every named session.
    pub fn snapshot(&self) -> Vec<PresenceUser> {
        let mut users: Vec<PresenceUser> = self
            .sessions
            .values()
            .filter_map(|s| {
                s.name.as_ref().map(|name| PresenceUser {
                    id: s.id.clone(),
                    name: name.clone(),
                    busy: s.room_id.is_some(),
                })
            })
            .collect();
        users.sort_by_key(|u| u.name.to_lowercase());
        users
    }

    pub fn send_to(&self, session_id: &str, frame: &ServerFrame) {
        if let Some(session) = self.sessions.get(session_id) {
            session.send(frame);
        }
    }

    /// Deliver a frame to every named session whose channel still accepts
    /// writes.
    pub fn broadcast_named(&self, frame: &ServerFrame) {
        for session in self
            .sessions
            .values()
            .filter(|s| s.is_named() && s.is_open())
        {
            session.send(frame);
        }
    }

    pub fn voice_stats(&self, base: &StatsBase) -> VoiceStats {
        VoiceStats::compute(base, self.rooms.values().map(|r| r.members.len()))
    }

    /// Push the current presence snapshot to every named session.
    pub fn broadcast_presence(&self, base: &StatsBase) {
        let frame = ServerFrame::Presence {
            users: self.snapshot(),
            voice: self.voice_stats(base),
        };
        self.broadcast_named(&frame);
    }

    /// Broadcast a System chat line (join/leave notices).
    pub fn system_chat(&self, text: String) {
        let frame = ServerFrame::Chat {
            at_iso: Utc::now().to_rfc3339(),
            from: None,
            from_name: "System".to_string(),
            to: None,
            to_name: None,
            text,
            private: false,
        };
        self.broadcast_named(&frame);
    }
}

/// The process-wide hub: one lock over all shared state plus the
/// config-derived stats inputs.
pub struct Hub {
    state: Mutex<HubState>,
    stats_base: StatsBase,
}

impl Hub {
    pub fn new(stats_base: StatsBase) -> Self {
        Self {
            state: Mutex::new(HubState::new()),
            stats_base,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock()
    }

    pub fn stats_base(&self) -> &StatsBase {
        &self.stats_base
    }
}
