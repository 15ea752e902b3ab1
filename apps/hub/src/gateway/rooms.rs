//! Room membership operations.
//!
//! Rooms and sessions reference each other by id only: `Room.members` holds
//! session ids, `Session.room_id` names the room. Every operation here
//! maintains that symmetry, and a room that would drop to one member is
//! dissolved on the spot with a `callEnded reason:"alone"` to the survivor.

use std::collections::HashSet;

use super::events::{PeerInfo, ServerFrame};
use super::hub::{HubState, Room};

impl HubState {
    /// Get or create a room.
    pub fn ensure_room(&mut self, room_id: &str) -> &mut Room {
        self.rooms.entry(room_id.to_string()).or_insert_with(|| Room {
            id: room_id.to_string(),
            members: HashSet::new(),
        })
    }

    /// Add a session to a room and point its record at it.
    pub fn join_room(&mut self, room_id: &str, session_id: &str) {
        self.ensure_room(room_id).members.insert(session_id.to_string());
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.room_id = Some(room_id.to_string());
        }
    }

    /// Remove a session from its current room, clearing its `room_id`.
    /// Returns the room left, which may now be undersized — callers follow
    /// up with [`HubState::dissolve_if_small`].
    pub fn leave_room(&mut self, session_id: &str) -> Option<String> {
        let room_id = self
            .sessions
            .get_mut(session_id)
            .and_then(|s| s.room_id.take())?;
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.members.remove(session_id);
        }
        Some(room_id)
    }

    /// Dissolve a room once it cannot hold a call: a lone survivor gets
    /// `callEnded reason:"alone"` and its `room_id` cleared.
    pub fn dissolve_if_small(&mut self, room_id: &str) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        if room.members.len() > 1 {
            return;
        }
        let survivors: Vec<String> = room.members.iter().cloned().collect();
        self.rooms.remove(room_id);
        for id in survivors {
            if let Some(session) = self.sessions.get_mut(&id) {
                session.room_id = None;
                session.send(&ServerFrame::CallEnded { reason: "alone" });
            }
        }
    }

    /// Whether `a` and `b` are both members of `room_id`. Gates signal
    /// relaying.
    pub fn is_pair(&self, a: &str, b: &str, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|r| r.members.contains(a) && r.members.contains(b))
    }

    /// The other members of a room, as `(id, name)` peer infos. Anonymous
    /// members never occur (only named sessions can call), but are skipped
    /// defensively by `display_name` being empty.
    pub fn room_peers_except(&self, room_id: &str, except: &str) -> Vec<PeerInfo> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        let mut peers: Vec<PeerInfo> = room
            .members
            .iter()
            .filter(|id| id.as_str() != except)
            .filter_map(|id| self.sessions.get(id))
            .map(|s| PeerInfo {
                id: s.id.clone(),
                name: s.display_name().to_string(),
            })
            .collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::session::Session;
    use tokio::sync::mpsc;

    fn attach(st: &mut HubState, id: &str, name: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        st.attach(Session::new(id.to_string(), tx));
        st.claim(id, name.to_string()).unwrap();
        rx
    }

    #[test]
    fn join_sets_both_sides() {
        let mut st = HubState::new();
        attach(&mut st, "a", "Alice");
        st.join_room("r", "a");
        assert!(st.rooms["r"].members.contains("a"));
        assert_eq!(st.sessions["a"].room_id.as_deref(), Some("r"));
    }

    #[test]
    fn leave_clears_both_sides() {
        let mut st = HubState::new();
        attach(&mut st, "a", "Alice");
        st.join_room("r", "a");
        assert_eq!(st.leave_room("a").as_deref(), Some("r"));
        assert!(st.sessions["a"].room_id.is_none());
        assert!(st.rooms["r"].members.is_empty());
    }

    #[test]
    fn leave_without_room_is_none() {
        let mut st = HubState::new();
        attach(&mut st, "a", "Alice");
        assert!(st.leave_room("a").is_none());
    }

    #[test]
    fn dissolve_notifies_lone_survivor() {
        let mut st = HubState::new();
        let _rx_a = attach(&mut st, "a", "Alice");
        let mut rx_b = attach(&mut st, "b", "Bob");
        st.join_room("r", "a");
        st.join_room("r", "b");

        st.leave_room("a");
        st.dissolve_if_small("r");

        assert!(st.rooms.get("r").is_none());
        assert!(st.sessions["b"].room_id.is_none());
        let frame: serde_json::Value =
            serde_json::from_str(&rx_b.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "callEnded");
        assert_eq!(frame["reason"], "alone");
    }

    #[test]
    fn dissolve_leaves_full_rooms_alone() {
        let mut st = HubState::new();
        attach(&mut st, "a", "Alice");
        attach(&mut st, "b", "Bob");
        st.join_room("r", "a");
        st.join_room("r", "b");
        st.dissolve_if_small("r");
        assert!(st.rooms.contains_key("r"));
    }

    #[test]
    fn dissolve_empty_room_just_removes_it() {
        let mut st = HubState::new();
        st.ensure_room("r");
        st.dissolve_if_small("r");
        assert!(st.rooms.is_empty());
    }

    #[test]
    fn is_pair_requires_shared_membership() {
        let mut st = HubState::new();
        attach(&mut st, "a", "Alice");
        attach(&mut st, "b", "Bob");
        attach(&mut st, "c", "Carol");
        st.join_room("r", "a");
        st.join_room("r", "b");

        assert!(st.is_pair("a", "b", "r"));
        assert!(!st.is_pair("a", "c", "r"));
        assert!(!st.is_pair("a", "b", "other"));
    }

    #[test]
    fn room_peers_except_lists_the_others() {
        let mut st = HubState::new();
        attach(&mut st, "a", "Alice");
        attach(&mut st, "b", "Bob");
        attach(&mut st, "c", "Carol");
        for id in ["a", "b", "c"] {
            st.join_room("r", id);
        }
        let peers = st.room_peers_except("r", "b");
        let names: Vec<&str> = peers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Carol"]);
    }
}
