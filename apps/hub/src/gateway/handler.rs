//! Frame dispatch: the per-connection protocol state machine.
//!
//! Everything here runs under the hub lock and is purely synchronous; the
//! only deferred work is push notification, returned as [`PushJob`]s for the
//! socket task to deliver once the lock is gone.

use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Value};

use sonora_common::hex_id;

use super::events::{
    decode, ClientFrame, DecodeError, ErrorCode, PeerInfo, ServerFrame,
};
use super::hub::{ClaimError, HubState};
use super::stats::StatsBase;
use super::validate::{parse_private_prefix, validate_chat, validate_name, REPLY_PREFIX};

/// A push notification to deliver after the lock is released.
pub struct PushJob {
    /// Session the subscription belongs to, so a permanent-gone answer can
    /// evict it.
    pub session_id: String,
    pub subscription: Value,
    pub payload: Value,
}

/// Handle one inbound text frame for `session_id`. Returns the push
/// notifications the frame produced.
pub fn dispatch_frame(
    st: &mut HubState,
    base: &StatsBase,
    push_enabled: bool,
    session_id: &str,
    text: &str,
) -> Vec<PushJob> {
    let now = Instant::now();
    let Some(session) = st.sessions.get_mut(session_id) else {
        return Vec::new();
    };
    session.last_frame_at = now;
    if !session.window.allow(now) {
        session.send(&ServerFrame::error(ErrorCode::RateLimit));
        return Vec::new();
    }
    let named = session.is_named();

    let frame = match decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            let code = match e {
                DecodeError::BadJson => ErrorCode::BadJson,
                DecodeError::BadMessage => ErrorCode::BadMessage,
                // An anonymous session is told to name itself before the
                // hub admits to not knowing the frame type.
                DecodeError::UnknownType if !named => ErrorCode::NoName,
                DecodeError::UnknownType => ErrorCode::UnknownType,
            };
            st.send_to(session_id, &ServerFrame::error(code));
            return Vec::new();
        }
    };

    match frame {
        // Push bookkeeping is legal in every state and never answered.
        ClientFrame::PushSubscribe { subscription } => {
            if push_enabled {
                st.push_subs.insert(session_id.to_string(), subscription);
            }
            Vec::new()
        }
        ClientFrame::PushUnsubscribe => {
            st.push_subs.remove(session_id);
            Vec::new()
        }

        ClientFrame::SetName { name } => {
            set_name(st, base, session_id, &name);
            Vec::new()
        }

        _ if !named => {
            st.send_to(session_id, &ServerFrame::error(ErrorCode::NoName));
            Vec::new()
        }

        ClientFrame::CallStart { to } => call_start(st, base, session_id, &to),
        ClientFrame::CallAccept { from, room_id } => {
            call_accept(st, base, session_id, &from, &room_id);
            Vec::new()
        }
        ClientFrame::CallReject { from, .. } => {
            call_reject(st, base, session_id, &from);
            Vec::new()
        }
        ClientFrame::CallHangup => {
            hangup(st, base, session_id);
            Vec::new()
        }
        ClientFrame::Signal { to, payload } => {
            signal(st, session_id, &to, payload);
            Vec::new()
        }
        ClientFrame::ChatSend { text } => chat_send(st, session_id, &text),
    }
}

/// Channel close or transport fault: synthesize a hangup, drop the push
/// subscription and name binding, announce the departure, delete the
/// session. The socket task calls this exactly once.
pub fn dispatch_disconnect(st: &mut HubState, base: &StatsBase, session_id: &str) {
    if !st.sessions.contains_key(session_id) {
        return;
    }

    if let Some(room_id) = st.leave_room(session_id) {
        notify_room_peer_left(st, &room_id, session_id);
        st.dissolve_if_small(&room_id);
    }
    st.push_subs.remove(session_id);

    let removed = st.release(session_id);
    if let Some(name) = removed.and_then(|s| s.name) {
        st.system_chat(format!("{name} left."));
        st.broadcast_presence(base);
    }
}

fn set_name(st: &mut HubState, base: &StatsBase, session_id: &str, name: &Value) {
    let Some(canonical) = validate_name(name) else {
        st.send_to(
            session_id,
            &ServerFrame::NameResult {
                ok: false,
                name: None,
                reason: Some("invalid"),
            },
        );
        return;
    };
    match st.claim(session_id, canonical) {
        Err(ClaimError::Taken) => st.send_to(
            session_id,
            &ServerFrame::NameResult {
                ok: false,
                name: None,
                reason: Some("taken"),
            },
        ),
        Ok(name) => {
            st.send_to(
                session_id,
                &ServerFrame::NameResult {
                    ok: true,
                    name: Some(name.clone()),
                    reason: None,
                },
            );
            st.system_chat(format!("{name} joined."));
            st.broadcast_presence(base);
        }
    }
}

fn call_start(st: &mut HubState, base: &StatsBase, session_id: &str, to: &str) -> Vec<PushJob> {
    let reject = |st: &HubState, reason: &'static str| {
        st.send_to(
            session_id,
            &ServerFrame::CallStartResult {
                ok: false,
                reason: Some(reason),
            },
        );
        Vec::new()
    };

    if to == session_id {
        return reject(st, "self");
    }
    match st.sessions.get(to) {
        None => return reject(st, "not_found"),
        Some(target) if !target.is_named() => return reject(st, "not_ready"),
        Some(target) if target.room_id.is_some() => return reject(st, "busy"),
        Some(_) => {}
    }

    let caller = &st.sessions[session_id];
    let caller_name = caller.display_name().to_string();
    // A caller already in a call invites the callee into the same room.
    let room_id = caller.room_id.clone().unwrap_or_else(hex_id);

    st.join_room(&room_id, session_id);
    st.join_room(&room_id, to);

    st.send_to(
        to,
        &ServerFrame::IncomingCall {
            from: session_id.to_string(),
            from_name: caller_name.clone(),
            room_id: room_id.clone(),
        },
    );
    st.send_to(
        session_id,
        &ServerFrame::CallStartResult {
            ok: true,
            reason: None,
        },
    );
    st.broadcast_presence(base);

    push_job_for(
        st,
        to,
        json!({
            "title": "Incoming call",
            "body": format!("{caller_name} is calling you"),
            "tag": "call",
        }),
    )
    .into_iter()
    .collect()
}

fn call_accept(st: &mut HubState, base: &StatsBase, session_id: &str, from: &str, room_id: &str) {
    let caller_in_room = st
        .sessions
        .get(from)
        .is_some_and(|c| c.room_id.as_deref() == Some(room_id));
    let self_in_room = st
        .sessions
        .get(session_id)
        .is_some_and(|s| s.room_id.as_deref() == Some(room_id));

    if !caller_in_room || !self_in_room {
        // Stale or forged accept: abandon whatever room this session was
        // placed in and let the others know if that empties it.
        if let Some(left) = st.leave_room(session_id) {
            st.dissolve_if_small(&left);
        }
        st.broadcast_presence(base);
        return;
    }

    let me = PeerInfo {
        id: session_id.to_string(),
        name: st.sessions[session_id].display_name().to_string(),
    };
    let peers = st.room_peers_except(room_id, session_id);
    // Existing members offer to the joiner; the joiner answers.
    for peer in &peers {
        st.send_to(
            &peer.id,
            &ServerFrame::RoomPeerJoined {
                room_id: room_id.to_string(),
                peer: me.clone(),
            },
        );
    }
    st.send_to(
        session_id,
        &ServerFrame::RoomPeers {
            room_id: room_id.to_string(),
            peers,
        },
    );
}

fn call_reject(st: &mut HubState, base: &StatsBase, session_id: &str, from: &str) {
    st.send_to(from, &ServerFrame::CallRejected { reason: "rejected" });
    // The rejecter leaves; any other members keep their call.
    if let Some(room_id) = st.leave_room(session_id) {
        st.dissolve_if_small(&room_id);
        st.broadcast_presence(base);
    }
}

fn hangup(st: &mut HubState, base: &StatsBase, session_id: &str) {
    if let Some(room_id) = st.leave_room(session_id) {
        notify_room_peer_left(st, &room_id, session_id);
        st.dissolve_if_small(&room_id);
        st.broadcast_presence(base);
    }
}

fn signal(st: &mut HubState, session_id: &str, to: &str, payload: Value) {
    // Relayed verbatim, and only between members of the same room. Anything
    // else is dropped without a reply.
    let Some(room_id) = st
        .sessions
        .get(session_id)
        .and_then(|s| s.room_id.clone())
    else {
        return;
    };
    if !st.is_pair(session_id, to, &room_id) {
        return;
    }
    let from_name = st.sessions[session_id].display_name().to_string();
    st.send_to(
        to,
        &ServerFrame::Signal {
            from: session_id.to_string(),
            from_name,
            payload,
        },
    );
}

fn chat_send(st: &mut HubState, session_id: &str, text: &Value) -> Vec<PushJob> {
    let Some(body) = validate_chat(text) else {
        st.send_to(session_id, &ServerFrame::error(ErrorCode::BadChat));
        return Vec::new();
    };

    let from_name = st.sessions[session_id].display_name().to_string();
    let at_iso = Utc::now().to_rfc3339();

    // Quoted replies begin with `@reply [` and stay public even though they
    // look like an @-address.
    if !body.starts_with(REPLY_PREFIX) {
        if let Some((target_name, pm_body)) = parse_private_prefix(&body) {
            let Some(target_id) = st.names.get(&target_name).cloned() else {
                st.send_to(session_id, &ServerFrame::error(ErrorCode::PmNotFound));
                return Vec::new();
            };
            if target_id == session_id {
                st.send_to(session_id, &ServerFrame::error(ErrorCode::PmSelf));
                return Vec::new();
            }
            let frame = ServerFrame::Chat {
                at_iso,
                from: Some(session_id.to_string()),
                from_name: from_name.clone(),
                to: Some(target_id.clone()),
                to_name: Some(target_name.clone()),
                text: pm_body.clone(),
                private: true,
            };
            st.send_to(session_id, &frame);
            st.send_to(&target_id, &frame);
            return push_job_for(
                st,
                &target_id,
                json!({
                    "title": format!("{from_name} (private)"),
                    "body": pm_body,
                    "tag": "chat",
                }),
            )
            .into_iter()
            .collect();
        }
    }

    let frame = ServerFrame::Chat {
        at_iso,
        from: Some(session_id.to_string()),
        from_name: from_name.clone(),
        to: None,
        to_name: None,
        text: body.clone(),
        private: false,
    };
    st.broadcast_named(&frame);

    let payload = json!({
        "title": from_name,
        "body": body,
        "tag": "chat",
    });
    st.sessions
        .values()
        .filter(|s| s.is_named() && s.id != session_id)
        .filter_map(|s| {
            st.push_subs.get(&s.id).map(|sub| PushJob {
                session_id: s.id.clone(),
                subscription: sub.clone(),
                payload: payload.clone(),
            })
        })
        .collect()
}

fn push_job_for(st: &HubState, session_id: &str, payload: Value) -> Option<PushJob> {
    st.push_subs.get(session_id).map(|sub| PushJob {
        session_id: session_id.to_string(),
        subscription: sub.clone(),
        payload,
    })
}

fn notify_room_peer_left(st: &HubState, room_id: &str, left_id: &str) {
    let Some(room) = st.rooms.get(room_id) else {
        return;
    };
    let frame = ServerFrame::RoomPeerLeft {
        room_id: room_id.to_string(),
        peer_id: left_id.to_string(),
    };
    for member in &room.members {
        st.send_to(member, &frame);
    }
}
