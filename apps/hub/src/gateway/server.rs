//! WebSocket upgrade handler and per-connection socket loop.

use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use sonora_common::hex_id;

use crate::ice;
use crate::AppState;

use super::events::ServerFrame;
use super::handler::{dispatch_disconnect, dispatch_frame};
use super::push::PushError;
use super::session::Session;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, addr))
}

async fn handle_connection(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let session_id = hex_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Register the session and queue the hello before reading anything.
    {
        let mut st = state.hub.lock();
        st.attach(Session::new(session_id.clone(), tx));
        let hello = ServerFrame::Hello {
            id: session_id.clone(),
            turn: ice::ice_config(&state.config),
            https: state.config.tls_enabled(),
            client_ip: addr.ip().to_string(),
            turn_warning: ice::loopback_warning(&state.config, addr.ip()),
            voice: st.voice_stats(state.hub.stats_base()),
        };
        st.send_to(&session_id, &hello);
    }

    tracing::debug!(session_id = %session_id, client = %addr, "session connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: drain the session's outbound queue into the socket.
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                process_frame(&state, &session_id, text.as_str()).await;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            // The protocol is text frames only; a binary frame is a
            // transport fault, like a close.
            Ok(Message::Close(_)) | Ok(Message::Binary(_)) => break,
            Err(e) => {
                tracing::debug!(?e, session_id = %session_id, "ws read error");
                break;
            }
        }
    }

    // Runs exactly once per connection: the loop above is the only exit
    // path. Removing the session drops its sender, which ends the writer.
    {
        let mut st = state.hub.lock();
        dispatch_disconnect(&mut st, state.hub.stats_base(), &session_id);
    }
    writer.abort();

    tracing::debug!(session_id = %session_id, "session closed");
}

/// Run one frame through the protocol engine, then deliver whatever push
/// notifications it produced. The hub lock is released before any sink
/// call; a permanent-gone answer evicts the stored subscription.
async fn process_frame(state: &AppState, session_id: &str, text: &str) {
    let jobs = {
        let mut st = state.hub.lock();
        dispatch_frame(
            &mut st,
            state.hub.stats_base(),
            state.push.enabled(),
            session_id,
            text,
        )
    };

    for job in jobs {
        match state.push.send(&job.subscription, &job.payload).await {
            Ok(()) => {}
            Err(PushError::Gone) => {
                state.hub.lock().push_subs.remove(&job.session_id);
                tracing::debug!(session_id = %job.session_id, "push subscription gone, removed");
            }
            Err(PushError::Transport(err)) => {
                tracing::debug!(%err, "push delivery failed");
            }
        }
    }
}
