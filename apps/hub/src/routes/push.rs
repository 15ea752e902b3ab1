use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/push/public-key", get(public_key))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushKeyResponse {
    pub enabled: bool,
    pub public_key: Option<String>,
}

/// `GET /api/push/public-key` — whether push is enabled and the VAPID
/// public key clients subscribe with.
#[utoipa::path(
    get,
    path = "/api/push/public-key",
    tag = "Push",
    responses((status = 200, description = "Push availability", body = PushKeyResponse)),
)]
pub async fn public_key(State(state): State<AppState>) -> Json<PushKeyResponse> {
    let enabled = state.push.enabled();
    Json(PushKeyResponse {
        enabled,
        public_key: if enabled {
            state.config.vapid_public_key.clone()
        } else {
            None
        },
    })
}
