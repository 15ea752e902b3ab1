use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::ice::{self, IceConfig};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/turn", get(turn))
}

/// `GET /turn` — ICE server configuration with freshly derived TURN
/// credentials.
#[utoipa::path(
    get,
    path = "/turn",
    tag = "TURN",
    responses((status = 200, description = "ICE server configuration", body = IceConfig)),
)]
pub async fn turn(State(state): State<AppState>) -> Json<IceConfig> {
    Json(ice::ice_config(&state.config))
}
