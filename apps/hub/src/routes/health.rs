use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// `GET /healthz` — liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Health",
    responses((status = 200, description = "Hub is up", body = String)),
)]
pub async fn healthz() -> &'static str {
    "ok"
}
