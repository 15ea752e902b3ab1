pub mod health;
pub mod push;
pub mod turn;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(health::healthz, turn::turn, push::public_key),
    info(title = "Sonora Hub", description = "Ephemeral voice-call signaling hub")
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(turn::router())
        .merge(push::router())
        .merge(crate::gateway::server::router())
}
