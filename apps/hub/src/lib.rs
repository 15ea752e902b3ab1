pub mod config;
pub mod gateway;
pub mod ice;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::hub::Hub;
use gateway::push::PushSink;

/// Shared application state available to all route handlers and the
/// gateway.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<Hub>,
    pub push: Arc<dyn PushSink>,
}
