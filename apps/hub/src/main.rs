use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use sonora_hub::config::Config;
use sonora_hub::gateway::hub::Hub;
use sonora_hub::gateway::push::{DisabledSink, PushSink, WebPushSink};
use sonora_hub::gateway::stats::StatsBase;
use sonora_hub::routes::ApiDoc;
use sonora_hub::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    if config.startup_log {
        tracing::info!(
            host = %config.host,
            port = config.port,
            public_dir = %config.public_dir.display(),
            turn_urls = config.turn_urls.len(),
            turn_secret = config.turn_secret.is_some(),
            relay_ports = ?config.relay_ports_total(),
            push = config.push_enabled(),
            tls = config.tls_enabled(),
            "hub configured"
        );
    }

    let push: Arc<dyn PushSink> = match (config.push_enabled(), &config.vapid_public_key) {
        (true, Some(key)) => Arc::new(WebPushSink::new(key.clone())),
        _ => Arc::new(DisabledSink),
    };
    let hub = Arc::new(Hub::new(StatsBase::from_config(&config)));

    let state = AppState {
        config: Arc::new(config.clone()),
        hub,
        push,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(sonora_hub::routes::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(&config.public_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let ip: IpAddr = config
        .host
        .parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let addr = SocketAddr::from((ip, config.port));

    if let (Some(cert), Some(key)) = (&config.tls_cert_path, &config.tls_key_path) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .expect("failed to load TLS key/cert");
        tracing::info!(%addr, "hub listening (tls)");
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("server error");
    } else {
        tracing::info!(%addr, "hub listening");
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("failed to bind");
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
