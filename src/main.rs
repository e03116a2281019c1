use std::net::SocketAddr;
use std::sync::Arc;

use kms_chat::api::{build_router, AppState};
use kms_chat::auth::StaticTokenVerifier;
use kms_chat::config::{init_tracing, AppConfig};
use kms_chat::db::Database;

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load config");
    tracing::info!(service = "kms-chat", llm_url = %config.llm_url, "starting");

    let db = Database::new(&config.database_path).expect("failed to open database");

    let state = AppState {
        db: Arc::new(db),
        http: reqwest::Client::new(),
        llm_url: config.llm_url.clone(),
        verifier: Arc::new(StaticTokenVerifier::new(config.auth_tokens.clone())),
    };

    let app = build_router(state);
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
