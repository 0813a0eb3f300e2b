use anyhow::Context;

mod app;
mod auth;
mod config;
mod error;
mod foods;
mod meals;
mod nutrition;
mod plans;
mod reconcile;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fitcore=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&state.db)
        .await
        .context("run migrations")?;

    tracing::info!(
        reconcile_mode = ?state.config.reconcile_mode,
        "schema up to date"
    );

    let (host, port) = (state.config.host.clone(), state.config.port);
    app::serve(app::build_app(state), &host, port).await
}
