use anyhow::anyhow;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perpetua::config::AppConfig;
use perpetua::infra::db::Db;
use perpetua::{http, jobs, AppState};

const MIGRATIONS_DIR: &str = "migrations";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = Db::connect(&config).await?;

    match config.app_mode.as_str() {
        "api" => {
            let state = AppState::new(db, &config);
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!(env = %config.app_env, "listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "worker" => {
            tracing::info!("starting worker mode");
            tokio::select! {
                result = jobs::retention::run(db, config.tunables.retention) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        "migrate" => {
            let applied = db.run_migrations(MIGRATIONS_DIR).await?;
            tracing::info!(applied, "migrations complete");
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
