//! Keel - A layered REST backend starter

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use keel::{
    api::{self, AppState},
    config::Config,
    db::{self, migrations, DynDatabasePool},
    logging,
};

#[derive(Parser)]
#[command(author, version, about = "Keel REST backend")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending migrations and start the HTTP server (default)
    Serve,
    /// Manage the database schema
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Revert the most recently applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// List every migration and whether it is applied
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_env(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    logging::init(&config.logger)?;

    let pool = db::create_pool(&config.database).await?;
    tracing::info!(driver = ?config.database.driver, "Database connected");

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool.clone(), &config).await,
        Command::Migrate { action } => migrate(&pool, action).await,
    };

    pool.close().await;
    result
}

async fn serve(pool: DynDatabasePool, config: &Config) -> Result<()> {
    config.validate()?;

    let applied = migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let state = AppState::from_config(pool, config)?;

    match state.token_service.purge_expired().await {
        Ok(purged) => tracing::info!(purged, "Expired refresh tokens purged"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired refresh tokens"),
    }

    let app = api::build_router(state, &config.server)?;

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn migrate(pool: &DynDatabasePool, action: MigrateAction) -> Result<()> {
    match action {
        MigrateAction::Up => {
            let applied = migrations::run_migrations(pool).await?;
            println!("Applied {} migration(s)", applied);
        }
        MigrateAction::Down { steps } => {
            let reverted = migrations::rollback(pool, steps).await?;
            if reverted.is_empty() {
                println!("Nothing to roll back");
            }
            for version in reverted {
                println!("Reverted {}", version);
            }
        }
        MigrateAction::Status => {
            for entry in migrations::status(pool).await? {
                let state = match entry.applied_at {
                    Some(at) => format!("applied {}", at.to_rfc3339()),
                    None => "pending".to_string(),
                };
                println!("{}  {:<28} {}", entry.version, entry.name, state);
            }
            println!(
                "{} of {} migration(s) pending",
                migrations::pending_count(pool).await?,
                migrations::total_migrations()
            );
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
