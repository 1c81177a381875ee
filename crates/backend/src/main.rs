use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use votr::config::AppConfig;
use votr::repository::{MemoryUserStore, PgUserStore, UserStore};
use votr::{build_router, db, AppState};

#[derive(Parser)]
#[command(name = "votr")]
#[command(about = "Votr poll server")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000", env = "VOTR_ADDR")]
    addr: SocketAddr,

    /// Keep users in memory instead of Postgres.
    ///
    /// Users are lost on restart; meant for local development.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let store: Arc<dyn UserStore> = if cli.in_memory {
        tracing::warn!("Using in-memory user store, users will not survive a restart");
        Arc::new(MemoryUserStore::new())
    } else {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set unless --in-memory is given")?;
        Arc::new(PgUserStore::new(db::establish_connection_pool(
            database_url,
        )?))
    };

    let state = AppState::new(&config, store)?;

    if !config.static_dir.exists() {
        tracing::warn!(
            "Static directory not found at {}, assets will 404",
            config.static_dir.display()
        );
    }
    let app = build_router(state, &config.static_dir);

    tracing::info!("Server listening on {}", cli.addr);

    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
