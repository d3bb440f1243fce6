//! spm-portal - Student project management portal
//!
//! Serves the JSON API, or imports a roster of departments, accounts,
//! rubrics and review windows into the database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spm_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV};
use spm_portal::db::{self, sessions};
use spm_portal::media::MediaStore;
use spm_portal::roster::{import_roster, Roster};
use spm_portal::{build_router, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spm-portal")]
#[command(about = "Student project management portal", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding spm.db and uploaded files
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Import a roster TOML file and exit
    ImportRoster {
        /// Roster file to import
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level can seed the filter
    let (config, config_source) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load config")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting spm-portal v{}",
        env!("CARGO_PKG_VERSION")
    );
    config_source.log();

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml_value(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to prepare root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::ImportRoster { path } => {
            let roster = Roster::load(&path)
                .with_context(|| format!("Failed to read roster {}", path.display()))?;
            let summary = import_roster(&pool, &roster)
                .await
                .context("Roster import failed")?;
            info!(
                "Imported {} students, {} faculty, {} rubric items, {} windows",
                summary.students_created,
                summary.faculty_created,
                summary.rubric_items,
                summary.windows
            );
            Ok(())
        }
        Command::Serve => {
            let purged = sessions::purge_expired(&pool).await?;
            if purged > 0 {
                info!("Removed {} expired sessions", purged);
            }

            let media = MediaStore::new(initializer.media_path(), config.max_upload_bytes);
            let state = AppState::new(pool, media, config.session_ttl_hours);
            let app = build_router(state);

            let port = args.port.unwrap_or(config.port);
            let addr = format!("{}:{}", config.bind, port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("spm-portal listening on http://{}", addr);
            info!("Health check: http://{}/health", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            info!("spm-portal stopped");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
