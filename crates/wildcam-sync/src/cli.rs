//! Command-line interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;
use wildcam_common::types::{AuthConfig, NewPullSource, PullSource};

use crate::admin::SourceAdmin;
use crate::config::SyncConfig;
use crate::detection::HttpDetectionPipeline;
use crate::gateway::DefaultGatewayFactory;
use crate::orchestrator::{SyncOrchestrator, SyncTimeouts};
use crate::scheduler::{IntervalJobRunner, SyncScheduler};
use crate::store::PgPullSourceStore;

#[derive(Parser, Debug)]
#[command(name = "wildcam-sync")]
#[command(about = "Pull camera-trap images from remote feeds into detection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the recurring sweep until interrupted
    Run,

    /// Sync a single source now
    Sync {
        source_id: Uuid,

        /// Files to process this run (defaults to SYNC_MAX_FILES_PER_SOURCE)
        #[arg(long)]
        max_files: Option<usize>,
    },

    /// Sync every active source once
    Sweep {
        #[arg(long)]
        max_files: Option<usize>,
    },

    /// Manage pull sources
    #[command(subcommand)]
    Source(SourceCommand),
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Register a new pull source
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        owner: String,

        /// Location that ingested images are attributed to
        #[arg(long)]
        location: Uuid,

        /// Directory listing URL of the feed
        #[arg(long)]
        url: String,

        #[arg(long, value_enum, default_value_t = AuthKind::None)]
        auth: AuthKind,

        #[arg(long, required_if_eq("auth", "basic"))]
        username: Option<String>,

        #[arg(long, env = "WILDCAM_SOURCE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Authorization header value sent verbatim
        #[arg(long, env = "WILDCAM_SOURCE_AUTH_HEADER", hide_env_values = true)]
        header_value: Option<String>,

        /// Create the source disabled
        #[arg(long)]
        inactive: bool,
    },

    /// List active sources for an owner
    List {
        #[arg(long)]
        owner: String,
    },

    /// Resume syncing a source
    Enable { source_id: Uuid },

    /// Stop syncing a source without losing its cursor
    Disable { source_id: Uuid },

    /// Remove a source
    Delete { source_id: Uuid },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    None,
    Basic,
    Header,
}

impl SourceCommand {
    fn auth_config(
        auth: AuthKind,
        username: Option<String>,
        password: Option<String>,
        header_value: Option<String>,
    ) -> Result<AuthConfig> {
        Ok(match auth {
            AuthKind::None => AuthConfig::None,
            AuthKind::Basic => AuthConfig::Basic {
                username: username.context("--username is required for basic auth")?,
                password: password.unwrap_or_default(),
            },
            AuthKind::Header => AuthConfig::Header {
                value: header_value.context("--header-value is required for header auth")?,
            },
        })
    }
}

/// Wired-up engine for one CLI invocation
struct Engine {
    config: SyncConfig,
    orchestrator: Arc<SyncOrchestrator>,
}

impl Engine {
    async fn connect(config: SyncConfig) -> Result<Self> {
        let store = PgPullSourceStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        store.migrate().await.context("Failed to run migrations")?;

        let gateways = DefaultGatewayFactory::new(config.http_timeout(), &config.http.user_agent)
            .context("Failed to build HTTP client")?;
        let detection = HttpDetectionPipeline::new(&config.detection.url, config.detection_timeout())
            .context("Failed to build detection client")?;

        let orchestrator = SyncOrchestrator::new(Arc::new(store), Arc::new(gateways), Arc::new(detection))
            .with_timeouts(SyncTimeouts::from_config(&config))
            .with_source_parallelism(config.scheduler.source_parallelism);

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
        })
    }

    fn admin(&self) -> SourceAdmin {
        SourceAdmin::new(Arc::clone(&self.orchestrator))
    }

    fn max_files(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.config.scheduler.max_files_per_source)
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = SyncConfig::load()?;
    let engine = Engine::connect(config).await?;

    match cli.command {
        Commands::Run => run(&engine).await,
        Commands::Sync {
            source_id,
            max_files,
        } => {
            let result = engine
                .admin()
                .trigger_manual_sync(source_id, engine.max_files(max_files))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        },
        Commands::Sweep { max_files } => {
            let summary = engine
                .orchestrator
                .pull_and_process_all_active_sources(engine.max_files(max_files))
                .await?;
            println!(
                "Sources: {} synced, {} skipped, {} failed",
                summary.sources_synced, summary.sources_skipped, summary.sources_failed
            );
            println!(
                "Files: {} succeeded, {} failed",
                summary.files_succeeded, summary.files_failed
            );
            Ok(())
        },
        Commands::Source(command) => source_command(&engine, command).await,
    }
}

async fn run(engine: &Engine) -> Result<()> {
    if !engine.config.scheduler.enabled {
        warn!("Scheduler is disabled (SYNC_SCHEDULER_ENABLED=false), nothing to run");
        return Ok(());
    }

    let scheduler = SyncScheduler::from_config(
        Arc::clone(&engine.orchestrator),
        Arc::new(IntervalJobRunner::new()),
        &engine.config,
    );
    let handle = scheduler.start();

    shutdown_signal().await;
    scheduler.shutdown();
    handle.await.context("Scheduler task panicked")?;

    info!("Sync scheduler shut down gracefully");
    Ok(())
}

async fn source_command(engine: &Engine, command: SourceCommand) -> Result<()> {
    let admin = engine.admin();

    match command {
        SourceCommand::Add {
            name,
            owner,
            location,
            url,
            auth,
            username,
            password,
            header_value,
            inactive,
        } => {
            let source = admin
                .create_source(NewPullSource {
                    name,
                    owner_user_id: owner,
                    target_location_id: location,
                    base_url: url,
                    auth_config: SourceCommand::auth_config(auth, username, password, header_value)?,
                    is_active: !inactive,
                })
                .await?;
            println!("Created source {} ({})", source.name, source.id);
        },
        SourceCommand::List { owner } => {
            let sources = admin.list_active_sources_for_owner(&owner).await?;
            if sources.is_empty() {
                println!("No active sources for {}", owner);
            }
            for source in &sources {
                print_source(source);
            }
        },
        SourceCommand::Enable { source_id } => {
            let source = admin.toggle_active(source_id, true).await?;
            println!("Enabled {} ({})", source.name, source.id);
        },
        SourceCommand::Disable { source_id } => {
            let source = admin.toggle_active(source_id, false).await?;
            println!("Disabled {} ({})", source.name, source.id);
        },
        SourceCommand::Delete { source_id } => {
            admin.delete_source(source_id).await?;
            println!("Deleted {}", source_id);
        },
    }
    Ok(())
}

fn print_source(source: &PullSource) {
    let last_sync = source
        .last_sync_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{}  {:<32}  auth={:<6}  cursor={:<24}  last_sync={}",
        source.id,
        source.name,
        source.auth_config.kind(),
        source.cursor.as_deref().unwrap_or("-"),
        last_sync
    );
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_with_max_files() {
        let id = Uuid::new_v4();
        let cli = Cli::parse_from(["wildcam-sync", "sync", &id.to_string(), "--max-files", "3"]);
        match cli.command {
            Commands::Sync {
                source_id,
                max_files,
            } => {
                assert_eq!(source_id, id);
                assert_eq!(max_files, Some(3));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_basic_auth_requires_username() {
        let location = Uuid::new_v4().to_string();
        let result = Cli::try_parse_from([
            "wildcam-sync",
            "source",
            "add",
            "--name",
            "cam",
            "--owner",
            "u1",
            "--location",
            &location,
            "--url",
            "http://cam.example.org/",
            "--auth",
            "basic",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_auth_config_from_flags() {
        let auth = SourceCommand::auth_config(
            AuthKind::Basic,
            Some("ranger".to_string()),
            Some("pw".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(auth.kind(), "basic");

        let err = SourceCommand::auth_config(AuthKind::Header, None, None, None);
        assert!(err.is_err());
    }
}
