//! linkwatchd — the linkwatch daemon.
//!
//! Single binary that assembles all linkwatch subsystems:
//! - Endpoint snapshot store
//! - Prober + round-robin probe scheduler
//! - Alarm correlator (when an alarm feed is configured)
//! - Dashboard refresher
//! - Incident ticket bridge
//! - REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! linkwatchd init --config linkwatch.toml
//! linkwatchd run --config linkwatch.toml --port 8480 --delay slow --skip-offline
//! ```

mod clients;
mod inventory;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};

use linkwatch_alarms::AlarmCorrelator;
use linkwatch_api::{ApiState, DashboardRefresher};
use linkwatch_core::{LinkwatchConfig, ProbeDelay};
use linkwatch_health::{Prober, StatusResolver};
use linkwatch_incident::{IncidentBridge, TicketingService};
use linkwatch_scheduler::{ProbeScheduler, SchedulerSettings};
use linkwatch_state::{EndpointFilter, EndpointRegistry, SnapshotStore};

use crate::clients::{
    HttpAlarmFeed, HttpProbeTransport, HttpRegistry, HttpTicketing, JsonClient, NoTicketing,
};
use crate::inventory::FileInventory;

const DEFAULT_LOG_FILTER: &str = "info,linkwatchd=debug,linkwatch=debug";
const DEFAULT_CONFIG: &str = "linkwatch.toml";

/// How often `current_downtime_seconds` is recomputed for down endpoints.
const DOWNTIME_TICK: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "linkwatchd", about = "linkwatch network health monitoring daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitoring daemon.
    Run {
        /// Path to linkwatch.toml (defaults apply when absent).
        #[arg(long)]
        config: Option<PathBuf>,

        /// API port (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Probe delay preset: fast, normal, slow, very_slow or 1000/2000/3000/5000.
        #[arg(long)]
        delay: Option<String>,

        /// Pass over endpoints that are OFFLINE without probing them.
        #[arg(long)]
        skip_offline: bool,

        /// Local inventory file used instead of a registry service.
        #[arg(long)]
        inventory: Option<PathBuf>,

        /// Start probing immediately.
        #[arg(long)]
        autostart: bool,
    },

    /// Write a linkwatch.toml with every default spelled out.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            port,
            delay,
            skip_offline,
            inventory,
            autostart,
        } => {
            let config = load_config(config.as_deref())?;
            let overrides = Overrides {
                port,
                delay,
                skip_offline,
                inventory,
                autostart,
            };
            run_daemon(config, overrides).await
        }
        Command::Init { config, force } => write_scaffold(&config, force),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LinkwatchConfig> {
    match path {
        Some(path) => LinkwatchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            LinkwatchConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("loading config {DEFAULT_CONFIG}"))
        }
        None => {
            info!("no config file, using defaults");
            Ok(LinkwatchConfig::default())
        }
    }
}

fn write_scaffold(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(path, LinkwatchConfig::scaffold().to_toml_string()?)?;
    info!(path = %path.display(), "config scaffold written");
    Ok(())
}

/// Command-line values that take precedence over the config file.
struct Overrides {
    port: Option<u16>,
    delay: Option<String>,
    skip_offline: bool,
    inventory: Option<PathBuf>,
    autostart: bool,
}

fn build_registry(
    config: &LinkwatchConfig,
    inventory: Option<PathBuf>,
) -> anyhow::Result<Arc<dyn EndpointRegistry>> {
    let collaborators = config.collaborators.clone().unwrap_or_default();
    if let Some(path) = inventory.or(collaborators.inventory_path.map(PathBuf::from)) {
        let inventory = FileInventory::new(path);
        info!(path = %inventory.path().display(), "using file inventory");
        return Ok(Arc::new(inventory));
    }
    match collaborators.registry_url {
        Some(url) => {
            info!(%url, "using registry service");
            Ok(Arc::new(HttpRegistry::new(JsonClient::new(&url))))
        }
        None => anyhow::bail!("no endpoint source: set collaborators.registry_url or --inventory"),
    }
}

async fn run_daemon(config: LinkwatchConfig, overrides: Overrides) -> anyhow::Result<()> {
    info!("linkwatch daemon starting");

    let collaborators = config.collaborators.clone().unwrap_or_default();
    let delay = match overrides.delay.as_deref() {
        Some(raw) => raw.parse::<ProbeDelay>()?,
        None => config.probe_delay()?,
    };
    let settings = SchedulerSettings {
        delay,
        skip_offline: overrides.skip_offline || config.skip_offline(),
    };
    let profiles = config.probe_profiles()?;
    let filter = EndpointFilter::all();

    // ── Initialize subsystems ──────────────────────────────────

    let store = SnapshotStore::new();
    let registry = build_registry(&config, overrides.inventory)?;

    let probe_url = collaborators
        .probe_url
        .as_deref()
        .context("collaborators.probe_url is required")?;
    // Longest media timeout plus a margin.
    let agent_timeout = [profiles.vsat, profiles.m2m, profiles.fo, profiles.default]
        .iter()
        .map(|p| p.timeout)
        .max()
        .unwrap_or_default()
        + Duration::from_secs(1);
    let transport = Arc::new(HttpProbeTransport::new(
        JsonClient::new(probe_url).with_timeout(agent_timeout),
    ));
    let prober = Arc::new(Prober::new(transport, profiles));
    let resolver = StatusResolver::new(store.clone());
    let scheduler = Arc::new(ProbeScheduler::new(prober, resolver.clone(), settings));
    info!(
        delay_ms = settings.delay.as_millis(),
        skip_offline = settings.skip_offline,
        %probe_url,
        "scheduler initialized"
    );

    let ticketing: Arc<dyn TicketingService> = match collaborators.ticketing_url.as_deref() {
        Some(url) => Arc::new(HttpTicketing::new(JsonClient::new(url))),
        None => {
            warn!("no ticketing service configured, ticket requests will fail");
            Arc::new(NoTicketing)
        }
    };
    let bridge = Arc::new(
        IncidentBridge::new(ticketing, store.clone())
            .with_pacing(config.ticket_pacing()?)
            .with_child_suppression(config.suppress_child_atms())
            .with_dedup_window(config.incident_dedup_window()?),
    );

    let dashboard = Arc::new(
        DashboardRefresher::new(registry.clone(), filter.clone(), store.clone(), scheduler.clone())
            .with_interval(config.dashboard_refresh_interval()?),
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    // ── Start background tasks ─────────────────────────────────

    // Dashboard refresh loop.
    {
        let dashboard = dashboard.clone();
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { dashboard.run(shutdown).await }));
    }

    // Alarm correlation loop.
    match collaborators.alarm_url.as_deref() {
        Some(url) => {
            let feed = Arc::new(HttpAlarmFeed::new(JsonClient::new(url)));
            let correlator = AlarmCorrelator::new(feed, store.clone())
                .with_interval(config.alarm_refresh_interval()?);
            let registry = registry.clone();
            let filter = filter.clone();
            let shutdown = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                correlator.run(registry, filter, shutdown).await;
            }));
        }
        None => info!("no alarm feed configured, alarm correlation disabled"),
    }

    // Downtime ticker.
    {
        let mut shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(DOWNTIME_TICK);
            loop {
                tokio::select! {
                    _ = interval.tick() => resolver.refresh_downtime(Utc::now()),
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    if overrides.autostart || config.autostart() {
        match scheduler.start(registry.as_ref(), &filter).await {
            Ok(count) => info!(endpoints = count, "monitoring autostarted"),
            Err(e) => warn!(error = %e, "autostart failed, start monitoring through the API"),
        }
    }

    // ── Start API server ───────────────────────────────────────

    let state = ApiState {
        store,
        scheduler: scheduler.clone(),
        registry,
        bridge,
        filter,
        dashboard: dashboard.subscribe(),
    };
    let router = linkwatch_api::build_router(state);
    let port = overrides.port.unwrap_or_else(|| config.api_port());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for CTRL+C");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Stop probing and wait for background tasks.
    scheduler.shutdown().await;
    for handle in handles {
        let _ = handle.await;
    }

    info!("linkwatch daemon stopped");
    Ok(())
}
