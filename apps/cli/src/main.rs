//! Envoy demo shell
//!
//! Drives one validation round into an activated engine from the command line.

mod surfaces;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use envoy_activation::{ActivationError, CanaryRoute, Orchestrator, OrchestratorConfig, Surface, SurfaceKind};
use envoy_core::{CandidateListBuilder, CandidateSet, LocalFrontEnd};
use envoy_engine::{EngineConfig, EngineSlot, NetworkEngine};
use envoy_logging::LogLevel;
use envoy_validation::{LocalConnector, ValidationProber, ValidationService};

use crate::surfaces::EnginePage;

/// Envoy - egress validation and engine activation demo
#[derive(Parser)]
#[command(name = "envoy-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file (every field optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate candidates and activate the engine with the first winner
    Run {
        /// Local proxy front-end host
        #[arg(long)]
        proxy_host: Option<String>,

        /// Local proxy front-end port
        #[arg(long)]
        proxy_port: Option<u16>,

        /// Remote probe target (repeatable; replaces the configured targets)
        #[arg(short, long)]
        target: Vec<String>,

        /// Page visible while validating
        #[arg(long, default_value = "engine")]
        surface: SurfaceKind,

        /// Seconds to wait for a winner (0 waits forever)
        #[arg(long)]
        timeout: Option<u64>,

        /// Canary endpoint
        #[arg(long)]
        canary: Option<String>,

        /// Canary route (engine, direct)
        #[arg(long)]
        canary_route: Option<CanaryRoute>,

        /// URL to GET through the activated engine
        #[arg(long)]
        fetch: Option<String>,

        /// Seconds to keep listening after activation (canary output)
        #[arg(long, default_value = "2")]
        linger: u64,
    },

    /// Run the prober alone and print every winner
    Probe {
        /// Candidate egress URLs (defaults to the configured candidates)
        candidates: Vec<String>,

        /// Seconds to collect results
        #[arg(long, default_value = "15")]
        wait: u64,
    },

    /// GET a URL through an engine built from one egress URL
    Fetch {
        /// Egress URL (socks5://, https://, envoy://)
        #[arg(short, long)]
        egress: String,

        /// URL to fetch
        url: String,
    },

    /// List the demo pages
    Surfaces,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    envoy_logging::try_init_with_target(LogLevel::from_verbosity(cli.verbose), cli.verbose > 1)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            proxy_host,
            proxy_port,
            target,
            surface,
            timeout,
            canary,
            canary_route,
            fetch,
            linger,
        } => {
            let mut config = config;
            if let Some(host) = proxy_host {
                config.front_end.host = host;
            }
            if let Some(port) = proxy_port {
                config.front_end.port = port;
            }
            if !target.is_empty() {
                config.targets = target;
            }
            if let Some(secs) = timeout {
                config.validation_timeout_secs = (secs > 0).then_some(secs);
            }
            if let Some(endpoint) = canary {
                config.canary_endpoint = endpoint;
            }
            if let Some(route) = canary_route {
                config.canary_route = route;
            }
            config.validate()?;
            run(config, surface, fetch, Duration::from_secs(linger)).await?;
        }
        Commands::Probe { candidates, wait } => {
            probe(&config, candidates, Duration::from_secs(wait)).await?;
        }
        Commands::Fetch { egress, url } => {
            fetch(&config, &egress, &url).await?;
        }
        Commands::Surfaces => {
            list_surfaces();
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    match path {
        Some(path) => OrchestratorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(OrchestratorConfig::default()),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run(config: OrchestratorConfig, surface: SurfaceKind, fetch_url: Option<String>, linger: Duration) -> Result<()> {
    let service = Arc::new(ValidationService::new(config.probe.clone()));
    let slot = Arc::new(EngineSlot::with_template(config.engine.clone()));
    let canary = Arc::new(config.canary());
    let candidates = config.candidates();

    let orchestrator = Orchestrator::new(
        config,
        service.clone(),
        Arc::new(LocalConnector::new(service)),
        slot.clone(),
        canary,
    );

    let engine_page = (surface == SurfaceKind::Engine).then(|| Arc::new(EnginePage::default()));
    let page: Arc<dyn Surface> = match &engine_page {
        Some(engine_page) => engine_page.clone(),
        None => surfaces::page(surface),
    };
    orchestrator.set_visible_surface(&page);
    orchestrator.on_visible()?;

    println!("Validating {} candidate(s):", candidates.len());
    for candidate in candidates.iter() {
        println!("  {}", candidate);
    }
    orchestrator.start(candidates)?;

    match orchestrator.wait_for_activation().await {
        Ok(url) => {
            println!("\nActivated: {}", url);
            if let Some(engine) = slot.current() {
                println!("Engine:    {}", engine.version_string());
            }
        }
        Err(ActivationError::Timeout(elapsed)) => {
            println!("\nNo valid egress within {:?}", elapsed);
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(url) = engine_page.as_ref().and_then(|p| p.last_url()) {
        println!("{} page last saw: {}", SurfaceKind::Engine.title(), url);
    }

    match orchestrator.known_valid_urls() {
        Ok(urls) if urls.is_empty() => println!("Known valid URLs: none"),
        Ok(urls) => {
            println!("Known valid URLs:");
            for url in urls {
                println!("  {}", url);
            }
        }
        Err(e) => debug!("Status query unavailable: {}", e),
    }

    if let Some(url) = fetch_url {
        let engine = slot.require().context("No engine to fetch through")?;
        print_fetch(&engine, &url).await?;
    }

    if orchestrator.state().is_active() && !linger.is_zero() {
        tokio::time::sleep(linger).await;
    }

    orchestrator.clear_visible_surface();
    orchestrator.on_hidden();
    orchestrator.shutdown();
    Ok(())
}

async fn probe(config: &OrchestratorConfig, candidates: Vec<String>, wait: Duration) -> Result<()> {
    let candidates = if candidates.is_empty() {
        config.candidates()
    } else {
        parse_candidates(candidates)?
    };

    let service = ValidationService::new(config.probe.clone());
    let mut rx = service.subscribe();
    service.try_submit(candidates.clone())?;
    info!("Probing {} candidate(s) for up to {:?}", candidates.len(), wait);

    let deadline = tokio::time::Instant::now() + wait;
    let mut winners = 0;
    while winners < candidates.len() {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) => {
                winners += 1;
                println!("valid: {}", event.url.unwrap_or_default());
            }
            Ok(None) | Err(_) => break,
        }
    }

    println!("{}/{} candidate(s) valid", winners, candidates.len());
    Ok(())
}

async fn fetch(config: &OrchestratorConfig, egress: &str, url: &str) -> Result<()> {
    let engine_config = EngineConfig {
        egress_url: egress.to_string(),
        user_agent: config.user_agent.clone(),
        ..config.engine.clone()
    };
    let engine = NetworkEngine::build(engine_config).context("Invalid egress")?;
    print_fetch(&engine, url).await
}

fn list_surfaces() {
    println!("{:<16} {:<16} {}", "NAME", "TITLE", "ACTIVATION EVENTS");
    for kind in SurfaceKind::ALL {
        let observes = surfaces::page(kind).activation_observer().is_some();
        println!("{:<16} {:<16} {}", kind.as_str(), kind.title(), if observes { "yes" } else { "no" });
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Bare `host:port` entries are read as a SOCKS5 front-end
fn parse_candidates(raw: Vec<String>) -> Result<CandidateSet> {
    let mut builder = CandidateListBuilder::new();
    for entry in raw {
        if entry.contains("://") {
            builder = builder.target(entry);
        } else {
            let front_end: LocalFrontEnd = entry
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid candidate {}: {}", entry, e))?;
            builder = builder.local_front_end(front_end);
        }
    }
    Ok(builder.build())
}

async fn print_fetch(engine: &NetworkEngine, url: &str) -> Result<()> {
    info!("Fetching {} via {}", url, engine.egress_url());
    let response = engine.get(url).await.with_context(|| format!("Failed to fetch {}", url))?;
    println!("Status: {}", response.status);
    println!("\n{}", response.text());
    Ok(())
}
