// playdeck - terminal front end for streamed playlists
// Browses a catalog, hands tracks to the playback service, renders what it publishes

use anyhow::{Context, Result};
use clap::Parser;
use playdeck::audio::SimulatedDevice;
use playdeck::catalog::{CatalogProvider, JsonCatalog, Playlist};
use playdeck::config::{Config, PlaybackConfig};
use playdeck::playback::{PlaybackError, PlayerService};
use playdeck::ui::StatusPrinter;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "playdeck")]
#[command(about = "Browse playlists and play them from the terminal")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalog JSON file, overrides `catalog_path`
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Playlist id or name to start with in headless mode
    #[arg(long)]
    playlist: Option<String>,

    /// Use the silent simulated device instead of audio output
    #[arg(long)]
    simulate: bool,

    /// Print playback transitions instead of drawing the terminal UI
    #[arg(long)]
    headless: bool,

    /// Mirror logs to stderr
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let loaded = match &args.config {
        Some(path) => Config::load_or_create(path),
        None => Config::load(),
    };

    // Logging comes up before a bad config is reported, so the error lands in the log file
    let log_dir = match &loaded {
        Ok(config) => config.log_dir.clone(),
        Err(_) => Config::default_log_dir(),
    };
    let _guard = init_logging(&log_dir, args.dev)?;
    info!("Starting playdeck v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Could not load config: {:#}", e);
            return Err(e);
        }
    };
    if let Some(catalog) = &args.catalog {
        config.catalog_path = catalog.clone();
    }

    let catalog = JsonCatalog::new(&config.catalog_path);
    let service = spawn_player(&config.playback, args.simulate)?;

    let outcome = if args.headless || !cfg!(feature = "tui") {
        run_headless(&service, &catalog, args.playlist.as_deref()).await
    } else {
        run_tui(&config, &service, &catalog).await
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    service.shutdown()?;
    info!("playdeck stopped");
    outcome
}

fn init_logging(log_dir: &Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "playdeck.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Base filter: info level for general logs, debug for playdeck
    let base_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,playdeck=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("Dev mode: logging to stderr and {}", log_dir.display());
    }

    Ok(guard)
}

fn spawn_simulated(playback: &PlaybackConfig) -> Result<PlayerService, PlaybackError> {
    PlayerService::spawn(playback, || Ok(SimulatedDevice::new().realtime()))
}

#[cfg(feature = "audio")]
fn spawn_player(playback: &PlaybackConfig, simulate: bool) -> Result<PlayerService, PlaybackError> {
    if simulate {
        info!("Using simulated audio device");
        spawn_simulated(playback)
    } else {
        PlayerService::spawn(playback, playdeck::audio::RodioDevice::new)
    }
}

#[cfg(not(feature = "audio"))]
fn spawn_player(playback: &PlaybackConfig, simulate: bool) -> Result<PlayerService, PlaybackError> {
    if !simulate {
        warn!("Built without audio output, falling back to the simulated device");
    }
    spawn_simulated(playback)
}

async fn run_headless(service: &PlayerService, catalog: &JsonCatalog, key: Option<&str>) -> Result<()> {
    let playlist = match key {
        Some(key) => catalog.playlist(key)?,
        None => first_playlist(catalog)?,
    };
    let printer = StatusPrinter::new(service.handle())?;
    printer.run(&playlist).await
}

fn first_playlist(catalog: &JsonCatalog) -> Result<Playlist> {
    catalog
        .playlists()?
        .into_iter()
        .next()
        .with_context(|| format!("No playlists in {}", catalog.path().display()))
}

#[cfg(feature = "tui")]
async fn run_tui(config: &Config, service: &PlayerService, catalog: &JsonCatalog) -> Result<()> {
    let playlists = match catalog.playlists() {
        Ok(playlists) => playlists,
        Err(e) => {
            // Still usable as an empty browser
            warn!("{}", e);
            Vec::new()
        }
    };

    let mut app = playdeck::ui::App::new(config.ui.clone(), service.handle(), playlists)?;
    app.run().await
}

#[cfg(not(feature = "tui"))]
async fn run_tui(_config: &Config, service: &PlayerService, catalog: &JsonCatalog) -> Result<()> {
    run_headless(service, catalog, None).await
}
