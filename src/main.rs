use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use museum_wall::config::Configuration;
use museum_wall::events::AssetRequest;
use museum_wall::layout::LayoutPreset;
use museum_wall::tasks::{loader, viewer};

#[derive(Debug, Parser)]
#[command(name = "museum-wall", version, about = "Framed photos on a virtual museum wall")]
struct Args {
    /// Path to YAML config; defaults apply when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Override the layout preset
    #[arg(long, value_name = "PRESET")]
    layout: Option<LayoutPreset>,
    /// Override the backdrop image
    #[arg(long, value_name = "FILE")]
    backdrop: Option<PathBuf>,
    /// Show only the wall
    #[arg(long = "no-photos")]
    no_photos: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
        .add_directive(format!("museum_wall={level}").parse()?)
        .add_directive("wgpu=warn".parse()?)
        .add_directive("winit=warn".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<Configuration> {
    let mut cfg = match &args.config {
        Some(path) => {
            let base = path.parent().map(PathBuf::from).unwrap_or_default();
            Configuration::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
                .resolve_paths(&base)
        }
        None => Configuration::default(),
    };
    if let Some(layout) = args.layout {
        cfg.layout = layout;
    }
    if let Some(backdrop) = &args.backdrop {
        cfg.backdrop = backdrop.clone();
    }
    if args.no_photos {
        cfg.show_photos = false;
    }
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let cfg = load_config(&args)?;
    tracing::info!(
        layout = %cfg.layout,
        backdrop = %cfg.backdrop.display(),
        landscape = cfg.landscape_photos.len(),
        portrait = cfg.portrait_photos.len(),
        "configuration loaded"
    );
    tracing::debug!("{cfg:#?}");

    let (to_loader_tx, to_loader_rx) = mpsc::unbounded_channel::<AssetRequest>();
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let event_loop = viewer::event_loop()?;
    let mut tasks = JoinSet::new();

    tasks.spawn({
        let sink = event_loop.create_proxy();
        let cancel = cancel.clone();
        let options = loader::LoaderOptions {
            max_in_flight: cfg.loader_max_concurrent_decodes,
            max_texture_dim: cfg.rendering.max_texture_dim,
        };
        async move {
            loader::run(to_loader_rx, sink, cancel, options)
                .await
                .context("loader task failed")
        }
    });

    // The window owns the main thread until it closes or cancellation fires.
    if let Err(e) = viewer::run_windowed(event_loop, cfg, to_loader_tx, cancel.clone()) {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
