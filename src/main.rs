//! overlay-config CLI
//!
//! Loads tagged configuration sources, merges them into overlays and prints
//! resolved values or whole trees. `watch` keeps the sources live and
//! reprints the view on every change.

use anyhow::{Context, Result};
use clap::Parser;
use overlay_config::cli::{Cli, Command, DumpArgs, GetArgs, SourceArgs, ValueKind};
use overlay_config::config::EngineSettings;
use overlay_config::engine::OverlayConfig;
use overlay_config::logging::init_tracing;
use overlay_config::tags::Tags;
use overlay_config::watcher::{SourceChangeEvent, WatchedFiles, WatcherConfig, start_source_watcher};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, &cli.log)?;

    let settings = match &cli.settings {
        Some(path) => {
            let mut settings = EngineSettings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?;
            settings.apply_env_overrides()?;
            settings
        }
        None => EngineSettings::discover()?,
    };
    debug!(?settings, "Engine settings");

    match cli.command {
        Command::Dump(args) => {
            let engine = build_engine(settings, &args.source)?;
            print_subtree(&engine, &args)
        }
        Command::Get(args) => {
            let engine = build_engine(settings, &args.source)?;
            print_value(&engine, &args)
        }
        Command::Watch(args) => watch(settings, args).await,
    }
}

fn build_engine(settings: EngineSettings, args: &SourceArgs) -> Result<OverlayConfig> {
    let engine = OverlayConfig::new(settings)?;
    for source in &args.sources {
        engine
            .add_source(source.clone())
            .with_context(|| format!("loading source {}", source))?;
    }
    if let Some(ref prefix) = args.env_prefix {
        engine.add_env(prefix, Tags::none())?;
    }
    info!(sources = args.sources.len(), tags = %args.tags, "Configuration loaded");
    Ok(engine)
}

fn print_subtree(engine: &OverlayConfig, args: &DumpArgs) -> Result<()> {
    let node = engine.get_node(&args.path, &args.source.tags)?;
    println!("{}", serde_json::to_string_pretty(&node.to_json())?);
    Ok(())
}

fn print_value(engine: &OverlayConfig, args: &GetArgs) -> Result<()> {
    let (path, tags) = (args.path.as_str(), &args.source.tags);
    match args.kind {
        ValueKind::String => println!("{}", engine.get::<String>(path, tags)?),
        ValueKind::Int => println!("{}", engine.get::<i64>(path, tags)?),
        ValueKind::Float => println!("{}", engine.get::<f64>(path, tags)?),
        ValueKind::Bool => println!("{}", engine.get::<bool>(path, tags)?),
        ValueKind::List => {
            for item in engine.get_list::<String>(path, tags)? {
                println!("{}", item);
            }
        }
    }
    Ok(())
}

async fn watch(settings: EngineSettings, args: DumpArgs) -> Result<()> {
    let engine = build_engine(settings, &args.source)?;
    print_subtree(&engine, &args)?;

    let files = WatchedFiles::new(engine.sources().into_iter().map(|(_, source)| source.path));
    let mut handle = start_source_watcher(files, WatcherConfig::default())?;

    loop {
        tokio::select! {
            event = handle.wait_for_change() => {
                let Some(event) = event else {
                    info!("Source watcher stopped");
                    break;
                };
                if let SourceChangeEvent::Error(message) = &event {
                    warn!(error = %message, "Source watcher error");
                    continue;
                }
                for path in event.affected_paths() {
                    // A broken edit keeps the last good tree in place.
                    match engine.reload_path(path) {
                        Ok(ids) => debug!(path = %path.display(), reloaded = ids.len(), "Source reloaded"),
                        Err(e) => warn!(path = %path.display(), error = %e, "Reload failed, keeping previous configuration"),
                    }
                }
                if let Err(e) = print_subtree(&engine, &args) {
                    warn!(error = %e, "Unable to render configuration");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watcher");
                break;
            }
        }
    }
    Ok(())
}
