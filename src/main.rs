mod cli;
mod keymap;
mod registry;
mod settings;
mod store;
mod supervisor;
mod tui;
mod viewport;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use cli::{AddArgs, Cli, Command, ListArgs};
use registry::{AddOutcome, Registry, default_stream_name};
use settings::{Settings, load_or_create_settings};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use store::{JsonFileStore, RecordStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_file_logging(cli.log_filter.as_deref());

    let settings = load_settings(cli.config.as_deref());
    let store = match cli.database {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::at_default_path()?,
    };
    info!(database = %store.path().display(), "opening stream database");
    let mut registry = Registry::load(store, settings.resolution_policy.clone())
        .context("failed loading stream database")?;

    match cli.command {
        None | Some(Command::Tui) => {
            tui::run_tui(registry, settings).await?;
        }
        Some(Command::List(args)) => {
            print_streams(&mut registry, &args)?;
        }
        Some(Command::Add(args)) => {
            add_stream(&mut registry, &args)?;
        }
    }

    Ok(())
}

/// Sends tracing output to a log file so it never lands on the dashboard.
/// Logging stays off when the file cannot be opened.
fn init_file_logging(filter_override: Option<&str>) {
    let Ok(log_path) = store::log_path() else {
        return;
    };
    if store::ensure_parent_dir(&log_path).is_err() {
        return;
    }
    let Ok(log_file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };

    let filter = match filter_override {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();
}

fn load_settings(explicit: Option<&Path>) -> Settings {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match store::settings_path() {
            Ok(path) => path,
            Err(err) => {
                eprintln!("Warning: {err:#}. Using default settings.");
                return Settings::default();
            }
        },
    };

    match load_or_create_settings(&path) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(path = %path.display(), "failed to load settings: {err:#}");
            eprintln!("Warning: failed to load settings ({err:#}). Using defaults.");
            Settings::default()
        }
    }
}

fn print_streams<S: RecordStore>(registry: &mut Registry<S>, args: &ListArgs) -> Result<()> {
    if let Some(filter) = &args.filter {
        registry.set_filter(filter);
    }
    let streams = registry.filtered().collect::<Vec<_>>();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&streams)?);
        return Ok(());
    }
    if streams.is_empty() {
        if registry.is_empty() {
            println!("No streams yet. Run `stream-tui add <url>` to add one.");
        } else {
            println!("No stream matches '{}'.", registry.filter());
        }
        return Ok(());
    }

    println!(
        "{:>6}  {:>7}  {:<12}  {:<22}  URL",
        "ID", "VIEWS", "RESOLUTION", "NAME"
    );
    for stream in streams {
        println!(
            "{:>6}  {:>7}  {:<12}  {:<22}  {}",
            stream.id, stream.seen_count, stream.resolution, stream.name, stream.url
        );
    }
    Ok(())
}

fn add_stream<S: RecordStore>(registry: &mut Registry<S>, args: &AddArgs) -> Result<()> {
    let url = args.url.trim();
    if url.is_empty() {
        bail!("stream URL is empty");
    }
    let name = match args.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => default_stream_name(url)
            .ok_or_else(|| anyhow!("cannot derive a stream name from '{url}', pass --name"))?,
    };

    let outcome = registry.add(&name, url, args.resolution.as_deref())?;
    let id = outcome.id();
    let Some(stream) = registry.get(id) else {
        bail!("stream {id} vanished after being added");
    };
    match outcome {
        AddOutcome::Added(_) => {
            info!(stream_id = id, %url, "stream added from command line");
            println!("Added stream {id}: {} ({})", stream.name, stream.resolution);
        }
        AddOutcome::Existing(_) => {
            println!("Stream already exists as {id}: {}", stream.name);
        }
    }
    Ok(())
}
