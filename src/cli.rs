use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "stream-tui",
    version,
    about = "Terminal dashboard for your stream catalog, launching and supervising player processes"
)]
pub struct Cli {
    /// Stream database file (defaults to streams.json in the data directory).
    #[arg(short = 'd', long = "database", value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    /// Settings file (defaults to settings.json in the data directory).
    #[arg(short = 'f', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `stream_tui=trace`. Overrides RUST_LOG.
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive dashboard (default).
    Tui,
    /// Print the stream catalog ordered by view count.
    List(ListArgs),
    /// Add a stream to the catalog without opening the dashboard.
    Add(AddArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Only show streams whose name or URL contains this text.
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Stream URL understood by the player command.
    pub url: String,

    /// Display name (defaults to the last path segment of the URL).
    #[arg(short, long)]
    pub name: Option<String>,

    /// Resolution passed to the player (defaults to the configured policy).
    #[arg(short, long)]
    pub resolution: Option<String>,
}
