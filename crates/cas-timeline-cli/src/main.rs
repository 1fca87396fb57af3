#![forbid(unsafe_code)]

mod cmd;
mod output;
mod tui;

use anyhow::Context as _;
use cas_timeline_core::config;
use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log file the TUI writes to, under the data directory.
const TUI_LOG_FILE: &str = "cas-timeline.log";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "cas: browse and curate the CAS timeline",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Config file to use instead of the default lookup.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Browse the timeline interactively",
        long_about = "Open the full-screen timeline browser.",
        after_help = "EXAMPLES:\n    # Open the timeline\n    cas browse\n\n    # Open a shared view\n    cas browse --link 'https://cas-timeline.local/#filter=Community&sort=newest'\n\n    # Disable the cross-fade\n    cas browse --reduce-motion"
    )]
    Browse(tui::BrowseArgs),

    #[command(
        next_help_heading = "Read",
        about = "List timeline events",
        long_about = "Print the timeline filtered, searched and sorted like the browser view.",
        after_help = "EXAMPLES:\n    # Everything, oldest first\n    cas list\n\n    # Sustainability projects, newest first\n    cas list --filter Sustainability --sort newest\n\n    # Reproduce a shared view\n    cas list --link '#q=robotics&year=2024'\n\n    # Emit machine-readable output\n    cas list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show data source and pending edits",
        long_about = "Show the active data source, dataset signature and edits waiting to be published.",
        after_help = "EXAMPLES:\n    # Show status\n    cas status\n\n    # Emit machine-readable output\n    cas status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Edit",
        about = "Add an event",
        long_about = "Add a new event to the timeline. In local mode it is kept on this device until published.",
        after_help = "EXAMPLES:\n    # Add an event\n    cas add --title 'Beach clean-up' --date 2024-04-22 \\\n        --summary 'Year 12 cleaned the shore' --details 'Collected 40kg of litter' \\\n        -c Sustainability -c Community --password admin\n\n    # Upload a photo with it\n    cas add ... --image-file photo.jpg"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Edit",
        about = "Delete an event",
        long_about = "Remove an event from the timeline by id.",
        after_help = "EXAMPLES:\n    # Delete after confirmation\n    cas delete evt-1 --password admin\n\n    # Skip the prompt\n    cas delete evt-1 --force"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Publish",
        about = "Export the merged timeline as JSON",
        long_about = "Write the merged timeline, oldest first and stamped with today's date, as a dataset file.",
        after_help = "EXAMPLES:\n    # Print to stdout\n    cas export\n\n    # Write a file\n    cas export --out timeline-data.json"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Publish",
        about = "Publish the merged timeline",
        long_about = "Send the merged timeline to the publish endpoint and clear local edits on success.",
        after_help = "EXAMPLES:\n    # Publish\n    cas publish --password \"$PUBLISH_PASSWORD\"\n\n    # Wait until the public site serves it\n    cas publish --wait"
    )]
    Publish(cmd::publish::PublishArgs),

    #[command(
        next_help_heading = "Utilities",
        about = "Generate shell completions",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    cas completions bash\n\n    # Generate zsh completions\n    cas completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env("CAS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "cas_timeline=debug,info"
        } else {
            "cas_timeline=info,warn"
        })
    })
}

/// Install the subscriber. `log_file` takes the place of stderr, which the
/// TUI owns.
fn init_tracing(verbose: bool, log_file: Option<File>) {
    let format = env::var("CAS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(default_filter(verbose));

    match (format.as_str(), log_file) {
        ("json", Some(file)) => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        ("json", None) => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        (_, Some(file)) => registry
            .with(fmt::layer().compact().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        (_, None) => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn open_tui_log(dir: &Path) -> anyhow::Result<File> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(TUI_LOG_FILE);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.command {
        Commands::Browse(_) => Some(open_tui_log(&config::default_data_dir())?),
        _ => None,
    };
    init_tracing(cli.verbose, log_file);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;
    let output = cli.output_mode();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Browse(ref args) => tui::timeline::run_browse(args, config_path, &project_root),
        Commands::List(ref args) => {
            cmd::list::run_list(args, config_path, output, &project_root)
        }
        Commands::Status(ref args) => {
            cmd::status::run_status(args, config_path, output, &project_root)
        }
        Commands::Add(ref args) => cmd::add::run_add(args, config_path, output, &project_root),
        Commands::Delete(ref args) => {
            cmd::delete::run_delete(args, config_path, output, &project_root)
        }
        Commands::Export(ref args) => {
            cmd::export::run_export(args, config_path, output, &project_root)
        }
        Commands::Publish(ref args) => {
            cmd::publish::run_publish(args, config_path, output, &project_root)
        }
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
