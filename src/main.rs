//! Binary entry point for murmur.
//!
//! This binary provides the CLI interface for the murmur assistant and its
//! memory store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use murmur::MurmurConfig;
use murmur::observability;

/// Murmur - a voice assistant with a persistent, self-pruning memory.
#[derive(Parser)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding memory.json (overrides the configuration).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Add a reminder, e.g. `murmur remind call mom tomorrow at 2 PM`.
    Remind {
        /// Reminder text, optionally ending in a time phrase.
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,

        /// Due time (timestamp or phrase); otherwise taken from the text.
        #[arg(long)]
        at: Option<String>,
    },

    /// Add an event.
    Event {
        /// Event title, optionally ending in a time phrase.
        #[arg(required = true, trailing_var_arg = true)]
        title: Vec<String>,

        /// Event time (timestamp or phrase); otherwise taken from the title.
        #[arg(long)]
        at: Option<String>,
    },

    /// Remember a fact.
    Fact {
        /// The fact.
        #[arg(required = true, trailing_var_arg = true)]
        content: Vec<String>,

        /// Category such as `preference`.
        #[arg(long)]
        category: Option<String>,
    },

    /// List stored records.
    List {
        /// Only this kind: reminder, event, fact, or conversation.
        #[arg(short, long)]
        kind: Option<String>,

        /// Include completed reminders.
        #[arg(short, long)]
        all: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show the coming week.
    Week {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Update a record by identifier (or unique prefix).
    Update {
        /// Record identifier.
        id: String,

        /// New text.
        #[arg(long)]
        text: Option<String>,

        /// New time (timestamp or phrase).
        #[arg(long)]
        at: Option<String>,

        /// New category (facts only).
        #[arg(long)]
        category: Option<String>,
    },

    /// Mark a reminder completed.
    Complete {
        /// Reminder identifier (or unique prefix).
        id: String,
    },

    /// Clear reminders or all memory.
    Clear {
        /// What to clear: reminders or all.
        #[arg(short, long, default_value = "reminders")]
        scope: String,

        /// Confirm the deletion.
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove records past their retention horizon.
    Cleanup {
        /// Report what would be removed without removing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Find records related to a topic.
    Query {
        /// The topic.
        #[arg(required = true, trailing_var_arg = true)]
        topic: Vec<String>,

        /// Only records created within this many days (default: context window).
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Relevance scorer: `keyword` or `substring`.
        #[arg(long)]
        scorer: Option<String>,

        /// Order by score instead of recency.
        #[arg(long)]
        ranked: bool,
    },

    /// Show the contextual view and intent display.
    Context {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Merge a memory file (any known layout) into the store.
    Import {
        /// Path of the file to import.
        path: PathBuf,
    },

    /// Send one utterance to the assistant.
    Ask {
        /// What to say.
        #[arg(required = true, trailing_var_arg = true)]
        utterance: Vec<String>,
    },

    /// Run the interactive assistant.
    Run {
        /// Do not start background reminder checks.
        #[arg(long)]
        no_scheduler: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match MurmurConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    let config = match &cli.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    };

    if let Err(e) = observability::init_from_env(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: MurmurConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Remind { text, at } => commands::cmd_remind(&config, text.join(" "), at),
        Commands::Event { title, at } => commands::cmd_event(&config, title.join(" "), at),
        Commands::Fact { content, category } => {
            commands::cmd_fact(&config, content.join(" "), category)
        },
        Commands::List { kind, all, json } => commands::cmd_list(&config, kind, all, json),
        Commands::Week { json } => commands::cmd_week(&config, json),
        Commands::Update {
            id,
            text,
            at,
            category,
        } => commands::cmd_update(&config, id, text, at, category),
        Commands::Complete { id } => commands::cmd_complete(&config, id),
        Commands::Clear { scope, yes } => commands::cmd_clear(&config, scope, yes),
        Commands::Cleanup { dry_run } => commands::cmd_cleanup(&config, dry_run),
        Commands::Query {
            topic,
            days,
            limit,
            scorer,
            ranked,
        } => commands::cmd_query(&config, topic.join(" "), days, limit, scorer, ranked),
        Commands::Context { json } => commands::cmd_context(&config, json),
        Commands::Import { path } => commands::cmd_import(&config, path),
        Commands::Ask { utterance } => commands::cmd_ask(&config, utterance.join(" ")),
        Commands::Run { no_scheduler } => commands::cmd_run(&config, !no_scheduler),
    }
}
