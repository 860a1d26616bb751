//! AppQuitter CLI - Quit running applications with a whitelist
//!
//! A command-line front end for the quit engine: quit one application,
//! quit a whole list of them, and manage the persistent whitelist.

#[cfg(not(unix))]
compile_error!("Unsupported platform: appquitter needs Unix signals");

mod commands;

use std::path::PathBuf;

use appquitter_core::config::DEFAULT_SELF_BUNDLE_ID;
use appquitter_core::{QuitterConfig, QuitterEngine, SignalTerminator};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Engine backed by real signals and the JSON config file.
pub type Engine = QuitterEngine<SignalTerminator>;

#[derive(Parser)]
#[command(name = "appquitter")]
#[command(author, version, about = "Quit running applications, sparing whitelisted ones")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.appquitter/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bundle identifier of the controlling application
    #[arg(long, global = true, default_value = DEFAULT_SELF_BUNDLE_ID)]
    self_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one application to quit
    Quit {
        /// Bundle identifier, e.g. com.apple.Safari
        bundle_id: String,
        /// Process ID
        pid: u32,
        /// Display name used in messages
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Force quit one application (SIGKILL)
    #[command(alias = "kill")]
    ForceQuit {
        bundle_id: String,
        pid: u32,
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Quit every candidate application that is not whitelisted
    QuitAll {
        /// JSON array of candidates; read from stdin when omitted
        #[arg(short, long)]
        candidates: Option<PathBuf>,

        /// Spare these bundle identifiers for this run only
        #[arg(long, value_name = "BUNDLE_ID")]
        skip: Vec<String>,
    },

    /// Manage the persistent whitelist
    #[command(alias = "wl")]
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Show whether a bundle identifier is protected
    Protected { bundle_id: String },

    /// Run the protection self-check
    Check,
}

#[derive(Subcommand)]
enum WhitelistAction {
    /// Add a bundle identifier
    Add { bundle_id: String },
    /// Remove a bundle identifier
    #[command(alias = "rm")]
    Remove { bundle_id: String },
    /// Toggle a bundle identifier
    Toggle { bundle_id: String },
    /// List all entries
    #[command(alias = "ls")]
    List,
    /// Remove every entry that is not protected
    Clear,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "appquitter_core=debug,appquitter=debug"
    } else {
        "appquitter_core=info,appquitter=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = QuitterConfig {
        self_bundle_id: cli.self_id,
        config_path: cli.config,
        ..QuitterConfig::default()
    };
    let engine = Engine::open(config).await?;

    match cli.command {
        Commands::Quit {
            bundle_id,
            pid,
            name,
        } => commands::quit::one(&engine, &bundle_id, pid, name, false, cli.json).await?,
        Commands::ForceQuit {
            bundle_id,
            pid,
            name,
        } => commands::quit::one(&engine, &bundle_id, pid, name, true, cli.json).await?,
        Commands::QuitAll { candidates, skip } => {
            commands::quit::all(&engine, candidates.as_deref(), &skip, cli.json).await?
        }
        Commands::Whitelist { action } => match action {
            WhitelistAction::Add { bundle_id } => {
                commands::whitelist::add(&engine, &bundle_id).await?
            }
            WhitelistAction::Remove { bundle_id } => {
                commands::whitelist::remove(&engine, &bundle_id).await?
            }
            WhitelistAction::Toggle { bundle_id } => {
                commands::whitelist::toggle(&engine, &bundle_id).await?
            }
            WhitelistAction::List => commands::whitelist::list(&engine, cli.json)?,
            WhitelistAction::Clear => commands::whitelist::clear(&engine).await?,
        },
        Commands::Protected { bundle_id } => {
            commands::protection::show(&engine, &bundle_id, cli.json)?
        }
        Commands::Check => commands::protection::check(&engine)?,
    }

    Ok(())
}
