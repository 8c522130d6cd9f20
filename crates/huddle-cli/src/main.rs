//! huddle: drives live rooms against the in-process document store.
//!
//! `huddle simulate` plays a short session the way a browser client would:
//! participants subscribe to a room, chat, run a poll, lose and regain the
//! network, then leave. `huddle config` prints or initialises the config.

mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use huddle_common::HuddleError;
use huddle_config::{config_to_json, toml_loader, HuddleConfig};

#[derive(Parser)]
#[command(name = "huddle", about = "Live room presence and chat simulator")]
struct Args {
    /// Config file to use instead of `$HUDDLE_CONFIG` or the platform default.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a room session with simulated participants.
    Simulate(simulate::SimulateArgs),
    /// Print the effective configuration as JSON.
    Config {
        /// Write a commented default config file if none exists.
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), HuddleError> {
    let args = Args::parse();

    if let Command::Config { init: true } = args.command {
        return init_config(args.config);
    }

    let config = load(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_filter().into()),
        )
        .init();

    match args.command {
        Command::Simulate(sim) => simulate::run(&config, sim).await,
        Command::Config { .. } => {
            println!("{}", config_to_json(&config));
            Ok(())
        }
    }
}

fn load(path: Option<&std::path::Path>) -> Result<HuddleConfig, HuddleError> {
    let config = match path {
        Some(path) => huddle_config::load_config_from(path)?,
        None => huddle_config::load_config()?,
    };
    Ok(config)
}

fn init_config(path: Option<PathBuf>) -> Result<(), HuddleError> {
    let path = match path {
        Some(path) => path,
        None => toml_loader::default_config_path()?,
    };
    if path.exists() {
        println!("config already exists at {}", path.display());
    } else {
        toml_loader::create_default_config(&path)?;
        println!("wrote default config to {}", path.display());
    }
    Ok(())
}
