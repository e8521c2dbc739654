//! Command-line client for the dungeon game service.
//!
//! Wires the HTTP backend into the session runtime and exposes its
//! operations as subcommands. Credentials come from the environment
//! (or a `.env` file):
//!
//! ```bash
//! export GAME_AUTH_TOKEN=...
//! export GAME_ACCOUNT_ADDRESS=0x...
//! teraverse status
//! teraverse play --dungeon 1
//! teraverse claim energy
//! ```

mod commands;
mod dirs;
mod logging;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{AutoPlay, Claim, Energy, History, Play, PlayMove, Status};

use client_api_http::{HttpApiConfig, HttpGameApi};
use runtime::{FileHistory, Runtime, RuntimeConfig, RuntimeHandle};

/// Play dungeon runs, track energy and claim resources
#[derive(Parser)]
#[command(name = "teraverse")]
#[command(about = "Dungeon game client", long_about = None)]
#[command(version)]
struct Cli {
    /// Echo debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Show energy, current run, claimables and today's dungeons
    Status(Status),

    /// Start a run and auto-play it
    Play(Play),

    /// Resume auto-play on the active run
    #[command(name = "autoplay")]
    AutoPlay(AutoPlay),

    /// Submit a single move
    #[command(name = "move")]
    PlayMove(PlayMove),

    /// Claim a resource category from all owned objects
    Claim(Claim),

    /// Show energy, optionally following the refresh timer
    Energy(Energy),

    /// List or clear recorded runs
    History(History),
}

impl Command {
    async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        match self {
            Command::Status(cmd) => cmd.execute(handle).await,
            Command::Play(cmd) => cmd.execute(handle).await,
            Command::AutoPlay(cmd) => cmd.execute(handle).await,
            Command::PlayMove(cmd) => cmd.execute(handle).await,
            Command::Claim(cmd) => cmd.execute(handle).await,
            Command::Energy(cmd) => cmd.execute(handle).await,
            Command::History(cmd) => cmd.execute(handle.history_repository()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::setup_logging(cli.verbose)?;

    let runtime_config = RuntimeConfig::from_env();
    let history = open_history(&runtime_config)?;

    // History is local; no credentials needed.
    let command = match cli.command {
        Command::History(cmd) => return cmd.execute(&history),
        command => command,
    };

    let api_config = HttpApiConfig::from_env().context("Failed to load API configuration")?;
    let address = api_config.address.clone();
    tracing::info!(%address, base_url = %api_config.base_url, "Starting client");

    let api = HttpGameApi::new(api_config).context("Failed to create HTTP client")?;
    let runtime = Runtime::builder()
        .config(runtime_config)
        .api(api)
        .address(address)
        .history(history)
        .build()?;

    let handle = runtime.handle();
    let outcome = command.execute(&handle).await;

    runtime.shutdown().await?;
    tracing::info!("Client shutdown complete");
    outcome
}

fn open_history(config: &RuntimeConfig) -> Result<FileHistory> {
    let history = match &config.history_file {
        Some(path) => FileHistory::new(path),
        None => FileHistory::open_default(),
    };
    history.context("Failed to open history file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_api_core::{ClaimCategory, Move};
    use runtime::ProviderChoice;

    #[test]
    fn parses_play_arguments() {
        let cli = Cli::try_parse_from([
            "teraverse", "play", "--dungeon", "3", "--juiced", "--provider", "Manual",
        ])
        .unwrap();
        let Command::Play(play) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(play.dungeon, 3);
        assert!(play.juiced);
        assert_eq!(play.provider, Some(ProviderChoice::Manual));
    }

    #[test]
    fn parses_moves_and_categories() {
        let cli = Cli::try_parse_from(["teraverse", "move", "loot_two"]).unwrap();
        assert!(matches!(cli.command, Command::PlayMove(PlayMove { mv: Move::LootTwo })));

        let cli = Cli::try_parse_from(["teraverse", "-v", "claim", "energy"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Claim(Claim {
                category: ClaimCategory::Energy,
                dry_run: false
            })
        ));

        assert!(Cli::try_parse_from(["teraverse", "claim", "gold"]).is_err());
    }

    #[test]
    fn history_clear_conflicts_with_listing_flags() {
        assert!(Cli::try_parse_from(["teraverse", "history", "--clear"]).is_ok());
        assert!(Cli::try_parse_from(["teraverse", "history", "--clear", "--json"]).is_err());
        assert!(Cli::try_parse_from(["teraverse", "history", "--stats", "--clear"]).is_err());
        assert!(Cli::try_parse_from(["teraverse", "history", "--stats", "-n", "3"]).is_err());

        let cli = Cli::try_parse_from(["teraverse", "history", "--stats", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::History(History {
                stats: true,
                json: true,
                ..
            })
        ));
    }
}
