#![deny(missing_docs)]
//! A command-line peer for one-time-pad chat over a shared relay directory.

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use padchat_core::coordinator::SyncCoordinator;
use padchat_core::error::Error;
use padchat_core::relay::DirRelay;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Initialize a vault for each peer against a shared relay directory\npadchat-cli --vault ./alice_vault init --id alice --relay ./relay\npadchat-cli --vault ./bob_vault init --id bob --relay ./relay\n\n# Share fresh pad with a peer, then import it on the other side\npadchat-cli --vault ./alice_vault share --peer bob --out ./pad.json\npadchat-cli --vault ./bob_vault import ./pad.json\n\n# Chat\npadchat-cli --vault ./alice_vault send --peer bob \"hello bob\"\npadchat-cli --vault ./bob_vault sync\npadchat-cli --vault ./bob_vault log --peer alice"
)]
struct Cli {
    /// The path to the local vault.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// The shared relay directory. Required for 'init'; overrides the
    /// configured relay elsewhere.
    #[arg(long, global = true)]
    relay: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new vault with a local peer identity
    Init {
        /// The local peer identifier other peers will address
        #[arg(long)]
        id: String,
    },
    /// Generate pad units for a peer and export the share file
    Share {
        /// The peer to share pad with
        #[arg(long)]
        peer: String,

        /// The number of pad units to generate
        #[arg(short, long, default_value_t = 1000)]
        count: usize,

        /// Where to write the share file. Defaults to ./<peer>-pad.json
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        out: Option<PathBuf>,
    },
    /// Import a pad share file received from a peer
    Import {
        /// Path to the pad share file
        share: PathBuf,
    },
    /// Encrypt and send a message to a peer
    Send {
        /// The peer to send to
        #[arg(long)]
        peer: String,

        /// The message text
        message: String,
    },
    /// Publish queued envelopes, then fetch and decrypt pending messages
    Sync,
    /// Print the decrypted conversation with a peer
    Log {
        /// The peer whose conversation to print
        #[arg(long)]
        peer: String,
    },
    /// Show pad availability for every conversation
    Status,
}

/// Vault-local configuration written by 'init'.
#[derive(Serialize, Deserialize)]
struct VaultConfig {
    id: String,
    relay: PathBuf,
}

const CONFIG_FILE: &str = "config.json";

fn load_config(vault: &Path) -> VaultConfig {
    let path = vault.join(CONFIG_FILE);
    let contents = fs::read_to_string(&path).unwrap_or_else(|e| {
        error!(
            "Failed to read vault config at '{}': {e}. Run 'init' first.",
            path.display()
        );
        std::process::exit(1);
    });
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        error!("Failed to parse vault config: {e}");
        std::process::exit(1);
    })
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |when| when.format("%Y-%m-%d %H:%M").to_string(),
    )
}

#[allow(clippy::too_many_lines)]
fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let vault = cli.vault.unwrap_or_else(|| {
        error!("A --vault path is required for this command.");
        std::process::exit(1);
    });

    if let Commands::Init { id } = &cli.command {
        let relay = cli.relay.unwrap_or_else(|| {
            error!("The --relay path is required for 'init'.");
            std::process::exit(1);
        });
        let config_path = vault.join(CONFIG_FILE);
        if config_path.exists() {
            error!(
                "Vault at '{}' is already initialized.",
                vault.display()
            );
            std::process::exit(1);
        }
        if let Err(e) = fs::create_dir_all(vault.join("ledgers")) {
            error!("Failed to create vault directories: {e}");
            std::process::exit(1);
        }
        let config = VaultConfig {
            id: id.clone(),
            relay,
        };
        let contents = serde_json::to_string_pretty(&config).unwrap_or_else(|e| {
            error!("Failed to serialize vault config: {e}");
            std::process::exit(1);
        });
        if let Err(e) = fs::write(&config_path, contents) {
            error!("Failed to write vault config: {e}");
            std::process::exit(1);
        }
        info!("Vault initialized at '{}'.", vault.display());
        println!("Initialized vault for '{id}' at '{}'", vault.display());
        return;
    }

    let config = load_config(&vault);
    let relay_root = cli.relay.unwrap_or_else(|| config.relay.clone());
    let coordinator = SyncCoordinator::new(&vault, &config.id, DirRelay::new(&relay_root));

    match &cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Share { peer, count, out } => {
            let out = out
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{peer}-pad.json")));
            match coordinator.export_share(peer, *count, &out) {
                Ok(()) => {
                    println!("Shared {count} pad unit(s) with '{peer}'.");
                    println!("Transfer '{}' to them over a trusted channel.", out.display());
                }
                Err(e) => {
                    error!("Failed to share pad: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Import { share } => match coordinator.import_share(share) {
            Ok(peer) => {
                let available = coordinator.available(&peer).unwrap_or(0);
                println!("Imported pad from '{peer}'. {available} unit(s) now available.");
            }
            Err(e) => {
                error!("Failed to import pad share: {e}");
                std::process::exit(1);
            }
        },
        Commands::Send { peer, message } => match coordinator.send(peer, message) {
            Ok(()) => println!("Sent to '{peer}'."),
            Err(Error::InsufficientPad { needed, available }) => {
                error!(
                    "Not enough pad available for '{peer}': need {needed}, have {available}. Share more pad first."
                );
                std::process::exit(1);
            }
            Err(e @ Error::PublishFailure(_)) => {
                warn!("{e}. The message is queued; run 'sync' to retry.");
            }
            Err(e) => {
                error!("Failed to send: {e}");
                std::process::exit(1);
            }
        },
        Commands::Sync => {
            let peers = coordinator.peers().unwrap_or_else(|e| {
                error!("Failed to list conversations: {e}");
                std::process::exit(1);
            });
            for peer in &peers {
                if let Err(e) = coordinator.flush_outbox(peer) {
                    warn!("Could not publish queued envelopes for '{peer}': {e}");
                }
            }
            match coordinator.sync() {
                Ok(fresh) => {
                    if fresh.is_empty() {
                        println!("No new messages.");
                    } else {
                        for message in &fresh {
                            println!(
                                "[{}] {}: {}",
                                format_timestamp(message.timestamp),
                                message.sender,
                                message.text
                            );
                        }
                    }
                }
                Err(e) => {
                    error!("Sync failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Log { peer } => match coordinator.messages(peer) {
            Ok(messages) => {
                if messages.is_empty() {
                    println!("No messages with '{peer}'.");
                } else {
                    for message in &messages {
                        let who = if message.sender == config.id {
                            "you"
                        } else {
                            message.sender.as_str()
                        };
                        println!(
                            "[{}] {who}: {}",
                            format_timestamp(message.timestamp),
                            message.text
                        );
                    }
                }
            }
            Err(e) => {
                error!("Failed to read conversation: {e}");
                std::process::exit(1);
            }
        },
        Commands::Status => {
            let peers = coordinator.peers().unwrap_or_else(|e| {
                error!("Failed to list conversations: {e}");
                std::process::exit(1);
            });
            if peers.is_empty() {
                println!("No conversations in vault '{}'", vault.display());
                return;
            }
            println!("Conversations for '{}':", config.id);
            println!(
                "{:<24} {:<16} {:<12} {:<8}",
                "Peer", "Pad Available", "Messages", "Queued"
            );
            println!("{:-<64}", "");
            for peer in &peers {
                let available = coordinator.available(peer).unwrap_or(0);
                let messages = coordinator.messages(peer).map_or(0, |m| m.len());
                let queued = coordinator.pending(peer).unwrap_or(0);
                println!("{peer:<24} {available:<16} {messages:<12} {queued:<8}");
            }
        }
    }
}
