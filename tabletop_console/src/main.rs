// Legend for various fix-this comments:
//   * "TODO" - bug or missing crucial feature.
//   * "Improvement potential" - missing nice-to-have feature or an opportunity
//       to make code better or faster.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod network;

mod client_main;
mod server_config;
mod server_main;

use anyhow::Context;
use clap::{Command, arg};
use server_config::ServerConfig;


// The client owns the terminal: its log goes to stderr and stays off unless RUST_LOG asks for it.
fn logger_config(subcommand: Option<&str>) -> (env_logger::Target, log::LevelFilter) {
    match subcommand {
        Some("client") => (env_logger::Target::Stderr, log::LevelFilter::Off),
        _ => (env_logger::Target::Stdout, log::LevelFilter::Info),
    }
}

fn main() -> anyhow::Result<()> {
    let matches = Command::new("Tabletop")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .about("Tabletop games client/server console app")
        .subcommand_required(true)
        .subcommand(Command::new("server").about("Run as server").arg(
            arg!(<config_file> "Path to the configuration file: yaml-serialized ServerConfig."),
        ))
        .subcommand(
            Command::new("client")
                .about("Run as client")
                .arg(arg!(<server_address> "Server address, e.g. localhost:8080"))
                .arg(arg!(--"game-type" <game_type> "Game to join or create"))
                .arg(arg!(--"game-id" <game_id> "Game to join"))
                .arg(arg!(--"player-id" <player_id> "Player to reconnect as"))
                .arg(arg!(--"transports" <transports> "Comma-separated transport whitelist")),
        )
        .get_matches();

    let (log_target, log_level) = logger_config(matches.subcommand_name());
    env_logger::Builder::new()
        .target(log_target)
        .filter_level(log_level)
        .parse_default_env()
        .init();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            let config_file = sub_matches
                .get_one::<String>("config_file")
                .context("Missing config file argument")?;
            server_main::run(read_config_file(config_file)?)
        }
        Some(("client", sub_matches)) => {
            let arg = |name: &str| sub_matches.get_one::<String>(name).cloned();
            client_main::run(client_main::ClientConfig {
                server_address: arg("server_address").context("Missing server address")?,
                game_type: arg("game-type"),
                game_id: arg("game-id"),
                player_id: arg("player-id"),
                transports: arg("transports").unwrap_or_default(),
            })
        }
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}

fn read_config_file(filename: &str) -> anyhow::Result<ServerConfig> {
    let contents = std::fs::read_to_string(filename)
        .with_context(|| format!("Reading config file '{filename}'"))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Parsing config file '{filename}'"))
}
