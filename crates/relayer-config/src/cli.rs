// Copyright (C) 2022-2024 Webb Technologies Inc.
//
// Tangle is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Tangle is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

use crate::WebbRelayerConfig;
use anyhow::Context;
use directories_next::ProjectDirs;
use ethers::types::H256;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use webb_relayer_types::WormholeChainId;

/// Package identifier, where the default configuration & database are defined.
/// If the user does not start the relayer with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["tools", "webb", "webb-generic-relayer"];

/// The Webb Generic Relayer Command-line tool
///
/// Start the relayer from a config file:
///
/// $ webb-generic-relayer -vvv -c <CONFIG_DIR_PATH>
///
/// Or look up what happened to a past delivery:
///
/// $ webb-generic-relayer -c <CONFIG_DIR_PATH> status --chain 2 --tx 0x..
#[derive(StructOpt)]
#[structopt(name = "Webb Generic Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Create the Database Store in a temporary directory.
    /// and will be deleted when the process exits.
    #[structopt(long)]
    pub tmp: bool,
    /// Run a one-off command instead of the relayer.
    #[structopt(subcommand)]
    pub command: Option<Command>,
}

/// One-off commands.
#[derive(Debug, StructOpt)]
pub enum Command {
    /// Reconstructs the outcome of a delivery or redelivery request.
    Status {
        /// Wormhole chain id of the source transaction.
        #[structopt(long)]
        chain: WormholeChainId,
        /// The source transaction hash.
        #[structopt(long)]
        tx: H256,
        /// Which relay message of the transaction, when it has several.
        #[structopt(long)]
        index: Option<usize>,
    },
}

/// Loads the configuration from the given directory.
///
/// Returns `Ok(Config)` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `config_dir` - An optional `PathBuf` representing the directory that contains the configuration.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<WebbRelayerConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Getting default dirs for webb generic relayer");
    let dirs = ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")?;
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => dirs.config_dir().to_path_buf(),
    };
    // return an error if the path is not a directory.
    if !path.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", path.display()));
    }
    tracing::trace!("Loading Config from {} ..", path.display());
    let v = crate::utils::load(path)?;
    tracing::trace!("Config loaded..");
    Ok(v)
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
///
/// Returns `Ok(())` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `verbosity` - An i32 integer representing the verbosity level.
pub fn setup_logger(verbosity: i32) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in ["webb_relayer", "webb_generic_relayer"] {
        env_filter =
            env_filter.add_directive(format!("{target}={log_level}").parse()?);
    }
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    // if we are not compiling for integration tests, we should use pretty logs
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    // otherwise, we should use json, which is easy to parse.
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger.init();
    Ok(())
}

/// Creates a database store for the relayer based on the configuration passed in.
///
/// Returns `Ok(store::sled::SledStore)` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `opts` - The configuration options for the database store.
pub async fn create_store(
    opts: &Opts,
) -> anyhow::Result<webb_relayer_store::SledStore> {
    // check if we shall use the temp dir.
    if opts.tmp {
        tracing::debug!("Using temp dir for store");
        let store = webb_relayer_store::SledStore::temporary()?;
        return Ok(store);
    }
    let dirs = ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")?;
    let p = match opts.config_dir.as_ref() {
        Some(p) => p.to_path_buf(),
        None => dirs.data_local_dir().to_path_buf(),
    };
    let db_path = match opts.config_dir.as_ref().zip(p.parent()) {
        Some((_, parent)) => parent.join("store"),
        None => p.join("store"),
    };

    let store = webb_relayer_store::SledStore::open(db_path)?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_command() {
        let opts = Opts::from_iter([
            "webb-generic-relayer",
            "-vv",
            "-c",
            "config/example",
            "status",
            "--chain",
            "6",
            "--tx",
            "0x1111111111111111111111111111111111111111111111111111111111111111",
            "--index",
            "1",
        ]);
        assert_eq!(opts.verbose, 2);
        match opts.command {
            Some(Command::Status { chain, tx, index }) => {
                assert_eq!(chain, 6);
                assert_eq!(tx, H256::repeat_byte(0x11));
                assert_eq!(index, Some(1));
            }
            None => panic!("expected the status command"),
        }
    }

    #[test]
    fn relayer_mode_has_no_command() {
        let opts = Opts::from_iter(["webb-generic-relayer", "--tmp"]);
        assert!(opts.tmp);
        assert!(opts.command.is_none());
    }
}
