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

use config::{Config, File};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::*;

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> webb_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(webb_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`WebbRelayerConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> webb_relayer_utils::Result<WebbRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        // get file extension
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of WEBB).
    let builder = builder
        .add_source(config::Environment::with_prefix("WEBB").separator("_"));
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: Result<
        WebbRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files and
///
/// Returns `Ok(WebbRelayerConfig)` on success, or `Err(Error)` on failure.
///
/// # Arguments
///
/// * `path` - The path to the configuration directory
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> webb_relayer_utils::Result<WebbRelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: WebbRelayerConfig,
) -> webb_relayer_utils::Result<WebbRelayerConfig> {
    tracing::trace!("Checking configration sanity ...");

    // 1. drain everything, and take enabled chains.
    let old_evm = config
        .evm
        .drain()
        .filter(|(_, chain)| chain.enabled)
        .collect::<HashMap<_, _>>();
    // 2. insert them again, keyed by their wormhole chain id.
    for (_, v) in old_evm {
        let key = v.wormhole_chain_id.to_string();
        if let Some(other) = config.evm.get(&key) {
            tracing::error!(
                "Chains {} and {} share the wormhole chain id {}",
                other.name,
                v.name,
                key
            );
            return Err(webb_relayer_utils::Error::DuplicateChainId(
                v.wormhole_chain_id,
            ));
        }
        if v.private_key.is_none() {
            tracing::warn!(
                "!!WARNING!!: chain {} ({}) has no private-key, deliveries to it will fail",
                v.name,
                key
            );
        }
        config.evm.insert(key, v);
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn chain(name: &str, wormhole_chain_id: u16, enabled: bool) -> EvmChainConfig {
        EvmChainConfig {
            name: name.to_string(),
            enabled,
            http_endpoint: url::Url::from_str("http://localhost:8545")
                .unwrap()
                .into(),
            explorer: None,
            chain_id: 1,
            wormhole_chain_id,
            private_key: None,
            relay_contract: Default::default(),
            core_bridge: Default::default(),
            relay_provider: None,
            block_confirmations: 1,
            deployed_at: 0,
            polling_interval: 1000,
            max_blocks_per_step: 100,
        }
    }

    fn config(chains: Vec<EvmChainConfig>) -> WebbRelayerConfig {
        WebbRelayerConfig {
            evm: chains.into_iter().map(|c| (c.name.clone(), c)).collect(),
            guardian: GuardianConfig {
                rpc_url: url::Url::from_str("http://localhost:7071")
                    .unwrap()
                    .into(),
                request_timeout: 1000,
            },
            resolver: Default::default(),
            executor: Default::default(),
            status: Default::default(),
        }
    }

    #[test]
    fn rekeys_enabled_chains() {
        let config = postloading_process(config(vec![
            chain("ethereum", 2, true),
            chain("bsc", 4, false),
        ]))
        .unwrap();
        let keys: Vec<_> = config.evm.keys().cloned().collect();
        assert_eq!(keys, vec!["2".to_string()]);
        assert!(config.verify().is_err(), "private key is missing");
    }

    #[test]
    fn duplicate_wormhole_ids_are_rejected() {
        let err = postloading_process(config(vec![
            chain("ethereum", 2, true),
            chain("goerli", 2, true),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            webb_relayer_utils::Error::DuplicateChainId(2)
        ));
        // a disabled duplicate is fine.
        postloading_process(config(vec![
            chain("ethereum", 2, true),
            chain("goerli", 2, false),
        ]))
        .unwrap();
    }
}
