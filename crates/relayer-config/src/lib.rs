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

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the relayer.
//!
//! ## Overview
//!
//! The relayer configuration module is responsible for configuring the relayer.
//! Possible configuration include:
//! * `evm`: EVM based networks, their signer and the relay contracts. See
//!   [config/example](./config/example) for an example.
//! * `guardian`: where signed attestations are fetched from.
//! * `resolver`: the retry schedule of incomplete deliveries.
//! * `executor`: the delivery budget and gas settings.
//! * `status`: the block range scanned by the status lookup.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values for optional keys.
pub mod defaults;
/// EVM configuration
pub mod evm;
/// Utils for processing configuration
pub mod utils;

use std::collections::HashMap;

use evm::EvmChainConfig;
use serde::{Deserialize, Serialize};
use webb_relayer_types::rpc_url::RpcUrl;
use webb_relayer_types::{ContractMap, WormholeChainId};

/// WebbRelayerConfig is the configuration for the generic relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebbRelayerConfig {
    /// EVM based networks and the configuration.
    ///
    /// a map between chain name and its configuration, keyed by the
    /// wormhole chain id once loaded.
    #[serde(default)]
    pub evm: HashMap<String, EvmChainConfig>,
    /// Guardian network access.
    pub guardian: GuardianConfig,
    /// Retry schedule of the attestation resolver.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Delivery executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Status lookup settings.
    #[serde(default)]
    pub status: StatusConfig,
}

impl WebbRelayerConfig {
    /// Returns the configuration of a chain by its wormhole chain id.
    pub fn chain(
        &self,
        chain_id: WormholeChainId,
    ) -> webb_relayer_utils::Result<&EvmChainConfig> {
        self.evm.get(&chain_id.to_string()).ok_or_else(|| {
            webb_relayer_utils::Error::ChainNotFound {
                chain_id: chain_id.to_string(),
            }
        })
    }

    /// The static `chain id -> contracts` map of every enabled chain.
    pub fn contracts(&self) -> ContractMap {
        self.evm
            .values()
            .map(|chain| (chain.wormhole_chain_id, chain.contracts()))
            .collect()
    }

    /// Makes sure that the config is valid, by going
    /// through the whole config and doing some basic checks.
    ///
    /// Delivering needs a signer on every enabled chain.
    pub fn verify(&self) -> webb_relayer_utils::Result<()> {
        self.evm
            .values()
            .all(|chain| chain.private_key.is_some())
            .then_some(())
            .ok_or(webb_relayer_utils::Error::MissingSecrets)
    }
}

/// GuardianConfig points at the guardian network REST API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GuardianConfig {
    /// Base url of the guardian RPC.
    #[serde(skip_serializing)]
    pub rpc_url: RpcUrl,
    /// Request timeout, in milliseconds.
    #[serde(
        rename(serialize = "requestTimeout"),
        default = "defaults::request_timeout"
    )]
    pub request_timeout: u64,
}

/// ResolverConfig is the retry schedule of incomplete deliveries.
///
/// All values are in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// How often the pending queue is scanned.
    #[serde(
        rename(serialize = "retryInterval"),
        default = "defaults::retry_interval"
    )]
    pub retry_interval: u64,
    /// First retry delay.
    #[serde(
        rename(serialize = "initialBackoff"),
        default = "defaults::initial_backoff"
    )]
    pub initial_backoff: u64,
    /// Upper bound of the retry delay.
    #[serde(
        rename(serialize = "maxBackoff"),
        default = "defaults::max_backoff"
    )]
    pub max_backoff: u64,
    /// How long a dispatched entry is kept before it is pruned.
    ///
    /// A trigger seen again after this period is handled as a new one.
    #[serde(
        rename(serialize = "retentionPeriod"),
        default = "defaults::retention_period"
    )]
    pub retention_period: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            retry_interval: defaults::retry_interval(),
            initial_backoff: defaults::initial_backoff(),
            max_backoff: defaults::max_backoff(),
            retention_period: defaults::retention_period(),
        }
    }
}

/// ExecutorConfig controls how deliveries are submitted.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutorConfig {
    /// Wei added on top of every budget.
    #[serde(
        rename(serialize = "safetyMargin"),
        default = "defaults::safety_margin"
    )]
    pub safety_margin: u64,
    /// Gas limit of a delivery transaction.
    #[serde(rename(serialize = "gasLimit"), default = "defaults::gas_limit")]
    pub gas_limit: u64,
    /// Confirmations to wait for after a delivery was mined.
    #[serde(default = "defaults::tx_confirmations")]
    pub confirmations: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            safety_margin: defaults::safety_margin(),
            gas_limit: defaults::gas_limit(),
            confirmations: defaults::tx_confirmations(),
        }
    }
}

/// StatusConfig controls the status lookup.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusConfig {
    /// Blocks back from the latest block scanned for delivery events.
    #[serde(
        rename(serialize = "blockRange"),
        default = "defaults::status_block_range"
    )]
    pub block_range: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            block_range: defaults::status_block_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_config_files_are_correct() {
        // Walks every directory under the workspace `config` directory and
        // parses the config file(s) inside it.
        let config_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config");
        let config_dirs =
            glob::glob(config_dir.join("*").to_str().unwrap())
                .expect("Failed to read config directory")
                .filter_map(|p| p.ok())
                .filter(|p| p.is_dir())
                .collect::<Vec<_>>();
        assert!(
            !config_dirs.is_empty(),
            "No config directories found in the config directory"
        );
        for config_subdir in config_dirs {
            // Load the example dot env file.
            let _ = dotenv::from_path(config_subdir.join(".env.example"));
            let config = match utils::load(&config_subdir) {
                Ok(config) => config,
                Err(e) => panic!(
                    "Failed to parse config file in directory: {config_subdir:?} with error: {e}"
                ),
            };
            assert!(!config.evm.is_empty());
            config.verify().unwrap();
        }
    }

    #[test]
    fn example_config_values() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../config/example");
        let _ = dotenv::from_path(dir.join(".env.example"));
        let config = utils::load(&dir).unwrap();
        // chains are keyed by their wormhole chain id.
        let ethereum = config.chain(2).unwrap();
        assert_eq!(ethereum.name, "ethereum");
        assert_eq!(ethereum.chain_id, 1337);
        assert!(ethereum.private_key.is_some());
        assert!(config.chain(4).is_err(), "disabled chains are dropped");
        assert_eq!(config.resolver.retry_interval, 3_000);
        assert_eq!(config.resolver.retention_period, 86_400_000);
        assert_eq!(config.executor.safety_margin, 100);
        assert_eq!(config.executor.gas_limit, 3_000_000);
        assert_eq!(config.status.block_range, 2_040);
        let contracts = config.contracts();
        assert_eq!(contracts.len(), 2);
        assert!(contracts[&6].relay_provider.is_some());
        assert!(contracts[&2].relay_provider.is_none());
    }
}
