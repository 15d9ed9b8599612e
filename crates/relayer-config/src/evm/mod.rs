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

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use webb_relayer_types::private_key::PrivateKey;
use webb_relayer_types::rpc_url::RpcUrl;
use webb_relayer_types::{ChainContracts, WormholeChainId};

use crate::defaults;

/// EvmChainConfig is the configuration of one EVM chain the relayer watches
/// or delivers to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvmChainConfig {
    /// String that groups configuration for this chain on a human-readable name.
    pub name: String,
    /// Boolean indicating the chain is enabled or not.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// Block Explorer for this chain.
    ///
    /// Optional, and only used for printing a clickable links
    /// for transactions and contracts.
    #[serde(skip_serializing)]
    pub explorer: Option<url::Url>,
    /// chain specific id (output of chainId opcode on EVM networks)
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u32,
    /// The id the guardian network uses for this chain.
    #[serde(rename(serialize = "wormholeChainId"))]
    pub wormhole_chain_id: WormholeChainId,
    /// The Private Key of this account on this network
    /// the format is more dynamic here:
    /// 1. if it starts with '0x' then this would be raw (64 bytes) hex encoded
    ///    private key.
    ///    Example: 0x8917174396171783496173419137618235192359106130478137647163400318
    ///
    /// 2. if it starts with '$' then it would be considered as an Enviroment variable
    ///    of a hex-encoded private key.
    ///   Example: $ETHEREUM_PRIVATE_KEY
    #[serde(skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// The relay contract, also the emitter of delivery requests.
    #[serde(rename(serialize = "relayContract"))]
    pub relay_contract: Address,
    /// The core bridge contract.
    #[serde(rename(serialize = "coreBridge"))]
    pub core_bridge: Address,
    /// Pins the relay provider checked for approved senders.
    ///
    /// When missing, the provider delivery address of each instruction is used.
    #[serde(rename(serialize = "relayProvider"), default)]
    pub relay_provider: Option<Address>,
    /// Blocks to wait before a block is considered final by the watcher.
    #[serde(
        rename(serialize = "blockConfirmations"),
        default = "defaults::block_confirmations"
    )]
    pub block_confirmations: u64,
    /// The block the relay contract got deployed at, where scanning starts.
    #[serde(rename(serialize = "deployedAt"), default)]
    pub deployed_at: u64,
    /// Trigger watcher polling interval, in milliseconds.
    #[serde(
        rename(serialize = "pollingInterval"),
        default = "defaults::polling_interval"
    )]
    pub polling_interval: u64,
    /// The maximum number of blocks scanned in one request.
    #[serde(skip_serializing, default = "defaults::max_blocks_per_step")]
    pub max_blocks_per_step: u64,
}

impl EvmChainConfig {
    /// The contracts the relayer uses on this chain.
    pub fn contracts(&self) -> ChainContracts {
        ChainContracts {
            relay_contract: self.relay_contract,
            core_bridge: self.core_bridge,
            relay_provider: self.relay_provider,
        }
    }
}
