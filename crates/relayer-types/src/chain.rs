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

use std::collections::HashMap;

use ethers::types::Address;

/// The chain id assigned by the guardian network, shared by every chain it observes.
///
/// It is different from the EVM `chainId`, for example Ethereum mainnet is `2` here.
pub type WormholeChainId = u16;

const CHAIN_NAMES: &[(WormholeChainId, &str)] = &[
    (1, "solana"),
    (2, "ethereum"),
    (3, "terra"),
    (4, "bsc"),
    (5, "polygon"),
    (6, "avalanche"),
    (7, "oasis"),
    (8, "algorand"),
    (9, "aurora"),
    (10, "fantom"),
    (11, "karura"),
    (12, "acala"),
    (13, "klaytn"),
    (14, "celo"),
    (15, "near"),
    (16, "moonbeam"),
    (17, "neon"),
    (18, "terra2"),
    (19, "injective"),
    (20, "osmosis"),
    (21, "sui"),
    (22, "aptos"),
    (23, "arbitrum"),
    (24, "optimism"),
    (25, "gnosis"),
    (26, "pythnet"),
    (28, "xpla"),
    (29, "btc"),
    (30, "base"),
    (32, "sei"),
    (3104, "wormchain"),
];

/// Returns the well known name of a chain, if any.
pub fn chain_name(chain_id: WormholeChainId) -> Option<&'static str> {
    CHAIN_NAMES
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, name)| *name)
}

/// Formats a chain as `name (Chain id)`, used in human readable reports.
pub fn display_chain(chain_id: WormholeChainId) -> String {
    match chain_name(chain_id) {
        Some(name) => format!("{name} (Chain {chain_id})"),
        None => format!("unknown (Chain {chain_id})"),
    }
}

/// The contracts the relayer talks to on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainContracts {
    /// The relay contract, which is also the emitter of delivery requests.
    pub relay_contract: Address,
    /// The core bridge contract publishing attestations.
    pub core_bridge: Address,
    /// The relay provider consulted for approved senders, if pinned.
    pub relay_provider: Option<Address>,
}

/// The static `chain id -> contracts` map built from the configuration.
pub type ContractMap = HashMap<WormholeChainId, ChainContracts>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_chains() {
        assert_eq!(chain_name(2), Some("ethereum"));
        assert_eq!(display_chain(6), "avalanche (Chain 6)");
        assert_eq!(display_chain(9999), "unknown (Chain 9999)");
    }
}
