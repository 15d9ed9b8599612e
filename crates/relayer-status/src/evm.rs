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
use std::sync::Arc;

use ethers::providers::Middleware;
use ethers::types::{Address, H256};
use webb_relayer_evm::contract::{CoreRelayer, DeliveryFilter};
use webb_relayer_types::{ContractMap, WormholeChainId};
use webb_relayer_utils::{Error, EvmProvider, Result};

use crate::{DeliveryEvent, DeliveryEventSource};

/// Queries the relay contract of every configured chain.
#[derive(Clone, Default)]
pub struct EvmDeliveryEventSource {
    chains: HashMap<WormholeChainId, (Arc<EvmProvider>, Address)>,
}

impl EvmDeliveryEventSource {
    /// Pairs each provider with its chain's relay contract. Chains missing
    /// from `contracts` are left out.
    pub fn new(
        providers: HashMap<WormholeChainId, Arc<EvmProvider>>,
        contracts: &ContractMap,
    ) -> Self {
        let chains = providers
            .into_iter()
            .filter_map(|(id, provider)| {
                let relay = contracts.get(&id)?.relay_contract;
                Some((id, (provider, relay)))
            })
            .collect();
        Self { chains }
    }

    fn chain(
        &self,
        chain_id: WormholeChainId,
    ) -> Result<&(Arc<EvmProvider>, Address)> {
        self.chains.get(&chain_id).ok_or_else(|| Error::ChainNotFound {
            chain_id: chain_id.to_string(),
        })
    }
}

impl std::fmt::Debug for EvmDeliveryEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let relays: HashMap<_, _> = self
            .chains
            .iter()
            .map(|(id, (_, relay))| (id, relay))
            .collect();
        f.debug_struct("EvmDeliveryEventSource")
            .field("relay_contracts", &relays)
            .finish()
    }
}

#[async_trait::async_trait]
impl DeliveryEventSource for EvmDeliveryEventSource {
    async fn latest_block(&self, chain_id: WormholeChainId) -> Result<u64> {
        let (provider, _) = self.chain(chain_id)?;
        let block = provider.get_block_number().await?;
        Ok(block.as_u64())
    }

    #[tracing::instrument(skip(self))]
    async fn delivery_events(
        &self,
        chain_id: WormholeChainId,
        source_chain: WormholeChainId,
        sequence: u64,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<DeliveryEvent>> {
        let (provider, relay) = self.chain(chain_id)?;
        let contract = CoreRelayer::new(*relay, provider.clone());
        // topic1 is the recipient, left open.
        let events = contract
            .event::<DeliveryFilter>()
            .topic2(H256::from_low_u64_be(u64::from(source_chain)))
            .topic3(H256::from_low_u64_be(sequence))
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await?;
        tracing::trace!(found = events.len(), "queried delivery events");
        Ok(events
            .into_iter()
            .map(|(event, meta)| DeliveryEvent {
                recipient_contract: event.recipient_contract,
                source_chain: event.source_chain,
                sequence: event.sequence,
                delivery_vaa_hash: H256::from(event.delivery_vaa_hash),
                status: event.status,
                tx_hash: Some(meta.transaction_hash),
            })
            .collect())
    }
}
