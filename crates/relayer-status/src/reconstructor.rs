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

use std::sync::Arc;

use ethers::types::H256;
use futures::future::try_join_all;
use webb_relayer_config::StatusConfig;
use webb_relayer_evm::ReceiptSource;
use webb_relayer_payloads::vaa::evm_address_to_emitter;
use webb_relayer_payloads::{DeliveryInstruction, RelayerPayload};
use webb_relayer_types::{ContractMap, WormholeChainId};
use webb_relayer_utils::{probe, Error, Result};

use crate::{
    find_log, BlockRange, DeliveryAttempt, DeliveryEventSource, DeliveryInfo,
    DeliveryStatus, TargetStatus,
};

/// Rebuilds the story of a relay request from chain data alone.
#[derive(Clone)]
pub struct StatusReconstructor {
    receipts: Arc<dyn ReceiptSource>,
    events: Arc<dyn DeliveryEventSource>,
    contracts: Arc<ContractMap>,
    range: BlockRange,
}

impl std::fmt::Debug for StatusReconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReconstructor")
            .field("range", &self.range)
            .finish()
    }
}

impl StatusReconstructor {
    /// Searches the last `block-range` blocks of each target chain.
    pub fn new(
        receipts: Arc<dyn ReceiptSource>,
        events: Arc<dyn DeliveryEventSource>,
        contracts: ContractMap,
        config: &StatusConfig,
    ) -> Self {
        Self {
            receipts,
            events,
            contracts: Arc::new(contracts),
            range: BlockRange::recent(config.block_range),
        }
    }

    /// Searches `range` instead.
    pub fn with_range(mut self, range: BlockRange) -> Self {
        self.range = range;
        self
    }

    /// Looks up the relay request emitted by `source_tx` on `source_chain`.
    ///
    /// `index` picks one relay message when the transaction emitted more
    /// than one, the first one is used by default.
    #[tracing::instrument(skip(self))]
    pub async fn reconstruct(
        &self,
        source_chain: WormholeChainId,
        source_tx: H256,
        index: Option<usize>,
    ) -> Result<DeliveryInfo> {
        let contracts =
            self.contracts.get(&source_chain).ok_or_else(|| {
                Error::ChainNotFound {
                    chain_id: source_chain.to_string(),
                }
            })?;
        let logs = self
            .receipts
            .fetch_by_transaction(source_chain, source_tx)
            .await?;
        let message = find_log(
            &logs,
            contracts.core_bridge,
            evm_address_to_emitter(contracts.relay_contract),
            index.unwrap_or(0),
        )?;
        let info = match RelayerPayload::decode(&message.payload)? {
            RelayerPayload::Redelivery(instruction) => DeliveryInfo::Redelivery {
                source_chain,
                source_tx,
                instruction,
            },
            RelayerPayload::Delivery(container) => {
                let lookups = container.instructions.iter().map(|instruction| {
                    self.target_status(source_chain, message.sequence, instruction)
                });
                let target_statuses = try_join_all(lookups).await?;
                DeliveryInfo::Delivery {
                    source_chain,
                    source_tx,
                    sequence: message.sequence,
                    container,
                    target_statuses,
                }
            }
        };
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Status,
            source_chain,
            %source_tx,
            sequence = message.sequence,
            redelivery = matches!(info, DeliveryInfo::Redelivery { .. }),
        );
        Ok(info)
    }

    async fn target_status(
        &self,
        source_chain: WormholeChainId,
        sequence: u64,
        instruction: &DeliveryInstruction,
    ) -> Result<TargetStatus> {
        let chain_id = instruction.target_chain;
        let latest = self.events.latest_block(chain_id).await?;
        let (from, to) = self.range.resolve(latest);
        let events = self
            .events
            .delivery_events(chain_id, source_chain, sequence, from, to)
            .await?;
        let mut attempts: Vec<_> = events
            .into_iter()
            .map(|event| DeliveryAttempt {
                status: DeliveryStatus::from_code(event.status),
                tx_hash: event.tx_hash,
            })
            .collect();
        if attempts.is_empty() {
            attempts.push(DeliveryAttempt {
                status: DeliveryStatus::DeliveryDidntHappenWithinRange {
                    from,
                    to,
                },
                tx_hash: None,
            });
        }
        Ok(TargetStatus { chain_id, attempts })
    }
}
