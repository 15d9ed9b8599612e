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
use std::time::Duration;

use ethers::abi::Detokenize;
use ethers::contract::builders::ContractCall;
use ethers::providers::Middleware;
use ethers::types::{Address, H256, U64};
use url::Url;
use webb_relayer_config::evm::EvmChainConfig;
use webb_relayer_evm::contract::{CoreRelayer, RelayProvider};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::clickable_link::tx_link;
use webb_relayer_utils::{probe, Error, EvmSignerClient, Result};

use crate::{DeliveryRequest, DestinationChain, RedeliveryRequest};

/// An EVM chain reached through a signing JSON-RPC client.
#[derive(Clone)]
pub struct EvmDestinationChain {
    chain_id: WormholeChainId,
    relay_contract: Address,
    explorer: Option<Url>,
    client: Arc<EvmSignerClient>,
    confirmations: usize,
    poll_interval: Duration,
}

impl EvmDestinationChain {
    /// Creates the client of one configured chain.
    pub fn new(
        config: &EvmChainConfig,
        client: Arc<EvmSignerClient>,
        confirmations: usize,
    ) -> Self {
        Self {
            chain_id: config.wormhole_chain_id,
            relay_contract: config.relay_contract,
            explorer: config.explorer.clone(),
            client,
            confirmations,
            poll_interval: Duration::from_millis(config.polling_interval),
        }
    }

    fn failed(&self, reason: impl std::fmt::Display) -> Error {
        Error::SubmissionFailed {
            chain_id: self.chain_id,
            reason: reason.to_string(),
        }
    }

    /// Dry runs `call`, sends it and waits for the receipt.
    async fn submit<D>(
        &self,
        call: ContractCall<EvmSignerClient, D>,
    ) -> Result<H256>
    where
        D: Detokenize + Send + Sync,
    {
        let chain_id = self.chain_id;
        if let Err(e) = call.call().await {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Executor,
                chain_id,
                errored = true,
                error = %e,
                dry_run = "failed",
            );
            return Err(self.failed(format!("dry run failed: {e}")));
        }
        let pending = call
            .send()
            .await
            .map_err(|e| self.failed(format!("could not send: {e}")))?;
        let tx_hash = *pending;
        let link = tx_link(self.explorer.as_ref(), &format!("0x{tx_hash:x}"));
        tracing::info!("Tx {} is submitted and pending!", link);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Executor,
            chain_id,
            pending = true,
            %tx_hash,
        );
        let receipt = pending
            .interval(self.poll_interval)
            .confirmations(self.confirmations)
            .await
            .map_err(|e| self.failed(format!("lost track of {tx_hash:?}: {e}")))?
            .ok_or_else(|| {
                self.failed(format!("{tx_hash:?} was dropped from the mempool"))
            })?;
        if receipt.status == Some(U64::zero()) {
            tracing::error!("Tx {} reverted", link);
            return Err(self.failed(format!("{tx_hash:?} reverted")));
        }
        tracing::info!("Tx {} is finalized", link);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Executor,
            chain_id,
            finalized = true,
            %tx_hash,
            block = ?receipt.block_number,
        );
        Ok(tx_hash)
    }
}

impl std::fmt::Debug for EvmDestinationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmDestinationChain")
            .field("chain_id", &self.chain_id)
            .field("relay_contract", &self.relay_contract)
            .field("signer", &self.client.address())
            .finish()
    }
}

#[async_trait::async_trait]
impl DestinationChain for EvmDestinationChain {
    fn chain_id(&self) -> WormholeChainId {
        self.chain_id
    }

    fn signer_address(&self) -> Address {
        self.client.address()
    }

    async fn is_approved_sender(
        &self,
        provider: Address,
        sender: Address,
    ) -> Result<bool> {
        let contract = RelayProvider::new(provider, self.client.clone());
        let approved = contract.approved_sender(sender).call().await?;
        Ok(approved)
    }

    #[tracing::instrument(
        skip_all,
        fields(chain_id = self.chain_id, multisend_index = request.multisend_index)
    )]
    async fn deliver(&self, request: DeliveryRequest) -> Result<H256> {
        let contract = CoreRelayer::new(self.relay_contract, self.client.clone());
        let call = contract
            .deliver_single((
                request.attestations,
                request.delivery_index,
                request.multisend_index,
                request.refund_address,
            ))
            .value(request.value)
            .gas(request.gas_limit);
        self.submit(call).await
    }

    #[tracing::instrument(skip_all, fields(chain_id = self.chain_id))]
    async fn redeliver(&self, request: RedeliveryRequest) -> Result<H256> {
        let contract = CoreRelayer::new(self.relay_contract, self.client.clone());
        let call = contract
            .redeliver_single((
                request.redelivery_vaa,
                request.source_attestations,
                request.refund_address,
            ))
            .value(request.value)
            .gas(request.gas_limit);
        self.submit(call).await
    }
}
