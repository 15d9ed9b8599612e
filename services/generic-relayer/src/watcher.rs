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

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, H256};
use webb_relayer_config::evm::EvmChainConfig;
use webb_relayer_config::ResolverConfig;
use webb_relayer_evm::contract::{IWormhole, LogMessagePublishedFilter};
use webb_relayer_payloads::vaa::evm_address_to_emitter;
use webb_relayer_resolver::{AttestationFetcher, AttestationResolver};
use webb_relayer_store::{HistoryStore, HistoryStoreKey, PendingStore};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::{probe, Error, EvmProvider, Result};

/// How long a freshly published trigger may take to be signed before the
/// watcher restarts its step.
const SIGNING_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// The next block range to scan, or `None` when `last` already reached
/// `target`.
pub fn next_range(last: u64, target: u64, max_step: u64) -> Option<(u64, u64)> {
    if last >= target {
        return None;
    }
    let to = last.saturating_add(max_step.max(1)).min(target);
    Some((last + 1, to))
}

/// Fetches a signed attestation, waiting for the guardians with `backoff`.
///
/// Unsigned attestations and transient errors are retried, anything else
/// gives up at once.
pub async fn fetch_attestation<B>(
    fetcher: &dyn AttestationFetcher,
    chain_id: WormholeChainId,
    emitter: H256,
    sequence: u64,
    backoff: B,
) -> Result<Bytes>
where
    B: Backoff + Send,
{
    backoff::future::retry(backoff, move || async move {
        match fetcher
            .fetch_by_emitter_sequence(chain_id, emitter, sequence)
            .await
        {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(backoff::Error::transient(
                Error::DependencyUnavailable {
                    emitter_chain: chain_id,
                    emitter_address: emitter.to_fixed_bytes(),
                    sequence,
                },
            )),
            Err(e) if e.is_transient() => Err(backoff::Error::transient(e)),
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await
}

/// Polls a source chain's core bridge for messages of the relay contract
/// and feeds their attestations to the resolver.
pub struct TriggerWatcher<S> {
    chain_id: WormholeChainId,
    relay_contract: Address,
    core_bridge: Address,
    deployed_at: u64,
    block_confirmations: u64,
    max_blocks_per_step: u64,
    polling_interval: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    provider: Arc<EvmProvider>,
    fetcher: Arc<dyn AttestationFetcher>,
    resolver: AttestationResolver<S>,
    store: S,
}

impl<S> std::fmt::Debug for TriggerWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerWatcher")
            .field("chain_id", &self.chain_id)
            .field("relay_contract", &self.relay_contract)
            .field("core_bridge", &self.core_bridge)
            .finish()
    }
}

impl<S> TriggerWatcher<S>
where
    S: PendingStore + HistoryStore + 'static,
{
    /// Creates the watcher of one configured chain.
    pub fn new(
        chain: &EvmChainConfig,
        retry: &ResolverConfig,
        provider: Arc<EvmProvider>,
        fetcher: Arc<dyn AttestationFetcher>,
        resolver: AttestationResolver<S>,
        store: S,
    ) -> Self {
        Self {
            chain_id: chain.wormhole_chain_id,
            relay_contract: chain.relay_contract,
            core_bridge: chain.core_bridge,
            deployed_at: chain.deployed_at,
            block_confirmations: chain.block_confirmations,
            max_blocks_per_step: chain.max_blocks_per_step,
            polling_interval: Duration::from_millis(chain.polling_interval),
            initial_backoff: Duration::from_millis(retry.initial_backoff),
            max_backoff: Duration::from_millis(retry.max_backoff),
            provider,
            fetcher,
            resolver,
            store,
        }
    }

    fn history_key(&self) -> HistoryStoreKey {
        HistoryStoreKey::from((self.chain_id, self.core_bridge))
    }

    /// Scans one block range. Returns whether the watcher caught up.
    async fn step(&self) -> Result<bool> {
        let latest = self.provider.get_block_number().await?.as_u64();
        let target = latest.saturating_sub(self.block_confirmations);
        let last = self.store.get_last_block_number(
            self.history_key(),
            self.deployed_at.saturating_sub(1),
        )?;
        let Some((from, to)) = next_range(last, target, self.max_blocks_per_step)
        else {
            return Ok(true);
        };
        let contract = IWormhole::new(self.core_bridge, self.provider.clone());
        let messages = contract
            .event::<LogMessagePublishedFilter>()
            .topic1(H256::from(self.relay_contract))
            .from_block(from)
            .to_block(to)
            .query()
            .await?;
        tracing::trace!(from, to, found = messages.len(), "scanned blocks");
        for message in messages {
            self.handle(message).await?;
        }
        self.store.set_last_block_number(self.history_key(), to)?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Watcher,
            chain_id = self.chain_id,
            from,
            to,
            target,
        );
        Ok(to == target)
    }

    #[tracing::instrument(skip_all, fields(sequence = message.sequence))]
    async fn handle(&self, message: LogMessagePublishedFilter) -> Result<()> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(Some(SIGNING_DEADLINE))
            .build();
        let bytes = fetch_attestation(
            self.fetcher.as_ref(),
            self.chain_id,
            evm_address_to_emitter(message.sender),
            message.sequence,
            backoff,
        )
        .await?;
        match self.resolver.on_trigger_attestation(&bytes).await {
            Err(e) if e.is_transient() => Err(e),
            // anything else was logged by the resolver and is final.
            _ => Ok(()),
        }
    }

    async fn sync_forever(
        &self,
    ) -> std::result::Result<(), backoff::Error<Error>> {
        loop {
            let synced = self.step().await.map_err(|e| {
                tracing::warn!(chain_id = self.chain_id, %e, "restarting watcher");
                backoff::Error::transient(e)
            })?;
            if synced {
                tokio::time::sleep(self.polling_interval).await;
            }
        }
    }

    /// Watches the chain forever, restarting from the last stored block
    /// after any error.
    #[tracing::instrument(skip_all, fields(chain_id = self.chain_id))]
    pub async fn run(self) -> Result<()> {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Watcher,
            chain_id = self.chain_id,
            starting = true,
        );
        let backoff = backoff::backoff::Constant::new(Duration::from_secs(1));
        backoff::future::retry(backoff, || self.sync_forever()).await
    }
}
