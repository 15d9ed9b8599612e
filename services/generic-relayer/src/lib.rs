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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Webb Generic Relayer Crate 🕸️
//!
//! Relays cross-chain delivery requests to their destination chains.
//!
//! ## Overview
//!
//! For every configured chain the relayer runs a [`TriggerWatcher`] that
//! picks up the delivery and redelivery requests published by the relay
//! contract. Their attestations go through the attestation resolver, which
//! gathers every attestation the request depends on, and the resolved
//! workflows are executed on the target chains by the executor.
//!
//! The `status` subcommand reconstructs what happened to an earlier
//! request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::H256;
use tokio::sync::mpsc;
use webb_relayer_context::RelayerContext;
use webb_relayer_executor::{DestinationChain, EvmDestinationChain, Executor};
use webb_relayer_resolver::{
    AttestationFetcher, AttestationResolver, GuardianRpcClient,
};
use webb_relayer_status::{
    DeliveryInfo, EvmDeliveryEventSource, StatusReconstructor,
};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::probe;

/// Source chain trigger watcher.
pub mod watcher;

pub use watcher::TriggerWatcher;

/// Resolved workflows waiting for the executor.
const WORKFLOW_QUEUE_SIZE: usize = 1024;

/// Spawns `task` and stops it when the relayer shuts down.
fn spawn_until_shutdown<F>(ctx: &RelayerContext, name: &'static str, task: F)
where
    F: Future + Send + 'static,
{
    let mut shutdown = ctx.shutdown_signal();
    tokio::spawn(async move {
        tokio::select! {
            _ = task => {
                tracing::warn!(task = name, "task stopped");
            },
            _ = shutdown.recv() => {
                tracing::trace!(task = name, "stopping on shutdown");
            },
        }
    });
}

fn guardian_client(
    ctx: &RelayerContext,
) -> webb_relayer_utils::Result<GuardianRpcClient> {
    let guardian = &ctx.config.guardian;
    GuardianRpcClient::new(
        guardian.rpc_url.clone().into(),
        Duration::from_millis(guardian.request_timeout),
    )
}

/// Starts every background service of the relayer.
///
/// This does not block, the services run on background tasks until the
/// context is shut down.
pub async fn ignite(ctx: &RelayerContext) -> anyhow::Result<()> {
    let store = ctx.store().clone();
    let contracts = ctx.config.contracts();
    let fetcher: Arc<dyn AttestationFetcher> = Arc::new(guardian_client(ctx)?);
    let receipts = Arc::new(ctx.receipt_source()?);

    let (workflows, received) = mpsc::channel(WORKFLOW_QUEUE_SIZE);
    let resolver = AttestationResolver::new(
        store.clone(),
        fetcher.clone(),
        receipts,
        Arc::new(workflows),
        contracts.clone(),
        &ctx.config.resolver,
    );

    let mut chains: Vec<Arc<dyn DestinationChain>> = Vec::new();
    for chain in ctx.config.evm.values() {
        if chain.private_key.is_none() {
            tracing::warn!(
                "No private key for ({}), deliveries to it are skipped.",
                chain.name
            );
            continue;
        }
        let client = ctx.evm_signer_client(chain.wormhole_chain_id)?;
        chains.push(Arc::new(EvmDestinationChain::new(
            chain,
            client,
            ctx.config.executor.confirmations,
        )));
    }
    let executor = Executor::new(chains, contracts, &ctx.config.executor);
    tracing::debug!(?executor, "Starting the executor");
    spawn_until_shutdown(ctx, "executor", executor.run(received));

    let recovered = resolver.recover().await?;
    if recovered > 0 {
        tracing::info!("Handed {} resolved deliveries to the executor", recovered);
    }
    spawn_until_shutdown(ctx, "retry-worker", resolver.clone().run_retry_worker());

    for chain in ctx.config.evm.values() {
        tracing::debug!(
            "Starting Background Services for ({}) chain.",
            chain.name
        );
        let provider = Arc::new(ctx.evm_provider(chain.wormhole_chain_id)?);
        let watcher = TriggerWatcher::new(
            chain,
            &ctx.config.resolver,
            provider,
            fetcher.clone(),
            resolver.clone(),
            store.clone(),
        );
        let chain_id = chain.wormhole_chain_id;
        spawn_until_shutdown(ctx, "trigger-watcher", async move {
            if let Err(e) = watcher.run().await {
                tracing::error!(chain_id, %e, "trigger watcher failed");
            }
        });
    }
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        chains = ctx.config.evm.len(),
        ignited = true,
    );
    Ok(())
}

/// Reconstructs the outcome of the relay request sent by `tx` on `chain`.
pub async fn delivery_status(
    ctx: &RelayerContext,
    chain: WormholeChainId,
    tx: H256,
    index: Option<usize>,
) -> anyhow::Result<DeliveryInfo> {
    let contracts = ctx.config.contracts();
    let mut providers = HashMap::new();
    for id in contracts.keys() {
        providers.insert(*id, Arc::new(ctx.evm_provider(*id)?));
    }
    let events = EvmDeliveryEventSource::new(providers, &contracts);
    let reconstructor = StatusReconstructor::new(
        Arc::new(ctx.receipt_source()?),
        Arc::new(events),
        contracts,
        &ctx.config.status,
    );
    let info = reconstructor.reconstruct(chain, tx, index).await?;
    Ok(info)
}
