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
//! # Relayer Context Module 🕸️
//!
//! Shared runtime state of the generic relayer: its configuration, store,
//! shutdown signal and per-chain clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::core::k256::SecretKey;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider, RetryClientBuilder};
use ethers::signers::{LocalWallet, Signer};
use tokio::sync::broadcast;
use webb_relayer_evm::EvmReceiptSource;
use webb_relayer_store::SledStore;
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::{EvmProvider, EvmSignerClient};

/// Retry policy of the EVM JSON-RPC clients.
pub mod ethers_retry_policy;

use ethers_retry_policy::WebbHttpRetryPolicy;

/// RelayerContext contains Relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: webb_relayer_config::WebbRelayerConfig,
    /// Broadcasts a shutdown signal to all running tasks.
    ///
    /// When a task is spawned, it is passed a broadcast receiver handle.
    /// When a graceful shutdown is initiated, a `()` value is sent via the
    /// broadcast::Sender. Each task receives it, reaches a safe terminal
    /// state, and completes.
    notify_shutdown: broadcast::Sender<()>,
    store: SledStore,
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    pub fn new(
        config: webb_relayer_config::WebbRelayerConfig,
        store: SledStore,
    ) -> webb_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        Ok(Self {
            config,
            notify_shutdown,
            store,
        })
    }
    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }
    /// Sends a shutdown signal to all subscribed tasks.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }
    /// Returns a new JSON-RPC provider for a chain.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - The wormhole chain id.
    pub fn evm_provider(
        &self,
        chain_id: WormholeChainId,
    ) -> webb_relayer_utils::Result<EvmProvider> {
        let chain_config = self.config.chain(chain_id)?;
        let http = Http::new(url::Url::from(chain_config.http_endpoint.clone()));
        let client = RetryClientBuilder::default()
            .rate_limit_retries(10)
            .timeout_retries(3)
            .initial_backoff(Duration::from_millis(500))
            .build(http, WebbHttpRetryPolicy::boxed());
        let provider = Provider::new(client)
            .interval(Duration::from_millis(chain_config.polling_interval));
        Ok(provider)
    }
    /// Sets up and returns an EVM wallet for the relayer.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - The wormhole chain id.
    pub fn evm_wallet(
        &self,
        chain_id: WormholeChainId,
    ) -> webb_relayer_utils::Result<LocalWallet> {
        let chain_config = self.config.chain(chain_id)?;
        let private_key = chain_config
            .private_key
            .as_ref()
            .ok_or(webb_relayer_utils::Error::MissingSecrets)?;
        let key = SecretKey::from_bytes(private_key.as_bytes().into())?;
        let wallet =
            LocalWallet::from(key).with_chain_id(chain_config.chain_id);
        Ok(wallet)
    }
    /// The signing client that submits transactions on a chain.
    pub fn evm_signer_client(
        &self,
        chain_id: WormholeChainId,
    ) -> webb_relayer_utils::Result<Arc<EvmSignerClient>> {
        let provider = self.evm_provider(chain_id)?;
        let wallet = self.evm_wallet(chain_id)?;
        Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
    }
    /// A receipt source covering every configured chain.
    pub fn receipt_source(
        &self,
    ) -> webb_relayer_utils::Result<EvmReceiptSource> {
        let mut providers = HashMap::new();
        for chain in self.config.evm.values() {
            let provider = self.evm_provider(chain.wormhole_chain_id)?;
            providers.insert(chain.wormhole_chain_id, Arc::new(provider));
        }
        Ok(EvmReceiptSource::new(providers))
    }

    /// Returns [Sled](https://sled.rs)-based database store
    pub fn store(&self) -> &SledStore {
        &self.store
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the server
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Whether the shutdown signal was already received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
