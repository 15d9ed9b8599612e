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
use ethers::types::{Log, H256};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::{Error, EvmProvider, Result};

/// Reads the logs of a mined transaction.
#[async_trait::async_trait]
pub trait ReceiptSource: Send + Sync {
    /// Returns the receipt logs of `tx_hash` on `chain_id`.
    ///
    /// A transaction that is not mined yet is a
    /// [`Error::TransactionNotFound`].
    async fn fetch_by_transaction(
        &self,
        chain_id: WormholeChainId,
        tx_hash: H256,
    ) -> Result<Vec<Log>>;
}

/// A [`ReceiptSource`] backed by one JSON-RPC provider per chain.
#[derive(Clone, Default)]
pub struct EvmReceiptSource {
    providers: HashMap<WormholeChainId, Arc<EvmProvider>>,
}

impl std::fmt::Debug for EvmReceiptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chains: Vec<_> = self.providers.keys().collect();
        chains.sort();
        f.debug_struct("EvmReceiptSource")
            .field("chains", &chains)
            .finish()
    }
}

impl EvmReceiptSource {
    /// Creates a source from the given providers.
    pub fn new(providers: HashMap<WormholeChainId, Arc<EvmProvider>>) -> Self {
        Self { providers }
    }

    /// The provider of one chain.
    pub fn provider(
        &self,
        chain_id: WormholeChainId,
    ) -> Result<Arc<EvmProvider>> {
        self.providers
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| Error::ChainNotFound {
                chain_id: chain_id.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl ReceiptSource for EvmReceiptSource {
    #[tracing::instrument(skip(self))]
    async fn fetch_by_transaction(
        &self,
        chain_id: WormholeChainId,
        tx_hash: H256,
    ) -> Result<Vec<Log>> {
        let provider = self.provider(chain_id)?;
        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await?
            .ok_or(Error::TransactionNotFound(tx_hash))?;
        tracing::trace!(logs = receipt.logs.len(), "fetched receipt");
        Ok(receipt.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_chain_is_reported() {
        let source = EvmReceiptSource::default();
        let err = source
            .fetch_by_transaction(2, H256::zero())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::ChainNotFound { chain_id } if chain_id == "2")
        );
        assert_eq!(format!("{source:?}"), "EvmReceiptSource { chains: [] }");
    }
}
