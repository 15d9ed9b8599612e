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

use tokio::sync::{Mutex, MutexGuard};
use webb_relayer_types::WormholeChainId;

use crate::DestinationChain;

/// The one signer of a destination chain.
///
/// Holding the lock serializes submissions on that chain, so nonces are
/// handed out in order. Different chains never wait on each other.
pub struct ManagedSigner {
    chain_id: WormholeChainId,
    chain: Mutex<Arc<dyn DestinationChain>>,
}

impl ManagedSigner {
    /// Wraps a destination chain.
    pub fn new(chain: Arc<dyn DestinationChain>) -> Self {
        Self {
            chain_id: chain.chain_id(),
            chain: Mutex::new(chain),
        }
    }

    /// The wrapped chain id.
    pub fn chain_id(&self) -> WormholeChainId {
        self.chain_id
    }

    /// Waits for exclusive use of the chain's signer.
    pub async fn acquire(&self) -> MutexGuard<'_, Arc<dyn DestinationChain>> {
        self.chain.lock().await
    }
}

impl std::fmt::Debug for ManagedSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedSigner")
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
