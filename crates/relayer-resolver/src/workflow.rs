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

use ethers::types::{Bytes, H256};
use tokio::sync::mpsc;
use webb_relayer_store::PendingEntry;
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::{Error, Result};

/// A trigger attestation together with every attestation it depends on,
/// ready to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkflow {
    /// The chain all attestations were emitted on.
    pub chain_id: WormholeChainId,
    /// Hash of the trigger attestation.
    pub trigger_hash: H256,
    /// Ordered attestation bytes, as the relay contract expects them.
    pub attestations: Vec<Bytes>,
    /// Position of the delivery attestation within `attestations`.
    pub delivery_vaa_index: usize,
    /// The redelivery attestation, for redelivery workflows.
    pub redelivery_vaa: Option<Bytes>,
}

impl ResolvedWorkflow {
    /// Builds the workflow of a fully fetched entry.
    pub fn from_entry(entry: &PendingEntry) -> Result<Self> {
        if !entry.all_fetched {
            return Err(Error::Generic("entry still has missing dependencies"));
        }
        Ok(Self {
            chain_id: entry.chain_id,
            trigger_hash: entry.hash,
            attestations: entry.attestations(),
            delivery_vaa_index: entry.delivery_vaa_index,
            redelivery_vaa: entry.redelivery_vaa.clone(),
        })
    }

    /// The delivery attestation this workflow executes.
    pub fn delivery_vaa(&self) -> Result<&Bytes> {
        self.attestations
            .get(self.delivery_vaa_index)
            .ok_or_else(|| Error::malformed("delivery index out of range"))
    }
}

/// Where resolved workflows are handed over to the executor.
#[async_trait::async_trait]
pub trait WorkflowSink: Send + Sync {
    /// Hands over one workflow.
    async fn dispatch(&self, workflow: ResolvedWorkflow) -> Result<()>;
}

#[async_trait::async_trait]
impl WorkflowSink for mpsc::Sender<ResolvedWorkflow> {
    async fn dispatch(&self, workflow: ResolvedWorkflow) -> Result<()> {
        self.send(workflow)
            .await
            .map_err(|_| Error::Generic("workflow receiver was dropped"))
    }
}
