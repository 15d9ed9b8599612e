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
//! # Relayer Resolver Module 🕸️
//!
//! Collects the attestations a trigger depends on.
//!
//! ## Overview
//!
//! A trigger attestation (a delivery or a redelivery request) only becomes
//! executable once every attestation of its batch is in hand. The
//! [`AttestationResolver`] derives the needed attestations, fetches them from
//! the guardian network through an [`AttestationFetcher`], and keeps whatever
//! is still missing in a durable retry queue. Once an entry is complete it is
//! handed to a [`WorkflowSink`] as a [`ResolvedWorkflow`].

#![warn(missing_docs)]

use ethers::types::{Bytes, H256};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::Result;

/// Derivation of the dependency slots of a trigger.
pub mod dependencies;
/// Guardian REST client.
pub mod guardian;
/// The resolver and its retry worker.
pub mod resolver;
/// Resolved workflows and where they go.
pub mod workflow;


pub use guardian::GuardianRpcClient;
pub use resolver::{now_millis, AttestationResolver, RetryReport, TriggerOutcome};
pub use workflow::{ResolvedWorkflow, WorkflowSink};

/// Fetches signed attestations by emitter and sequence.
#[async_trait::async_trait]
pub trait AttestationFetcher: Send + Sync {
    /// Returns the signed attestation, or `None` when the guardians have not
    /// signed it yet.
    async fn fetch_by_emitter_sequence(
        &self,
        chain_id: WormholeChainId,
        emitter: H256,
        sequence: u64,
    ) -> Result<Option<Bytes>>;
}
