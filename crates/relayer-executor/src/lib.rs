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
//! # Relayer Executor Module 🕸️
//!
//! Executes resolved workflows on their destination chains.
//!
//! ## Overview
//!
//! Every target instruction of a delivery becomes one call of the relay
//! contract on the target chain, paid with the instruction's budget. The
//! relayer's signer must be approved by the relay provider there. Targets
//! are independent: one failing target never blocks the others, and a
//! failed target is recovered by a redelivery request, never by retrying
//! here.

#![warn(missing_docs)]

use ethers::types::{Address, Bytes, H256, U256};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::Result;

/// Budget computation.
pub mod budget;
/// The EVM destination chain client.
pub mod evm;
/// The executor and its reports.
pub mod executor;
/// Per-chain signers.
pub mod signer;

#[cfg(test)]
mod tests;

pub use budget::budget;
pub use evm::EvmDestinationChain;
pub use executor::{ExecutionReport, Executor, TargetOutcome};
pub use signer::ManagedSigner;

/// Arguments of one delivery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Every attestation of the batch, in order.
    pub attestations: Vec<Bytes>,
    /// Position of the delivery attestation in `attestations`.
    pub delivery_index: u8,
    /// Position of the target instruction in the delivery.
    pub multisend_index: u8,
    /// Receives the unused part of the budget.
    pub refund_address: Address,
    /// Native value sent along.
    pub value: U256,
    /// Gas limit of the transaction.
    pub gas_limit: u64,
}

/// Arguments of one redelivery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryRequest {
    /// The redelivery attestation.
    pub redelivery_vaa: Bytes,
    /// Every attestation of the original batch, in order.
    pub source_attestations: Vec<Bytes>,
    /// Receives the unused part of the budget.
    pub refund_address: Address,
    /// Native value sent along.
    pub value: U256,
    /// Gas limit of the transaction.
    pub gas_limit: u64,
}

/// A chain deliveries are executed on.
#[async_trait::async_trait]
pub trait DestinationChain: Send + Sync {
    /// The wormhole chain id.
    fn chain_id(&self) -> WormholeChainId;

    /// The address our transactions are signed with.
    fn signer_address(&self) -> Address;

    /// Asks the relay `provider` whether `sender` may deliver.
    async fn is_approved_sender(
        &self,
        provider: Address,
        sender: Address,
    ) -> Result<bool>;

    /// Submits a delivery and waits for it to be mined.
    async fn deliver(&self, request: DeliveryRequest) -> Result<H256>;

    /// Submits a redelivery and waits for it to be mined.
    async fn redeliver(&self, request: RedeliveryRequest) -> Result<H256>;
}
