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
//! # Relayer Status Module 🕸️
//!
//! Answers "what happened to delivery X" after the fact.
//!
//! ## Overview
//!
//! The [`StatusReconstructor`] reads the relay message out of a source
//! transaction, decodes it and, for a delivery, searches every target
//! chain for the matching `Delivery` events. Nothing here writes to a chain
//! or feeds back into the relay pipeline.

#![warn(missing_docs)]

use ethers::types::{Address, H256};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::Result;

/// `Delivery` event queries on EVM chains.
pub mod evm;
/// The human readable report.
pub mod info;
/// Locating the relay message in a receipt.
pub mod log;
/// Putting it all together.
pub mod reconstructor;
/// Statuses and block ranges.
pub mod status;

#[cfg(test)]
mod tests;

pub use evm::EvmDeliveryEventSource;
pub use info::DeliveryInfo;
pub use log::find_log;
pub use reconstructor::StatusReconstructor;
pub use status::{
    BlockRange, BlockSpec, DeliveryAttempt, DeliveryStatus, TargetStatus,
};

/// A `Delivery` event of a relay contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    /// The receiver that was called.
    pub recipient_contract: Address,
    /// Chain of the delivery request.
    pub source_chain: WormholeChainId,
    /// Sequence of the delivery request.
    pub sequence: u64,
    /// Hash of the delivery attestation.
    pub delivery_vaa_hash: H256,
    /// Raw status code.
    pub status: u8,
    /// The transaction that emitted the event.
    pub tx_hash: Option<H256>,
}

/// Reads delivery events of target chains.
#[async_trait::async_trait]
pub trait DeliveryEventSource: Send + Sync {
    /// The current head of `chain_id`.
    async fn latest_block(&self, chain_id: WormholeChainId) -> Result<u64>;

    /// Every `Delivery` event for (`source_chain`, `sequence`) emitted on
    /// `chain_id` between `from_block` and `to_block`, in block order.
    async fn delivery_events(
        &self,
        chain_id: WormholeChainId,
        source_chain: WormholeChainId,
        sequence: u64,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<DeliveryEvent>>;
}
