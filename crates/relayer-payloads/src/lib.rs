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
//! # Relayer Payloads Module 🕸️
//!
//! Wire codec for the payloads carried inside relay attestations.
//!
//! ## Overview
//!
//! Two payload shapes exist, both are strict fixed-width, big-endian layouts:
//!
//! * [`DeliveryInstructionsContainer`] (payload type `1`): the dependencies of a
//!   delivery and one instruction per target.
//! * [`RedeliveryByTxHashInstruction`] (payload type `2`): a new budget for one
//!   target of an earlier delivery.
//!
//! Any length mismatch or unknown tag fails with
//! [`Error::MalformedPayload`](webb_relayer_utils::Error::MalformedPayload),
//! decoding never truncates or guesses.

/// Delivery payload (type 1).
pub mod delivery;
/// A bounds-checked big-endian reader.
pub mod reader;
/// Redelivery payload (type 2).
pub mod redelivery;
/// The signed attestation envelope.
pub mod vaa;

pub use delivery::{
    DeliveryInstruction, DeliveryInstructionsContainer, ExecutionParameters,
    MessageInfo, MessageInfoType,
};
pub use redelivery::RedeliveryByTxHashInstruction;
pub use vaa::Vaa;

use webb_relayer_utils::{Error, Result};

/// The first byte of every relay payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadType {
    /// A delivery request.
    Delivery = 1,
    /// A redelivery request.
    Redelivery = 2,
}

impl TryFrom<u8> for PayloadType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Delivery),
            2 => Ok(Self::Redelivery),
            other => Err(Error::malformed(format!(
                "unrecognized payload type {other}"
            ))),
        }
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery => write!(f, "Delivery"),
            Self::Redelivery => write!(f, "Redelivery"),
        }
    }
}

/// Reads the payload type from the first byte, without decoding the rest.
pub fn peek_payload_type(bytes: &[u8]) -> Result<PayloadType> {
    let first = bytes
        .first()
        .copied()
        .ok_or_else(|| Error::malformed("empty payload"))?;
    PayloadType::try_from(first)
}

/// Either of the relay payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayerPayload {
    /// Payload type 1.
    Delivery(DeliveryInstructionsContainer),
    /// Payload type 2.
    Redelivery(RedeliveryByTxHashInstruction),
}

impl RelayerPayload {
    /// Peeks the payload type and decodes the matching shape.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match peek_payload_type(bytes)? {
            PayloadType::Delivery => {
                DeliveryInstructionsContainer::decode(bytes).map(Self::Delivery)
            }
            PayloadType::Redelivery => {
                RedeliveryByTxHashInstruction::decode(bytes)
                    .map(Self::Redelivery)
            }
        }
    }

    /// The payload type of this payload.
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::Delivery(_) => PayloadType::Delivery,
            Self::Redelivery(_) => PayloadType::Redelivery,
        }
    }
}

/// Decodes a delivery payload, see [`DeliveryInstructionsContainer::decode`].
pub fn decode_delivery_instructions(
    bytes: &[u8],
) -> Result<DeliveryInstructionsContainer> {
    DeliveryInstructionsContainer::decode(bytes)
}

/// Decodes a redelivery payload, see [`RedeliveryByTxHashInstruction::decode`].
pub fn decode_redelivery_instruction(
    bytes: &[u8],
) -> Result<RedeliveryByTxHashInstruction> {
    RedeliveryByTxHashInstruction::decode(bytes)
}
