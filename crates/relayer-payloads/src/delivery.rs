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

use ethers::types::{H256, U256};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::{Error, Result};

use crate::reader::{put_u256, Reader};
use crate::PayloadType;

/// Encoded size of [`ExecutionParameters`].
pub const EXECUTION_PARAMETERS_LEN: usize = 1 + 4 + 32;
/// Encoded size of one [`DeliveryInstruction`].
pub const DELIVERY_INSTRUCTION_LEN: usize =
    2 + 32 + 32 + 32 + 32 + EXECUTION_PARAMETERS_LEN;

/// Per-target execution settings chosen by the relay provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionParameters {
    /// Layout version of these parameters.
    pub version: u8,
    /// Gas limit for the receiver call on the target chain.
    pub gas_limit: u32,
    /// The relay provider's delivery address on the target chain.
    pub provider_delivery_address: H256,
}

impl ExecutionParameters {
    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            version: reader.u8("execution parameters version")?,
            gas_limit: reader.u32("gas limit")?,
            provider_delivery_address: reader
                .bytes32("provider delivery address")?,
        })
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        out.extend_from_slice(&self.gas_limit.to_be_bytes());
        out.extend_from_slice(self.provider_delivery_address.as_bytes());
    }
}

/// Wire tag of a [`MessageInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageInfoType {
    /// Referenced by emitter address and sequence.
    EmitterSequence = 0,
    /// Referenced by attestation hash.
    VaaHash = 1,
}

/// A dependency of a delivery, every entry must resolve to exactly one attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageInfo {
    /// An attestation emitted on the delivery's source chain.
    EmitterSequence {
        /// Message info layout version.
        version: u8,
        /// The emitter, in its 32 bytes form.
        emitter_address: H256,
        /// The emitter sequence.
        sequence: u64,
    },
    /// An attestation identified by its hash.
    VaaHash {
        /// Message info layout version.
        version: u8,
        /// The attestation hash.
        vaa_hash: H256,
    },
}

impl MessageInfo {
    /// The wire tag of this entry.
    pub fn info_type(&self) -> MessageInfoType {
        match self {
            Self::EmitterSequence { .. } => MessageInfoType::EmitterSequence,
            Self::VaaHash { .. } => MessageInfoType::VaaHash,
        }
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.u8("message info version")?;
        match reader.u8("message info type")? {
            0 => Ok(Self::EmitterSequence {
                version,
                emitter_address: reader.bytes32("message emitter address")?,
                sequence: reader.u64("message sequence")?,
            }),
            1 => Ok(Self::VaaHash {
                version,
                vaa_hash: reader.bytes32("message vaa hash")?,
            }),
            other => Err(Error::malformed(format!(
                "unknown message info type {other}"
            ))),
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::EmitterSequence {
                version,
                emitter_address,
                sequence,
            } => {
                out.push(*version);
                out.push(MessageInfoType::EmitterSequence as u8);
                out.extend_from_slice(emitter_address.as_bytes());
                out.extend_from_slice(&sequence.to_be_bytes());
            }
            Self::VaaHash { version, vaa_hash } => {
                out.push(*version);
                out.push(MessageInfoType::VaaHash as u8);
                out.extend_from_slice(vaa_hash.as_bytes());
            }
        }
    }
}

/// A request to deliver to one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryInstruction {
    /// Destination chain.
    pub target_chain: WormholeChainId,
    /// Receiver contract on the destination chain.
    pub target_address: H256,
    /// Where unused gas money is refunded on the destination chain.
    pub refund_address: H256,
    /// Upper bound on the refundable amount, in target chain currency.
    pub maximum_refund_target: U256,
    /// Amount forwarded to the receiver, in target chain currency.
    pub receiver_value_target: U256,
    /// Relay provider settings for this target.
    pub execution_parameters: ExecutionParameters,
}

impl DeliveryInstruction {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            target_chain: reader.u16("target chain")?,
            target_address: reader.bytes32("target address")?,
            refund_address: reader.bytes32("refund address")?,
            maximum_refund_target: reader.u256("maximum refund target")?,
            receiver_value_target: reader.u256("receiver value target")?,
            execution_parameters: ExecutionParameters::decode(reader)?,
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target_chain.to_be_bytes());
        out.extend_from_slice(self.target_address.as_bytes());
        out.extend_from_slice(self.refund_address.as_bytes());
        put_u256(out, self.maximum_refund_target);
        put_u256(out, self.receiver_value_target);
        self.execution_parameters.encode_into(out);
    }
}

/// The decoded payload of a delivery request (payload type 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryInstructionsContainer {
    /// Whether the request carried enough value for every target.
    pub sufficiently_funded: bool,
    /// Ordered dependency descriptors.
    pub messages: Vec<MessageInfo>,
    /// Ordered per-target instructions, the position is the multisend index.
    pub instructions: Vec<DeliveryInstruction>,
}

impl DeliveryInstructionsContainer {
    /// Strictly decodes a delivery payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let payload_id = reader.u8("payload id")?;
        if payload_id != PayloadType::Delivery as u8 {
            return Err(Error::malformed(format!(
                "expected delivery payload ({}), found {payload_id}",
                PayloadType::Delivery as u8
            )));
        }
        let sufficiently_funded = match reader.u8("sufficiently funded")? {
            0 => false,
            1 => true,
            other => {
                return Err(Error::malformed(format!(
                    "sufficiently funded flag must be 0 or 1, found {other}"
                )))
            }
        };
        let num_messages = reader.u8("message count")?;
        let num_instructions = reader.u8("instruction count")?;
        let messages = (0..num_messages)
            .map(|_| MessageInfo::decode(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        let instructions = (0..num_instructions)
            .map(|_| DeliveryInstruction::decode(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        reader.finish("delivery payload")?;
        Ok(Self {
            sufficiently_funded,
            messages,
            instructions,
        })
    }

    /// Encodes the container in its wire form.
    ///
    /// Fails if there are more than 255 messages or instructions.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let num_messages = u8::try_from(self.messages.len())
            .map_err(|_| Error::malformed("too many messages"))?;
        let num_instructions = u8::try_from(self.instructions.len())
            .map_err(|_| Error::malformed("too many instructions"))?;
        let mut out = Vec::with_capacity(
            4 + self.messages.len() * 42
                + self.instructions.len() * DELIVERY_INSTRUCTION_LEN,
        );
        out.push(PayloadType::Delivery as u8);
        out.push(u8::from(self.sufficiently_funded));
        out.push(num_messages);
        out.push(num_instructions);
        for message in &self.messages {
            message.encode_into(&mut out);
        }
        for instruction in &self.instructions {
            instruction.encode_into(&mut out);
        }
        Ok(out)
    }
}
