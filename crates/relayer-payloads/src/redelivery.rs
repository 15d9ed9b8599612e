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

use crate::delivery::ExecutionParameters;
use crate::reader::{put_u256, Reader};
use crate::PayloadType;

/// Encoded size of a [`RedeliveryByTxHashInstruction`].
pub const REDELIVERY_LEN: usize = 1
    + 2
    + 32
    + 8
    + 2
    + 1
    + 32
    + 32
    + crate::delivery::EXECUTION_PARAMETERS_LEN;

/// The decoded payload of a redelivery request (payload type 2).
///
/// It points at one target of an earlier delivery and replaces its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryByTxHashInstruction {
    /// Chain of the original delivery request.
    pub source_chain: WormholeChainId,
    /// Transaction that emitted the original delivery request.
    pub source_tx_hash: H256,
    /// Sequence of the original delivery attestation.
    pub delivery_vaa_sequence: u64,
    /// The one target being redelivered.
    pub target_chain: WormholeChainId,
    /// Position of that target in the original instruction list.
    pub multisend_index: u8,
    /// Replacement refund bound.
    pub new_maximum_refund_target: U256,
    /// Replacement receiver value.
    pub new_receiver_value_target: U256,
    /// Replacement execution settings.
    pub execution_parameters: ExecutionParameters,
}

impl RedeliveryByTxHashInstruction {
    /// Strictly decodes a redelivery payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let payload_id = reader.u8("payload id")?;
        if payload_id != PayloadType::Redelivery as u8 {
            return Err(Error::malformed(format!(
                "expected redelivery payload ({}), found {payload_id}",
                PayloadType::Redelivery as u8
            )));
        }
        let instruction = Self {
            source_chain: reader.u16("source chain")?,
            source_tx_hash: reader.bytes32("source tx hash")?,
            delivery_vaa_sequence: reader.u64("delivery vaa sequence")?,
            target_chain: reader.u16("target chain")?,
            multisend_index: reader.u8("multisend index")?,
            new_maximum_refund_target: reader
                .u256("new maximum refund target")?,
            new_receiver_value_target: reader
                .u256("new receiver value target")?,
            execution_parameters: ExecutionParameters::decode(&mut reader)?,
        };
        reader.finish("redelivery payload")?;
        Ok(instruction)
    }

    /// Encodes the instruction in its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(REDELIVERY_LEN);
        out.push(PayloadType::Redelivery as u8);
        out.extend_from_slice(&self.source_chain.to_be_bytes());
        out.extend_from_slice(self.source_tx_hash.as_bytes());
        out.extend_from_slice(&self.delivery_vaa_sequence.to_be_bytes());
        out.extend_from_slice(&self.target_chain.to_be_bytes());
        out.push(self.multisend_index);
        put_u256(&mut out, self.new_maximum_refund_target);
        put_u256(&mut out, self.new_receiver_value_target);
        self.execution_parameters.encode_into(&mut out);
        out
    }
}
