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

use ethers::abi::{self, Token};
use ethers::contract::{parse_log, EthEvent};
use ethers::types::{Address, Bytes, Log, H256, U256};
use webb_relayer_payloads::vaa::evm_address_to_emitter;
use webb_relayer_utils::{Error, Result};

use crate::contract::LogMessagePublishedFilter;

/// A `LogMessagePublished` event of the core bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// The contract that published the message.
    pub sender: Address,
    /// The sender's sequence.
    pub sequence: u64,
    /// Groups the messages of one source transaction.
    pub nonce: u32,
    /// The message payload.
    pub payload: Bytes,
    /// Finality requested by the sender.
    pub consistency_level: u8,
}

impl PublishedMessage {
    /// The sender in its 32 bytes emitter form.
    pub fn emitter(&self) -> H256 {
        evm_address_to_emitter(self.sender)
    }

    /// Builds the raw log the core bridge would emit for this message.
    pub fn to_log(&self, core_bridge: Address) -> Log {
        let data = abi::encode(&[
            Token::Uint(U256::from(self.sequence)),
            Token::Uint(U256::from(self.nonce)),
            Token::Bytes(self.payload.to_vec()),
            Token::Uint(U256::from(self.consistency_level)),
        ]);
        Log {
            address: core_bridge,
            topics: vec![
                LogMessagePublishedFilter::signature(),
                H256::from(self.sender),
            ],
            data: data.into(),
            ..Default::default()
        }
    }
}

impl From<LogMessagePublishedFilter> for PublishedMessage {
    fn from(event: LogMessagePublishedFilter) -> Self {
        Self {
            sender: event.sender,
            sequence: event.sequence,
            nonce: event.nonce,
            payload: event.payload,
            consistency_level: event.consistency_level,
        }
    }
}

/// Decodes every message the core bridge published in `logs`, in log order.
///
/// Logs from other contracts and other core bridge events are skipped.
pub fn published_messages(
    logs: &[Log],
    core_bridge: Address,
) -> Result<Vec<PublishedMessage>> {
    let signature = LogMessagePublishedFilter::signature();
    logs.iter()
        .filter(|log| log.address == core_bridge)
        .filter(|log| log.topics.first() == Some(&signature))
        .map(|log| {
            let event: LogMessagePublishedFilter = parse_log(log.clone())?;
            Ok(PublishedMessage::from(event))
        })
        .collect()
}

/// Rebuilds the batch of messages a delivery depended on.
///
/// The delivery request is the relay contract's message with
/// `delivery_sequence`. Its batch is every message sharing its nonce. Returns
/// the batch and the position of the delivery request within it.
pub fn synthetic_batch(
    messages: &[PublishedMessage],
    relay_contract: Address,
    delivery_sequence: u64,
) -> Result<(Vec<PublishedMessage>, usize)> {
    let is_trigger = |m: &PublishedMessage| {
        m.sender == relay_contract && m.sequence == delivery_sequence
    };
    let nonce = messages
        .iter()
        .find(|m| is_trigger(*m))
        .map(|m| m.nonce)
        .ok_or(Error::RelayLogNotFound)?;
    let batch: Vec<_> = messages
        .iter()
        .filter(|m| m.nonce == nonce)
        .cloned()
        .collect();
    let index = batch
        .iter()
        .position(is_trigger)
        .ok_or(Error::RelayLogNotFound)?;
    Ok((batch, index))
}
