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

//! Which attestations a trigger depends on.

use ethers::types::Bytes;
use webb_relayer_evm::{published_messages, synthetic_batch, ReceiptSource};
use webb_relayer_payloads::{
    DeliveryInstructionsContainer, MessageInfo, RedeliveryByTxHashInstruction,
    Vaa,
};
use webb_relayer_store::{DependencySlot, PendingEntry};
use webb_relayer_types::ContractMap;
use webb_relayer_utils::{Error, Result};

/// Slots of a delivery, one per message info, in message order.
///
/// The trigger is pre-filled at the slot naming its own emitter and
/// sequence, or appended last when no message names it.
pub fn delivery_entry(
    vaa: &Vaa,
    vaa_bytes: &Bytes,
    container: &DeliveryInstructionsContainer,
    now: u64,
) -> Result<PendingEntry> {
    let mut slots = Vec::with_capacity(container.messages.len() + 1);
    for message in &container.messages {
        match message {
            MessageInfo::EmitterSequence {
                emitter_address,
                sequence,
                ..
            } => {
                slots.push(DependencySlot::missing(*emitter_address, *sequence))
            }
            MessageInfo::VaaHash { vaa_hash, .. } => {
                return Err(Error::malformed(format!(
                    "message {vaa_hash:?} is referenced by hash and cannot be fetched"
                )))
            }
        }
    }
    let own = slots.iter().position(|slot| {
        slot.emitter_address == vaa.emitter_address
            && slot.sequence == vaa.sequence
    });
    let delivery_vaa_index = match own {
        Some(index) => {
            slots[index].bytes = vaa_bytes.clone();
            index
        }
        None => {
            slots.push(DependencySlot::filled(
                vaa.emitter_address,
                vaa.sequence,
                vaa_bytes.clone(),
            ));
            slots.len() - 1
        }
    };
    Ok(PendingEntry::new(
        vaa.hash,
        vaa.emitter_chain,
        delivery_vaa_index,
        slots,
        None,
        now,
    ))
}

/// Slots of a redelivery: the batch of the original delivery transaction.
///
/// The original receipt is read back, and every core bridge message sharing
/// the original delivery's nonce becomes a slot. Nothing is pre-filled, the
/// redelivery attestation itself is kept aside.
pub async fn redelivery_entry(
    vaa: &Vaa,
    vaa_bytes: &Bytes,
    instruction: &RedeliveryByTxHashInstruction,
    receipts: &dyn ReceiptSource,
    contracts: &ContractMap,
    now: u64,
) -> Result<PendingEntry> {
    let source_chain = instruction.source_chain;
    let chain = contracts.get(&source_chain).ok_or_else(|| {
        Error::ChainNotFound {
            chain_id: source_chain.to_string(),
        }
    })?;
    let logs = receipts
        .fetch_by_transaction(source_chain, instruction.source_tx_hash)
        .await?;
    let messages = published_messages(&logs, chain.core_bridge)?;
    if messages.is_empty() {
        return Err(Error::NoCoreBridgeLogs);
    }
    let (batch, delivery_vaa_index) = synthetic_batch(
        &messages,
        chain.relay_contract,
        instruction.delivery_vaa_sequence,
    )?;
    let slots = batch
        .iter()
        .map(|message| DependencySlot::missing(message.emitter(), message.sequence))
        .collect();
    Ok(PendingEntry::new(
        vaa.hash,
        source_chain,
        delivery_vaa_index,
        slots,
        Some(vaa_bytes.clone()),
        now,
    ))
}
