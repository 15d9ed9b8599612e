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
use serde::{Deserialize, Serialize};
use webb_relayer_types::WormholeChainId;

/// One dependency of a trigger attestation.
///
/// `bytes` stays empty until the attestation was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySlot {
    /// The emitter, in its 32 bytes form.
    pub emitter_address: H256,
    /// The emitter sequence.
    pub sequence: u64,
    /// The signed attestation, empty while missing.
    pub bytes: Bytes,
}

impl DependencySlot {
    /// A slot that still needs to be fetched.
    pub fn missing(emitter_address: H256, sequence: u64) -> Self {
        Self {
            emitter_address,
            sequence,
            bytes: Bytes::new(),
        }
    }

    /// A slot that is already in hand.
    pub fn filled(emitter_address: H256, sequence: u64, bytes: Bytes) -> Self {
        Self {
            emitter_address,
            sequence,
            bytes,
        }
    }

    /// Whether the attestation was fetched.
    pub fn is_filled(&self) -> bool {
        !self.bytes.is_empty()
    }
}

/// The durable staging record of a trigger attestation, keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    /// Hash of the trigger attestation.
    pub hash: H256,
    /// The chain every dependency was emitted on.
    pub chain_id: WormholeChainId,
    /// Position of the delivery attestation within `slots`.
    pub delivery_vaa_index: usize,
    /// Ordered dependency slots.
    pub slots: Vec<DependencySlot>,
    /// `true` once no slot is empty.
    pub all_fetched: bool,
    /// The trigger itself, only present for redeliveries.
    pub redelivery_vaa: Option<Bytes>,
    /// Whether the resolved workflow was handed to the executor.
    #[serde(default)]
    pub dispatched: bool,
    /// When the workflow was handed over, in milliseconds.
    #[serde(default)]
    pub dispatched_at: Option<u64>,
    /// Creation time, in milliseconds since the unix epoch.
    pub created_at: u64,
}

impl PendingEntry {
    /// Creates a new entry, `all_fetched` is derived from the slots.
    pub fn new(
        hash: H256,
        chain_id: WormholeChainId,
        delivery_vaa_index: usize,
        slots: Vec<DependencySlot>,
        redelivery_vaa: Option<Bytes>,
        created_at: u64,
    ) -> Self {
        let mut entry = Self {
            hash,
            chain_id,
            delivery_vaa_index,
            slots,
            all_fetched: false,
            redelivery_vaa,
            dispatched: false,
            dispatched_at: None,
            created_at,
        };
        entry.refresh();
        entry
    }

    /// Recomputes `all_fetched` from the slots.
    pub fn refresh(&mut self) -> bool {
        self.all_fetched = self.slots.iter().all(DependencySlot::is_filled);
        self.all_fetched
    }

    /// Indices of the slots that still need to be fetched.
    pub fn missing_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_filled())
            .map(|(i, _)| i)
            .collect()
    }

    /// Fills an empty slot. Filling an already filled slot is a no-op.
    ///
    /// Returns `true` if the slot changed.
    pub fn fill_slot(&mut self, index: usize, bytes: Bytes) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if !slot.is_filled() && !bytes.is_empty() => {
                slot.bytes = bytes;
                self.refresh();
                true
            }
            _ => false,
        }
    }

    /// Copies every attestation `other` has and `self` lacks.
    ///
    /// Slots are matched by position, emitter and sequence, so merging is
    /// idempotent and never overwrites.
    pub fn merge_from(&mut self, other: &PendingEntry) -> usize {
        let mut filled = 0;
        for (index, theirs) in other.slots.iter().enumerate() {
            let same_slot = self.slots.get(index).map_or(false, |ours| {
                ours.emitter_address == theirs.emitter_address
                    && ours.sequence == theirs.sequence
            });
            if same_slot && self.fill_slot(index, theirs.bytes.clone()) {
                filled += 1;
            }
        }
        filled
    }

    /// Whether the entry was dispatched at or before `before`.
    pub fn dispatched_before(&self, before: u64) -> bool {
        self.dispatched && self.dispatched_at.map_or(false, |at| at <= before)
    }

    /// The ordered attestation bytes, in slot order.
    pub fn attestations(&self) -> Vec<Bytes> {
        self.slots.iter().map(|slot| slot.bytes.clone()).collect()
    }
}

/// A retry scheduling record of a [`PendingEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    /// Hash of the trigger attestation.
    pub hash: H256,
    /// When the entry was first queued, in milliseconds.
    pub start_time: u64,
    /// Earliest time of the next resolution attempt, in milliseconds.
    pub next_retry_time: u64,
    /// How many retry passes already ran for this entry.
    pub num_times_retried: u32,
}

impl PendingRecord {
    /// A record due right away.
    pub fn new(hash: H256, now: u64) -> Self {
        Self {
            hash,
            start_time: now,
            next_retry_time: now,
            num_times_retried: 0,
        }
    }

    /// Whether the record should be retried at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.next_retry_time <= now
    }
}

/// The result of [`PendingStore::enqueue_pending`](crate::PendingStore::enqueue_pending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The entry was stored, and queued for retries if it is incomplete.
    Stored,
    /// An entry with the same hash is already fully fetched.
    AlreadyResolved(PendingEntry),
    /// An entry with the same hash is already waiting in the queue.
    AlreadyPending(PendingEntry),
}
