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

//! # Relayer Store Module 🕸️
//!
//! A module for managing the storage of the relayer.
//!
//! ## Overview
//!
//! The relayer store keeps two kinds of state across restarts:
//!
//! * the pending attestation entries together with their retry queue,
//!   see [`PendingStore`].
//! * the last scanned block of every watched contract, see [`HistoryStore`].

#![warn(missing_docs)]

use std::fmt::{Debug, Display};

use ethers::types::{Address, H256};
use webb_relayer_types::WormholeChainId;
use webb_relayer_utils::Result;

/// A module for managing in-memory storage of the relayer.
pub mod mem;
/// Pending entries and their retry records.
pub mod pending;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
#[cfg(feature = "sled")]
pub mod sled;

/// A store that uses [`sled`](https://sled.rs) as the backend.
#[cfg(feature = "sled")]
pub use self::sled::SledStore;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;
pub use pending::{DependencySlot, EnqueueOutcome, PendingEntry, PendingRecord};

/// HistoryStoreKey identifies a watched contract on a chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct HistoryStoreKey {
    /// The wormhole chain id.
    pub chain_id: WormholeChainId,
    /// The watched contract.
    pub address: Address,
}

impl HistoryStoreKey {
    /// Returns the bytes of the key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(22);
        vec.extend_from_slice(&self.chain_id.to_be_bytes());
        vec.extend_from_slice(self.address.as_bytes());
        vec
    }
}

impl Display for HistoryStoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Contract({}, Chain {})", self.address, self.chain_id)
    }
}

impl From<(WormholeChainId, Address)> for HistoryStoreKey {
    fn from((chain_id, address): (WormholeChainId, Address)) -> Self {
        Self { chain_id, address }
    }
}

/// HistoryStore is a simple trait for storing and retrieving history
/// of block numbers.
pub trait HistoryStore: Clone + Send + Sync {
    /// Sets the new block number for that contract in the cache and returns the old one.
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> Result<u64>;
    /// Get the last block number for that contract.
    /// if not found, returns the `default_block_number`.
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> Result<u64>;
}

/// The durable staging area of the attestation resolver.
///
/// Entries are keyed by the hash of their trigger attestation. Every entry
/// that still misses a dependency has a companion [`PendingRecord`] in the
/// retry queue. Implementations must apply each method atomically over both.
pub trait PendingStore: Clone + Send + Sync {
    /// Reads one entry.
    fn get_entry(&self, hash: H256) -> Result<Option<PendingEntry>>;

    /// Reads the retry record of an entry, if it is still queued.
    fn get_record(&self, hash: H256) -> Result<Option<PendingRecord>>;

    /// Stores a new entry and queues it with `next_retry_time = now` when
    /// it is incomplete.
    ///
    /// Nothing is written when an entry with the same hash is already
    /// resolved or already queued.
    fn enqueue_pending(
        &self,
        entry: PendingEntry,
        now: u64,
    ) -> Result<EnqueueOutcome>;

    /// Lists the queue records due at `now`, oldest retry time first.
    fn due_records(&self, now: u64) -> Result<Vec<PendingRecord>>;

    /// Read-modify-write of an entry and its retry record.
    ///
    /// `f` may run more than once when the underlying transaction conflicts,
    /// so it must not have side effects. After `f` the entry's
    /// `all_fetched` flag is recomputed and a resolved entry leaves the
    /// queue. Returns the stored entry, or `None` if there is no such entry.
    fn update_entry<F>(&self, hash: H256, f: F) -> Result<Option<PendingEntry>>
    where
        F: Fn(&mut PendingEntry, Option<&mut PendingRecord>);

    /// Flags a resolved entry as handed over to the executor at `now`.
    ///
    /// Returns `false` when the entry is missing or was already dispatched.
    fn mark_dispatched(&self, hash: H256, now: u64) -> Result<bool>;

    /// Puts an undispatched entry back into the retry queue.
    ///
    /// An existing record is kept as is. Returns `false` when the entry is
    /// missing or already dispatched.
    fn requeue(&self, record: PendingRecord) -> Result<bool>;

    /// Removes the entries dispatched at or before `before`, together with
    /// their attestations. Returns how many were removed.
    fn prune_dispatched(&self, before: u64) -> Result<usize>;

    /// Entries that are resolved but were never dispatched.
    fn undispatched_resolved(&self) -> Result<Vec<PendingEntry>>;

    /// Removes an entry together with its retry record.
    fn remove_entry(&self, hash: H256) -> Result<()>;

    /// Number of records in the retry queue.
    fn pending_len(&self) -> Result<usize>;
}

pub(crate) fn entry_key(hash: H256) -> [u8; 32] {
    hash.to_fixed_bytes()
}
