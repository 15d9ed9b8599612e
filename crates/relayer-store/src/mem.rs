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

use std::collections::HashMap;

use std::sync::Arc;

use ethers::types::H256;
use parking_lot::RwLock;

use super::{
    EnqueueOutcome, HistoryStore, HistoryStoreKey, PendingEntry, PendingRecord,
    PendingStore,
};

#[derive(Debug, Default)]
struct Pending {
    entries: HashMap<H256, PendingEntry>,
    queue: HashMap<H256, PendingRecord>,
}

/// InMemoryStore is a store that keeps everything in memory.
///
/// Both pending maps live behind one lock, so every operation is atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    pending: Arc<RwLock<Pending>>,
    last_block_numbers: Arc<RwLock<HashMap<HistoryStoreKey, u64>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl HistoryStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + std::fmt::Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.last_block_numbers.read();
        let val = guard
            .get(&key.into())
            .cloned()
            .unwrap_or(default_block_number);
        Ok(val)
    }

    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + std::fmt::Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.last_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }
}

impl PendingStore for InMemoryStore {
    fn get_entry(&self, hash: H256) -> crate::Result<Option<PendingEntry>> {
        Ok(self.pending.read().entries.get(&hash).cloned())
    }

    fn get_record(&self, hash: H256) -> crate::Result<Option<PendingRecord>> {
        Ok(self.pending.read().queue.get(&hash).cloned())
    }

    #[tracing::instrument(skip_all, fields(hash = %entry.hash))]
    fn enqueue_pending(
        &self,
        mut entry: PendingEntry,
        now: u64,
    ) -> crate::Result<EnqueueOutcome> {
        let mut guard = self.pending.write();
        let Pending { entries, queue } = &mut *guard;
        if let Some(existing) = entries.get(&entry.hash) {
            if existing.all_fetched {
                return Ok(EnqueueOutcome::AlreadyResolved(existing.clone()));
            }
            if queue.contains_key(&entry.hash) {
                return Ok(EnqueueOutcome::AlreadyPending(existing.clone()));
            }
            // an unqueued leftover keeps what it already fetched.
            entry.merge_from(existing);
        }
        if !entry.all_fetched {
            queue.insert(entry.hash, PendingRecord::new(entry.hash, now));
        }
        entries.insert(entry.hash, entry);
        Ok(EnqueueOutcome::Stored)
    }

    fn due_records(&self, now: u64) -> crate::Result<Vec<PendingRecord>> {
        let guard = self.pending.read();
        let mut due: Vec<_> = guard
            .queue
            .values()
            .filter(|record| record.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|record| (record.next_retry_time, record.start_time));
        Ok(due)
    }

    #[tracing::instrument(skip_all, fields(hash = %hash))]
    fn update_entry<F>(
        &self,
        hash: H256,
        f: F,
    ) -> crate::Result<Option<PendingEntry>>
    where
        F: Fn(&mut PendingEntry, Option<&mut PendingRecord>),
    {
        let mut guard = self.pending.write();
        let Pending { entries, queue } = &mut *guard;
        let Some(current) = entries.get(&hash) else {
            return Ok(None);
        };
        let mut entry = current.clone();
        let mut record = queue.get(&hash).cloned();
        f(&mut entry, record.as_mut());
        entry.refresh();
        match record {
            Some(_) if entry.all_fetched => {
                queue.remove(&hash);
            }
            Some(record) => {
                queue.insert(hash, record);
            }
            None => {}
        }
        entries.insert(hash, entry.clone());
        Ok(Some(entry))
    }

    fn mark_dispatched(&self, hash: H256, now: u64) -> crate::Result<bool> {
        let mut guard = self.pending.write();
        match guard.entries.get_mut(&hash) {
            Some(entry) if entry.all_fetched && !entry.dispatched => {
                entry.dispatched = true;
                entry.dispatched_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn requeue(&self, record: PendingRecord) -> crate::Result<bool> {
        let mut guard = self.pending.write();
        let Pending { entries, queue } = &mut *guard;
        match entries.get(&record.hash) {
            Some(entry) if !entry.dispatched => {
                queue.entry(record.hash).or_insert(record);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn prune_dispatched(&self, before: u64) -> crate::Result<usize> {
        let mut guard = self.pending.write();
        let Pending { entries, queue } = &mut *guard;
        let expired: Vec<H256> = entries
            .values()
            .filter(|entry| entry.dispatched_before(before))
            .map(|entry| entry.hash)
            .collect();
        for hash in &expired {
            entries.remove(hash);
            queue.remove(hash);
        }
        Ok(expired.len())
    }

    fn undispatched_resolved(&self) -> crate::Result<Vec<PendingEntry>> {
        let guard = self.pending.read();
        let mut entries: Vec<_> = guard
            .entries
            .values()
            .filter(|entry| entry.all_fetched && !entry.dispatched)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.created_at);
        Ok(entries)
    }

    fn remove_entry(&self, hash: H256) -> crate::Result<()> {
        let mut guard = self.pending.write();
        guard.entries.remove(&hash);
        guard.queue.remove(&hash);
        Ok(())
    }

    fn pending_len(&self) -> crate::Result<usize> {
        Ok(self.pending.read().queue.len())
    }
}
