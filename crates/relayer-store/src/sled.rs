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

use std::fmt::Debug;
use std::io;
use std::path::Path;

use ethers::types::H256;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult,
};
use sled::Transactional;

use super::{
    entry_key, EnqueueOutcome, HistoryStore, HistoryStoreKey, PendingEntry,
    PendingRecord, PendingStore,
};

const LAST_BLOCK_NUMBERS: &str = "last_block_numbers";
const PENDING_ENTRIES: &str = "pending_entries";
const PENDING_QUEUE: &str = "pending_queue";

/// SledStore is a store that keeps the relayer state in a [Sled](https://sled.rs)-based database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Create a new SledStore.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .temporary(cfg!(test))
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }
    /// Creates a temporary SledStore.
    pub fn temporary() -> crate::Result<Self> {
        let dir = tempfile::tempdir()?;
        Self::open(dir.path())
    }

    fn pending_trees(&self) -> crate::Result<(sled::Tree, sled::Tree)> {
        let entries = self.db.open_tree(PENDING_ENTRIES)?;
        let queue = self.db.open_tree(PENDING_QUEUE)?;
        Ok((entries, queue))
    }
}

fn decode<T: DeserializeOwned>(
    bytes: &[u8],
) -> ConflictableTransactionResult<T, io::Error> {
    serde_json::from_slice(bytes)
        .map_err(|e| ConflictableTransactionError::Abort(io::Error::from(e)))
}

fn encode<T: Serialize>(
    value: &T,
) -> ConflictableTransactionResult<Vec<u8>, io::Error> {
    serde_json::to_vec(value)
        .map_err(|e| ConflictableTransactionError::Abort(io::Error::from(e)))
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut output = [0u8; 8];
    let len = bytes.len().min(8);
    output[..len].copy_from_slice(&bytes[..len]);
    u64::from_be_bytes(output)
}

impl HistoryStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree(LAST_BLOCK_NUMBERS)?;
        let key: HistoryStoreKey = key.into();
        let old = tree.insert(key.to_bytes(), &block_number.to_be_bytes())?;
        self.db.flush()?;
        match old {
            Some(v) => Ok(read_u64(&v)),
            None => Ok(block_number),
        }
    }

    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree(LAST_BLOCK_NUMBERS)?;
        let key: HistoryStoreKey = key.into();
        match tree.get(key.to_bytes())? {
            Some(v) => Ok(read_u64(&v)),
            None => Ok(default_block_number),
        }
    }
}

impl PendingStore for SledStore {
    fn get_entry(&self, hash: H256) -> crate::Result<Option<PendingEntry>> {
        let tree = self.db.open_tree(PENDING_ENTRIES)?;
        match tree.get(entry_key(hash))? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    fn get_record(&self, hash: H256) -> crate::Result<Option<PendingRecord>> {
        let tree = self.db.open_tree(PENDING_QUEUE)?;
        match tree.get(entry_key(hash))? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip_all, fields(hash = %entry.hash))]
    fn enqueue_pending(
        &self,
        entry: PendingEntry,
        now: u64,
    ) -> crate::Result<EnqueueOutcome> {
        let (entries, queue) = self.pending_trees()?;
        let key = entry_key(entry.hash);
        let record = serde_json::to_vec(&PendingRecord::new(entry.hash, now))?;
        // the entry and its queue record are written together, or not at all.
        let outcome = Transactional::<io::Error>::transaction(
            &(&entries, &queue),
            |(entries, queue)| {
                let mut stored = entry.clone();
                if let Some(raw) = entries.get(&key[..])? {
                    let existing: PendingEntry = decode(&raw)?;
                    if existing.all_fetched {
                        return Ok(EnqueueOutcome::AlreadyResolved(existing));
                    }
                    if queue.get(&key[..])?.is_some() {
                        return Ok(EnqueueOutcome::AlreadyPending(existing));
                    }
                    stored.merge_from(&existing);
                }
                entries.insert(&key[..], encode(&stored)?)?;
                if !stored.all_fetched {
                    queue.insert(&key[..], record.as_slice())?;
                }
                Ok(EnqueueOutcome::Stored)
            },
        )?;
        self.db.flush()?;
        tracing::trace!(?outcome, "enqueue pending entry");
        Ok(outcome)
    }

    fn due_records(&self, now: u64) -> crate::Result<Vec<PendingRecord>> {
        let tree = self.db.open_tree(PENDING_QUEUE)?;
        let mut due = Vec::new();
        for item in tree.iter() {
            let (_, value) = item?;
            let record: PendingRecord = serde_json::from_slice(&value)?;
            if record.is_due(now) {
                due.push(record);
            }
        }
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
        let (entries, queue) = self.pending_trees()?;
        let key = entry_key(hash);
        let updated = Transactional::<io::Error>::transaction(
            &(&entries, &queue),
            |(entries, queue)| {
                let mut entry: PendingEntry = match entries.get(&key[..])? {
                    Some(raw) => decode(&raw)?,
                    None => return Ok(None),
                };
                let mut record: Option<PendingRecord> =
                    match queue.get(&key[..])? {
                        Some(raw) => Some(decode(&raw)?),
                        None => None,
                    };
                f(&mut entry, record.as_mut());
                entry.refresh();
                entries.insert(&key[..], encode(&entry)?)?;
                match record {
                    Some(_) if entry.all_fetched => {
                        queue.remove(&key[..])?;
                    }
                    Some(record) => {
                        queue.insert(&key[..], encode(&record)?)?;
                    }
                    None => {}
                }
                Ok(Some(entry))
            },
        )?;
        self.db.flush()?;
        Ok(updated)
    }

    #[tracing::instrument(skip_all, fields(hash = %hash))]
    fn mark_dispatched(&self, hash: H256, now: u64) -> crate::Result<bool> {
        let tree = self.db.open_tree(PENDING_ENTRIES)?;
        let key = entry_key(hash);
        let changed = tree.transaction::<_, _, io::Error>(|db| {
            let mut entry: PendingEntry = match db.get(&key[..])? {
                Some(raw) => decode(&raw)?,
                None => return Ok(false),
            };
            if !entry.all_fetched || entry.dispatched {
                return Ok(false);
            }
            entry.dispatched = true;
            entry.dispatched_at = Some(now);
            db.insert(&key[..], encode(&entry)?)?;
            Ok(true)
        })?;
        self.db.flush()?;
        Ok(changed)
    }

    #[tracing::instrument(skip_all, fields(hash = %record.hash))]
    fn requeue(&self, record: PendingRecord) -> crate::Result<bool> {
        let (entries, queue) = self.pending_trees()?;
        let key = entry_key(record.hash);
        let raw_record = serde_json::to_vec(&record)?;
        let requeued = Transactional::<io::Error>::transaction(
            &(&entries, &queue),
            |(entries, queue)| {
                let entry: PendingEntry = match entries.get(&key[..])? {
                    Some(raw) => decode(&raw)?,
                    None => return Ok(false),
                };
                if entry.dispatched {
                    return Ok(false);
                }
                if queue.get(&key[..])?.is_none() {
                    queue.insert(&key[..], raw_record.as_slice())?;
                }
                Ok(true)
            },
        )?;
        self.db.flush()?;
        Ok(requeued)
    }

    #[tracing::instrument(skip(self))]
    fn prune_dispatched(&self, before: u64) -> crate::Result<usize> {
        let (entries, queue) = self.pending_trees()?;
        let mut expired = Vec::new();
        for item in entries.iter() {
            let (key, value) = item?;
            let entry: PendingEntry = serde_json::from_slice(&value)?;
            if entry.dispatched_before(before) {
                expired.push(key);
            }
        }
        let mut batch = sled::Batch::default();
        let mut queue_batch = sled::Batch::default();
        for key in &expired {
            batch.remove(key.clone());
            queue_batch.remove(key.clone());
        }
        Transactional::<io::Error>::transaction(
            &(&entries, &queue),
            |(entries, queue)| {
                entries.apply_batch(&batch)?;
                queue.apply_batch(&queue_batch)?;
                Ok(())
            },
        )?;
        self.db.flush()?;
        tracing::trace!(removed = expired.len(), "pruned dispatched entries");
        Ok(expired.len())
    }

    fn undispatched_resolved(&self) -> crate::Result<Vec<PendingEntry>> {
        let tree = self.db.open_tree(PENDING_ENTRIES)?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_, value) = item?;
            let entry: PendingEntry = serde_json::from_slice(&value)?;
            if entry.all_fetched && !entry.dispatched {
                out.push(entry);
            }
        }
        out.sort_by_key(|entry| entry.created_at);
        Ok(out)
    }

    #[tracing::instrument(skip_all, fields(hash = %hash))]
    fn remove_entry(&self, hash: H256) -> crate::Result<()> {
        let (entries, queue) = self.pending_trees()?;
        let key = entry_key(hash);
        Transactional::<io::Error>::transaction(
            &(&entries, &queue),
            |(entries, queue)| {
                entries.remove(&key[..])?;
                queue.remove(&key[..])?;
                Ok(())
            },
        )?;
        self.db.flush()?;
        Ok(())
    }

    fn pending_len(&self) -> crate::Result<usize> {
        Ok(self.db.open_tree(PENDING_QUEUE)?.len())
    }
}
