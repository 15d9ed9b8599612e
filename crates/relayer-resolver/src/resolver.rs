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

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ethers::types::{Bytes, H256};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use webb_relayer_config::ResolverConfig;
use webb_relayer_evm::ReceiptSource;
use webb_relayer_payloads::{RelayerPayload, Vaa};
use webb_relayer_store::{
    EnqueueOutcome, PendingEntry, PendingRecord, PendingStore,
};
use webb_relayer_types::ContractMap;
use webb_relayer_utils::probe;
use webb_relayer_utils::retry::DoublingSchedule;
use webb_relayer_utils::Result;

use crate::dependencies::{delivery_entry, redelivery_entry};
use crate::{AttestationFetcher, ResolvedWorkflow, WorkflowSink};

/// What happened to a trigger attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Every dependency was in hand, the workflow was dispatched.
    Dispatched,
    /// Some dependencies are still missing, the entry waits in the retry
    /// queue.
    Pending {
        /// How many slots are still empty.
        missing: usize,
    },
    /// The trigger was already dispatched, nothing was done.
    Duplicate,
    /// Another task is resolving the same trigger right now.
    InFlight,
}

/// Counters of one retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Records that were due.
    pub due: usize,
    /// Entries that became complete and were dispatched.
    pub resolved: usize,
    /// Entries that are still missing dependencies.
    pub pending: usize,
    /// Entries busy in another task, or gone.
    pub skipped: usize,
    /// Entries whose retry failed with an error.
    pub failed: usize,
}

enum RetryOutcome {
    Resolved,
    Pending,
    Skipped,
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<H256>>,
    hash: H256,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.hash);
    }
}

/// Turns trigger attestations into resolved workflows.
///
/// Progress is kept in a [`PendingStore`], so a restart resumes where the
/// previous process stopped. Every entry is resolved by at most one task of
/// this process at a time.
#[derive(Clone)]
pub struct AttestationResolver<S> {
    store: S,
    fetcher: Arc<dyn AttestationFetcher>,
    receipts: Arc<dyn ReceiptSource>,
    sink: Arc<dyn WorkflowSink>,
    contracts: Arc<ContractMap>,
    schedule: DoublingSchedule,
    retry_interval: Duration,
    retention_period: u64,
    in_flight: Arc<Mutex<HashSet<H256>>>,
}

/// How often dispatched entries past their retention period are pruned.
const PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

impl<S> std::fmt::Debug for AttestationResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationResolver")
            .field("schedule", &self.schedule)
            .field("retry_interval", &self.retry_interval)
            .field("retention_period", &self.retention_period)
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<S: PendingStore> AttestationResolver<S> {
    /// Creates a resolver.
    pub fn new(
        store: S,
        fetcher: Arc<dyn AttestationFetcher>,
        receipts: Arc<dyn ReceiptSource>,
        sink: Arc<dyn WorkflowSink>,
        contracts: ContractMap,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            receipts,
            sink,
            contracts: Arc::new(contracts),
            schedule: DoublingSchedule::new(
                Duration::from_millis(config.initial_backoff),
                Duration::from_millis(config.max_backoff),
            ),
            retry_interval: Duration::from_millis(config.retry_interval),
            retention_period: config.retention_period,
            in_flight: Default::default(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn begin(&self, hash: H256) -> Option<InFlightGuard<'_>> {
        let inserted = self.in_flight.lock().insert(hash);
        inserted.then(|| InFlightGuard {
            set: &self.in_flight,
            hash,
        })
    }

    /// Handles a freshly observed trigger attestation.
    ///
    /// Malformed triggers are logged and returned as errors, they are never
    /// retried. Transient errors, like a redelivery whose original receipt
    /// cannot be read yet, are returned to the caller for a later retry.
    pub async fn on_trigger_attestation(
        &self,
        vaa_bytes: &[u8],
    ) -> Result<TriggerOutcome> {
        self.on_trigger_attestation_at(vaa_bytes, now_millis()).await
    }

    /// Same as [`Self::on_trigger_attestation`] with an explicit clock.
    #[tracing::instrument(skip_all, fields(now))]
    pub async fn on_trigger_attestation_at(
        &self,
        vaa_bytes: &[u8],
        now: u64,
    ) -> Result<TriggerOutcome> {
        let result = self.handle_trigger(vaa_bytes, now).await;
        match &result {
            Ok(outcome) => tracing::debug!(?outcome, "trigger handled"),
            Err(e) if e.is_transient() => {
                tracing::debug!(%e, "trigger could not be handled yet")
            }
            Err(e) => tracing::warn!(%e, "dropping trigger attestation"),
        }
        result
    }

    async fn handle_trigger(
        &self,
        vaa_bytes: &[u8],
        now: u64,
    ) -> Result<TriggerOutcome> {
        let vaa = Vaa::parse(vaa_bytes)?;
        let Some(_guard) = self.begin(vaa.hash) else {
            return Ok(TriggerOutcome::InFlight);
        };
        if let Some(known) = self.store.get_entry(vaa.hash)? {
            return self.on_known_entry(known, now).await;
        }
        let bytes = Bytes::from(vaa_bytes.to_vec());
        let mut entry = match RelayerPayload::decode(&vaa.payload)? {
            RelayerPayload::Delivery(container) => {
                delivery_entry(&vaa, &bytes, &container, now)?
            }
            RelayerPayload::Redelivery(instruction) => {
                redelivery_entry(
                    &vaa,
                    &bytes,
                    &instruction,
                    self.receipts.as_ref(),
                    &self.contracts,
                    now,
                )
                .await?
            }
        };
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Resolver,
            chain_id = entry.chain_id,
            hash = ?entry.hash,
            slots = entry.slots.len(),
            delivery_vaa_index = entry.delivery_vaa_index,
            redelivery = entry.redelivery_vaa.is_some(),
        );
        for (index, bytes) in self.fetch_missing(&entry).await {
            entry.fill_slot(index, bytes);
        }
        match self.store.enqueue_pending(entry.clone(), now)? {
            EnqueueOutcome::Stored if entry.all_fetched => {
                self.dispatch(&entry, now).await?;
                Ok(TriggerOutcome::Dispatched)
            }
            EnqueueOutcome::Stored => {
                let missing = entry.missing_slots().len();
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::PendingStore,
                    hash = ?entry.hash,
                    queued = true,
                    missing,
                );
                Ok(TriggerOutcome::Pending { missing })
            }
            EnqueueOutcome::AlreadyResolved(known)
            | EnqueueOutcome::AlreadyPending(known) => {
                self.on_known_entry(known, now).await
            }
        }
    }

    /// A trigger seen again runs one more resolution pass over its entry.
    ///
    /// The retry schedule of the entry is left untouched.
    async fn on_known_entry(
        &self,
        entry: PendingEntry,
        now: u64,
    ) -> Result<TriggerOutcome> {
        if entry.dispatched {
            tracing::debug!(hash = ?entry.hash, "trigger already dispatched");
            return Ok(TriggerOutcome::Duplicate);
        }
        let entry = if entry.all_fetched {
            entry
        } else {
            match self.resolve_pass(&entry, now, false).await? {
                Some(updated) => updated,
                None => return Ok(TriggerOutcome::Duplicate),
            }
        };
        if entry.all_fetched {
            self.dispatch(&entry, now).await?;
            return Ok(TriggerOutcome::Dispatched);
        }
        Ok(TriggerOutcome::Pending {
            missing: entry.missing_slots().len(),
        })
    }

    /// Fetches the empty slots of `entry` and stores what was found.
    ///
    /// With `backoff` set, an entry that is still incomplete gets its next
    /// retry pushed back.
    async fn resolve_pass(
        &self,
        entry: &PendingEntry,
        now: u64,
        backoff: bool,
    ) -> Result<Option<PendingEntry>> {
        let fetched = self.fetch_missing(entry).await;
        let schedule = self.schedule;
        self.store.update_entry(entry.hash, |entry, record| {
            for (index, bytes) in &fetched {
                entry.fill_slot(*index, bytes.clone());
            }
            if entry.refresh() || !backoff {
                return;
            }
            if let Some(record) = record {
                let delay = schedule.delay_for(record.num_times_retried);
                record.num_times_retried =
                    record.num_times_retried.saturating_add(1);
                record.next_retry_time =
                    now.saturating_add(delay.as_millis() as u64);
            }
        })
    }

    /// Fetches every empty slot of `entry`, concurrently.
    ///
    /// A failed slot never stops the others, it just stays empty.
    async fn fetch_missing(&self, entry: &PendingEntry) -> Vec<(usize, Bytes)> {
        let chain_id = entry.chain_id;
        let fetches = entry.missing_slots().into_iter().map(|index| {
            let emitter = entry.slots[index].emitter_address;
            let sequence = entry.slots[index].sequence;
            async move {
                match self
                    .fetcher
                    .fetch_by_emitter_sequence(chain_id, emitter, sequence)
                    .await
                {
                    Ok(Some(bytes)) if !bytes.is_empty() => Some((index, bytes)),
                    Ok(_) => {
                        tracing::trace!(chain_id, sequence, "dependency not available yet");
                        None
                    }
                    Err(e) => {
                        tracing::debug!(%e, chain_id, sequence, "failed to fetch dependency");
                        None
                    }
                }
            }
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Hands a resolved entry to the sink.
    ///
    /// When the sink refuses it, the entry goes back to the retry queue so
    /// the retry worker hands it over again.
    async fn dispatch(&self, entry: &PendingEntry, now: u64) -> Result<()> {
        let workflow = ResolvedWorkflow::from_entry(entry)?;
        if let Err(e) = self.sink.dispatch(workflow).await {
            let mut record = PendingRecord::new(entry.hash, now);
            record.next_retry_time = now
                .saturating_add(self.schedule.delay_for(0).as_millis() as u64);
            match self.store.requeue(record) {
                Ok(_) => tracing::warn!(
                    hash = ?entry.hash,
                    %e,
                    "hand over failed, entry requeued"
                ),
                Err(store_error) => tracing::error!(
                    hash = ?entry.hash,
                    %e,
                    %store_error,
                    "hand over failed and the entry could not be requeued"
                ),
            }
            return Err(e);
        }
        self.store.mark_dispatched(entry.hash, now)?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Resolver,
            chain_id = entry.chain_id,
            hash = ?entry.hash,
            dispatched = true,
        );
        Ok(())
    }

    /// Runs one retry pass now.
    pub async fn retry_pass(&self) -> Result<RetryReport> {
        self.retry_pass_at(now_millis()).await
    }

    /// Retries every queue record due at `now`.
    ///
    /// Entries are retried concurrently, a failing entry does not stop the
    /// pass.
    #[tracing::instrument(skip(self))]
    pub async fn retry_pass_at(&self, now: u64) -> Result<RetryReport> {
        let due = self.store.due_records(now)?;
        let mut report = RetryReport {
            due: due.len(),
            ..Default::default()
        };
        let retries = due.into_iter().map(|record| self.retry_entry(record, now));
        for outcome in join_all(retries).await {
            match outcome {
                Ok(RetryOutcome::Resolved) => report.resolved += 1,
                Ok(RetryOutcome::Pending) => report.pending += 1,
                Ok(RetryOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(%e, "retry of a pending entry failed");
                }
            }
        }
        if report.due > 0 {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Retry,
                due = report.due,
                resolved = report.resolved,
                pending = report.pending,
                skipped = report.skipped,
                failed = report.failed,
            );
        }
        Ok(report)
    }

    async fn retry_entry(
        &self,
        record: PendingRecord,
        now: u64,
    ) -> Result<RetryOutcome> {
        let Some(_guard) = self.begin(record.hash) else {
            return Ok(RetryOutcome::Skipped);
        };
        let Some(entry) = self.store.get_entry(record.hash)? else {
            // an orphan queue record.
            self.store.remove_entry(record.hash)?;
            return Ok(RetryOutcome::Skipped);
        };
        match self.resolve_pass(&entry, now, true).await? {
            Some(entry) if entry.all_fetched => {
                if !entry.dispatched {
                    self.dispatch(&entry, now).await?;
                }
                Ok(RetryOutcome::Resolved)
            }
            Some(_) => Ok(RetryOutcome::Pending),
            None => Ok(RetryOutcome::Skipped),
        }
    }

    /// Dispatches entries that were resolved but never handed over, for
    /// example because the process stopped right after resolving them.
    pub async fn recover(&self) -> Result<usize> {
        let mut recovered = 0;
        for entry in self.store.undispatched_resolved()? {
            let Some(_guard) = self.begin(entry.hash) else {
                continue;
            };
            self.dispatch(&entry, now_millis()).await?;
            recovered += 1;
        }
        if recovered > 0 {
            tracing::info!(recovered, "re-dispatched resolved entries");
        }
        Ok(recovered)
    }

    /// Forgets the entries dispatched more than the retention period
    /// before `now`.
    pub fn prune_dispatched_at(&self, now: u64) -> Result<usize> {
        let before = now.saturating_sub(self.retention_period);
        let pruned = self.store.prune_dispatched(before)?;
        if pruned > 0 {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::PendingStore,
                pruned,
                before,
            );
        }
        Ok(pruned)
    }

    /// Runs the retry pass on a fixed interval and prunes old dispatched
    /// entries, forever.
    pub async fn run_retry_worker(self) {
        let mut retries = tokio::time::interval(self.retry_interval);
        retries.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pruning = tokio::time::interval(PRUNE_INTERVAL);
        pruning.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = retries.tick() => {
                    if let Err(e) = self.retry_pass().await {
                        tracing::error!(%e, "retry pass failed");
                    }
                }
                _ = pruning.tick() => {
                    if let Err(e) = self.prune_dispatched_at(now_millis()) {
                        tracing::error!(%e, "pruning dispatched entries failed");
                    }
                }
            }
        }
    }
}
