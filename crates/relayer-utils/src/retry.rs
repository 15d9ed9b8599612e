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

//! Retry logic for async calls

use std::time::Duration;

use backoff::backoff::Backoff;

/// A deterministic doubling schedule, capped at `max`.
///
/// Unlike [`backoff::ExponentialBackoff`] the delay only depends on the attempt
/// number, so it can be recomputed from a persisted retry counter after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoublingSchedule {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl DoublingSchedule {
    /// Creates a new schedule starting at `initial` and never exceeding `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            attempt: 0,
        }
    }

    /// The delay to apply after `attempt` failed attempts.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // 2^31 * initial already saturates any sane cap.
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Backoff for DoublingSchedule {
    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}
