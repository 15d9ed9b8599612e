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

//! Default values of optional configuration keys.

/// Chains are enabled unless stated otherwise.
pub const fn enabled() -> bool {
    true
}
/// The number of confirmations before a block is scanned.
pub const fn block_confirmations() -> u64 {
    1
}
/// Trigger watcher polling interval, in milliseconds.
pub const fn polling_interval() -> u64 {
    7_000
}
/// The maximum blocks per step is set to `500` by default.
pub const fn max_blocks_per_step() -> u64 {
    500
}
/// Guardian RPC request timeout, in milliseconds.
pub const fn request_timeout() -> u64 {
    10_000
}
/// How often the retry worker scans the pending queue, in milliseconds.
pub const fn retry_interval() -> u64 {
    3_000
}
/// First retry delay of an incomplete entry, in milliseconds.
pub const fn initial_backoff() -> u64 {
    1_000
}
/// Upper bound of the retry delay, in milliseconds.
pub const fn max_backoff() -> u64 {
    60_000
}
/// How long dispatched entries are kept, seven days in milliseconds.
pub const fn retention_period() -> u64 {
    7 * 24 * 60 * 60 * 1_000
}
/// Extra wei added on top of every delivery budget.
pub const fn safety_margin() -> u64 {
    100
}
/// Gas limit of the delivery transaction.
pub const fn gas_limit() -> u64 {
    3_000_000
}
/// How many blocks back from the latest the status lookup scans.
pub const fn status_block_range() -> u64 {
    2_040
}
/// How many confirmations a delivery transaction waits for.
pub const fn tx_confirmations() -> usize {
    1
}
