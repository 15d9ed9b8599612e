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

use ethers::types::{Address, Log, H256};
use webb_relayer_evm::{published_messages, PublishedMessage};
use webb_relayer_utils::{Error, Result};

/// Finds the `index`th relay message of a transaction.
///
/// Only core bridge logs published by `relay_emitter` count.
pub fn find_log(
    logs: &[Log],
    core_bridge: Address,
    relay_emitter: H256,
    index: usize,
) -> Result<PublishedMessage> {
    if !logs.iter().any(|log| log.address == core_bridge) {
        return Err(Error::NoCoreBridgeLogs);
    }
    let relayed: Vec<_> = published_messages(logs, core_bridge)?
        .into_iter()
        .filter(|message| message.emitter() == relay_emitter)
        .collect();
    if relayed.is_empty() {
        return Err(Error::RelayLogNotFound);
    }
    let len = relayed.len();
    relayed
        .into_iter()
        .nth(index)
        .ok_or(Error::LogIndexOutOfRange { index, len })
}
