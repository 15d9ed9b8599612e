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

#![warn(missing_docs)]
//! # Relayer EVM Module 🕸️
//!
//! Contract bindings for the relay, relay provider and core bridge
//! contracts, plus helpers to read relay messages out of transaction
//! receipts.

/// Generated contract bindings.
#[allow(missing_docs, clippy::too_many_arguments)]
pub mod contract {
    use ethers::contract::abigen;

    abigen!(CoreRelayer, "abi/CoreRelayer.json");
    abigen!(RelayProvider, "abi/RelayProvider.json");
    abigen!(IWormhole, "abi/IWormhole.json");
}

/// Messages published through the core bridge.
pub mod published;
/// Fetching transaction receipts from EVM chains.
pub mod receipt;

pub use published::{published_messages, synthetic_batch, PublishedMessage};
pub use receipt::{EvmReceiptSource, ReceiptSource};
