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
//! # Relayer Types Module 🕸️
//!
//! Small wrapper types shared by the configuration and runtime crates.

/// Wormhole chain ids and their human readable names.
pub mod chain;
/// A private key that can be read from the environment.
pub mod private_key;
/// An RPC url that can be read from the environment.
pub mod rpc_url;

pub use chain::{ChainContracts, ContractMap, WormholeChainId};
