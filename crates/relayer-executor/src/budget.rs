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

use ethers::types::U256;

/// The native value sent with a delivery call.
///
/// `receiver_value + maximum_refund + safety_margin`, saturating at
/// [`U256::MAX`] instead of wrapping.
pub fn budget(
    receiver_value: U256,
    maximum_refund: U256,
    safety_margin: U256,
) -> U256 {
    receiver_value
        .saturating_add(maximum_refund)
        .saturating_add(safety_margin)
}
