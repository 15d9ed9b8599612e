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

use std::fmt;

use ethers::types::H256;
use webb_relayer_types::WormholeChainId;

/// The outcome of one delivery attempt on a target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The receiver ran and succeeded.
    DeliverySuccess,
    /// The receiver ran and reverted.
    ReceiverFailure,
    /// The receiver asked for a forward that could not be funded.
    ForwardRequestFailure,
    /// The receiver asked for a forward and it was funded.
    ForwardRequestSuccess,
    /// The redelivery did not match its original delivery.
    InvalidRedelivery,
    /// The contract reported a code we do not know.
    ThisShouldNeverHappen(u8),
    /// No delivery event was found in the searched blocks.
    DeliveryDidntHappenWithinRange {
        /// First searched block.
        from: u64,
        /// Last searched block.
        to: u64,
    },
}

impl DeliveryStatus {
    /// Maps the status code of a `Delivery` event.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::DeliverySuccess,
            1 => Self::ReceiverFailure,
            2 => Self::ForwardRequestFailure,
            3 => Self::ForwardRequestSuccess,
            4 => Self::InvalidRedelivery,
            other => Self::ThisShouldNeverHappen(other),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeliverySuccess => write!(f, "Delivery Success"),
            Self::ReceiverFailure => write!(f, "Receiver Failure"),
            Self::ForwardRequestFailure => write!(f, "Forward Request Failure"),
            Self::ForwardRequestSuccess => write!(f, "Forward Request Success"),
            Self::InvalidRedelivery => write!(f, "Invalid Redelivery"),
            Self::ThisShouldNeverHappen(code) => write!(
                f,
                "This should never happen. Contact Support. (status code {code})"
            ),
            Self::DeliveryDidntHappenWithinRange { from, to } => write!(
                f,
                "Delivery didn't happen within blocks {from} to {to}"
            ),
        }
    }
}

/// One delivery attempt seen on a target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// What happened.
    pub status: DeliveryStatus,
    /// The delivering transaction, when there was one.
    pub tx_hash: Option<H256>,
}

/// Every delivery attempt of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    /// The target chain.
    pub chain_id: WormholeChainId,
    /// Attempts in block order, never empty.
    pub attempts: Vec<DeliveryAttempt>,
}

/// A block bound, resolved against the chain head at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSpec {
    /// The chain head.
    Latest,
    /// This many blocks before the chain head.
    BehindLatest(u64),
    /// A fixed block.
    Number(u64),
}

impl BlockSpec {
    /// The block number this points at when the head is `latest`.
    pub fn resolve(&self, latest: u64) -> u64 {
        match self {
            Self::Latest => latest,
            Self::BehindLatest(blocks) => latest.saturating_sub(*blocks),
            Self::Number(number) => *number,
        }
    }
}

/// The blocks searched for delivery events, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First block.
    pub from: BlockSpec,
    /// Last block.
    pub to: BlockSpec,
}

impl BlockRange {
    /// The last `blocks` blocks up to the head.
    pub fn recent(blocks: u64) -> Self {
        Self {
            from: BlockSpec::BehindLatest(blocks),
            to: BlockSpec::Latest,
        }
    }

    /// Both ends as block numbers, given the head.
    pub fn resolve(&self, latest: u64) -> (u64, u64) {
        (self.from.resolve(latest), self.to.resolve(latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_map_to_named_statuses() {
        assert_eq!(DeliveryStatus::from_code(0), DeliveryStatus::DeliverySuccess);
        assert_eq!(DeliveryStatus::from_code(1), DeliveryStatus::ReceiverFailure);
        assert_eq!(
            DeliveryStatus::from_code(2),
            DeliveryStatus::ForwardRequestFailure
        );
        assert_eq!(
            DeliveryStatus::from_code(3),
            DeliveryStatus::ForwardRequestSuccess
        );
        assert_eq!(DeliveryStatus::from_code(4), DeliveryStatus::InvalidRedelivery);
        for code in [5, 42, u8::MAX] {
            assert_eq!(
                DeliveryStatus::from_code(code),
                DeliveryStatus::ThisShouldNeverHappen(code)
            );
        }
    }

    #[test]
    fn statuses_read_like_sentences() {
        assert_eq!(DeliveryStatus::DeliverySuccess.to_string(), "Delivery Success");
        assert_eq!(
            DeliveryStatus::DeliveryDidntHappenWithinRange { from: 10, to: 20 }
                .to_string(),
            "Delivery didn't happen within blocks 10 to 20"
        );
        assert!(DeliveryStatus::ThisShouldNeverHappen(9)
            .to_string()
            .contains("status code 9"));
    }

    #[test]
    fn ranges_resolve_against_the_head() {
        assert_eq!(BlockRange::recent(2040).resolve(10_000), (7_960, 10_000));
        assert_eq!(BlockRange::recent(2040).resolve(100), (0, 100));
        let fixed = BlockRange {
            from: BlockSpec::Number(5),
            to: BlockSpec::Number(9),
        };
        assert_eq!(fixed.resolve(1_000), (5, 9));
    }
}
