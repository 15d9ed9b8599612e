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
use webb_relayer_payloads::{
    DeliveryInstructionsContainer, RedeliveryByTxHashInstruction,
};
use webb_relayer_types::WormholeChainId;

use crate::TargetStatus;

/// What a source transaction requested, and what came of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryInfo {
    /// A delivery request and the status of each of its targets.
    Delivery {
        /// Chain of the source transaction.
        source_chain: WormholeChainId,
        /// The source transaction.
        source_tx: H256,
        /// Sequence of the delivery request.
        sequence: u64,
        /// The decoded request.
        container: DeliveryInstructionsContainer,
        /// One entry per instruction, in multisend order.
        target_statuses: Vec<TargetStatus>,
    },
    /// A redelivery request. It is executed as a fresh delivery, so its
    /// fields are the whole answer.
    Redelivery {
        /// Chain of the source transaction.
        source_chain: WormholeChainId,
        /// The source transaction.
        source_tx: H256,
        /// The decoded request.
        instruction: RedeliveryByTxHashInstruction,
    },
}

fn chain(id: WormholeChainId) -> String {
    format!("Chain {id}")
}

impl fmt::Display for DeliveryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redelivery {
                source_chain,
                source_tx,
                instruction,
            } => {
                writeln!(
                    f,
                    "Found redelivery request in transaction {source_tx:?} on {}",
                    chain(*source_chain)
                )?;
                writeln!(
                    f,
                    "Original delivery source chain: {}",
                    chain(instruction.source_chain)
                )?;
                writeln!(
                    f,
                    "Original delivery source transaction hash: {:?}",
                    instruction.source_tx_hash
                )?;
                writeln!(
                    f,
                    "Original delivery sequence: {}",
                    instruction.delivery_vaa_sequence
                )?;
                writeln!(f, "Target chain: {}", chain(instruction.target_chain))?;
                writeln!(f, "Multisend index: {}", instruction.multisend_index)?;
                writeln!(
                    f,
                    "New max amount (in target chain currency) to use for gas: {}",
                    instruction.new_maximum_refund_target
                )?;
                writeln!(
                    f,
                    "New amount (in target chain currency) to pass into target address: {}",
                    instruction.new_receiver_value_target
                )?;
                writeln!(
                    f,
                    "New target chain gas limit: {}",
                    instruction.execution_parameters.gas_limit
                )?;
                writeln!(
                    f,
                    "Relay provider delivery address: {:?}",
                    instruction.execution_parameters.provider_delivery_address
                )
            }
            Self::Delivery {
                source_chain,
                source_tx,
                sequence,
                container,
                target_statuses,
            } => {
                writeln!(
                    f,
                    "Found delivery request {sequence} in transaction {source_tx:?} on {}",
                    chain(*source_chain)
                )?;
                if container.sufficiently_funded {
                    writeln!(f, "The delivery was funded")?;
                } else {
                    writeln!(
                        f,
                        "** NOTE: The delivery was NOT sufficiently funded. \
                         There were not enough leftover funds to perform the forward **"
                    )?;
                }
                let n = container.instructions.len();
                writeln!(
                    f,
                    "\nMessages were requested to be sent to {n} destination{}:",
                    if n == 1 { "" } else { "s" }
                )?;
                for (i, instruction) in container.instructions.iter().enumerate() {
                    let target = chain(instruction.target_chain);
                    writeln!(
                        f,
                        "\n(Destination {i}): Target address is {:?} on {target}",
                        instruction.target_address
                    )?;
                    writeln!(
                        f,
                        "Max amount to use for gas: {} of {target} currency",
                        instruction.maximum_refund_target
                    )?;
                    if !instruction.receiver_value_target.is_zero() {
                        writeln!(
                            f,
                            "Amount to pass into target address: {} of {target} currency",
                            instruction.receiver_value_target
                        )?;
                    }
                    writeln!(
                        f,
                        "Gas limit: {} {target} gas",
                        instruction.execution_parameters.gas_limit
                    )?;
                    writeln!(
                        f,
                        "Relay provider delivery address: {:?}",
                        instruction.execution_parameters.provider_delivery_address
                    )?;
                    let attempts = target_statuses
                        .get(i)
                        .map(|t| t.attempts.as_slice())
                        .unwrap_or_default();
                    for (n, attempt) in attempts.iter().enumerate() {
                        write!(f, "Delivery attempt {}: {}", n + 1, attempt.status)?;
                        match attempt.tx_hash {
                            Some(tx) => writeln!(f, " ({target} transaction hash: {tx:?})")?,
                            None => writeln!(f)?,
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
