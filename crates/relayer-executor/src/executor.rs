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

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ethers::types::{Address, Bytes, H256, U256};
use futures::future::join_all;
use tokio::sync::mpsc;
use webb_relayer_config::ExecutorConfig;
use webb_relayer_payloads::vaa::emitter_to_evm_address;
use webb_relayer_payloads::{
    DeliveryInstruction, DeliveryInstructionsContainer,
    RedeliveryByTxHashInstruction, Vaa,
};
use webb_relayer_resolver::ResolvedWorkflow;
use webb_relayer_types::{ContractMap, WormholeChainId};
use webb_relayer_utils::{probe, Error, Result};

use crate::budget::budget;
use crate::{
    DeliveryRequest, DestinationChain, ManagedSigner, RedeliveryRequest,
};

/// What happened to one target.
#[derive(Debug)]
pub struct TargetOutcome {
    /// The target chain.
    pub target_chain: WormholeChainId,
    /// Position of the target in its delivery.
    pub multisend_index: u8,
    /// The mined transaction, or why there is none.
    pub result: Result<H256>,
}

/// The outcome of one workflow, target by target.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Hash of the trigger attestation.
    pub trigger_hash: H256,
    /// Whether this was a redelivery.
    pub redelivery: bool,
    /// One outcome per target, in multisend order.
    pub targets: Vec<TargetOutcome>,
}

impl ExecutionReport {
    /// Targets that were delivered.
    pub fn succeeded(&self) -> usize {
        self.targets.iter().filter(|t| t.result.is_ok()).count()
    }

    /// Targets that were not.
    pub fn failed(&self) -> usize {
        self.targets.len() - self.succeeded()
    }
}

/// Executes resolved workflows, one on-chain call per target.
#[derive(Clone)]
pub struct Executor {
    signers: Arc<HashMap<WormholeChainId, ManagedSigner>>,
    contracts: Arc<ContractMap>,
    safety_margin: U256,
    gas_limit: u64,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chains: Vec<_> = self.signers.keys().collect();
        chains.sort();
        f.debug_struct("Executor")
            .field("chains", &chains)
            .field("safety_margin", &self.safety_margin)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}

impl Executor {
    /// Creates an executor over `chains`, keyed by their wormhole id.
    pub fn new(
        chains: impl IntoIterator<Item = Arc<dyn DestinationChain>>,
        contracts: ContractMap,
        config: &ExecutorConfig,
    ) -> Self {
        let signers = chains
            .into_iter()
            .map(|chain| (chain.chain_id(), ManagedSigner::new(chain)))
            .collect();
        Self {
            signers: Arc::new(signers),
            contracts: Arc::new(contracts),
            safety_margin: U256::from(config.safety_margin),
            gas_limit: config.gas_limit,
        }
    }

    fn signer(&self, chain_id: WormholeChainId) -> Result<&ManagedSigner> {
        self.signers.get(&chain_id).ok_or_else(|| Error::ChainNotFound {
            chain_id: chain_id.to_string(),
        })
    }

    /// The relay provider that approves senders on `chain_id`.
    ///
    /// The configured provider wins, otherwise the instruction's provider
    /// delivery address is used.
    fn relay_provider(
        &self,
        chain_id: WormholeChainId,
        provider_delivery_address: H256,
    ) -> Address {
        self.contracts
            .get(&chain_id)
            .and_then(|c| c.relay_provider)
            .unwrap_or_else(|| emitter_to_evm_address(provider_delivery_address))
    }

    async fn ensure_approved(
        &self,
        chain: &dyn DestinationChain,
        provider_delivery_address: H256,
    ) -> Result<Address> {
        let chain_id = chain.chain_id();
        let provider = self.relay_provider(chain_id, provider_delivery_address);
        let sender = chain.signer_address();
        if chain.is_approved_sender(provider, sender).await? {
            Ok(sender)
        } else {
            Err(Error::SenderNotApproved { chain_id, sender })
        }
    }

    /// Executes one workflow.
    pub async fn execute(
        &self,
        workflow: &ResolvedWorkflow,
    ) -> Result<ExecutionReport> {
        match &workflow.redelivery_vaa {
            Some(redelivery) => {
                self.execute_redelivery(workflow, redelivery).await
            }
            None => self.execute_delivery(workflow).await,
        }
    }

    /// Delivers every target of a delivery workflow.
    ///
    /// An underfunded request fails as a whole with
    /// [`Error::InsufficientFunding`] before anything is sent.
    #[tracing::instrument(
        skip_all,
        fields(chain_id = workflow.chain_id, hash = ?workflow.trigger_hash)
    )]
    pub async fn execute_delivery(
        &self,
        workflow: &ResolvedWorkflow,
    ) -> Result<ExecutionReport> {
        let vaa = Vaa::parse(workflow.delivery_vaa()?)?;
        let container = DeliveryInstructionsContainer::decode(&vaa.payload)?;
        if !container.sufficiently_funded {
            return Err(Error::InsufficientFunding);
        }
        let delivery_index = u8::try_from(workflow.delivery_vaa_index)
            .map_err(|_| Error::malformed("delivery index does not fit in u8"))?;

        let mut groups: BTreeMap<WormholeChainId, Vec<(u8, DeliveryInstruction)>> =
            BTreeMap::new();
        for (index, instruction) in container.instructions.iter().enumerate() {
            let multisend_index = u8::try_from(index)
                .map_err(|_| Error::malformed("too many instructions"))?;
            groups
                .entry(instruction.target_chain)
                .or_default()
                .push((multisend_index, *instruction));
        }

        let runs = groups.into_iter().map(|(target_chain, instructions)| {
            self.deliver_group(
                target_chain,
                instructions,
                &workflow.attestations,
                delivery_index,
            )
        });
        let mut targets: Vec<_> =
            join_all(runs).await.into_iter().flatten().collect();
        targets.sort_by_key(|t| t.multisend_index);
        Ok(ExecutionReport {
            trigger_hash: workflow.trigger_hash,
            redelivery: false,
            targets,
        })
    }

    /// The targets of one chain, strictly one after the other.
    async fn deliver_group(
        &self,
        target_chain: WormholeChainId,
        instructions: Vec<(u8, DeliveryInstruction)>,
        attestations: &[Bytes],
        delivery_index: u8,
    ) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(instructions.len());
        for (multisend_index, instruction) in instructions {
            let result = self
                .deliver_target(
                    multisend_index,
                    &instruction,
                    attestations,
                    delivery_index,
                )
                .await;
            outcomes.push(TargetOutcome {
                target_chain,
                multisend_index,
                result,
            });
        }
        outcomes
    }

    async fn deliver_target(
        &self,
        multisend_index: u8,
        instruction: &DeliveryInstruction,
        attestations: &[Bytes],
        delivery_index: u8,
    ) -> Result<H256> {
        let signer = self.signer(instruction.target_chain)?;
        let chain = signer.acquire().await;
        let refund_address = self
            .ensure_approved(
                &**chain,
                instruction.execution_parameters.provider_delivery_address,
            )
            .await?;
        let request = DeliveryRequest {
            attestations: attestations.to_vec(),
            delivery_index,
            multisend_index,
            refund_address,
            value: budget(
                instruction.receiver_value_target,
                instruction.maximum_refund_target,
                self.safety_margin,
            ),
            gas_limit: self.gas_limit,
        };
        chain.deliver(request).await
    }

    /// Executes a redelivery workflow, always exactly one target.
    #[tracing::instrument(
        skip_all,
        fields(chain_id = workflow.chain_id, hash = ?workflow.trigger_hash)
    )]
    pub async fn execute_redelivery(
        &self,
        workflow: &ResolvedWorkflow,
        redelivery_vaa: &Bytes,
    ) -> Result<ExecutionReport> {
        let vaa = Vaa::parse(redelivery_vaa)?;
        let instruction = RedeliveryByTxHashInstruction::decode(&vaa.payload)?;
        let result = self
            .redeliver_target(&instruction, workflow, redelivery_vaa)
            .await;
        Ok(ExecutionReport {
            trigger_hash: workflow.trigger_hash,
            redelivery: true,
            targets: vec![TargetOutcome {
                target_chain: instruction.target_chain,
                multisend_index: instruction.multisend_index,
                result,
            }],
        })
    }

    async fn redeliver_target(
        &self,
        instruction: &RedeliveryByTxHashInstruction,
        workflow: &ResolvedWorkflow,
        redelivery_vaa: &Bytes,
    ) -> Result<H256> {
        let signer = self.signer(instruction.target_chain)?;
        let chain = signer.acquire().await;
        let refund_address = self
            .ensure_approved(
                &**chain,
                instruction.execution_parameters.provider_delivery_address,
            )
            .await?;
        let request = RedeliveryRequest {
            redelivery_vaa: redelivery_vaa.clone(),
            source_attestations: workflow.attestations.clone(),
            refund_address,
            value: budget(
                instruction.new_receiver_value_target,
                instruction.new_maximum_refund_target,
                self.safety_margin,
            ),
            gas_limit: self.gas_limit,
        };
        chain.redeliver(request).await
    }

    /// Executes one workflow and logs the outcome of every target.
    pub async fn handle(&self, workflow: ResolvedWorkflow) {
        let chain_id = workflow.chain_id;
        let hash = workflow.trigger_hash;
        let report = match self.execute(&workflow).await {
            Ok(report) => report,
            Err(e @ Error::InsufficientFunding) => {
                tracing::warn!(chain_id, ?hash, %e, "skipping delivery");
                return;
            }
            Err(e) => {
                tracing::error!(chain_id, ?hash, %e, "could not execute workflow");
                return;
            }
        };
        for target in &report.targets {
            match &target.result {
                Ok(tx_hash) => tracing::info!(
                    chain_id,
                    ?hash,
                    target_chain = target.target_chain,
                    index = target.multisend_index,
                    ?tx_hash,
                    "delivered"
                ),
                Err(e @ Error::SenderNotApproved { .. }) => tracing::warn!(
                    chain_id,
                    ?hash,
                    target_chain = target.target_chain,
                    index = target.multisend_index,
                    %e,
                    "skipping target"
                ),
                Err(e) => tracing::error!(
                    chain_id,
                    ?hash,
                    target_chain = target.target_chain,
                    index = target.multisend_index,
                    %e,
                    "delivery failed"
                ),
            }
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Executor,
            chain_id,
            ?hash,
            redelivery = report.redelivery,
            succeeded = report.succeeded(),
            failed = report.failed(),
        );
    }

    /// Executes every workflow received on `workflows`, each in its own
    /// task. Returns once the sending side is gone.
    pub async fn run(self, mut workflows: mpsc::Receiver<ResolvedWorkflow>) {
        while let Some(workflow) = workflows.recv().await {
            let executor = self.clone();
            tokio::spawn(async move { executor.handle(workflow).await });
        }
        tracing::debug!("workflow channel closed");
    }
}
