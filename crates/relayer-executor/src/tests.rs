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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, Bytes, Log, H256, U256};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use webb_relayer_config::{ExecutorConfig, ResolverConfig};
use webb_relayer_evm::ReceiptSource;
use webb_relayer_payloads::vaa::evm_address_to_emitter;
use webb_relayer_payloads::{
    DeliveryInstruction, DeliveryInstructionsContainer, ExecutionParameters,
    MessageInfo, RedeliveryByTxHashInstruction, Vaa,
};
use webb_relayer_resolver::{
    AttestationFetcher, AttestationResolver, ResolvedWorkflow, TriggerOutcome,
};
use webb_relayer_store::{InMemoryStore, PendingStore};
use webb_relayer_types::{ChainContracts, ContractMap, WormholeChainId};
use webb_relayer_utils::{Error, Result};

use crate::{
    DeliveryRequest, DestinationChain, Executor, RedeliveryRequest,
};

const SOURCE: WormholeChainId = 2;
const AVALANCHE: WormholeChainId = 6;
const BSC: WormholeChainId = 4;

#[derive(Default)]
struct FakeChain {
    id: WormholeChainId,
    signer: Address,
    approved: bool,
    failing: Vec<u8>,
    queried: Mutex<Vec<(Address, Address)>>,
    delivered: Mutex<Vec<DeliveryRequest>>,
    redelivered: Mutex<Vec<RedeliveryRequest>>,
}

impl FakeChain {
    fn approved(id: WormholeChainId) -> Arc<Self> {
        Arc::new(Self {
            id,
            signer: Address::repeat_byte(id as u8),
            approved: true,
            ..Default::default()
        })
    }

    fn failing_at(id: WormholeChainId, failing: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            id,
            signer: Address::repeat_byte(id as u8),
            approved: true,
            failing,
            ..Default::default()
        })
    }

    fn unapproved(id: WormholeChainId) -> Arc<Self> {
        Arc::new(Self {
            id,
            signer: Address::repeat_byte(id as u8),
            ..Default::default()
        })
    }

    fn deliveries(&self) -> Vec<DeliveryRequest> {
        self.delivered.lock().clone()
    }
}

#[async_trait::async_trait]
impl DestinationChain for FakeChain {
    fn chain_id(&self) -> WormholeChainId {
        self.id
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn is_approved_sender(
        &self,
        provider: Address,
        sender: Address,
    ) -> Result<bool> {
        self.queried.lock().push((provider, sender));
        Ok(self.approved)
    }

    async fn deliver(&self, request: DeliveryRequest) -> Result<H256> {
        let index = request.multisend_index;
        self.delivered.lock().push(request);
        if self.failing.contains(&index) {
            return Err(Error::SubmissionFailed {
                chain_id: self.id,
                reason: "execution reverted".into(),
            });
        }
        Ok(H256::from_low_u64_be(u64::from(index) + 1))
    }

    async fn redeliver(&self, request: RedeliveryRequest) -> Result<H256> {
        self.redelivered.lock().push(request);
        Ok(H256::repeat_byte(0xee))
    }
}

fn config() -> ExecutorConfig {
    ExecutorConfig {
        safety_margin: 100,
        gas_limit: 3_000_000,
        confirmations: 1,
    }
}

fn executor(
    chains: Vec<Arc<FakeChain>>,
    contracts: ContractMap,
) -> Executor {
    let chains = chains
        .into_iter()
        .map(|chain| chain as Arc<dyn DestinationChain>);
    Executor::new(chains, contracts, &config())
}

fn instruction(target_chain: WormholeChainId, r: u64, m: u64) -> DeliveryInstruction {
    DeliveryInstruction {
        target_chain,
        target_address: H256::repeat_byte(0x11),
        refund_address: H256::repeat_byte(0x22),
        maximum_refund_target: U256::from(m),
        receiver_value_target: U256::from(r),
        execution_parameters: ExecutionParameters {
            version: 1,
            gas_limit: 500_000,
            provider_delivery_address: evm_address_to_emitter(
                Address::repeat_byte(0x99),
            ),
        },
    }
}

fn workflow(
    sufficiently_funded: bool,
    instructions: Vec<DeliveryInstruction>,
) -> ResolvedWorkflow {
    let app = Vaa::unsigned(SOURCE, H256::repeat_byte(0x01), 1, 7, vec![1]);
    let container = DeliveryInstructionsContainer {
        sufficiently_funded,
        messages: vec![MessageInfo::EmitterSequence {
            version: 1,
            emitter_address: app.emitter_address,
            sequence: app.sequence,
        }],
        instructions,
    };
    let delivery = Vaa::unsigned(
        SOURCE,
        H256::repeat_byte(0xaa),
        2,
        7,
        container.encode().unwrap(),
    );
    ResolvedWorkflow {
        chain_id: SOURCE,
        trigger_hash: delivery.hash,
        attestations: vec![
            Bytes::from(app.encode().unwrap()),
            Bytes::from(delivery.encode().unwrap()),
        ],
        delivery_vaa_index: 1,
        redelivery_vaa: None,
    }
}

#[tokio::test]
async fn delivery_call_carries_budget_and_indexes() {
    let avalanche = FakeChain::approved(AVALANCHE);
    let executor = executor(vec![avalanche.clone()], ContractMap::new());
    let workflow = workflow(true, vec![instruction(AVALANCHE, 5, 7)]);

    let report = executor.execute(&workflow).await.unwrap();
    assert_eq!(report.succeeded(), 1);
    assert!(!report.redelivery);

    let deliveries = avalanche.deliveries();
    assert_eq!(deliveries.len(), 1);
    let request = &deliveries[0];
    assert_eq!(request.value, U256::from(5 + 7 + 100));
    assert_eq!(request.attestations, workflow.attestations);
    assert_eq!(request.delivery_index, 1);
    assert_eq!(request.multisend_index, 0);
    assert_eq!(request.refund_address, avalanche.signer);
    assert_eq!(request.gas_limit, 3_000_000);
}

#[tokio::test]
async fn a_failing_target_does_not_affect_the_others() {
    let avalanche = FakeChain::failing_at(AVALANCHE, vec![0]);
    let bsc = FakeChain::approved(BSC);
    let executor = executor(vec![avalanche.clone(), bsc.clone()], ContractMap::new());
    let workflow = workflow(
        true,
        vec![
            instruction(AVALANCHE, 0, 10),
            instruction(BSC, 0, 20),
            instruction(AVALANCHE, 0, 30),
        ],
    );

    let report = executor.execute(&workflow).await.unwrap();
    let indexes: Vec<_> =
        report.targets.iter().map(|t| t.multisend_index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert!(matches!(
        report.targets[0].result,
        Err(Error::SubmissionFailed { chain_id: AVALANCHE, .. })
    ));
    assert_eq!(report.targets[1].result.as_ref().unwrap(), &H256::from_low_u64_be(2));
    assert_eq!(report.targets[2].result.as_ref().unwrap(), &H256::from_low_u64_be(3));
    assert_eq!((report.succeeded(), report.failed()), (2, 1));

    // same chain targets go out in multisend order.
    let sent: Vec<_> = avalanche
        .deliveries()
        .iter()
        .map(|r| r.multisend_index)
        .collect();
    assert_eq!(sent, vec![0, 2]);
    assert_eq!(bsc.deliveries().len(), 1);
}

#[tokio::test]
async fn unapproved_sender_skips_only_its_target() {
    let avalanche = FakeChain::unapproved(AVALANCHE);
    let bsc = FakeChain::approved(BSC);
    let executor = executor(vec![avalanche.clone(), bsc.clone()], ContractMap::new());
    let workflow = workflow(
        true,
        vec![instruction(AVALANCHE, 1, 1), instruction(BSC, 1, 1)],
    );

    let report = executor.execute(&workflow).await.unwrap();
    match &report.targets[0].result {
        Err(Error::SenderNotApproved { chain_id, sender }) => {
            assert_eq!(*chain_id, AVALANCHE);
            assert_eq!(*sender, avalanche.signer);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(report.targets[1].result.is_ok());
    assert!(avalanche.deliveries().is_empty());
    assert_eq!(bsc.deliveries().len(), 1);
}

#[tokio::test]
async fn underfunded_requests_send_nothing() {
    let avalanche = FakeChain::approved(AVALANCHE);
    let executor = executor(vec![avalanche.clone()], ContractMap::new());
    let workflow = workflow(false, vec![instruction(AVALANCHE, 1, 1)]);

    let err = executor.execute(&workflow).await.unwrap_err();
    assert!(matches!(err, Error::InsufficientFunding));
    assert!(avalanche.queried.lock().is_empty());
    assert!(avalanche.deliveries().is_empty());
}

#[tokio::test]
async fn unknown_target_chain_is_reported_per_target() {
    let avalanche = FakeChain::approved(AVALANCHE);
    let executor = executor(vec![avalanche.clone()], ContractMap::new());
    let workflow = workflow(
        true,
        vec![instruction(BSC, 1, 1), instruction(AVALANCHE, 1, 1)],
    );

    let report = executor.execute(&workflow).await.unwrap();
    assert!(matches!(
        report.targets[0].result,
        Err(Error::ChainNotFound { .. })
    ));
    assert!(report.targets[1].result.is_ok());
}

#[tokio::test]
async fn configured_relay_provider_takes_precedence() {
    let avalanche = FakeChain::approved(AVALANCHE);
    let bsc = FakeChain::approved(BSC);
    let mut contracts = ContractMap::new();
    contracts.insert(
        AVALANCHE,
        ChainContracts {
            relay_contract: Address::repeat_byte(0xaa),
            core_bridge: Address::repeat_byte(0xcc),
            relay_provider: Some(Address::repeat_byte(0x42)),
        },
    );
    let executor = executor(vec![avalanche.clone(), bsc.clone()], contracts);
    let workflow = workflow(
        true,
        vec![instruction(AVALANCHE, 1, 1), instruction(BSC, 1, 1)],
    );
    executor.execute(&workflow).await.unwrap();

    assert_eq!(
        avalanche.queried.lock().clone(),
        vec![(Address::repeat_byte(0x42), avalanche.signer)]
    );
    // no configured provider, the instruction names it.
    assert_eq!(
        bsc.queried.lock().clone(),
        vec![(Address::repeat_byte(0x99), bsc.signer)]
    );
}

#[tokio::test]
async fn redelivery_uses_the_new_budget() {
    let avalanche = FakeChain::approved(AVALANCHE);
    let executor = executor(vec![avalanche.clone()], ContractMap::new());
    let instruction = RedeliveryByTxHashInstruction {
        source_chain: SOURCE,
        source_tx_hash: H256::repeat_byte(0x77),
        delivery_vaa_sequence: 2,
        target_chain: AVALANCHE,
        multisend_index: 3,
        new_maximum_refund_target: U256::from(1_000u64),
        new_receiver_value_target: U256::from(50u64),
        execution_parameters: instruction(AVALANCHE, 0, 0).execution_parameters,
    };
    let redelivery = Vaa::unsigned(
        AVALANCHE,
        H256::repeat_byte(0xaa),
        9,
        0,
        instruction.encode(),
    );
    let redelivery_bytes = Bytes::from(redelivery.encode().unwrap());
    let mut workflow = workflow(true, vec![]);
    workflow.trigger_hash = redelivery.hash;
    workflow.redelivery_vaa = Some(redelivery_bytes.clone());

    let report = executor.execute(&workflow).await.unwrap();
    assert!(report.redelivery);
    assert_eq!(report.targets.len(), 1);
    assert_eq!(report.targets[0].multisend_index, 3);
    assert_eq!(report.targets[0].target_chain, AVALANCHE);

    let requests = avalanche.redelivered.lock().clone();
    assert_eq!(
        requests,
        vec![RedeliveryRequest {
            redelivery_vaa: redelivery_bytes,
            source_attestations: workflow.attestations.clone(),
            refund_address: avalanche.signer,
            value: U256::from(1_150u64),
            gas_limit: 3_000_000,
        }]
    );
    assert!(avalanche.deliveries().is_empty());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn run_executes_every_received_workflow() {
    let avalanche = FakeChain::approved(AVALANCHE);
    let executor = executor(vec![avalanche.clone()], ContractMap::new());
    let (tx, rx) = mpsc::channel(8);
    tx.send(workflow(true, vec![instruction(AVALANCHE, 1, 1)]))
        .await
        .unwrap();
    tx.send(workflow(false, vec![instruction(AVALANCHE, 1, 1)]))
        .await
        .unwrap();
    drop(tx);
    executor.run(rx).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while !logs_contain("skipping delivery") || avalanche.deliveries().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(avalanche.deliveries().len(), 1);
}

/// Serves attestations, the ones in `flaky` only from the second lookup on.
#[derive(Default)]
struct FlakyGuardian {
    signed: HashMap<(H256, u64), Bytes>,
    flaky: Mutex<Vec<(H256, u64)>>,
}

#[async_trait::async_trait]
impl AttestationFetcher for FlakyGuardian {
    async fn fetch_by_emitter_sequence(
        &self,
        _chain_id: WormholeChainId,
        emitter: H256,
        sequence: u64,
    ) -> Result<Option<Bytes>> {
        let mut flaky = self.flaky.lock();
        if let Some(pos) = flaky.iter().position(|k| *k == (emitter, sequence)) {
            flaky.remove(pos);
            return Err(Error::Generic("not signed yet"));
        }
        Ok(self.signed.get(&(emitter, sequence)).cloned())
    }
}

struct NoReceipts;

#[async_trait::async_trait]
impl ReceiptSource for NoReceipts {
    async fn fetch_by_transaction(
        &self,
        _chain_id: WormholeChainId,
        tx_hash: H256,
    ) -> Result<Vec<Log>> {
        Err(Error::TransactionNotFound(tx_hash))
    }
}

#[tokio::test]
async fn delivery_is_executed_once_its_late_dependency_arrives() {
    let now = 1_000_000;
    let first = Vaa::unsigned(SOURCE, H256::repeat_byte(0x01), 10, 3, vec![1]);
    let second = Vaa::unsigned(SOURCE, H256::repeat_byte(0x02), 20, 3, vec![2]);
    let container = DeliveryInstructionsContainer {
        sufficiently_funded: true,
        messages: vec![
            MessageInfo::EmitterSequence {
                version: 1,
                emitter_address: first.emitter_address,
                sequence: first.sequence,
            },
            MessageInfo::EmitterSequence {
                version: 1,
                emitter_address: second.emitter_address,
                sequence: second.sequence,
            },
        ],
        instructions: vec![instruction(AVALANCHE, 10, 10)],
    };
    let trigger = Vaa::unsigned(
        SOURCE,
        H256::repeat_byte(0xaa),
        5,
        3,
        container.encode().unwrap(),
    );
    let trigger_bytes = Bytes::from(trigger.encode().unwrap());

    let mut guardian = FlakyGuardian::default();
    for vaa in [&first, &second] {
        guardian.signed.insert(
            (vaa.emitter_address, vaa.sequence),
            Bytes::from(vaa.encode().unwrap()),
        );
    }
    guardian
        .flaky
        .lock()
        .push((first.emitter_address, first.sequence));

    let store = InMemoryStore::default();
    let (tx, mut rx) = mpsc::channel(8);
    let resolver = AttestationResolver::new(
        store.clone(),
        Arc::new(guardian),
        Arc::new(NoReceipts),
        Arc::new(tx),
        ContractMap::new(),
        &ResolverConfig::default(),
    );
    let avalanche = FakeChain::approved(AVALANCHE);
    let executor = executor(vec![avalanche.clone()], ContractMap::new());

    // first pass: message 1 is not available yet.
    let outcome = resolver
        .on_trigger_attestation_at(&trigger_bytes, now)
        .await
        .unwrap();
    assert_eq!(outcome, TriggerOutcome::Pending { missing: 1 });
    let entry = store.get_entry(trigger.hash).unwrap().unwrap();
    assert!(!entry.all_fetched);
    assert!(rx.try_recv().is_err());

    // second pass completes it.
    let report = resolver.retry_pass_at(now).await.unwrap();
    assert_eq!(report.resolved, 1);
    assert!(store.get_entry(trigger.hash).unwrap().unwrap().all_fetched);

    let workflow = rx.try_recv().unwrap();
    executor.execute(&workflow).await.unwrap();
    let deliveries = avalanche.deliveries();
    assert_eq!(deliveries.len(), 1);
    let index = usize::from(deliveries[0].delivery_index);
    assert_eq!(index, 2);
    assert_eq!(deliveries[0].attestations[index], trigger_bytes);
    assert_eq!(deliveries[0].attestations.len(), 3);
}
