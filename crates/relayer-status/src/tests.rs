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

use ethers::types::{Address, Bytes, Log, H256, U256};
use parking_lot::Mutex;
use webb_relayer_config::StatusConfig;
use webb_relayer_evm::{PublishedMessage, ReceiptSource};
use webb_relayer_payloads::{
    DeliveryInstruction, DeliveryInstructionsContainer, ExecutionParameters,
    RedeliveryByTxHashInstruction,
};
use webb_relayer_types::{ChainContracts, ContractMap, WormholeChainId};
use webb_relayer_utils::{Error, Result};

use crate::{
    BlockRange, BlockSpec, DeliveryEvent, DeliveryEventSource, DeliveryInfo,
    DeliveryStatus, StatusReconstructor,
};

const SOURCE: WormholeChainId = 2;
const AVALANCHE: WormholeChainId = 6;
const BSC: WormholeChainId = 4;
const LATEST: u64 = 10_000;

fn relay() -> Address {
    Address::repeat_byte(0xaa)
}

fn bridge() -> Address {
    Address::repeat_byte(0xcc)
}

#[derive(Default)]
struct FakeReceipts {
    logs: HashMap<H256, Vec<Log>>,
}

#[async_trait::async_trait]
impl ReceiptSource for FakeReceipts {
    async fn fetch_by_transaction(
        &self,
        _chain_id: WormholeChainId,
        tx_hash: H256,
    ) -> Result<Vec<Log>> {
        self.logs
            .get(&tx_hash)
            .cloned()
            .ok_or(Error::TransactionNotFound(tx_hash))
    }
}

/// Delivery events per target chain, each with the block it landed in.
#[derive(Default)]
struct FakeEvents {
    events: HashMap<WormholeChainId, Vec<(u64, DeliveryEvent)>>,
    queries: Mutex<Vec<(WormholeChainId, u64, u64)>>,
}

#[async_trait::async_trait]
impl DeliveryEventSource for FakeEvents {
    async fn latest_block(&self, _chain_id: WormholeChainId) -> Result<u64> {
        Ok(LATEST)
    }

    async fn delivery_events(
        &self,
        chain_id: WormholeChainId,
        source_chain: WormholeChainId,
        sequence: u64,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<DeliveryEvent>> {
        self.queries.lock().push((chain_id, from_block, to_block));
        Ok(self
            .events
            .get(&chain_id)
            .into_iter()
            .flatten()
            .filter(|(block, e)| {
                (from_block..=to_block).contains(block)
                    && e.source_chain == source_chain
                    && e.sequence == sequence
            })
            .map(|(_, e)| e.clone())
            .collect())
    }
}

fn contracts() -> ContractMap {
    let mut map = ContractMap::new();
    map.insert(
        SOURCE,
        ChainContracts {
            relay_contract: relay(),
            core_bridge: bridge(),
            relay_provider: None,
        },
    );
    map
}

fn instruction(target_chain: WormholeChainId) -> DeliveryInstruction {
    DeliveryInstruction {
        target_chain,
        target_address: H256::repeat_byte(0x11),
        refund_address: H256::repeat_byte(0x22),
        maximum_refund_target: U256::from(1_000u64),
        receiver_value_target: U256::from(5u64),
        execution_parameters: ExecutionParameters {
            version: 1,
            gas_limit: 250_000,
            provider_delivery_address: H256::repeat_byte(0x33),
        },
    }
}

fn relay_log(sequence: u64, payload: Vec<u8>) -> Log {
    PublishedMessage {
        sender: relay(),
        sequence,
        nonce: 1,
        payload: Bytes::from(payload),
        consistency_level: 1,
    }
    .to_log(bridge())
}

fn delivery_payload(targets: &[WormholeChainId]) -> Vec<u8> {
    DeliveryInstructionsContainer {
        sufficiently_funded: true,
        messages: vec![],
        instructions: targets.iter().map(|t| instruction(*t)).collect(),
    }
    .encode()
    .unwrap()
}

fn event(sequence: u64, status: u8, tx: u8) -> DeliveryEvent {
    DeliveryEvent {
        recipient_contract: Address::repeat_byte(0x11),
        source_chain: SOURCE,
        sequence,
        delivery_vaa_hash: H256::repeat_byte(0x44),
        status,
        tx_hash: Some(H256::repeat_byte(tx)),
    }
}

fn reconstructor(
    receipts: FakeReceipts,
    events: Arc<FakeEvents>,
) -> StatusReconstructor {
    StatusReconstructor::new(
        Arc::new(receipts),
        events,
        contracts(),
        &StatusConfig { block_range: 2040 },
    )
}

#[tokio::test]
async fn classifies_every_target() {
    let tx = H256::repeat_byte(0x01);
    let mut receipts = FakeReceipts::default();
    receipts
        .logs
        .insert(tx, vec![relay_log(12, delivery_payload(&[AVALANCHE, BSC]))]);
    let mut events = FakeEvents::default();
    events.events.insert(
        AVALANCHE,
        vec![
            (9_000, event(12, 1, 0xe1)),
            (9_100, event(12, 0, 0xe2)),
            // another delivery, same target.
            (9_200, event(13, 0, 0xe3)),
        ],
    );
    let events = Arc::new(events);
    let info = reconstructor(receipts, events.clone())
        .reconstruct(SOURCE, tx, None)
        .await
        .unwrap();

    let DeliveryInfo::Delivery {
        sequence,
        target_statuses,
        ..
    } = &info
    else {
        panic!("expected a delivery, got {info:?}");
    };
    assert_eq!(*sequence, 12);
    assert_eq!(target_statuses.len(), 2);

    let avalanche = &target_statuses[0];
    assert_eq!(avalanche.chain_id, AVALANCHE);
    let statuses: Vec<_> = avalanche.attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![DeliveryStatus::ReceiverFailure, DeliveryStatus::DeliverySuccess]
    );
    assert_eq!(avalanche.attempts[1].tx_hash, Some(H256::repeat_byte(0xe2)));

    let bsc = &target_statuses[1];
    assert_eq!(bsc.attempts.len(), 1);
    assert_eq!(
        bsc.attempts[0].status,
        DeliveryStatus::DeliveryDidntHappenWithinRange {
            from: LATEST - 2040,
            to: LATEST
        }
    );
    assert_eq!(bsc.attempts[0].tx_hash, None);

    let mut queries = events.queries.lock().clone();
    queries.sort();
    assert_eq!(
        queries,
        vec![(BSC, LATEST - 2040, LATEST), (AVALANCHE, LATEST - 2040, LATEST)]
    );

    let report = info.to_string();
    assert!(report.contains("sent to 2 destinations"));
    assert!(report.contains("Delivery attempt 1: Receiver Failure"));
    assert!(report.contains("Delivery attempt 2: Delivery Success"));
    assert!(report.contains("Delivery didn't happen within blocks 7960 to 10000"));
}

#[tokio::test]
async fn unknown_codes_are_surfaced() {
    let tx = H256::repeat_byte(0x02);
    let mut receipts = FakeReceipts::default();
    receipts
        .logs
        .insert(tx, vec![relay_log(3, delivery_payload(&[AVALANCHE]))]);
    let mut events = FakeEvents::default();
    events
        .events
        .insert(AVALANCHE, vec![(9_999, event(3, 7, 0xe1))]);
    let info = reconstructor(receipts, Arc::new(events))
        .reconstruct(SOURCE, tx, None)
        .await
        .unwrap();
    let DeliveryInfo::Delivery { target_statuses, .. } = info else {
        panic!("expected a delivery");
    };
    assert_eq!(
        target_statuses[0].attempts[0].status,
        DeliveryStatus::ThisShouldNeverHappen(7)
    );
}

#[tokio::test]
async fn events_outside_the_range_do_not_count() {
    let tx = H256::repeat_byte(0x03);
    let mut receipts = FakeReceipts::default();
    receipts
        .logs
        .insert(tx, vec![relay_log(3, delivery_payload(&[AVALANCHE]))]);
    let mut events = FakeEvents::default();
    events
        .events
        .insert(AVALANCHE, vec![(500, event(3, 0, 0xe1))]);
    let range = BlockRange {
        from: BlockSpec::Number(1_000),
        to: BlockSpec::Number(2_000),
    };
    let info = reconstructor(receipts, Arc::new(events))
        .with_range(range)
        .reconstruct(SOURCE, tx, None)
        .await
        .unwrap();
    let DeliveryInfo::Delivery { target_statuses, .. } = info else {
        panic!("expected a delivery");
    };
    assert_eq!(
        target_statuses[0].attempts[0].status,
        DeliveryStatus::DeliveryDidntHappenWithinRange {
            from: 1_000,
            to: 2_000
        }
    );
}

#[tokio::test]
async fn redelivery_needs_no_target_queries() {
    let tx = H256::repeat_byte(0x04);
    let redelivery = RedeliveryByTxHashInstruction {
        source_chain: SOURCE,
        source_tx_hash: H256::repeat_byte(0x01),
        delivery_vaa_sequence: 12,
        target_chain: AVALANCHE,
        multisend_index: 0,
        new_maximum_refund_target: U256::from(9_000u64),
        new_receiver_value_target: U256::from(1u64),
        execution_parameters: instruction(AVALANCHE).execution_parameters,
    };
    let mut receipts = FakeReceipts::default();
    receipts.logs.insert(tx, vec![relay_log(20, redelivery.encode())]);
    let events = Arc::new(FakeEvents::default());

    let info = reconstructor(receipts, events.clone())
        .reconstruct(SOURCE, tx, None)
        .await
        .unwrap();
    assert_eq!(
        info,
        DeliveryInfo::Redelivery {
            source_chain: SOURCE,
            source_tx: tx,
            instruction: redelivery,
        }
    );
    assert!(events.queries.lock().is_empty());
    let report = info.to_string();
    assert!(report.contains("New max amount (in target chain currency) to use for gas: 9000"));
    assert!(report.contains("to pass into target address: 1"));
}

#[tokio::test]
async fn index_selects_among_relay_messages() {
    let tx = H256::repeat_byte(0x05);
    let mut receipts = FakeReceipts::default();
    receipts.logs.insert(
        tx,
        vec![
            relay_log(30, delivery_payload(&[AVALANCHE])),
            relay_log(31, delivery_payload(&[BSC])),
        ],
    );
    let reconstructor =
        reconstructor(receipts, Arc::new(FakeEvents::default()));

    let second = reconstructor.reconstruct(SOURCE, tx, Some(1)).await.unwrap();
    let DeliveryInfo::Delivery { sequence, target_statuses, .. } = second else {
        panic!("expected a delivery");
    };
    assert_eq!(sequence, 31);
    assert_eq!(target_statuses[0].chain_id, BSC);

    let err = reconstructor
        .reconstruct(SOURCE, tx, Some(2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LogIndexOutOfRange { index: 2, len: 2 }));
}

#[tokio::test]
async fn unknown_source_chain_is_an_error() {
    let err = reconstructor(FakeReceipts::default(), Arc::new(FakeEvents::default()))
        .reconstruct(BSC, H256::zero(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChainNotFound { .. }));
}
