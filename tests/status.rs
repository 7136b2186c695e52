//! Status poller feeding the board and the forwarding engine.

use std::time::Duration;

use alloy::primitives::{Address, U256};

use donation_forwarder::forwarding::{engine_channel, EngineCommand};
use donation_forwarder::status::{StatusBoard, StatusPoller};

mod common;
use common::{eth, snapshot_with_balance, MockOracle};

fn poller(oracle: std::sync::Arc<MockOracle>, board: &StatusBoard) -> StatusPoller {
    StatusPoller::new(
        oracle,
        1,
        Address::repeat_byte(0xcc),
        "bcrt1qexample".to_string(),
        board.clone(),
    )
}

#[tokio::test]
async fn test_poll_publishes_and_feeds_engine_in_sequence() {
    let oracle = MockOracle::new([
        Ok(snapshot_with_balance(eth(1))),
        Ok(snapshot_with_balance(eth(2))),
    ]);
    let board = StatusBoard::new();
    let (handle, mut commands) = engine_channel(4);
    let mut poller = poller(oracle, &board).with_engine(handle);

    poller.poll_once().await.unwrap();
    poller.poll_once().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(command) = commands.try_recv() {
        match command {
            EngineCommand::BalanceObserved(s) => seen.push((s.amount, s.observed_at_poll_sequence)),
            EngineCommand::Retry => panic!("poller must not retry"),
        }
    }
    assert_eq!(seen, vec![(eth(1), 1), (eth(2), 2)]);

    let status = board.snapshot();
    assert_eq!(status.last_balance, Some(eth(2)));
    assert_eq!(status.last_poll_sequence, Some(2));
    assert_eq!(status.status.map(|s| s.fwd_balance), Some(eth(2)));
}

#[tokio::test]
async fn test_failed_poll_feeds_nothing() {
    let oracle = MockOracle::new([Err("node down".to_string())]);
    let board = StatusBoard::new();
    let (handle, mut commands) = engine_channel(4);
    let mut poller = poller(oracle, &board).with_engine(handle);

    assert!(poller.poll_once().await.is_err());
    assert!(commands.try_recv().is_err());
    assert_eq!(board.snapshot().last_balance, None);
}

#[tokio::test]
async fn test_poller_loop_runs_on_its_cadence() {
    let oracle = MockOracle::new([Ok(snapshot_with_balance(U256::from(5u64)))]);
    let board = StatusBoard::new();
    let mut rx = board.subscribe();

    let task = poller(oracle, &board).start(Duration::from_millis(1));
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.last_poll_sequence.is_some_and(|n| n >= 3)),
    )
    .await
    .expect("poller stalled")
    .unwrap();
    task.stop().await;
}
