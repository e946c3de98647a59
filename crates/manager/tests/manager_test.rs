mod common;

use common::{strong_candidate, test_config, StaticFeed};
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use stealth_trade_core::{
    BrokerPosition, EngineEvent, ExitReason, GatewayError, Position, PositionStatus, Side,
    TradeStore,
};
use stealth_trade_data::InMemoryTradeStore;
use stealth_trade_gateway::PaperGateway;
use stealth_trade_manager::{
    ManagerDeps, ManagerHandle, OpenResult, PositionOutcome, TradeManager,
};
use stealth_trade_risk::RiskRejectReason;
use uuid::Uuid;

struct Harness {
    handle: ManagerHandle,
    feed: Arc<StaticFeed>,
    gateway: Arc<PaperGateway>,
    store: Arc<InMemoryTradeStore>,
}

fn spawn_manager(config: stealth_trade_core::EngineConfig) -> Harness {
    let feed = Arc::new(StaticFeed::new());
    let gateway = Arc::new(PaperGateway::new(0.0, 0.0));
    let store = Arc::new(InMemoryTradeStore::new());
    let handle = TradeManager::spawn(
        config,
        ManagerDeps {
            gateway: gateway.clone(),
            feed: feed.clone(),
            store: store.clone(),
            notifier: Arc::new(stealth_trade_core::NoopNotifier),
        },
    );
    Harness {
        handle,
        feed,
        gateway,
        store,
    }
}

fn outcome_for(
    updates: &[stealth_trade_manager::PositionUpdate],
    symbol: &str,
) -> PositionOutcome {
    updates
        .iter()
        .find(|u| u.symbol == symbol)
        .unwrap_or_else(|| panic!("no update for {symbol}"))
        .outcome
        .clone()
}

#[tokio::test]
async fn full_lifecycle_open_trail_stop_out() {
    let h = spawn_manager(test_config());
    let mut events = h.handle.subscribe();
    h.feed.set("ABC", dec!(100));

    // Open: 10% of $10k cash x 1.5 prime tier = $1,500 => 15 shares at $100.
    let result = h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap();
    let OpenResult::Opened { quantity, fill_price, .. } = result else {
        panic!("expected open, got {result:?}");
    };
    assert_eq!(quantity, 15);
    assert_eq!(fill_price, dec!(100));
    assert!(matches!(
        events.recv().await.unwrap(),
        EngineEvent::PositionOpened { .. }
    ));

    // Rally to $103: trailing activates, stop ratchets to $101.
    h.feed.set("ABC", dec!(103));
    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::StopTightened { stop } if stop == dec!(101)
    ));

    // Pullback to $100.50 breaches the ratcheted stop, never the static $98.
    h.feed.set("ABC", dec!(100.50));
    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::Closed { realized_pnl, reason: ExitReason::Stop }
            if realized_pnl == dec!(7.50)
    ));

    let trades = h.store.load_trades().await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].realized_pnl, dec!(7.50));

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.open_positions, 0);
    assert_eq!(status.equity, dec!(10007.50));
    assert_eq!(status.cash_available, dec!(10007.50));
}

#[tokio::test]
async fn second_signal_for_open_symbol_rejected() {
    let h = spawn_manager(test_config());
    h.feed.set("ABC", dec!(100));

    let first = h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap();
    assert!(matches!(first, OpenResult::Opened { .. }));

    let second = h.handle.process_signal(strong_candidate("ABC", 0.95)).await.unwrap();
    assert!(matches!(
        second,
        OpenResult::RejectedByRisk {
            reason: RiskRejectReason::SymbolAlreadyOpen
        }
    ));

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.open_positions, 1);
}

#[tokio::test]
async fn losing_streak_trips_safe_mode_and_blocks_entries() {
    let mut config = test_config();
    config.risk.max_consecutive_losses = 2;
    let h = spawn_manager(config);

    for symbol in ["AAA", "BBB"] {
        h.feed.set(symbol, dec!(100));
        let result = h.handle.process_signal(strong_candidate(symbol, 0.90)).await.unwrap();
        assert!(matches!(result, OpenResult::Opened { .. }), "{symbol}: {result:?}");

        // Drop through the static 2% stop.
        h.feed.set(symbol, dec!(97));
        let updates = h.handle.refresh_now().await.unwrap();
        assert!(matches!(
            outcome_for(&updates, symbol),
            PositionOutcome::Closed { reason: ExitReason::Stop, .. }
        ));
    }

    let status = h.handle.status().await.unwrap();
    assert!(status.safe_mode);

    // Maximum-confidence signal is still rejected.
    h.feed.set("CCC", dec!(100));
    let result = h.handle.process_signal(strong_candidate("CCC", 0.99)).await.unwrap();
    assert!(matches!(
        result,
        OpenResult::RejectedByRisk {
            reason: RiskRejectReason::SafeModeActive
        }
    ));
}

#[tokio::test]
async fn daily_trade_ceiling_gates_new_opens_only() {
    let mut config = test_config();
    config.risk.max_daily_trades = 1;
    let h = spawn_manager(config);
    h.feed.set("AAA", dec!(100));
    h.feed.set("BBB", dec!(100));

    let first = h.handle.process_signal(strong_candidate("AAA", 0.90)).await.unwrap();
    assert!(matches!(first, OpenResult::Opened { .. }));

    let second = h.handle.process_signal(strong_candidate("BBB", 0.90)).await.unwrap();
    assert!(matches!(
        second,
        OpenResult::RejectedByRisk {
            reason: RiskRejectReason::DailyTradeCapReached
        }
    ));

    // Closes are still permitted at the cap.
    h.feed.set("AAA", dec!(97));
    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "AAA"),
        PositionOutcome::Closed { .. }
    ));
}

#[tokio::test]
async fn open_failure_rolls_back_reservation() {
    let h = spawn_manager(test_config());
    h.feed.set("ABC", dec!(100));
    h.gateway
        .script_failure(GatewayError::Rejected("insufficient margin".to_string()));

    let result = h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap();
    assert!(matches!(result, OpenResult::Failed { .. }));

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.cash_available, dec!(10000));
    assert_eq!(status.open_positions, 0);

    // The account is untouched; the next attempt opens normally.
    let retry = h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap();
    assert!(matches!(retry, OpenResult::Opened { .. }));
}

#[tokio::test]
async fn failed_close_stays_closing_and_retries_next_cycle() {
    let h = spawn_manager(test_config());
    h.feed.set("ABC", dec!(100));
    assert!(matches!(
        h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap(),
        OpenResult::Opened { .. }
    ));

    // Breach the stop while the gateway is down for one call.
    h.feed.set("ABC", dec!(97));
    h.gateway
        .script_failure(GatewayError::Unknown("connection reset".to_string()));
    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::CloseFailed { attempts: 1 }
    ));

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.open_positions, 1); // still held, in Closing

    // Gateway recovered: the retry settles the close.
    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::Closed { reason: ExitReason::Stop, .. }
    ));
    assert_eq!(h.store.load_trades().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_price_skips_position_for_the_cycle() {
    let h = spawn_manager(test_config());
    h.feed.set("ABC", dec!(100));
    assert!(matches!(
        h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap(),
        OpenResult::Opened { .. }
    ));

    h.feed.clear("ABC");
    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::Skipped
    ));

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.open_positions, 1);
}

#[tokio::test]
async fn manual_force_close_flows_through_next_refresh() {
    let h = spawn_manager(test_config());
    h.feed.set("ABC", dec!(100));
    assert!(matches!(
        h.handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap(),
        OpenResult::Opened { .. }
    ));

    assert!(h.handle.force_close("ABC").await.unwrap());
    assert!(!h.handle.force_close("NOPE").await.unwrap());

    let updates = h.handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::Closed { reason: ExitReason::Forced(_), .. }
    ));
}

fn persisted_closing_position(symbol: &str) -> Position {
    Position {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        side: Side::Long,
        quantity: 10,
        entry_price: dec!(100),
        opened_at: Utc::now(),
        stop_price: dec!(98),
        target_price: dec!(104),
        trailing_ref: dec!(100),
        status: PositionStatus::Closing,
        exit_reason: Some(ExitReason::Stop),
        close_attempts: 0,
        next_close_attempt_at: None,
    }
}

#[tokio::test]
async fn recovery_resumes_closing_position_without_duplicates() {

    let feed = Arc::new(StaticFeed::new());
    let gateway = Arc::new(PaperGateway::new(0.0, 0.0));
    let store = Arc::new(InMemoryTradeStore::new());

    // Crash left a Closing position behind; the broker still holds it.
    let position = persisted_closing_position("ABC");
    store.upsert_position(&position).await.unwrap();
    gateway.seed_position(BrokerPosition {
        symbol: "ABC".to_string(),
        side: Side::Long,
        quantity: 10,
        avg_price: dec!(100),
    });
    feed.set("ABC", dec!(97.50));

    let handle = TradeManager::spawn(
        test_config(),
        ManagerDeps {
            gateway: gateway.clone(),
            feed: feed.clone(),
            store: store.clone(),
            notifier: Arc::new(stealth_trade_core::NoopNotifier),
        },
    );

    let status = handle.status().await.unwrap();
    assert!(!status.halted);
    assert_eq!(status.open_positions, 1);

    // First refresh submits the pending close exactly once.
    let updates = handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::Closed { reason: ExitReason::Stop, .. }
    ));
    assert_eq!(store.load_trades().await.unwrap().len(), 1);

    // Further refreshes are no-ops: no duplicate trades, no double closes.
    let updates = handle.refresh_now().await.unwrap();
    assert!(updates.is_empty());
    assert_eq!(store.load_trades().await.unwrap().len(), 1);

    // A full restart against the same store finds nothing left to do.
    let restarted = TradeManager::spawn(
        test_config(),
        ManagerDeps {
            gateway,
            feed,
            store: store.clone(),
            notifier: Arc::new(stealth_trade_core::NoopNotifier),
        },
    );
    let status = restarted.status().await.unwrap();
    assert_eq!(status.open_positions, 0);
    assert_eq!(store.load_trades().await.unwrap().len(), 1);
}

#[tokio::test]
async fn reconciliation_mismatch_halts_until_cleared() {

    let feed = Arc::new(StaticFeed::new());
    let gateway = Arc::new(PaperGateway::new(0.0, 0.0));
    let store = Arc::new(InMemoryTradeStore::new());

    // Persisted position the gateway knows nothing about.
    store
        .upsert_position(&persisted_closing_position("GHOST"))
        .await
        .unwrap();

    let handle = TradeManager::spawn(
        test_config(),
        ManagerDeps {
            gateway,
            feed: feed.clone(),
            store,
            notifier: Arc::new(stealth_trade_core::NoopNotifier),
        },
    );

    let status = handle.status().await.unwrap();
    assert!(status.halted);

    feed.set("ABC", dec!(100));
    let result = handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap();
    assert!(matches!(result, OpenResult::Halted));

    // Operator resolves the discrepancy and releases the halt.
    handle.clear_halt(false).await.unwrap();
    let result = handle.process_signal(strong_candidate("ABC", 0.90)).await.unwrap();
    assert!(matches!(result, OpenResult::Opened { .. }));
}

#[tokio::test]
async fn orphaned_gateway_position_is_adopted() {
    let feed = Arc::new(StaticFeed::new());
    let gateway = Arc::new(PaperGateway::new(0.0, 0.0));
    let store = Arc::new(InMemoryTradeStore::new());

    // An out-of-band fill landed while the engine was down.
    gateway.seed_position(BrokerPosition {
        symbol: "ABC".to_string(),
        side: Side::Long,
        quantity: 10,
        avg_price: dec!(100),
    });

    let handle = TradeManager::spawn(
        test_config(),
        ManagerDeps {
            gateway,
            feed: feed.clone(),
            store: store.clone(),
            notifier: Arc::new(stealth_trade_core::NoopNotifier),
        },
    );

    let status = handle.status().await.unwrap();
    assert!(!status.halted);
    assert_eq!(status.open_positions, 1);

    // The adopted position is fully managed: it can be closed.
    assert!(handle.force_close("ABC").await.unwrap());
    feed.set("ABC", dec!(101));
    let updates = handle.refresh_now().await.unwrap();
    assert!(matches!(
        outcome_for(&updates, "ABC"),
        PositionOutcome::Closed { reason: ExitReason::Forced(_), .. }
    ));
    assert_eq!(store.load_trades().await.unwrap().len(), 1);
}
