//! Grid Orchestrator Integration Test
//!
//! Runs the orchestrator against the simulated exchange:
//! - First refresh builds and places the grid
//! - Fills are reversed and round trips booked
//! - Compounding reissues orders and resets the accumulator
//! - Reconciliation re-places vanished orders
//! - A fresh session adopts orders already resting on the exchange
//! - The run loop handles fills, resubscribes and shuts down cleanly

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stablegrid_core::{LevelState, OrderKind, OrderRef, Price, Side};
use stablegrid_exchange_sim::SimExchange;
use stablegrid_order_manager::{FillOutcome, RetryPolicy};
use stablegrid_ports::{ExchangeClient, ExchangeError, PlaceOrder};
use stablegrid_runner::{GridOrchestrator, GridSession, RunnerError, snapshot};
use stablegrid_strategy::{GridConfig, GridError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Ten levels between 0.98 and 1.02 around a 1.00 mid
fn tight_config() -> GridConfig {
    GridConfig {
        lower_bound: dec!(0.98),
        upper_bound: dec!(1.02),
        max_levels: 10,
        ..Default::default()
    }
}

fn setup(
    config: GridConfig,
    base: Decimal,
    quote: Decimal,
) -> (Arc<SimExchange>, GridOrchestrator<SimExchange>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let exchange = Arc::new(SimExchange::with_balances(dec!(1.0000), base, quote));
    let orchestrator = GridOrchestrator::new(
        exchange.clone(),
        GridSession::new(config),
        RetryPolicy::default(),
    )
    .unwrap();
    (exchange, orchestrator)
}

/// Highest buy level of the current grid
fn nearest_buy(orchestrator: &GridOrchestrator<SimExchange>) -> Price {
    orchestrator
        .grid()
        .unwrap()
        .levels()
        .iter()
        .filter(|l| l.side() == Side::Buy)
        .map(|l| l.price())
        .max()
        .unwrap()
}

/// Move the price below and back above the nearest buy level, handling fills
async fn one_round_trip(exchange: &SimExchange, orchestrator: &mut GridOrchestrator<SimExchange>) {
    let level = nearest_buy(orchestrator);
    for fill in exchange.set_price(level - dec!(0.0001)).await {
        orchestrator.handle_fill(fill).await.unwrap();
    }
    for fill in exchange.set_price(level + dec!(0.0001)).await {
        orchestrator.handle_fill(fill).await.unwrap();
    }
}

#[tokio::test]
async fn test_first_refresh_builds_and_places_grid() {
    let (exchange, mut orchestrator) = setup(GridConfig::default(), dec!(1000), dec!(1000));

    orchestrator.refresh_cycle().await.unwrap();

    let status = orchestrator.status();
    assert!(status.levels > 90);
    assert_eq!(status.open, status.levels);
    assert_eq!(status.pending, 0);
    assert_eq!(status.last_price, Some(dec!(1.0000)));
    assert_eq!(exchange.open_orders().await.unwrap().len(), status.levels);
    assert!(
        exchange
            .placed_orders()
            .await
            .iter()
            .all(|o| o.kind == OrderKind::Alo)
    );
}

#[tokio::test]
async fn test_second_refresh_places_nothing_new() {
    let (exchange, mut orchestrator) = setup(tight_config(), dec!(1000), dec!(1000));
    orchestrator.refresh_cycle().await.unwrap();
    let placed = exchange.placed_orders().await.len();

    orchestrator.refresh_cycle().await.unwrap();

    assert_eq!(exchange.placed_orders().await.len(), placed);
}

#[tokio::test]
async fn test_fill_reversal_books_round_trip() {
    let (exchange, mut orchestrator) = setup(tight_config(), dec!(1000), dec!(1000));
    orchestrator.refresh_cycle().await.unwrap();
    let level = nearest_buy(&orchestrator);

    let fills = exchange.set_price(level - dec!(0.0001)).await;
    assert_eq!(fills.len(), 1);
    let outcome = orchestrator.handle_fill(fills[0].clone()).await.unwrap();
    assert!(matches!(
        outcome,
        FillOutcome::Reversed {
            side: Side::Sell,
            round_trip_profit: None,
            ..
        }
    ));

    // Duplicate notification changes nothing
    let again = orchestrator.handle_fill(fills[0].clone()).await.unwrap();
    assert_eq!(again, FillOutcome::Ignored);

    for fill in exchange.set_price(level + dec!(0.0001)).await {
        orchestrator.handle_fill(fill).await.unwrap();
    }
    let status = orchestrator.status();
    assert_eq!(status.round_trips, 1);
    assert!(status.total_realized > Decimal::ZERO);
    assert_eq!(status.open, status.levels);
}

#[tokio::test]
async fn test_compounding_reissues_orders_and_resets() {
    // Large balances so one round trip clears the default 1.00 threshold
    let (exchange, mut orchestrator) = setup(tight_config(), dec!(100000), dec!(100000));
    orchestrator.refresh_cycle().await.unwrap();
    one_round_trip(&exchange, &mut orchestrator).await;
    assert!(orchestrator.status().realized_since_compound >= dec!(1.00));

    let before: HashSet<OrderRef> = orchestrator.grid().unwrap().resting_refs().into_iter().collect();
    let placed_before = exchange.placed_orders().await.len();
    orchestrator.refresh_cycle().await.unwrap();

    let status = orchestrator.status();
    assert_eq!(status.compound_count, 1);
    assert_eq!(status.realized_since_compound, Decimal::ZERO);
    assert_eq!(status.open, status.levels);

    let grid = orchestrator.grid().unwrap();
    let after: HashSet<OrderRef> = grid.resting_refs().into_iter().collect();
    assert!(before.is_disjoint(&after), "every order reissued");
    assert_eq!(
        exchange.placed_orders().await.len(),
        placed_before + grid.len()
    );

    // Buy levels share one notional; sell levels one quantity
    let sells: HashSet<Decimal> = grid
        .levels()
        .iter()
        .filter(|l| l.resting_side() == Side::Sell)
        .map(|l| l.size())
        .collect();
    assert_eq!(sells.len(), 1);
    let remote: HashSet<OrderRef> = exchange
        .open_orders()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_ref)
        .collect();
    assert_eq!(remote, after);
}

#[tokio::test]
async fn test_vanished_order_is_replaced() {
    let (exchange, mut orchestrator) = setup(tight_config(), dec!(1000), dec!(1000));
    orchestrator.refresh_cycle().await.unwrap();
    let level = orchestrator.grid().unwrap().levels()[0].clone();
    let lost = level.order_ref().unwrap();

    exchange.drop_order_silently(lost).await;
    orchestrator.refresh_cycle().await.unwrap();

    let replaced = &orchestrator.grid().unwrap().levels()[0];
    assert_eq!(replaced.state(), LevelState::Open);
    assert_ne!(replaced.order_ref(), Some(lost));
    assert_eq!(replaced.price(), level.price());
}

#[tokio::test]
async fn test_fresh_session_adopts_resting_orders() {
    let (exchange, mut first) = setup(tight_config(), dec!(1000), dec!(1000));
    first.refresh_cycle().await.unwrap();
    let resting = first.grid().unwrap().len();

    // Restart without a snapshot, with one stray order on the book
    let stray = exchange
        .place_order(PlaceOrder::new(dec!(0.9999), dec!(5), Side::Buy, OrderKind::Alo))
        .await
        .unwrap();
    let placed = exchange.placed_orders().await.len();
    let mut second = GridOrchestrator::new(
        exchange.clone(),
        GridSession::new(tight_config()),
        RetryPolicy::default(),
    )
    .unwrap();

    second.refresh_cycle().await.unwrap();

    let status = second.status();
    assert_eq!(status.levels, resting);
    assert_eq!(status.open, resting);
    assert_eq!(exchange.placed_orders().await.len(), placed, "nothing re-placed");
    let open = exchange.open_orders().await.unwrap();
    assert_eq!(open.len(), resting);
    assert!(open.iter().all(|o| o.order_ref != stray));
}

#[tokio::test]
async fn test_shape_change_rebuilds_grid() {
    let (exchange, mut orchestrator) = setup(tight_config(), dec!(1000), dec!(1000));
    orchestrator.refresh_cycle().await.unwrap();
    let old: HashSet<OrderRef> = orchestrator.grid().unwrap().resting_refs().into_iter().collect();

    orchestrator
        .update_config(GridConfig {
            upper_bound: dec!(1.05),
            ..tight_config()
        })
        .unwrap();
    orchestrator.refresh_cycle().await.unwrap();

    let grid = orchestrator.grid().unwrap();
    assert_eq!(grid.shape().upper_bound, dec!(1.05));
    let remote: HashSet<OrderRef> = exchange
        .open_orders()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_ref)
        .collect();
    assert!(remote.is_disjoint(&old));
    assert_eq!(remote.len(), grid.len());
}

#[tokio::test]
async fn test_invalid_config_update_rejected() {
    let (_exchange, mut orchestrator) = setup(tight_config(), dec!(1000), dec!(1000));

    let result = orchestrator.update_config(GridConfig {
        lower_bound: dec!(1.10),
        ..tight_config()
    });

    assert!(result.is_err());
    assert_eq!(orchestrator.session().config(), &tight_config());
}

#[tokio::test]
async fn test_out_of_range_price_fails_build() {
    let (exchange, mut orchestrator) = setup(tight_config(), dec!(1000), dec!(1000));
    exchange.set_price(dec!(1.0500)).await;

    assert!(orchestrator.refresh_cycle().await.is_err());
    assert!(orchestrator.grid().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_handles_fills_and_shuts_down() {
    let path = std::env::temp_dir().join(format!("stablegrid-run-{}.json", std::process::id()));
    let config = GridConfig {
        state_path: Some(path.clone()),
        ..tight_config()
    };
    let (exchange, mut orchestrator) = setup(config, dec!(1000), dec!(1000));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = async {
        // First tick fires immediately and builds the grid
        tokio::time::sleep(Duration::from_secs(1)).await;
        let level = orchestrator_level(&exchange).await;
        exchange.set_price(level - dec!(0.0001)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Stream drops; the loop resubscribes and keeps handling fills
        exchange.disconnect_fills().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        exchange.set_price(level + dec!(0.0001)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        shutdown_tx.send(true).unwrap();
    };

    let (result, ()) = tokio::join!(orchestrator.run(shutdown_rx), driver);
    result.unwrap();

    let status = orchestrator.status();
    assert_eq!(status.round_trips, 1);
    assert_eq!(status.open, status.levels);

    let saved = snapshot::load(&path).unwrap().unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(saved.grid.as_ref(), orchestrator.grid());
    assert_eq!(saved.compounding.round_trips, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_outlasts_fill_subscription_outage() {
    let path = std::env::temp_dir().join(format!("stablegrid-outage-{}.json", std::process::id()));
    let config = GridConfig {
        state_path: Some(path.clone()),
        ..tight_config()
    };
    let (exchange, mut orchestrator) = setup(config, dec!(1000), dec!(1000));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Longer than one retry round; the next refresh resubscribes
        exchange
            .fail_next_subscribes((0..7).map(|_| ExchangeError::Network("unreachable".into())))
            .await;
        exchange.disconnect_fills().await;
        tokio::time::sleep(Duration::from_secs(400)).await;

        let level = orchestrator_level(&exchange).await;
        exchange.set_price(level - dec!(0.0001)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        level
    };

    let (result, level) = tokio::join!(orchestrator.run(shutdown_rx), driver);
    result.unwrap();

    let grid = orchestrator.grid().unwrap();
    let reversed = &grid.levels()[grid.index_of_price(level).unwrap()];
    assert_eq!(reversed.resting_side(), Side::Sell);
    assert_eq!(reversed.state(), LevelState::Open);

    let saved = snapshot::load(&path).unwrap().unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(saved.grid.as_ref(), orchestrator.grid());
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_when_first_grid_unfundable() {
    let path = std::env::temp_dir().join(format!("stablegrid-unfunded-{}.json", std::process::id()));
    let config = GridConfig {
        state_path: Some(path.clone()),
        ..tight_config()
    };
    let (_exchange, mut orchestrator) = setup(config, dec!(5), dec!(5));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let err = orchestrator.run(shutdown_rx).await.unwrap_err();

    assert!(matches!(
        err,
        RunnerError::Grid(GridError::InsufficientCapital { .. })
    ));
    assert!(orchestrator.grid().is_none());
    // Session is still saved on the way out
    let saved = snapshot::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(saved.is_some_and(|s| s.grid.is_none()));
}

/// Highest resting buy on the exchange
async fn orchestrator_level(exchange: &SimExchange) -> Price {
    exchange
        .open_orders()
        .await
        .unwrap()
        .into_iter()
        .filter(|o| o.side == Side::Buy)
        .map(|o| o.price)
        .max()
        .unwrap()
}
