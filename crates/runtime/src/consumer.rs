//! Per-event-type consumer threads.
//!
//! One named OS thread per stream drains its bound queue with a bounded wait
//! and logs each record: market data through its column Display, orders and
//! positions as JSON. The streams are independent timelines; no ordering is
//! implied across queues.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::shutdown::ShutdownContext;
use xconn_api::{Connector, EventQueue, OrderUpdate, PositionUpdate, PriceTick, TickerUpdate};

/// Bounded wait per poll; consumers re-check the shutdown flag at this cadence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The four delivery queues, one per event type.
pub struct DispatchQueues {
    pub trades: Arc<EventQueue<PriceTick>>,
    pub ticker: Arc<EventQueue<TickerUpdate>>,
    pub orders: Arc<EventQueue<OrderUpdate>>,
    pub positions: Arc<EventQueue<PositionUpdate>>,
}

impl DispatchQueues {
    pub fn new() -> Self {
        Self {
            trades: Arc::new(EventQueue::unbounded()),
            ticker: Arc::new(EventQueue::unbounded()),
            orders: Arc::new(EventQueue::unbounded()),
            positions: Arc::new(EventQueue::unbounded()),
        }
    }

    /// Register every queue with the connector. Must precede `connect`.
    pub fn bind(&self, connector: &mut dyn Connector) {
        connector.bind_trades_queue(Arc::clone(&self.trades));
        connector.bind_ticker_queue(Arc::clone(&self.ticker));
        connector.bind_order_queue(Arc::clone(&self.orders));
        connector.bind_position_queue(Arc::clone(&self.positions));
    }
}

impl Default for DispatchQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Records consumed per stream over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerTotals {
    pub trades: u64,
    pub ticker: u64,
    pub orders: u64,
    pub positions: u64,
}

/// Join handles for the four consumer threads.
pub struct ConsumerWorkers {
    trades: JoinHandle<u64>,
    ticker: JoinHandle<u64>,
    orders: JoinHandle<u64>,
    positions: JoinHandle<u64>,
}

impl ConsumerWorkers {
    /// Join every consumer and collect the per-stream counts.
    pub fn join(self) -> ConsumerTotals {
        ConsumerTotals {
            trades: self.trades.join().unwrap_or(0),
            ticker: self.ticker.join().unwrap_or(0),
            orders: self.orders.join().unwrap_or(0),
            positions: self.positions.join().unwrap_or(0),
        }
    }
}

/// Spawn the four consumer threads against the bound queues.
///
/// Each runs until the shutdown flag flips, returning its consumed count.
pub fn spawn_consumers(
    queues: &DispatchQueues,
    ctx: &ShutdownContext,
) -> io::Result<ConsumerWorkers> {
    Ok(ConsumerWorkers {
        trades: spawn_consumer("trades-consumer", Arc::clone(&queues.trades), ctx.clone(), |record| {
            info!("{record}");
        })?,
        ticker: spawn_consumer("ticker-consumer", Arc::clone(&queues.ticker), ctx.clone(), |record| {
            info!("{record}");
        })?,
        orders: spawn_consumer("order-consumer", Arc::clone(&queues.orders), ctx.clone(), |record| {
            if let Ok(json) = serde_json::to_string(record) {
                info!("{json}");
            }
        })?,
        positions: spawn_consumer(
            "position-consumer",
            Arc::clone(&queues.positions),
            ctx.clone(),
            |record| {
                if let Ok(json) = serde_json::to_string(record) {
                    info!("{json}");
                }
            },
        )?,
    })
}

fn spawn_consumer<T, F>(
    name: &str,
    queue: Arc<EventQueue<T>>,
    ctx: ShutdownContext,
    log: F,
) -> io::Result<JoinHandle<u64>>
where
    T: Send + 'static,
    F: Fn(&T) + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(move || {
        let mut consumed = 0u64;
        while ctx.is_running() {
            if let Some(record) = queue.pop_timeout(POLL_INTERVAL) {
                log(&record);
                consumed += 1;
            }
        }
        consumed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tick(timestamp: i64) -> PriceTick {
        let mut tick = PriceTick {
            exchange: "binanceusdm".to_string(),
            asset_class: "perpetual".to_string(),
            instrum: "BTCUSDT".to_string(),
            timestamp,
            price: 29123.0,
            quantity: 0.1,
            lid: 0,
        };
        tick.update_local_id();
        tick
    }

    #[test]
    fn test_consumers_drain_and_report_counts() {
        let queues = DispatchQueues::new();
        let ctx = ShutdownContext::new();
        let workers = spawn_consumers(&queues, &ctx).unwrap();

        for i in 0..3 {
            queues.trades.push(sample_tick(1_700_000_000_000 + i));
        }
        let mut order = OrderUpdate {
            exchange: "binanceusdm".to_string(),
            instrum: "BTCUSDT".to_string(),
            timestamp: 1_700_000_000_000,
            id: "1".to_string(),
            state: "NEW".to_string(),
            ..OrderUpdate::default()
        };
        order.update_local_id();
        queues.orders.push(order);

        // Let the consumers observe the records, then wind down.
        thread::sleep(Duration::from_millis(150));
        ctx.request_shutdown();
        let totals = workers.join();

        assert_eq!(totals.trades, 3);
        assert_eq!(totals.orders, 1);
        assert_eq!(totals.ticker, 0);
        assert_eq!(totals.positions, 0);
        assert!(queues.trades.is_empty());
    }

    #[test]
    fn test_consumers_exit_promptly_on_shutdown() {
        let queues = DispatchQueues::new();
        let ctx = ShutdownContext::new();
        let workers = spawn_consumers(&queues, &ctx).unwrap();

        ctx.request_shutdown();
        let started = std::time::Instant::now();
        workers.join();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
