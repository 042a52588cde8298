//! Paperfeed connector implementation.
//!
//! Implements the xconn Connector trait over a synthetic feed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info, warn, Dispatch};

use crate::config::PaperfeedConfig;
use xconn_api::{
    ConnState, Connector, EventQueue, OrderRequest, OrderUpdate, PositionUpdate, PriceTick,
    TickerUpdate,
};

const EXCHANGE: &str = "paperfeed";

/// Granularity at which connector-owned threads re-check the run flag.
const RUN_CHECK: Duration = Duration::from_millis(10);

/// State shared with connector-owned threads.
struct Shared {
    running: AtomicBool,
    producers: Mutex<Vec<JoinHandle<()>>>,
    next_order_id: AtomicU64,
    positions: Mutex<HashMap<String, f64>>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
            producers: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(0),
            positions: Mutex::new(HashMap::new()),
        }
    }
}

pub struct PaperfeedConnector {
    config: PaperfeedConfig,
    initialized: bool,
    verbosity: u8,
    state: ConnState,
    trades: Option<Arc<EventQueue<PriceTick>>>,
    ticker: Option<Arc<EventQueue<TickerUpdate>>>,
    orders: Option<Arc<EventQueue<OrderUpdate>>>,
    positions: Option<Arc<EventQueue<PositionUpdate>>>,
    shared: Arc<Shared>,
}

impl Default for PaperfeedConnector {
    fn default() -> Self {
        Self {
            config: PaperfeedConfig::default(),
            initialized: false,
            verbosity: 1,
            state: ConnState::Closed,
            trades: None,
            ticker: None,
            orders: None,
            positions: None,
            shared: Arc::new(Shared::default()),
        }
    }
}

impl Connector for PaperfeedConnector {
    fn init(&mut self, config: &Value, verbosity: u8, log_sink: &Dispatch) {
        // Adopt the host's dispatcher: as a cdylib this module owns a
        // separate tracing global, and events would otherwise go nowhere.
        let _ = tracing::dispatcher::set_global_default(log_sink.clone());
        self.verbosity = verbosity;

        let parsed: PaperfeedConfig = match serde_json::from_value(config.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "invalid paperfeed configuration");
                return;
            }
        };
        if parsed.instruments.is_empty() {
            warn!("paperfeed configuration lists no instruments");
            return;
        }

        info!(
            instruments = parsed.instruments.len(),
            verbosity, "paperfeed initialized"
        );
        self.config = parsed;
        self.initialized = true;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn bind_trades_queue(&mut self, queue: Arc<EventQueue<PriceTick>>) {
        self.trades = Some(queue);
    }

    fn bind_ticker_queue(&mut self, queue: Arc<EventQueue<TickerUpdate>>) {
        self.ticker = Some(queue);
    }

    fn bind_order_queue(&mut self, queue: Arc<EventQueue<OrderUpdate>>) {
        self.orders = Some(queue);
    }

    fn bind_position_queue(&mut self, queue: Arc<EventQueue<PositionUpdate>>) {
        self.positions = Some(queue);
    }

    fn connect(&mut self, _config: &Value) -> ConnState {
        if !self.initialized {
            warn!("connect called before successful init");
            self.state = ConnState::Failed;
            return self.state;
        }
        self.state = ConnState::Connecting;
        debug!(verbosity = self.verbosity, "paperfeed connecting");
        if self.config.fail_connect {
            warn!("simulated transport outage");
            self.state = ConnState::Failed;
            return self.state;
        }
        info!(
            instruments = self.config.instruments.len(),
            "paper transport opened"
        );
        self.state = ConnState::Opened;
        self.state
    }

    fn test_connectivity(&self) {
        let rtt_ms: f64 = rand::rng().random_range(0.2..2.5);
        info!(rtt_ms, "simulated ping/pong round trip");
    }

    fn subscribe(&self, _config: &Value) {
        let trades = match &self.trades {
            Some(trades) => trades,
            None => {
                warn!("subscribe called without a bound trades queue");
                return;
            }
        };

        for instrum in &self.config.instruments {
            let name = format!("paperfeed-{}", instrum.to_lowercase());
            let feed = FeedWorker {
                shared: Arc::clone(&self.shared),
                trades: Arc::clone(trades),
                ticker: self.ticker.clone(),
                instrum: instrum.clone(),
                asset_class: self.config.asset_class.clone(),
                interval: Duration::from_millis(self.config.tick_interval_ms.max(1)),
                price: self.config.start_price,
            };
            match thread::Builder::new().name(name).spawn(move || feed.run()) {
                Ok(handle) => match self.shared.producers.lock() {
                    Ok(mut producers) => producers.push(handle),
                    Err(poisoned) => poisoned.into_inner().push(handle),
                },
                Err(err) => warn!(%instrum, error = %err, "failed to spawn feed thread"),
            }
        }
        info!(
            channels = self.config.instruments.len(),
            "subscribed to paper channels"
        );
    }

    fn keep_alive(&mut self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let ping = Duration::from_millis(self.config.ping_interval_ms.max(1));
        thread::spawn(move || {
            let mut last_beat = Instant::now();
            while shared.running.load(Ordering::SeqCst) {
                thread::sleep(RUN_CHECK);
                if last_beat.elapsed() >= ping {
                    debug!("heartbeat");
                    last_beat = Instant::now();
                }
            }
            // Drain producer threads before returning: once the keep-alive
            // handle is joined, no module-internal thread remains and the
            // host may unload the library.
            let drained: Vec<JoinHandle<()>> = match shared.producers.lock() {
                Ok(mut producers) => producers.drain(..).collect(),
                Err(poisoned) => poisoned.into_inner().drain(..).collect(),
            };
            for handle in drained {
                handle.join().ok();
            }
            debug!("keep-alive task finished");
        })
    }

    fn new_perpetual_order(&self, request: &OrderRequest) -> String {
        if self.state != ConnState::Opened {
            warn!(instrum = %request.instrum, "order rejected: connector not opened");
            return String::new();
        }

        let seq = self.shared.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("paper-{seq}");
        let cl_order_id = request
            .cl_order_id
            .clone()
            .unwrap_or_else(|| format!("cl-{seq}"));
        let timestamp = Utc::now().timestamp_millis();

        if let Some(orders) = &self.orders {
            let mut ack = OrderUpdate {
                exchange: EXCHANGE.to_string(),
                asset_class: self.config.asset_class.clone(),
                instrum: request.instrum.clone(),
                timestamp,
                id: order_id.clone(),
                cl_order_id: cl_order_id.clone(),
                side: request.side.clone(),
                order_type: request.order_type.clone(),
                time_in_force: request.time_in_force.clone(),
                pos_side: request.pos_side.clone(),
                post_only: request.post_only,
                price: request.price,
                quantity: request.quantity,
                filled: 0.0,
                state: "NEW".to_string(),
                lid: 0,
            };
            ack.update_local_id();
            orders.push(ack.clone());

            // Paper orders fill immediately and in full.
            let mut fill = ack;
            fill.timestamp = timestamp + 1;
            fill.filled = request.quantity;
            fill.state = "FILLED".to_string();
            fill.update_local_id();
            orders.push(fill);
        }

        let signed = if request.side.eq_ignore_ascii_case("SELL") {
            -request.quantity
        } else {
            request.quantity
        };
        let net = {
            let mut book = match self.shared.positions.lock() {
                Ok(book) => book,
                Err(poisoned) => poisoned.into_inner(),
            };
            let entry = book.entry(request.instrum.clone()).or_insert(0.0);
            *entry += signed;
            *entry
        };
        if let Some(positions) = &self.positions {
            let mut update = PositionUpdate {
                exchange: EXCHANGE.to_string(),
                asset_class: self.config.asset_class.clone(),
                instrum: request.instrum.clone(),
                timestamp: timestamp + 1,
                pos_side: request.pos_side.clone(),
                size: net,
                entry_price: request.price,
                unrealized_pnl: 0.0,
                leverage: 1.0,
                lid: 0,
            };
            update.update_local_id();
            positions.push(update);
        }

        info!(%order_id, %cl_order_id, instrum = %request.instrum, "paper order accepted");
        cl_order_id
    }

    fn cancel_future_order(&self, instrum: &str, order_id: &str, lid: u64) {
        if let Some(orders) = &self.orders {
            let mut update = OrderUpdate {
                exchange: EXCHANGE.to_string(),
                asset_class: self.config.asset_class.clone(),
                instrum: instrum.to_string(),
                timestamp: Utc::now().timestamp_millis(),
                id: order_id.to_string(),
                state: "CANCELED".to_string(),
                ..OrderUpdate::default()
            };
            update.update_local_id();
            orders.push(update);
        }
        debug!(%order_id, lid, "paper order canceled");
    }

    fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            info!("paperfeed connector stopping");
        }
    }
}

/// One synthetic producer: a bounded random walk for a single instrument.
struct FeedWorker {
    shared: Arc<Shared>,
    trades: Arc<EventQueue<PriceTick>>,
    ticker: Option<Arc<EventQueue<TickerUpdate>>>,
    instrum: String,
    asset_class: String,
    interval: Duration,
    price: f64,
}

impl FeedWorker {
    fn run(mut self) {
        let mut rng = rand::rng();
        let mut seq = 0u64;
        while self.shared.running.load(Ordering::SeqCst) {
            thread::sleep(self.interval);
            let drift: f64 = rng.random_range(-0.0005..0.0005);
            self.price = (self.price * (1.0 + drift)).max(0.01);
            let timestamp = Utc::now().timestamp_millis();

            let mut tick = PriceTick {
                exchange: EXCHANGE.to_string(),
                asset_class: self.asset_class.clone(),
                instrum: self.instrum.clone(),
                timestamp,
                price: self.price,
                quantity: rng.random_range(0.001..1.0),
                lid: 0,
            };
            tick.update_local_id();
            self.trades.push(tick);

            seq += 1;
            if seq % 5 == 0 {
                if let Some(ticker) = &self.ticker {
                    let spread = self.price * 0.0001;
                    let mut update = TickerUpdate {
                        exchange: EXCHANGE.to_string(),
                        asset_class: self.asset_class.clone(),
                        instrum: self.instrum.clone(),
                        timestamp,
                        bid: self.price - spread,
                        bid_qty: rng.random_range(0.1..5.0),
                        ask: self.price + spread,
                        ask_qty: rng.random_range(0.1..5.0),
                        lid: 0,
                    };
                    update.update_local_id();
                    ticker.push(update);
                }
            }
        }
        debug!(instrum = %self.instrum, "feed thread finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(tick_interval_ms: u64) -> Value {
        serde_json::json!({
            "instruments": ["BTCUSDT"],
            "assetClass": "perpetual",
            "tickIntervalMs": tick_interval_ms,
            "pingIntervalMs": 20
        })
    }

    fn initialized_connector(section: &Value) -> PaperfeedConnector {
        let mut connector = PaperfeedConnector::default();
        connector.init(section, 0, &Dispatch::none());
        connector
    }

    #[test]
    fn test_default_is_uninitialized() {
        let connector = PaperfeedConnector::default();
        assert!(!connector.is_initialized());
    }

    #[test]
    fn test_init_rejects_malformed_section() {
        let mut connector = PaperfeedConnector::default();
        connector.init(
            &serde_json::json!({"instruments": 42}),
            0,
            &Dispatch::none(),
        );
        assert!(!connector.is_initialized());
    }

    #[test]
    fn test_init_rejects_empty_instruments() {
        let mut connector = PaperfeedConnector::default();
        connector.init(
            &serde_json::json!({"instruments": []}),
            0,
            &Dispatch::none(),
        );
        assert!(!connector.is_initialized());
    }

    #[test]
    fn test_connect_before_init_fails() {
        let mut connector = PaperfeedConnector::default();
        assert_eq!(connector.connect(&section(100)), ConnState::Failed);
    }

    #[test]
    fn test_connect_simulated_outage() {
        let section = serde_json::json!({
            "instruments": ["BTCUSDT"],
            "failConnect": true
        });
        let mut connector = initialized_connector(&section);
        assert_eq!(connector.connect(&section), ConnState::Failed);
    }

    #[test]
    fn test_stop_is_idempotent_before_init() {
        let connector = PaperfeedConnector::default();
        connector.stop();
        connector.stop();
    }

    #[test]
    fn test_feed_produces_finalized_ticks() {
        let section = section(5);
        let mut connector = initialized_connector(&section);

        let trades = Arc::new(EventQueue::unbounded());
        let ticker = Arc::new(EventQueue::unbounded());
        connector.bind_trades_queue(Arc::clone(&trades));
        connector.bind_ticker_queue(Arc::clone(&ticker));

        let keepalive = connector.keep_alive();
        assert_eq!(connector.connect(&section), ConnState::Opened);
        connector.subscribe(&section);

        let deadline = Instant::now() + Duration::from_secs(5);
        let tick = loop {
            if let Some(tick) = trades.pop_timeout(Duration::from_millis(50)) {
                break tick;
            }
            assert!(Instant::now() < deadline, "no synthetic tick produced");
        };

        connector.stop();
        keepalive.join().unwrap();

        assert_eq!(tick.exchange, EXCHANGE);
        assert_eq!(tick.instrum, "BTCUSDT");
        assert_ne!(tick.lid, 0);
        assert!(tick.price > 0.0);
    }

    #[test]
    fn test_order_flow_emits_updates_and_position() {
        let section = section(1000);
        let mut connector = initialized_connector(&section);

        let orders = Arc::new(EventQueue::unbounded());
        let positions = Arc::new(EventQueue::unbounded());
        connector.bind_order_queue(Arc::clone(&orders));
        connector.bind_position_queue(Arc::clone(&positions));
        assert_eq!(connector.connect(&section), ConnState::Opened);

        let request = OrderRequest {
            instrum: "BTCUSDT".to_string(),
            order_type: "LIMIT".to_string(),
            time_in_force: "GTC".to_string(),
            side: "BUY".to_string(),
            pos_side: "BOTH".to_string(),
            post_only: true,
            price: 29123.0,
            quantity: 0.5,
            cl_order_id: None,
        };
        let cl_order_id = connector.new_perpetual_order(&request);
        assert!(!cl_order_id.is_empty());

        let ack = orders.try_pop().unwrap();
        assert_eq!(ack.state, "NEW");
        assert!(ack.is_valid());
        assert_eq!(ack.cl_order_id, cl_order_id);

        let fill = orders.try_pop().unwrap();
        assert_eq!(fill.state, "FILLED");
        assert_eq!(fill.filled, 0.5);

        let position = positions.try_pop().unwrap();
        assert_eq!(position.size, 0.5);
        assert_eq!(position.instrum, "BTCUSDT");

        connector.cancel_future_order("BTCUSDT", &ack.id, ack.lid);
        let canceled = orders.try_pop().unwrap();
        assert_eq!(canceled.state, "CANCELED");
        assert_eq!(canceled.id, ack.id);

        connector.stop();
    }

    #[test]
    fn test_order_rejected_when_not_opened() {
        let connector = initialized_connector(&section(100));
        let request = OrderRequest {
            instrum: "BTCUSDT".to_string(),
            side: "BUY".to_string(),
            quantity: 1.0,
            ..OrderRequest::default()
        };
        assert!(connector.new_perpetual_order(&request).is_empty());
    }
}
