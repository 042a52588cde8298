//! The connector contract every loadable module implements.

use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Dispatch;

use crate::events::{OrderUpdate, PositionUpdate, PriceTick, TickerUpdate};
use crate::queue::EventQueue;
use crate::state::ConnState;

/// Parameters for a new perpetual order.
///
/// Submission results are not returned synchronously; they arrive on the
/// bound order queue and are correlated by `cl_order_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrum: String,
    pub order_type: String,
    pub time_in_force: String,
    pub side: String,
    pub pos_side: String,
    pub post_only: bool,
    pub price: f64,
    pub quantity: f64,
    /// Client order id; the connector assigns one when absent.
    pub cl_order_id: Option<String>,
}

/// Capability set a connector module exposes to the host.
///
/// Call-order contract, enforced by the host harness:
/// `init` (then check `is_initialized`) → queue binds → `keep_alive` →
/// `connect` → `subscribe`. Binding after production has started, or
/// re-initializing, is undefined. After `connect` the host stops calling
/// control methods; the instance is mutated only by its own internal threads.
pub trait Connector: Send {
    /// Initialize with the exchange's configuration sub-document.
    ///
    /// Failure is silent: the connector stays in a queryable uninitialized
    /// state instead of panicking, and callers must check
    /// [`is_initialized`](Connector::is_initialized) before proceeding.
    /// `log_sink` is the host's tracing dispatcher — a loaded module owns a
    /// separate global dispatcher, so it adopts this one to reach the host's
    /// subscriber.
    fn init(&mut self, config: &Value, verbosity: u8, log_sink: &Dispatch);

    fn is_initialized(&self) -> bool;

    /// Register the queue the connector's producers push trade prints into.
    /// Must happen before [`connect`](Connector::connect).
    fn bind_trades_queue(&mut self, queue: Arc<EventQueue<PriceTick>>);

    fn bind_ticker_queue(&mut self, queue: Arc<EventQueue<TickerUpdate>>);

    fn bind_order_queue(&mut self, queue: Arc<EventQueue<OrderUpdate>>);

    fn bind_position_queue(&mut self, queue: Arc<EventQueue<PositionUpdate>>);

    /// Perform the transport handshake.
    ///
    /// [`ConnState::Opened`] is the only success value; every other state is
    /// a hard failure for the caller.
    fn connect(&mut self, config: &Value) -> ConnState;

    /// Best-effort ping/pong latency probe, observable only via logs.
    fn test_connectivity(&self);

    /// Request exchange-side channel subscriptions. Assumes `Opened`.
    ///
    /// Failures are module-internal (retry/resubscribe belongs to the
    /// keep-alive task); nothing is surfaced to the caller.
    fn subscribe(&self, config: &Value);

    /// Start the connector-owned background task sustaining the transport
    /// (heartbeats, reconnection). The caller joins the handle at shutdown;
    /// once it is joined, no module-internal threads remain.
    fn keep_alive(&mut self) -> JoinHandle<()>;

    /// Submit a new perpetual order; returns the client order id used for
    /// correlation. The resulting updates arrive on the order queue.
    fn new_perpetual_order(&self, request: &OrderRequest) -> String;

    /// Request cancellation of a resting order. The result arrives on the
    /// order queue.
    fn cancel_future_order(&self, instrum: &str, order_id: &str, lid: u64);

    /// Request graceful shutdown of all connector-owned threads.
    ///
    /// Idempotent, non-blocking, and safe to call at any point in the
    /// lifecycle — including repeatedly, and after a failed `init`.
    fn stop(&self);
}
