//! Dispatch harness: wires configuration, module loading, and queue
//! consumption together.
//!
//! Startup is a linear state machine; any failure before `Running` is
//! terminal and surfaces as a [`HarnessError`] for the binary to report and
//! exit on. Once running, the harness parks until the shutdown flag flips,
//! then stops the connector, joins every worker, and lets the module handle
//! drop — destroying the instance and unloading the library only after no
//! thread can hold references into it.

use std::path::Path;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::ConnectorConfig;
use crate::consumer::{spawn_consumers, ConsumerTotals, DispatchQueues};
use crate::error::HarnessError;
use crate::loader::ModuleLoader;
use crate::shutdown::ShutdownContext;
use xconn_api::{ConnState, Connector};

/// Pause between connect and subscribe, letting the transport settle.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Cadence at which the parked main thread re-checks the shutdown flag.
const PARK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    ModuleLoading,
    ModuleLoaded,
    Initialized,
    QueuesBound,
    Connecting,
    Connected,
    Subscribing,
    Running,
    ShuttingDown,
    Terminated,
}

pub struct Harness {
    exchange: String,
    verbosity: u8,
    state: HarnessState,
    settle_delay: Duration,
    park_interval: Duration,
    totals: Option<ConsumerTotals>,
}

impl Harness {
    pub fn new(exchange: impl Into<String>, verbosity: u8) -> Self {
        Self {
            exchange: exchange.into(),
            verbosity,
            state: HarnessState::Idle,
            settle_delay: SETTLE_DELAY,
            park_interval: PARK_INTERVAL,
            totals: None,
        }
    }

    /// Override the post-connect settle delay (tests, fast feeds).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// Per-stream consumed counts from the last completed run.
    pub fn totals(&self) -> Option<ConsumerTotals> {
        self.totals
    }

    fn transition(&mut self, next: HarnessState) {
        debug!(from = ?self.state, to = ?next, "harness transition");
        self.state = next;
    }

    /// Load the named module and run the full dispatch lifecycle.
    pub fn run(
        &mut self,
        modules_dir: &Path,
        config: &ConnectorConfig,
        ctx: &ShutdownContext,
    ) -> Result<(), HarnessError> {
        self.transition(HarnessState::ModuleLoading);
        let mut loader = ModuleLoader::new(modules_dir, &self.exchange);
        info!(path = %loader.path().display(), "loading connector module");
        loader.open()?;
        let mut handle = loader.instance()?;
        self.transition(HarnessState::ModuleLoaded);
        info!(module = handle.name(), "connector module loaded");

        let section = config.exchange_section(&self.exchange)?.clone();
        self.drive(&mut *handle, &section, ctx)
        // `handle` drops here: every worker has been joined by drive(), so
        // destroying the instance and unloading the library is safe.
    }

    /// Run the dispatch lifecycle against an already-instantiated connector.
    ///
    /// Split out from [`run`](Harness::run) so in-process connectors can be
    /// driven without a module on disk.
    pub fn drive(
        &mut self,
        connector: &mut dyn Connector,
        section: &Value,
        ctx: &ShutdownContext,
    ) -> Result<(), HarnessError> {
        let log_sink = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
        connector.init(section, self.verbosity, &log_sink);
        if !connector.is_initialized() {
            return Err(HarnessError::Init {
                exchange: self.exchange.clone(),
            });
        }
        self.transition(HarnessState::Initialized);

        let queues = DispatchQueues::new();
        queues.bind(connector);
        self.transition(HarnessState::QueuesBound);

        let workers = spawn_consumers(&queues, ctx)?;
        let keepalive = connector.keep_alive();

        self.transition(HarnessState::Connecting);
        let state = connector.connect(section);
        if state != ConnState::Opened {
            // Fatal: wind the already-spawned workers down before surfacing
            // the error, so the module can be unloaded safely.
            ctx.request_shutdown();
            connector.stop();
            workers.join();
            keepalive.join().ok();
            return Err(HarnessError::Connect {
                exchange: self.exchange.clone(),
                state,
            });
        }
        self.transition(HarnessState::Connected);
        info!(exchange = %self.exchange, "connected");

        connector.test_connectivity();
        thread::sleep(self.settle_delay);

        self.transition(HarnessState::Subscribing);
        connector.subscribe(section);
        self.transition(HarnessState::Running);
        info!(exchange = %self.exchange, "dispatch running");

        while ctx.is_running() {
            thread::sleep(self.park_interval);
        }

        self.transition(HarnessState::ShuttingDown);
        info!(exchange = %self.exchange, "shutting down");
        connector.stop();
        let totals = workers.join();
        keepalive.join().ok();
        info!(
            trades = totals.trades,
            ticker = totals.ticker,
            orders = totals.orders,
            positions = totals.positions,
            "consumer totals"
        );
        self.totals = Some(totals);
        self.transition(HarnessState::Terminated);
        Ok(())
    }
}
