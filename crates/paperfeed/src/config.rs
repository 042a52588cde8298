//! paperfeed configuration section.

use serde::Deserialize;

/// Parsed from the exchange's sub-document of the connector config.
///
/// All fields have defaults; an unparseable section leaves the connector
/// uninitialized rather than failing loudly.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaperfeedConfig {
    /// Instruments to simulate; one producer thread each.
    pub instruments: Vec<String>,
    pub asset_class: String,
    /// Delay between synthetic trade prints per instrument.
    pub tick_interval_ms: u64,
    /// Heartbeat cadence of the keep-alive task.
    pub ping_interval_ms: u64,
    /// Starting price of the random walk.
    pub start_price: f64,
    /// Simulate a transport outage: `connect` reports `Failed`.
    pub fail_connect: bool,
}

impl Default for PaperfeedConfig {
    fn default() -> Self {
        Self {
            instruments: vec!["BTCUSDT".to_string()],
            asset_class: "perpetual".to_string(),
            tick_interval_ms: 100,
            ping_interval_ms: 5_000,
            start_price: 30_000.0,
            fail_connect: false,
        }
    }
}
