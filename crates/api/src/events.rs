//! Typed event records delivered through the bound queues.
//!
//! Each record carries the identifying tuple (exchange, asset class,
//! instrument, timestamp) plus type-specific payload fields, and owns a
//! derived local identifier (`lid`). The lid is computed exactly once, by an
//! explicit [`update_local_id`](PriceTick::update_local_id) call after the
//! identifying fields are populated; copies keep the stored value and it is
//! never recomputed behind the caller's back. Records with the same
//! identifying tuple compare equal regardless of payload — the lid is the
//! equality/ordering/hash key for set and sorted-container use.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Derive the stable local identifier for an identifying tuple.
///
/// FNV-1a over the concatenated fields; deterministic across runs and
/// platforms. Two tuples that concatenate to the same byte string collide,
/// which matches the intended use as an equality key.
pub fn local_id(exchange: &str, asset_class: &str, instrum: &str, timestamp: i64) -> u64 {
    let mut hash = FNV_OFFSET;
    let ts = timestamp.to_string();
    for bytes in [
        exchange.as_bytes(),
        asset_class.as_bytes(),
        instrum.as_bytes(),
        ts.as_bytes(),
    ] {
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Format an exchange-local epoch-millisecond timestamp for display.
fn format_timestamp(timestamp: i64) -> String {
    Utc.timestamp_millis_opt(timestamp)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Generates the lid plumbing shared by every record type: the explicit
/// derivation call plus lid-keyed equality, ordering, and hashing.
macro_rules! lid_identity {
    ($record:ty) => {
        impl $record {
            /// Derive and store the local identifier.
            ///
            /// Must be called once, after the identifying fields are set.
            pub fn update_local_id(&mut self) {
                self.lid = local_id(
                    &self.exchange,
                    &self.asset_class,
                    &self.instrum,
                    self.timestamp,
                );
            }
        }

        impl PartialEq for $record {
            fn eq(&self, other: &Self) -> bool {
                self.lid == other.lid
            }
        }

        impl Eq for $record {}

        impl PartialOrd for $record {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $record {
            fn cmp(&self, other: &Self) -> Ordering {
                self.lid.cmp(&other.lid)
            }
        }

        impl Hash for $record {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.lid.hash(state);
            }
        }
    };
}

/// A single trade print.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceTick {
    pub exchange: String,
    pub asset_class: String,
    pub instrum: String,
    /// Exchange-local epoch milliseconds.
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub lid: u64,
}

lid_identity!(PriceTick);

impl fmt::Display for PriceTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {:<23} {:<14.8} {:<12.6} {:<16} {:<10} {:<10}",
            self.instrum,
            format_timestamp(self.timestamp),
            self.price,
            self.quantity,
            self.timestamp,
            self.asset_class,
            self.exchange,
        )
    }
}

/// Top-of-book quote update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerUpdate {
    pub exchange: String,
    pub asset_class: String,
    pub instrum: String,
    /// Exchange-local epoch milliseconds.
    pub timestamp: i64,
    pub bid: f64,
    pub bid_qty: f64,
    pub ask: f64,
    pub ask_qty: f64,
    #[serde(default)]
    pub lid: u64,
}

lid_identity!(TickerUpdate);

impl fmt::Display for TickerUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {:<23} {:<14.8} {:<12.6} {:<14.8} {:<12.6} {:<10}",
            self.instrum,
            format_timestamp(self.timestamp),
            self.bid,
            self.bid_qty,
            self.ask,
            self.ask_qty,
            self.exchange,
        )
    }
}

/// Order lifecycle update.
///
/// `state` carries the exchange's own vocabulary (NEW, FILLED, CANCELED, ...);
/// the host treats it as opaque.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub exchange: String,
    pub asset_class: String,
    pub instrum: String,
    /// Exchange-local epoch milliseconds.
    pub timestamp: i64,
    /// Exchange-assigned order id; empty until the exchange acknowledges.
    pub id: String,
    pub cl_order_id: String,
    pub side: String,
    pub order_type: String,
    pub time_in_force: String,
    pub pos_side: String,
    pub post_only: bool,
    pub price: f64,
    pub quantity: f64,
    pub filled: f64,
    pub state: String,
    #[serde(default)]
    pub lid: u64,
}

lid_identity!(OrderUpdate);

impl OrderUpdate {
    /// An update is valid once the exchange has assigned an order id.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Position snapshot update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub exchange: String,
    pub asset_class: String,
    pub instrum: String,
    /// Exchange-local epoch milliseconds.
    pub timestamp: i64,
    pub pos_side: String,
    /// Signed net size; positive long, negative short.
    pub size: f64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
    pub leverage: f64,
    #[serde(default)]
    pub lid: u64,
}

lid_identity!(PositionUpdate);
