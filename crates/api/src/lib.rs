//! xconn-api: shared connector contract
//!
//! Everything a connector module and the host must agree on: the typed event
//! records, the concurrent delivery queue, the connection state machine, the
//! `Connector` trait, and the plugin ABI. Modules link this crate and export
//! their implementation through [`declare_connector!`]; the host links the
//! same version and loads them at runtime.

pub mod connector;
pub mod events;
pub mod plugin;
pub mod queue;
pub mod state;

pub use connector::{Connector, OrderRequest};
pub use events::{local_id, OrderUpdate, PositionUpdate, PriceTick, TickerUpdate};
pub use queue::EventQueue;
pub use state::ConnState;
