//! xconn-runtime: host-side machinery
//!
//! Loads a connector module, wires configuration into it, fans its event
//! streams out to per-type consumer threads, and coordinates shutdown.

pub mod config;
pub mod consumer;
pub mod error;
pub mod harness;
pub mod loader;
pub mod shutdown;

pub use config::ConnectorConfig;
pub use consumer::DispatchQueues;
pub use error::{ConfigError, HarnessError, LoaderError};
pub use harness::{Harness, HarnessState};
pub use loader::{module_file_name, ConnectorHandle, ModuleLoader};
pub use shutdown::ShutdownContext;
