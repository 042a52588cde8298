//! paperfeed: simulated exchange connector module
//!
//! A complete implementation of the xconn connector contract backed by a
//! synthetic feed instead of a real transport: per-instrument random-walk
//! producer threads, a heartbeat keep-alive task, and simulated order fills
//! with position tracking. Build as a cdylib and drop `libpaperfeed.so`
//! into the host's modules directory to run the full pipeline without
//! exchange credentials.

pub mod config;
pub mod connector;

pub use config::PaperfeedConfig;
pub use connector::PaperfeedConnector;

xconn_api::declare_connector!(PaperfeedConnector);
