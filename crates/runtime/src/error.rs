use std::path::PathBuf;

use thiserror::Error;
use xconn_api::ConnState;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("module not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to load module {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("module ABI version {found} does not match host version {expected}")]
    AbiMismatch { expected: u32, found: u32 },
    #[error("failed to instantiate connector: {0}")]
    Instantiation(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config document must be an object keyed by exchange name")]
    NotAnObject,
    #[error("no configuration section for exchange {0}")]
    MissingExchange(String),
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("connector for {exchange} failed to initialize")]
    Init { exchange: String },
    #[error("failed to connect exchange {exchange}: connection state {state}")]
    Connect { exchange: String, state: ConnState },
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
