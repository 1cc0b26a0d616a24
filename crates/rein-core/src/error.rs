//! Error taxonomy.
//!
//! Only a bind failure at startup is fatal; everything else is absorbed at the
//! tick boundary or surfaced to the caller as a failed result.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Operational classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The process cannot continue (startup only).
    Fatal,
    /// Logged and retried / skipped; the loop keeps its schedule.
    Recoverable,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no peer connected to {addr} within {waited:?}")]
    ConnectTimeout { addr: SocketAddr, waited: Duration },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("no response to {query} within {waited:?}")]
    CorrelationTimeout { query: String, waited: Duration },

    #[error("not connected, dropped {query}")]
    Disconnected { query: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport stopped")]
    Stopped,
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Bind { .. } => ErrorKind::Fatal,
            _ => ErrorKind::Recoverable,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for the library surface.
#[derive(Debug, Error)]
pub enum ReinError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReinError::Transport(e) => e.kind(),
            ReinError::Provider(_) => ErrorKind::Recoverable,
            ReinError::Config(_) => ErrorKind::Fatal,
        }
    }
}
