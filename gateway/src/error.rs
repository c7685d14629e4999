//! Errors raised while setting up the proxy.
//!
//! Per-request failures never use this type; they are reported to the caller
//! as [`RpcError`](crate::rpc::RpcError) inside the response envelope.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Reflection error: {0}")]
    Reflection(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
