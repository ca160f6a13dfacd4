//! Transport adapters for SCPI instrument communication.
//!
//! The controller talks to the instrument through the [`ScpiTransport`]
//! trait so the wire can be swapped out: [`TcpTransport`] drives a real
//! socket endpoint, [`MockTransport`] scripts responses for tests.

pub mod mock;
pub mod tcp;

pub use mock::MockTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures, kept separate from the crate error so the
/// controller can tell a timeout apart from every other I/O failure.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection to {address} failed: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport is not connected")]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("malformed binary block header: {0}")]
    BadBlockHeader(String),
}

/// Bidirectional line-terminated text channel to a SCPI instrument.
///
/// One logical session per physical instrument: every call blocks the
/// caller until the instrument answers (or the timeout fires), and the
/// owning controller issues at most one operation at a time.
#[async_trait]
pub trait ScpiTransport: Send + Sync {
    /// Send a command. No response is read.
    async fn write(&mut self, command: &str) -> Result<(), TransportError>;

    /// Send a command and read one line-terminated response, trimmed.
    async fn query(&mut self, command: &str) -> Result<String, TransportError>;

    /// Send a command and read an IEEE 488.2 definite-length block,
    /// returning the raw payload bytes.
    async fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, TransportError>;

    /// Current per-call timeout.
    fn timeout(&self) -> Duration;

    /// Replace the per-call timeout.
    fn set_timeout(&mut self, timeout: Duration);
}
