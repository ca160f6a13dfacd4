//! Custom error types for the crate.
//!
//! This module defines the primary error type, `VnaError`, for the whole
//! client. Using the `thiserror` crate, it provides a centralized and
//! consistent way to classify failures the way the caller has to react to
//! them:
//!
//! - **`Transport`**: the socket is unreachable or I/O failed. Fatal at
//!   session start; no automatic retry is performed anywhere in the crate.
//! - **`Timeout`**: a query exceeded the configured bound. The sweep may
//!   still be running on the instrument, so the session state is unknown
//!   until the caller re-synchronizes or reconnects.
//! - **`Config`**: the settings file or environment overrides failed to
//!   load or parse.
//! - **`Configuration`**: a value passed parsing but is logically invalid
//!   (zero sweep points, negative smoothing aperture, non-finite
//!   frequency). Caught at construction time.
//! - **`Decode`**: a response could not be turned into numbers. Local and
//!   recoverable by re-querying.
//! - **`FormatMismatch`**: the decode path requested does not match the
//!   transfer format last written to the instrument.
//! - **`Domain`**: the data decoded fine but a derived quantity does not
//!   exist (an open-circuit reflection has unbounded impedance).

use thiserror::Error;

use crate::adapters::TransportError;
use crate::config::ConfigError;
use crate::scpi::TransferFormat;

/// Convenience alias for results using the crate error type.
pub type VnaResult<T> = std::result::Result<T, VnaError>;

#[derive(Error, Debug)]
pub enum VnaError {
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    #[error("Operation timed out; session state is unknown until re-synchronized: {0}")]
    Timeout(#[source] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transfer format is {active} but the decode path requires {expected}")]
    FormatMismatch {
        expected: TransferFormat,
        active: TransferFormat,
    },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

// Timeouts get their own taxon: every other transport failure is fatal at
// the call site, while a timeout additionally poisons the session.
impl From<TransportError> for VnaError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => VnaError::Timeout(err),
            _ => VnaError::Transport(err),
        }
    }
}

/// Failure to turn a raw instrument response into numeric data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed numeric token '{0}'")]
    MalformedNumber(String),

    #[error("unrecognized protocol token '{0}'")]
    UnknownToken(String),

    #[error("complex trace requires an even sample count, got {0}")]
    OddSampleCount(usize),

    #[error("binary payload length {0} is not a multiple of 8")]
    MisalignedPayload(usize),

    #[error("{0} trace cannot be paired into complex samples")]
    NotComplex(&'static str),
}

/// Decoded data for which a derived quantity does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error(
        "reflection coefficient at sample {index} equals 1 (open circuit); impedance is unbounded"
    )]
    ReflectionSingularity { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VnaError::Configuration("sweep must cover at least 1 point".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration validation error: sweep must cover at least 1 point"
        );
    }

    #[test]
    fn test_timeout_is_classified_separately() {
        let err: VnaError = TransportError::Timeout {
            command: "*OPC?".to_string(),
            timeout: std::time::Duration::from_secs(1),
        }
        .into();
        assert!(matches!(err, VnaError::Timeout(_)));

        let err: VnaError = TransportError::NotConnected.into();
        assert!(matches!(err, VnaError::Transport(_)));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::OddSampleCount(3);
        assert_eq!(
            err.to_string(),
            "complex trace requires an even sample count, got 3"
        );
    }
}
