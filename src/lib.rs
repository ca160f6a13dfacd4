//! Acquisition client for PLANAR-class vector network analyzers.
//!
//! This library drives a VNA over its SCPI-on-TCP socket endpoint: it
//! applies sweep configurations, runs bus-triggered single-shot
//! acquisitions synchronized on `*OPC?`, and decodes the returned traces
//! (ASCII or big-endian binary) into real, complex, or derived impedance
//! data.
//!
//! One controller owns one transport; operations are sequential and
//! blocking from the caller's perspective, with the operation-complete
//! barrier as the single intentional long block.

pub mod adapters;
pub mod config;
pub mod error;
pub mod instrument;
pub mod measurement;
pub mod scpi;
pub mod sweep;
pub mod trace;

pub use adapters::{MockTransport, ScpiTransport, TcpTransport, TransportError};
pub use config::{ConnectionSettings, VnaSettings};
pub use error::{DecodeError, DomainError, VnaError, VnaResult};
pub use instrument::{AcquisitionPhase, VnaController};
pub use measurement::SweepMeasurement;
pub use scpi::{TraceFormat, TransferFormat, TriggerSource, TriggerStatus};
pub use sweep::{FrequencyAxis, SweepConfig};
pub use trace::{impedance_from_reflection, RawTrace, TraceKind};
