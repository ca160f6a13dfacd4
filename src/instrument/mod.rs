//! Instrument drivers.
//!
//! One driver per instrument class; each owns its transport exclusively
//! for the duration of a session and exposes typed operations instead of
//! raw command strings.

pub mod vna;

pub use vna::{AcquisitionPhase, VnaController};
