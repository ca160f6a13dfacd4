//! Sweep configuration values.
//!
//! A [`SweepConfig`] describes one frequency sweep: the frequency axis in
//! exactly one of its two shapes (center+span or start+stop) plus the
//! shared acquisition parameters. Values are validated at construction
//! and immutable afterwards; every change builds a new instance.

use serde::{Deserialize, Serialize};

use crate::error::{VnaError, VnaResult};
use crate::scpi::cmd;

/// Frequency axis of a sweep, in one of its two mutually exclusive
/// shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrequencyAxis {
    /// Center frequency and symmetric span, both in Hz.
    CenterSpan { center_hz: f64, span_hz: f64 },
    /// Explicit start and stop frequencies in Hz.
    StartStop { start_hz: f64, stop_hz: f64 },
}

/// Immutable description of one frequency sweep.
///
/// `power_dbm` and `averaging_factor` ride along for callers and
/// configuration files, but [`setup_commands`](Self::setup_commands) does
/// not emit them: the modeled command subset has no power command, and
/// averaging is applied through its own explicit operation on the
/// controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_power_dbm")]
    power_dbm: f64,
    #[serde(default = "default_num_points")]
    num_points: u32,
    #[serde(default)]
    averaging_factor: u32,
    #[serde(default = "default_if_bandwidth_hz")]
    if_bandwidth_hz: f64,
    /// Zero disables smoothing; a positive value enables it with that
    /// aperture.
    #[serde(default)]
    smoothing_aperture: f64,
    #[serde(default = "default_axis")]
    axis: FrequencyAxis,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            power_dbm: default_power_dbm(),
            num_points: default_num_points(),
            averaging_factor: 0,
            if_bandwidth_hz: default_if_bandwidth_hz(),
            smoothing_aperture: 0.0,
            axis: default_axis(),
        }
    }
}

fn default_power_dbm() -> f64 {
    -10.0
}

fn default_num_points() -> u32 {
    1000
}

fn default_if_bandwidth_hz() -> f64 {
    1000.0
}

fn default_axis() -> FrequencyAxis {
    FrequencyAxis::CenterSpan {
        center_hz: 8e6,
        span_hz: 1e6,
    }
}

impl SweepConfig {
    /// Sweep around a center frequency with a symmetric span.
    pub fn center_span(center_hz: f64, span_hz: f64) -> VnaResult<Self> {
        Self::with_axis(FrequencyAxis::CenterSpan { center_hz, span_hz })
    }

    /// Sweep between explicit start and stop frequencies.
    pub fn start_stop(start_hz: f64, stop_hz: f64) -> VnaResult<Self> {
        Self::with_axis(FrequencyAxis::StartStop { start_hz, stop_hz })
    }

    /// Sweep over the given frequency axis with default parameters.
    pub fn with_axis(axis: FrequencyAxis) -> VnaResult<Self> {
        let config = Self {
            axis,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the source power.
    pub fn with_power_dbm(mut self, power_dbm: f64) -> VnaResult<Self> {
        self.power_dbm = power_dbm;
        self.validate()?;
        Ok(self)
    }

    /// Replace the sweep point count (at least 1).
    pub fn with_points(mut self, num_points: u32) -> VnaResult<Self> {
        self.num_points = num_points;
        self.validate()?;
        Ok(self)
    }

    /// Replace the averaging factor. Zero leaves averaging to the
    /// instrument's current state.
    pub fn with_averaging(mut self, averaging_factor: u32) -> Self {
        self.averaging_factor = averaging_factor;
        self
    }

    /// Replace the IF bandwidth in Hz.
    pub fn with_if_bandwidth(mut self, if_bandwidth_hz: f64) -> VnaResult<Self> {
        self.if_bandwidth_hz = if_bandwidth_hz;
        self.validate()?;
        Ok(self)
    }

    /// Replace the smoothing aperture. Zero disables smoothing.
    pub fn with_smoothing_aperture(mut self, smoothing_aperture: f64) -> VnaResult<Self> {
        self.smoothing_aperture = smoothing_aperture;
        self.validate()?;
        Ok(self)
    }

    /// The frequency axis of this sweep.
    pub fn axis(&self) -> FrequencyAxis {
        self.axis
    }

    /// Source power in dBm.
    pub fn power_dbm(&self) -> f64 {
        self.power_dbm
    }

    /// Number of sweep points.
    pub fn num_points(&self) -> u32 {
        self.num_points
    }

    /// Averaging factor; zero means averaging is not touched.
    pub fn averaging_factor(&self) -> u32 {
        self.averaging_factor
    }

    /// IF bandwidth in Hz.
    pub fn if_bandwidth_hz(&self) -> f64 {
        self.if_bandwidth_hz
    }

    /// Smoothing aperture; zero means smoothing disabled.
    pub fn smoothing_aperture(&self) -> f64 {
        self.smoothing_aperture
    }

    /// Whether this sweep enables trace smoothing.
    pub fn smoothing_enabled(&self) -> bool {
        self.smoothing_aperture > 0.0
    }

    pub(crate) fn validate(&self) -> VnaResult<()> {
        let frequencies = match self.axis {
            FrequencyAxis::CenterSpan { center_hz, span_hz } => [center_hz, span_hz],
            FrequencyAxis::StartStop { start_hz, stop_hz } => [start_hz, stop_hz],
        };
        if frequencies.iter().any(|f| !f.is_finite()) {
            return Err(VnaError::Configuration(
                "sweep frequencies must be finite".to_string(),
            ));
        }
        if self.num_points < 1 {
            return Err(VnaError::Configuration(
                "sweep must cover at least 1 point".to_string(),
            ));
        }
        if !self.if_bandwidth_hz.is_finite() || self.if_bandwidth_hz <= 0.0 {
            return Err(VnaError::Configuration(format!(
                "IF bandwidth must be positive, got {}",
                self.if_bandwidth_hz
            )));
        }
        if !self.smoothing_aperture.is_finite() || self.smoothing_aperture < 0.0 {
            return Err(VnaError::Configuration(format!(
                "smoothing aperture must be zero or positive, got {}",
                self.smoothing_aperture
            )));
        }
        if !self.power_dbm.is_finite() {
            return Err(VnaError::Configuration(
                "source power must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Render this sweep to its command sequence, in the order the
    /// instrument must receive it: frequency axis, point count, IF
    /// bandwidth, then smoothing (enable with aperture, or explicit
    /// disable).
    pub fn setup_commands(&self) -> Vec<String> {
        let mut commands = match self.axis {
            FrequencyAxis::CenterSpan { center_hz, span_hz } => vec![
                cmd::set_center_frequency(center_hz),
                cmd::set_span(span_hz),
            ],
            FrequencyAxis::StartStop { start_hz, stop_hz } => vec![
                cmd::set_start_frequency(start_hz),
                cmd::set_stop_frequency(stop_hz),
            ],
        };
        commands.push(cmd::set_sweep_points(self.num_points));
        commands.push(cmd::set_if_bandwidth(self.if_bandwidth_hz));
        if self.smoothing_enabled() {
            commands.push(cmd::set_smoothing_state(true));
            commands.push(cmd::set_smoothing_aperture(self.smoothing_aperture));
        } else {
            commands.push(cmd::set_smoothing_state(false));
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_factory_profile() {
        let config = SweepConfig::default();
        assert_eq!(
            config.axis(),
            FrequencyAxis::CenterSpan {
                center_hz: 8e6,
                span_hz: 1e6
            }
        );
        assert_eq!(config.power_dbm(), -10.0);
        assert_eq!(config.num_points(), 1000);
        assert_eq!(config.averaging_factor(), 0);
        assert_eq!(config.if_bandwidth_hz(), 1000.0);
        assert!(!config.smoothing_enabled());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(SweepConfig::center_span(f64::NAN, 1e6).is_err());
        assert!(SweepConfig::center_span(8e6, 1e6)
            .unwrap()
            .with_points(0)
            .is_err());
        assert!(SweepConfig::start_stop(1e6, 9e6)
            .unwrap()
            .with_if_bandwidth(0.0)
            .is_err());
        assert!(SweepConfig::start_stop(1e6, 9e6)
            .unwrap()
            .with_smoothing_aperture(-1.0)
            .is_err());
    }

    #[test]
    fn test_center_span_command_order() {
        let config = SweepConfig::center_span(8e6, 1e6)
            .unwrap()
            .with_points(201)
            .unwrap();
        assert_eq!(
            config.setup_commands(),
            vec![
                ":SENSe:FREQuency:CENTer 8000000",
                "SENSe:FREQuency:SPAN 1000000",
                "SENSe:SWEep:POINts 201",
                "SENSe:BANDwidth 1000",
                "CALCulate:SMOothing 0",
            ]
        );
    }

    #[test]
    fn test_start_stop_with_smoothing_command_order() {
        let config = SweepConfig::start_stop(1e6, 9e6)
            .unwrap()
            .with_smoothing_aperture(2.5)
            .unwrap();
        assert_eq!(
            config.setup_commands(),
            vec![
                "SENSe:FREQuency:STARt 1000000",
                "SENSe:FREQuency:STOP 9000000",
                "SENSe:SWEep:POINts 1000",
                "SENSe:BANDwidth 1000",
                "CALCulate:SMOothing 1",
                "CALCulate:SMOothing:APERture 2.5",
            ]
        );
    }
}
