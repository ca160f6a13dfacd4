//! PLANAR-class vector network analyzer driver.
//!
//! Drives the instrument over its SCPI socket endpoint: applies sweep
//! configurations, runs the bus-triggered single-shot acquisition
//! sequence synchronized on `*OPC?`, and decodes the returned traces.
//!
//! ## Configuration
//!
//! ```toml
//! [connection]
//! id = "vna"
//! host = "192.168.1.100"
//! port = 5025
//! timeout_ms = 10000000
//! ```
//!
//! ## Acquisition sequence
//!
//! Every acquisition runs the same four-step sequence:
//! trigger source `BUS` → `TRIGger:SINGle` → `*OPC?` → data query.
//! The `*OPC?` query is the only synchronization barrier: the instrument
//! does not answer it until the sweep finishes, so its return is the one
//! safe signal that trace data is ready. There is no polling and no
//! fixed delay. If it times out, the sweep may still be running and the
//! session must be treated as unusable until re-synchronized.

use chrono::Utc;
use num_complex::Complex64;
use tracing::{debug, info, warn};

use crate::adapters::{ScpiTransport, TcpTransport};
use crate::config::VnaSettings;
use crate::error::{VnaError, VnaResult};
use crate::measurement::SweepMeasurement;
use crate::scpi::{self, cmd, TraceFormat, TransferFormat, TriggerSource, TriggerStatus};
use crate::sweep::SweepConfig;
use crate::trace::{impedance_from_reflection, RawTrace, TraceKind};

/// Progress of the bus-triggered acquisition sequence.
///
/// After an error the phase stays where the sequence stopped; anything
/// other than `Idle` outside an acquisition call means the session is no
/// longer synchronized with the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPhase {
    /// No acquisition in progress.
    Idle,
    /// Trigger source set to bus.
    SourceSelected,
    /// Single sweep armed and started.
    Armed,
    /// Sweep finished, data ready to fetch.
    Complete,
}

/// Acquisition controller for one VNA session.
///
/// Owns its transport exclusively; one outstanding acquisition at a time
/// (`&mut self` throughout). The controller mirrors the transfer format
/// and trace format it last wrote so each decode path can assert it
/// matches what the instrument is actually sending.
pub struct VnaController {
    id: String,
    transport: Box<dyn ScpiTransport>,
    transfer_format: TransferFormat,
    trace_format: Option<TraceFormat>,
    phase: AcquisitionPhase,
}

impl VnaController {
    /// Connect to the instrument endpoint described by `settings`.
    pub async fn connect(settings: &VnaSettings) -> VnaResult<Self> {
        let transport = TcpTransport::connect(&settings.connection).await?;
        Ok(Self::with_transport(
            settings.connection.id.clone(),
            Box::new(transport),
        ))
    }

    /// Build a controller on an already-open transport.
    pub fn with_transport(id: String, transport: Box<dyn ScpiTransport>) -> Self {
        info!(id = %id, "VNA controller ready");
        Self {
            id,
            transport,
            // Power-on default of the instrument.
            transfer_format: TransferFormat::Ascii,
            trace_format: None,
            phase: AcquisitionPhase::Idle,
        }
    }

    /// Instrument identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the last acquisition sequence stopped.
    pub fn phase(&self) -> AcquisitionPhase {
        self.phase
    }

    /// Transfer format last written to the instrument (mirror).
    pub fn transfer_format(&self) -> TransferFormat {
        self.transfer_format
    }

    /// Trace format last written to the instrument (mirror), if any.
    pub fn trace_format(&self) -> Option<TraceFormat> {
        self.trace_format
    }

    async fn write(&mut self, command: &str) -> VnaResult<()> {
        Ok(self.transport.write(command).await?)
    }

    async fn query(&mut self, command: &str) -> VnaResult<String> {
        Ok(self.transport.query(command).await?)
    }

    // ------------------------------------------------------------------
    // Sweep configuration
    // ------------------------------------------------------------------

    /// Apply a sweep configuration.
    ///
    /// Writes one command per field in a fixed order with no intervening
    /// queries; the instrument applies each synchronously on write. The
    /// accepted values are trusted — callers needing verification issue
    /// the corresponding getter afterwards. An instrument-side rejection
    /// of a value is invisible at this layer.
    pub async fn apply_sweep(&mut self, config: &SweepConfig) -> VnaResult<()> {
        for command in config.setup_commands() {
            self.write(&command).await?;
        }
        info!(
            id = %self.id,
            points = config.num_points(),
            smoothing = config.smoothing_enabled(),
            "sweep configuration applied"
        );
        Ok(())
    }

    /// Set the center frequency in Hz.
    pub async fn set_center_frequency(&mut self, hz: f64) -> VnaResult<()> {
        self.write(&cmd::set_center_frequency(hz)).await
    }

    /// Read back the center frequency in Hz.
    pub async fn center_frequency(&mut self) -> VnaResult<f64> {
        let response = self.query(cmd::CENTER_FREQUENCY_QUERY).await?;
        Ok(scpi::parse_scalar(&response)?)
    }

    /// Set the frequency span in Hz.
    pub async fn set_span(&mut self, hz: f64) -> VnaResult<()> {
        self.write(&cmd::set_span(hz)).await
    }

    /// Read back the frequency span in Hz.
    pub async fn span(&mut self) -> VnaResult<f64> {
        let response = self.query(cmd::SPAN_QUERY).await?;
        Ok(scpi::parse_scalar(&response)?)
    }

    /// Set the sweep start frequency in Hz.
    pub async fn set_start_frequency(&mut self, hz: f64) -> VnaResult<()> {
        self.write(&cmd::set_start_frequency(hz)).await
    }

    /// Set the sweep stop frequency in Hz.
    pub async fn set_stop_frequency(&mut self, hz: f64) -> VnaResult<()> {
        self.write(&cmd::set_stop_frequency(hz)).await
    }

    /// Set the number of sweep points.
    pub async fn set_sweep_points(&mut self, points: u32) -> VnaResult<()> {
        self.write(&cmd::set_sweep_points(points)).await
    }

    /// Read back the number of sweep points.
    pub async fn sweep_points(&mut self) -> VnaResult<u32> {
        let response = self.query(cmd::SWEEP_POINTS_QUERY).await?;
        Ok(scpi::parse_scalar(&response)? as u32)
    }

    /// Enable or disable the system error correction.
    pub async fn set_correction(&mut self, enabled: bool) -> VnaResult<()> {
        self.write(&cmd::set_correction_state(enabled)).await
    }

    /// Read back the system error correction state.
    pub async fn correction(&mut self) -> VnaResult<bool> {
        let response = self.query(cmd::CORRECTION_STATE_QUERY).await?;
        Ok(scpi::parse_flag(&response)?)
    }

    /// Set the IF bandwidth in Hz.
    pub async fn set_if_bandwidth(&mut self, hz: f64) -> VnaResult<()> {
        self.write(&cmd::set_if_bandwidth(hz)).await
    }

    /// Read back the IF bandwidth in Hz.
    pub async fn if_bandwidth(&mut self) -> VnaResult<f64> {
        let response = self.query(cmd::IF_BANDWIDTH_QUERY).await?;
        Ok(scpi::parse_scalar(&response)?)
    }

    /// Enable averaging with the given factor.
    pub async fn set_averaging(&mut self, factor: u32) -> VnaResult<()> {
        self.write(&cmd::set_averaging_state(true)).await?;
        self.write(&cmd::set_averaging_count(factor)).await
    }

    /// Restart the running average.
    pub async fn clear_averaging(&mut self) -> VnaResult<()> {
        self.write(cmd::AVERAGING_CLEAR).await
    }

    /// Read back whether averaging is enabled.
    pub async fn averaging_enabled(&mut self) -> VnaResult<bool> {
        let response = self.query(cmd::AVERAGING_STATE_QUERY).await?;
        Ok(scpi::parse_flag(&response)?)
    }

    /// Read back the averaging factor.
    pub async fn averaging_count(&mut self) -> VnaResult<u32> {
        let response = self.query(cmd::AVERAGING_COUNT_QUERY).await?;
        Ok(scpi::parse_scalar(&response)? as u32)
    }

    /// Autoscale the active trace display.
    pub async fn autoscale(&mut self) -> VnaResult<()> {
        self.write(cmd::AUTOSCALE).await
    }

    // ------------------------------------------------------------------
    // Trigger control
    // ------------------------------------------------------------------

    /// Select the trigger source.
    pub async fn set_trigger_source(&mut self, source: TriggerSource) -> VnaResult<()> {
        self.write(&cmd::set_trigger_source(source)).await
    }

    /// Read back the trigger source.
    pub async fn trigger_source(&mut self) -> VnaResult<TriggerSource> {
        let response = self.query(cmd::TRIGGER_SOURCE_QUERY).await?;
        Ok(response.parse()?)
    }

    /// Enable or disable continuous triggering.
    pub async fn set_continuous_trigger(&mut self, enabled: bool) -> VnaResult<()> {
        self.write(&cmd::set_continuous_trigger(enabled)).await
    }

    /// Read back the continuous trigger state.
    pub async fn continuous_trigger(&mut self) -> VnaResult<bool> {
        let response = self.query(cmd::CONTINUOUS_TRIGGER_QUERY).await?;
        Ok(scpi::parse_flag(&response)?)
    }

    /// Read the instrument-reported trigger status.
    pub async fn trigger_status(&mut self) -> VnaResult<TriggerStatus> {
        let response = self.query(cmd::TRIGGER_STATUS_QUERY).await?;
        Ok(response.parse()?)
    }

    /// Generate a trigger signal and start one sweep.
    pub async fn trigger_single(&mut self) -> VnaResult<()> {
        self.write(cmd::TRIGGER_SINGLE).await
    }

    /// Block until the instrument reports the running operation complete.
    pub async fn wait_operation_complete(&mut self) -> VnaResult<()> {
        let ack = self.query(cmd::OPERATION_COMPLETE_QUERY).await?;
        if ack != "1" {
            warn!(id = %self.id, ack = %ack, "unexpected *OPC? acknowledgement");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Formats
    // ------------------------------------------------------------------

    /// Select the trace data transfer encoding and mirror it locally.
    pub async fn set_transfer_format(&mut self, format: TransferFormat) -> VnaResult<()> {
        self.write(&cmd::set_transfer_format(format)).await?;
        self.transfer_format = format;
        debug!(id = %self.id, format = %format, "transfer format set");
        Ok(())
    }

    /// Select the trace display format and mirror it locally.
    pub async fn set_trace_format(&mut self, format: TraceFormat) -> VnaResult<()> {
        self.write(&cmd::set_trace_format(format)).await?;
        self.trace_format = Some(format);
        Ok(())
    }

    /// Query the active trace format and refresh the mirror.
    pub async fn read_trace_format(&mut self) -> VnaResult<TraceFormat> {
        let response = self.query(cmd::TRACE_FORMAT_QUERY).await?;
        let format: TraceFormat = response.parse()?;
        self.trace_format = Some(format);
        Ok(format)
    }

    fn ensure_transfer_format(&self, expected: TransferFormat) -> VnaResult<()> {
        if self.transfer_format != expected {
            return Err(VnaError::FormatMismatch {
                expected,
                active: self.transfer_format,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------

    /// Run the shared trigger sequence up to the synchronization barrier.
    async fn run_triggered_sweep(&mut self) -> VnaResult<()> {
        self.phase = AcquisitionPhase::Idle;
        self.write(&cmd::set_trigger_source(TriggerSource::Bus))
            .await?;
        self.phase = AcquisitionPhase::SourceSelected;

        // Arms and starts one sweep; the instrument measures immediately.
        self.write(cmd::TRIGGER_SINGLE).await?;
        self.phase = AcquisitionPhase::Armed;

        // A timeout here means the sweep may still be in progress on the
        // instrument and the next command's behavior is undefined; the
        // phase stays Armed and the error is fatal for this session.
        self.wait_operation_complete().await?;
        self.phase = AcquisitionPhase::Complete;
        debug!(id = %self.id, "sweep complete, trace data ready");
        Ok(())
    }

    /// Run one bus-triggered sweep and fetch the trace as ASCII text.
    ///
    /// Real-valued traces are zero-filtered during decode; see
    /// [`scpi::decode_ascii_trace`].
    pub async fn acquire(&mut self) -> VnaResult<RawTrace> {
        self.ensure_transfer_format(TransferFormat::Ascii)?;
        self.run_triggered_sweep().await?;
        let response = self.query(cmd::TRACE_DATA_QUERY).await?;
        self.phase = AcquisitionPhase::Idle;
        let values = scpi::decode_ascii_trace(&response, TraceKind::Real)?;
        Ok(RawTrace::new(TraceKind::Real, values))
    }

    /// Run one bus-triggered sweep and fetch the trace as a binary
    /// block of big-endian doubles. No zero filter is applied.
    pub async fn acquire_binary(&mut self) -> VnaResult<RawTrace> {
        self.ensure_transfer_format(TransferFormat::Real64)?;
        self.run_triggered_sweep().await?;
        let payload = self.transport.query_binary(cmd::TRACE_DATA_QUERY).await?;
        self.phase = AcquisitionPhase::Idle;
        let values = scpi::decode_binary_f64(&payload)?;
        Ok(RawTrace::new(TraceKind::Real, values))
    }

    /// Run one bus-triggered sweep and fetch the trace as complex pairs
    /// (S-parameter data). The active trace format should be one of the
    /// Smith or polar formats for the pairs to be meaningful.
    pub async fn acquire_complex(&mut self) -> VnaResult<Vec<Complex64>> {
        self.ensure_transfer_format(TransferFormat::Ascii)?;
        if let Some(format) = self.trace_format {
            if !format.is_complex() {
                warn!(
                    id = %self.id,
                    format = %format,
                    "complex acquisition with a scalar trace format"
                );
            }
        }
        self.run_triggered_sweep().await?;
        let response = self.query(cmd::TRACE_DATA_QUERY).await?;
        self.phase = AcquisitionPhase::Idle;
        Ok(scpi::decode_ascii_complex(&response)?)
    }

    /// Fetch the sweep's frequency axis in Hz. Never zero-filtered.
    pub async fn frequency_axis(&mut self) -> VnaResult<Vec<f64>> {
        self.ensure_transfer_format(TransferFormat::Ascii)?;
        let response = self.query(cmd::FREQUENCY_DATA_QUERY).await?;
        Ok(scpi::decode_ascii_trace(&response, TraceKind::Frequency)?)
    }

    // ------------------------------------------------------------------
    // High-level measurements
    // ------------------------------------------------------------------

    /// Measure the port-1 reflection coefficient in Smith format and
    /// derive normalized impedance from it.
    ///
    /// The values stay normalized to the raw Smith-chart reference
    /// (`Z0 = 1`); multiply by the system reference impedance for ohms.
    pub async fn measure_impedance(&mut self) -> VnaResult<Vec<Complex64>> {
        self.set_trace_format(TraceFormat::Smith).await?;
        let reflection = self.acquire_complex().await?;
        Ok(impedance_from_reflection(&reflection)?)
    }

    /// Run one synchronized acquisition and return it as a timestamped
    /// record binding the frequency axis to the measured trace.
    pub async fn measure_sweep(&mut self) -> VnaResult<SweepMeasurement> {
        let trace = self.acquire().await?;
        let frequency_hz = self.frequency_axis().await?;
        if frequency_hz.len() != trace.len() {
            // The real-trace zero filter can strip samples; surface the
            // mismatch instead of guessing an alignment.
            warn!(
                id = %self.id,
                axis_points = frequency_hz.len(),
                trace_points = trace.len(),
                "frequency axis and trace lengths differ"
            );
        }
        Ok(SweepMeasurement {
            instrument_id: self.id.clone(),
            acquired_at: Utc::now(),
            frequency_hz,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTransport;

    fn controller_with_mock() -> (VnaController, MockTransport) {
        let mock = MockTransport::new();
        let controller =
            VnaController::with_transport("test_vna".to_string(), Box::new(mock.clone()));
        (controller, mock)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (controller, _mock) = controller_with_mock();
        assert_eq!(controller.id(), "test_vna");
        assert_eq!(controller.phase(), AcquisitionPhase::Idle);
        assert_eq!(controller.transfer_format(), TransferFormat::Ascii);
        assert_eq!(controller.trace_format(), None);
    }

    #[tokio::test]
    async fn test_format_mirror_tracks_writes() {
        let (mut controller, mock) = controller_with_mock();
        controller
            .set_transfer_format(TransferFormat::Real64)
            .await
            .unwrap();
        assert_eq!(controller.transfer_format(), TransferFormat::Real64);
        assert_eq!(mock.commands(), vec!["FORMat:DATA REAL32"]);

        controller
            .set_trace_format(TraceFormat::Smith)
            .await
            .unwrap();
        assert_eq!(controller.trace_format(), Some(TraceFormat::Smith));
    }

    #[tokio::test]
    async fn test_trigger_status_parsing() {
        let (mut controller, mock) = controller_with_mock();
        mock.respond("TRIGger:STATus?", "MEAS");
        assert_eq!(
            controller.trigger_status().await.unwrap(),
            TriggerStatus::Measuring
        );
    }

    #[tokio::test]
    async fn test_acquire_binary_requires_binary_format() {
        let (mut controller, mock) = controller_with_mock();
        let err = controller.acquire_binary().await.unwrap_err();
        assert!(matches!(
            err,
            VnaError::FormatMismatch {
                expected: TransferFormat::Real64,
                active: TransferFormat::Ascii,
            }
        ));
        // The mismatch is caught before any command reaches the wire.
        assert!(mock.commands().is_empty());
    }

    #[tokio::test]
    async fn test_ascii_acquire_rejected_in_binary_mode() {
        let (mut controller, _mock) = controller_with_mock();
        controller
            .set_transfer_format(TransferFormat::Real64)
            .await
            .unwrap();
        assert!(matches!(
            controller.acquire().await.unwrap_err(),
            VnaError::FormatMismatch { .. }
        ));
        assert!(matches!(
            controller.frequency_axis().await.unwrap_err(),
            VnaError::FormatMismatch { .. }
        ));
    }
}
