//! SCPI command codec.
//!
//! Stateless translation between configuration/request values and the
//! instrument's command vocabulary, and between raw responses and numeric
//! data. The command subset modeled is exactly what sweep configuration,
//! bus-triggered single-shot acquisition, and trace retrieval need —
//! this is not a general SCPI library.

use std::fmt;
use std::str::FromStr;

use bytes::Buf;
use num_complex::Complex64;

use crate::error::DecodeError;
use crate::trace::{pair_complex, TraceKind};

/// Trace data transfer encoding.
///
/// The binary mode ships 64-bit big-endian IEEE-754 doubles even though
/// the protocol token reads `REAL32`; the mismatch is the instrument's,
/// and the client tolerates it rather than reproducing it in its own
/// naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    /// Comma-separated decimal text.
    Ascii,
    /// Packed 64-bit big-endian floating point.
    Real64,
}

impl TransferFormat {
    /// Token written after `FORMat:DATA`.
    pub fn scpi_token(&self) -> &'static str {
        match self {
            TransferFormat::Ascii => "ASCII",
            TransferFormat::Real64 => "REAL32",
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scpi_token())
    }
}

impl FromStr for TransferFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" | "ASCII" => Ok(TransferFormat::Ascii),
            "REAL" | "REAL32" => Ok(TransferFormat::Real64),
            _ => Err(DecodeError::UnknownToken(s.trim().to_string())),
        }
    }
}

/// Trigger signal source.
///
/// Only `Bus` participates in the synchronized acquisition path; the
/// other sources leave the instrument free-running or waiting on
/// hardware, outside this client's synchronization guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Internal,
    External,
    Bus,
}

impl TriggerSource {
    /// Token written after `TRIGger:SOURce`.
    pub fn scpi_token(&self) -> &'static str {
        match self {
            TriggerSource::Internal => "INTernal",
            TriggerSource::External => "EXTernal",
            TriggerSource::Bus => "BUS",
        }
    }
}

impl FromStr for TriggerSource {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        if token.starts_with("INT") {
            Ok(TriggerSource::Internal)
        } else if token.starts_with("EXT") {
            Ok(TriggerSource::External)
        } else if token.starts_with("BUS") {
            Ok(TriggerSource::Bus)
        } else {
            Err(DecodeError::UnknownToken(s.trim().to_string()))
        }
    }
}

/// Instrument-reported trigger state, read-only for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    /// Sweep stopped.
    Hold,
    /// Measurement cycle in progress.
    Measuring,
    /// Armed, waiting for a trigger.
    WaitingForTrigger,
}

impl FromStr for TriggerStatus {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        if token.starts_with("HOLD") {
            Ok(TriggerStatus::Hold)
        } else if token.starts_with("MEAS") {
            Ok(TriggerStatus::Measuring)
        } else if token.starts_with("WAIT") {
            Ok(TriggerStatus::WaitingForTrigger)
        } else {
            Err(DecodeError::UnknownToken(s.trim().to_string()))
        }
    }
}

/// Trace display/format selection (`CALCulate:FORMat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// Logarithmic magnitude.
    LogMagnitude,
    /// Phase.
    Phase,
    /// Group delay time.
    GroupDelay,
    /// Smith chart format (Lin).
    SmithLinear,
    /// Smith chart format (Log).
    SmithLog,
    /// Smith chart format (Real/Imag).
    SmithComplex,
    /// Smith chart format (R + jX).
    Smith,
    /// Smith chart format (G + jB).
    SmithAdmittance,
    /// Polar format (Lin).
    PolarLinear,
    /// Polar format (Log).
    PolarLog,
    /// Polar format (Real/Imag).
    Polar,
    /// Linear magnitude.
    LinearMagnitude,
    /// Voltage standing wave ratio.
    Swr,
    /// Real part.
    Real,
    /// Imaginary part.
    Imaginary,
    /// Expanded phase.
    ExpandedPhase,
}

impl TraceFormat {
    /// Token written after `CALCulate:FORMat`.
    pub fn scpi_token(&self) -> &'static str {
        match self {
            TraceFormat::LogMagnitude => "MLOGarithmic",
            TraceFormat::Phase => "PHASe",
            TraceFormat::GroupDelay => "GDELay",
            TraceFormat::SmithLinear => "SLINear",
            TraceFormat::SmithLog => "SLOGarithmic",
            TraceFormat::SmithComplex => "SCOMplex",
            TraceFormat::Smith => "SMITh",
            TraceFormat::SmithAdmittance => "SADMittance",
            TraceFormat::PolarLinear => "PLINear",
            TraceFormat::PolarLog => "PLOGarithmic",
            TraceFormat::Polar => "POLar",
            TraceFormat::LinearMagnitude => "MLINear",
            TraceFormat::Swr => "SWR",
            TraceFormat::Real => "REAL",
            TraceFormat::Imaginary => "IMAGinary",
            TraceFormat::ExpandedPhase => "UPHase",
        }
    }

    /// Whether traces in this format are complex pairs rather than one
    /// real value per point.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            TraceFormat::SmithLinear
                | TraceFormat::SmithLog
                | TraceFormat::SmithComplex
                | TraceFormat::Smith
                | TraceFormat::SmithAdmittance
                | TraceFormat::PolarLinear
                | TraceFormat::PolarLog
                | TraceFormat::Polar
        )
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scpi_token())
    }
}

impl FromStr for TraceFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The instrument answers `CALCulate:FORMat?` with the short form.
        match s.trim().to_ascii_uppercase().as_str() {
            "MLOG" | "MLOGARITHMIC" => Ok(TraceFormat::LogMagnitude),
            "PHAS" | "PHASE" => Ok(TraceFormat::Phase),
            "GDEL" | "GDELAY" => Ok(TraceFormat::GroupDelay),
            "SLIN" | "SLINEAR" => Ok(TraceFormat::SmithLinear),
            "SLOG" | "SLOGARITHMIC" => Ok(TraceFormat::SmithLog),
            "SCOM" | "SCOMPLEX" => Ok(TraceFormat::SmithComplex),
            "SMIT" | "SMITH" => Ok(TraceFormat::Smith),
            "SADM" | "SADMITTANCE" => Ok(TraceFormat::SmithAdmittance),
            "PLIN" | "PLINEAR" => Ok(TraceFormat::PolarLinear),
            "PLOG" | "PLOGARITHMIC" => Ok(TraceFormat::PolarLog),
            "POL" | "POLAR" => Ok(TraceFormat::Polar),
            "MLIN" | "MLINEAR" => Ok(TraceFormat::LinearMagnitude),
            "SWR" => Ok(TraceFormat::Swr),
            "REAL" => Ok(TraceFormat::Real),
            "IMAG" | "IMAGINARY" => Ok(TraceFormat::Imaginary),
            "UPH" | "UPHASE" => Ok(TraceFormat::ExpandedPhase),
            _ => Err(DecodeError::UnknownToken(s.trim().to_string())),
        }
    }
}

/// Command string constructors and query literals.
///
/// The command heads are carried verbatim from the instrument manual,
/// leading-colon inconsistencies included. Numeric values are rendered
/// plainly; the instrument assumes Hz/dB/points per field, with no unit
/// suffix.
pub mod cmd {
    use super::{TraceFormat, TransferFormat, TriggerSource};

    pub fn set_center_frequency(hz: f64) -> String {
        format!(":SENSe:FREQuency:CENTer {hz}")
    }

    pub const CENTER_FREQUENCY_QUERY: &str = ":SENSe:FREQuency:CENTer?";

    pub fn set_span(hz: f64) -> String {
        format!("SENSe:FREQuency:SPAN {hz}")
    }

    pub const SPAN_QUERY: &str = ":SENSe:FREQuency:SPAN?";

    pub fn set_start_frequency(hz: f64) -> String {
        format!("SENSe:FREQuency:STARt {hz}")
    }

    pub fn set_stop_frequency(hz: f64) -> String {
        format!("SENSe:FREQuency:STOP {hz}")
    }

    pub fn set_sweep_points(points: u32) -> String {
        format!("SENSe:SWEep:POINts {points}")
    }

    pub const SWEEP_POINTS_QUERY: &str = "SENSe:SWEep:POINts?";

    pub fn set_correction_state(enabled: bool) -> String {
        format!("SYSTem:CORRection:STATe {}", u8::from(enabled))
    }

    pub const CORRECTION_STATE_QUERY: &str = "SYSTem:CORRection:STATe?";

    pub fn set_if_bandwidth(hz: f64) -> String {
        format!("SENSe:BANDwidth {hz}")
    }

    pub const IF_BANDWIDTH_QUERY: &str = "SENSe:BANDwidth?";

    pub fn set_averaging_state(enabled: bool) -> String {
        format!("SENSe:AVERage:STATe {}", u8::from(enabled))
    }

    pub const AVERAGING_STATE_QUERY: &str = "SENSe:AVERage:STATe?";

    pub fn set_averaging_count(count: u32) -> String {
        format!(":SENSe:AVERage:COUNt {count}")
    }

    pub const AVERAGING_COUNT_QUERY: &str = "SENSe:AVERage:COUNt?";

    pub const AVERAGING_CLEAR: &str = "SENSe:AVERage:CLEar";

    pub fn set_smoothing_state(enabled: bool) -> String {
        format!("CALCulate:SMOothing {}", u8::from(enabled))
    }

    pub fn set_smoothing_aperture(aperture: f64) -> String {
        format!("CALCulate:SMOothing:APERture {aperture}")
    }

    pub fn set_trigger_source(source: TriggerSource) -> String {
        format!("TRIGger:SOURce {}", source.scpi_token())
    }

    pub const TRIGGER_SOURCE_QUERY: &str = "TRIGger:SOURce?";

    pub fn set_continuous_trigger(enabled: bool) -> String {
        format!("INITiate:CONTinuous {}", u8::from(enabled))
    }

    pub const CONTINUOUS_TRIGGER_QUERY: &str = "INITiate:CONTinuous?";

    /// Generates a trigger signal and initiates a single sweep.
    pub const TRIGGER_SINGLE: &str = "TRIGger:SINGle";

    pub const TRIGGER_STATUS_QUERY: &str = "TRIGger:STATus?";

    /// Synchronization barrier: the instrument answers only once the
    /// running sweep has finished.
    pub const OPERATION_COMPLETE_QUERY: &str = "*OPC?";

    pub const FREQUENCY_DATA_QUERY: &str = "SENSe:FREQuency:DATA?";

    pub const TRACE_DATA_QUERY: &str = "CALCulate:DATA:FDATa?";

    pub fn set_transfer_format(format: TransferFormat) -> String {
        format!("FORMat:DATA {}", format.scpi_token())
    }

    pub fn set_trace_format(format: TraceFormat) -> String {
        format!("CALCulate:FORMat {}", format.scpi_token())
    }

    pub const TRACE_FORMAT_QUERY: &str = "CALCulate:FORMat?";

    pub const AUTOSCALE: &str = "DISPlay:WINDow:TRACe:Y:AUTO";
}

/// Parse a single numeric response (scientific notation accepted).
pub fn parse_scalar(text: &str) -> Result<f64, DecodeError> {
    let token = text.trim();
    token
        .parse::<f64>()
        .map_err(|_| DecodeError::MalformedNumber(token.to_string()))
}

/// Parse a `0`/`1` style boolean response.
pub fn parse_flag(text: &str) -> Result<bool, DecodeError> {
    Ok(parse_scalar(text)? != 0.0)
}

fn parse_csv_floats(text: &str) -> Result<Vec<f64>, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .map_err(|_| DecodeError::MalformedNumber(token.to_string()))
        })
        .collect()
}

/// Decode an ASCII comma-separated response into samples.
///
/// For real-valued traces, tokens that decode to exactly `0.0` are
/// dropped. This strips a zero-padding artifact seen in some response
/// framings of the trace query; it is a heuristic, not a numerical
/// filter, and it discards genuine zero samples indistinguishably from
/// padding. Frequency axes and complex data are never filtered, since
/// zeros are meaningful there.
pub fn decode_ascii_trace(text: &str, kind: TraceKind) -> Result<Vec<f64>, DecodeError> {
    let values = parse_csv_floats(text)?;
    Ok(match kind {
        TraceKind::Real => values.into_iter().filter(|v| *v != 0.0).collect(),
        TraceKind::Frequency | TraceKind::ComplexPairs => values,
    })
}

/// Decode an ASCII comma-separated response into complex samples by
/// pairing consecutive tokens `(re, im)`. An odd token count is a decode
/// error.
pub fn decode_ascii_complex(text: &str) -> Result<Vec<Complex64>, DecodeError> {
    pair_complex(&parse_csv_floats(text)?)
}

/// Decode a binary block payload of consecutive 64-bit big-endian
/// IEEE-754 values.
pub fn decode_binary_f64(payload: &[u8]) -> Result<Vec<f64>, DecodeError> {
    if payload.len() % 8 != 0 {
        return Err(DecodeError::MisalignedPayload(payload.len()));
    }
    let mut buf = payload;
    let mut values = Vec::with_capacity(payload.len() / 8);
    while buf.has_remaining() {
        values.push(buf.get_f64());
    }
    Ok(values)
}
