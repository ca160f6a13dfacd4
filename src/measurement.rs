//! Timestamped acquisition records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trace::RawTrace;

/// One synchronized acquisition: the sweep's frequency axis and the
/// trace measured over it, stamped when the data was fetched.
///
/// The trace can be shorter than the frequency axis when the real-trace
/// zero filter has stripped samples; the controller logs a warning when
/// that happens instead of guessing an alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepMeasurement {
    /// Identifier of the instrument that produced the data.
    pub instrument_id: String,
    /// When the trace data was fetched.
    pub acquired_at: DateTime<Utc>,
    /// Frequency axis in Hz, one entry per sweep point.
    pub frequency_hz: Vec<f64>,
    /// The measured trace.
    pub trace: RawTrace,
}

impl SweepMeasurement {
    /// Number of points on the frequency axis.
    pub fn num_points(&self) -> usize {
        self.frequency_hz.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceKind;

    #[test]
    fn test_measurement_record() {
        let measurement = SweepMeasurement {
            instrument_id: "vna".to_string(),
            acquired_at: Utc::now(),
            frequency_hz: vec![1e6, 2e6, 3e6],
            trace: RawTrace::new(TraceKind::Real, vec![-3.2, -2.9, -3.5]),
        };
        assert_eq!(measurement.num_points(), 3);
        assert_eq!(measurement.trace.len(), 3);
    }
}
