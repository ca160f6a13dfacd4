//! Decoded traces and derived quantities.
//!
//! A [`RawTrace`] is the ordered sample sequence returned by one data
//! query, tagged with what it represents so downstream processing knows
//! which rules apply (the zero-padding filter is only ever applied to
//! real-valued traces; pairing only makes sense for complex-pair
//! traces).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DomainError};

/// What one decoded trace represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// One real value per sweep point (magnitude, phase, SWR, ...).
    Real,
    /// Interleaved `(re, im)` pairs, two values per sweep point.
    ComplexPairs,
    /// The sweep's frequency axis in Hz.
    Frequency,
}

impl TraceKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TraceKind::Real => "real",
            TraceKind::ComplexPairs => "complex-pair",
            TraceKind::Frequency => "frequency",
        }
    }
}

/// Ordered sequence of decoded samples from one data query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrace {
    kind: TraceKind,
    values: Vec<f64>,
}

impl RawTrace {
    /// Tag a decoded sample sequence.
    pub fn new(kind: TraceKind, values: Vec<f64>) -> Self {
        Self { kind, values }
    }

    /// What this trace represents.
    pub fn kind(&self) -> TraceKind {
        self.kind
    }

    /// The flat decoded samples (two per point for complex pairs).
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of flat samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the trace, returning the flat samples.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Reconstruct complex samples from a complex-pair trace.
    pub fn to_complex(&self) -> Result<Vec<Complex64>, DecodeError> {
        match self.kind {
            TraceKind::ComplexPairs => pair_complex(&self.values),
            other => Err(DecodeError::NotComplex(other.as_str())),
        }
    }
}

/// Pair consecutive samples `(re, im)` into complex values. An
/// odd-length sequence is a decode error.
pub fn pair_complex(values: &[f64]) -> Result<Vec<Complex64>, DecodeError> {
    if values.len() % 2 != 0 {
        return Err(DecodeError::OddSampleCount(values.len()));
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| Complex64::new(pair[0], pair[1]))
        .collect())
}

/// Derive normalized impedance from reflection coefficients.
///
/// Computes `z = (1 + s) / (1 - s)` per sample. The result is normalized
/// to the instrument's raw Smith-chart reference (`Z0 = 1`); callers
/// needing ohms multiply by their actual reference impedance themselves.
///
/// A sample of exactly `1 + 0i` is a pure open circuit whose impedance is
/// unbounded; it fails the derivation with a [`DomainError`] carrying the
/// sample index rather than producing infinities or panicking.
pub fn impedance_from_reflection(
    reflection: &[Complex64],
) -> Result<Vec<Complex64>, DomainError> {
    const ONE: Complex64 = Complex64::new(1.0, 0.0);
    reflection
        .iter()
        .enumerate()
        .map(|(index, s)| {
            let denominator = ONE - s;
            if denominator.re == 0.0 && denominator.im == 0.0 {
                Err(DomainError::ReflectionSingularity { index })
            } else {
                Ok((ONE + s) / denominator)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_load_has_unit_impedance() {
        let z = impedance_from_reflection(&[Complex64::new(0.0, 0.0)]).unwrap();
        assert_eq!(z, vec![Complex64::new(1.0, 0.0)]);
    }

    #[test]
    fn test_open_circuit_is_a_domain_error() {
        let err = impedance_from_reflection(&[
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
        ])
        .unwrap_err();
        assert_eq!(err, DomainError::ReflectionSingularity { index: 1 });
    }

    #[test]
    fn test_short_circuit_impedance_is_zero() {
        let z = impedance_from_reflection(&[Complex64::new(-1.0, 0.0)]).unwrap();
        assert_eq!(z, vec![Complex64::new(0.0, 0.0)]);
    }

    #[test]
    fn test_reactive_reflection() {
        // s = j maps to z = (1 + j) / (1 - j) = j, a pure reactance.
        let z = impedance_from_reflection(&[Complex64::new(0.0, 1.0)]).unwrap();
        assert!((z[0] - Complex64::new(0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_pair_complex() {
        let pairs = pair_complex(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(
            pairs,
            vec![Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)]
        );
        assert_eq!(
            pair_complex(&[1.0, 2.0, 3.0]).unwrap_err(),
            DecodeError::OddSampleCount(3)
        );
    }

    #[test]
    fn test_raw_trace_pairing_requires_complex_kind() {
        let trace = RawTrace::new(TraceKind::Real, vec![1.0, 2.0]);
        assert!(matches!(
            trace.to_complex().unwrap_err(),
            DecodeError::NotComplex("real")
        ));

        let trace = RawTrace::new(TraceKind::ComplexPairs, vec![1.0, 2.0]);
        assert_eq!(trace.to_complex().unwrap(), vec![Complex64::new(1.0, 2.0)]);
    }
}
