//! Typed frequency-response samples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of a Bode pair a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// Magnitude in decibels (wire tag `A`).
    Magnitude,
    /// Phase in radians (wire tag `F`).
    Phase,
}

impl SampleKind {
    /// Wire tag that terminates a measurement payload.
    pub fn tag(&self) -> char {
        match self {
            SampleKind::Magnitude => 'A',
            SampleKind::Phase => 'F',
        }
    }

    /// Resolves a wire tag. Only `A` and `F` are recognised.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'A' => Some(SampleKind::Magnitude),
            'F' => Some(SampleKind::Phase),
            _ => None,
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleKind::Magnitude => "magnitude",
            SampleKind::Phase => "phase",
        };
        write!(f, "{}", s)
    }
}

/// One measurement reported by a device. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    kind: SampleKind,
    value: f64,
    frequency: f64,
}

impl Sample {
    pub fn new(kind: SampleKind, value: f64, frequency: f64) -> Self {
        Self {
            kind,
            value,
            frequency,
        }
    }

    /// Magnitude sample, `value` in dB.
    pub fn magnitude(value: f64, frequency: f64) -> Self {
        Self::new(SampleKind::Magnitude, value, frequency)
    }

    /// Phase sample, `value` in radians.
    pub fn phase(value: f64, frequency: f64) -> Self {
        Self::new(SampleKind::Phase, value, frequency)
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for kind in [SampleKind::Magnitude, SampleKind::Phase] {
            assert_eq!(SampleKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(SampleKind::from_tag('a'), None);
        assert_eq!(SampleKind::from_tag('X'), None);
    }

    #[test]
    fn sample_serializes_with_snake_case_kind() {
        let json = serde_json::to_value(Sample::phase(-1.57, 250.0)).unwrap();
        assert_eq!(json["kind"], "phase");
        assert_eq!(json["value"], -1.57);
        assert_eq!(json["frequency"], 250.0);
    }
}
