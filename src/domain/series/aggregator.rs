//! Per-device accumulation of Bode and Nyquist series.
//!
//! Samples are appended in arrival order (not frequency order). A Nyquist
//! point pairs the most recent magnitude with the most recent phase
//! regardless of the frequencies they were measured at; a point is emitted
//! each time either half updates once the other half has been seen.

use serde::Serialize;

use crate::domain::measurement::{Sample, SampleKind};

/// One `(frequency, value)` entry of a Bode series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub frequency: f64,
    pub value: f64,
}

/// Append-only ordered sequence of points for one sample kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, point: SeriesPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }
}

/// Complex-plane representation of a magnitude/phase pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NyquistPoint {
    pub re: f64,
    pub im: f64,
}

impl NyquistPoint {
    /// Builds a point from linear amplitude and phase in radians.
    pub fn from_polar(amplitude: f64, phase: f64) -> Self {
        Self {
            re: amplitude * phase.cos(),
            im: amplitude * phase.sin(),
        }
    }
}

/// Converts a decibel magnitude to linear amplitude.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Which series an ingest touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Magnitude,
    Phase,
    Nyquist,
}

/// Result of ingesting one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateUpdate {
    pub sample: Sample,
    pub nyquist: Option<NyquistPoint>,
}

impl AggregateUpdate {
    /// Series updated by this ingest, so callers can notify only interested observers.
    pub fn updated_series(&self) -> Vec<SeriesKind> {
        let mut updated = vec![match self.sample.kind() {
            SampleKind::Magnitude => SeriesKind::Magnitude,
            SampleKind::Phase => SeriesKind::Phase,
        }];
        if self.nyquist.is_some() {
            updated.push(SeriesKind::Nyquist);
        }
        updated
    }
}

/// Serializable copy of an aggregator's series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub magnitude: Series,
    pub phase: Series,
    pub nyquist: Vec<NyquistPoint>,
}

/// Accumulates samples for one device within one owning context.
///
/// Has no size bound; series grow for the life of the owner.
#[derive(Debug, Clone, Default)]
pub struct SeriesAggregator {
    magnitude: Series,
    phase: Series,
    nyquist: Vec<NyquistPoint>,
    latest_amplitude: Option<f64>,
    latest_phase: Option<f64>,
}

impl SeriesAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the sample to its series and derives a Nyquist point when possible.
    pub fn ingest(&mut self, sample: Sample) -> AggregateUpdate {
        let point = SeriesPoint {
            frequency: sample.frequency(),
            value: sample.value(),
        };

        let nyquist = match sample.kind() {
            SampleKind::Magnitude => {
                self.magnitude.push(point);
                let amplitude = db_to_linear(sample.value());
                self.latest_amplitude = Some(amplitude);
                self.latest_phase
                    .map(|phase| NyquistPoint::from_polar(amplitude, phase))
            }
            SampleKind::Phase => {
                self.phase.push(point);
                self.latest_phase = Some(sample.value());
                self.latest_amplitude
                    .map(|amplitude| NyquistPoint::from_polar(amplitude, sample.value()))
            }
        };

        if let Some(point) = nyquist {
            self.nyquist.push(point);
        }

        AggregateUpdate { sample, nyquist }
    }

    pub fn magnitude(&self) -> &Series {
        &self.magnitude
    }

    pub fn phase(&self) -> &Series {
        &self.phase
    }

    pub fn nyquist(&self) -> &[NyquistPoint] {
        &self.nyquist
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            magnitude: self.magnitude.clone(),
            phase: self.phase.clone(),
            nyquist: self.nyquist.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-12;

    #[test]
    fn zero_db_and_zero_rad_yield_unit_point() {
        let mut agg = SeriesAggregator::new();

        let first = agg.ingest(Sample::magnitude(0.0, 10.0));
        assert!(first.nyquist.is_none());

        let second = agg.ingest(Sample::phase(0.0, 10.0));
        let point = second.nyquist.unwrap();
        assert!((point.re - 1.0).abs() < EPS);
        assert!(point.im.abs() < EPS);
    }

    #[test]
    fn phase_first_then_magnitude_also_pairs() {
        let mut agg = SeriesAggregator::new();
        agg.ingest(Sample::phase(FRAC_PI_2, 5.0));
        let update = agg.ingest(Sample::magnitude(20.0, 5.0));

        let point = update.nyquist.unwrap();
        assert!(point.re.abs() < 1e-9);
        assert!((point.im - 10.0).abs() < 1e-9);
    }

    #[test]
    fn pairs_latest_values_regardless_of_frequency() {
        let mut agg = SeriesAggregator::new();
        agg.ingest(Sample::magnitude(0.0, 100.0));
        agg.ingest(Sample::phase(0.0, 200.0));
        let update = agg.ingest(Sample::magnitude(20.0, 300.0));

        let point = update.nyquist.unwrap();
        assert!((point.re - 10.0).abs() < 1e-9);
        assert_eq!(agg.nyquist().len(), 2);
    }

    #[test]
    fn series_preserve_arrival_order() {
        let mut agg = SeriesAggregator::new();
        agg.ingest(Sample::magnitude(-1.0, 300.0));
        agg.ingest(Sample::magnitude(-2.0, 100.0));
        agg.ingest(Sample::magnitude(-3.0, 200.0));

        let freqs: Vec<f64> = agg.magnitude().points().iter().map(|p| p.frequency).collect();
        assert_eq!(freqs, vec![300.0, 100.0, 200.0]);
        assert!(agg.phase().is_empty());
    }

    #[test]
    fn updated_series_reports_touched_kinds() {
        let mut agg = SeriesAggregator::new();
        let update = agg.ingest(Sample::phase(0.1, 1.0));
        assert_eq!(update.updated_series(), vec![SeriesKind::Phase]);

        let update = agg.ingest(Sample::magnitude(0.0, 1.0));
        assert_eq!(
            update.updated_series(),
            vec![SeriesKind::Magnitude, SeriesKind::Nyquist]
        );
    }

    #[test]
    fn db_conversion() {
        assert!((db_to_linear(0.0) - 1.0).abs() < EPS);
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-9);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn snapshot_copies_all_series() {
        let mut agg = SeriesAggregator::new();
        agg.ingest(Sample::magnitude(0.0, 1.0));
        agg.ingest(Sample::phase(0.0, 1.0));

        let snapshot = agg.snapshot();
        assert_eq!(snapshot.magnitude.len(), 1);
        assert_eq!(snapshot.phase.len(), 1);
        assert_eq!(snapshot.nyquist.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["magnitude"][0]["frequency"], 1.0);
    }
}
