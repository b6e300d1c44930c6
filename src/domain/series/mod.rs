//! Series module - ordered magnitude, phase and Nyquist series per device.

mod aggregator;

pub use aggregator::{
    db_to_linear, AggregateUpdate, NyquistPoint, Series, SeriesAggregator, SeriesKind,
    SeriesPoint, SeriesSnapshot,
};
