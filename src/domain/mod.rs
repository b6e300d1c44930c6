//! Domain layer containing the bridge's pure types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps, error codes)
//! - `measurement` - Measurement payload decoding into typed samples
//! - `series` - Magnitude/phase/Nyquist aggregation
//! - `bus` - Topic naming, connection lifecycle, bus and command errors
//! - `sweep` - Sweep validation, schedule and state

pub mod bus;
pub mod foundation;
pub mod measurement;
pub mod series;
pub mod sweep;
