//! Measurement module - decoding device payloads into typed samples.

mod parser;
mod sample;

pub use parser::{parse, ParseError};
pub use sample::{Sample, SampleKind};
