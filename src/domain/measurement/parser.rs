//! Decoder for the compact `"<value>;<frequency><tag>"` measurement encoding.
//!
//! Both numbers follow `[-+]?[0-9]*\.?[0-9]+`: an optional sign, optional
//! integer digits and, when a decimal point is present, at least one digit
//! after it. The tag is exactly one of `A` (magnitude, dB) or `F`
//! (phase, rad). Nothing may precede or follow.

use thiserror::Error;

use crate::domain::foundation::ErrorCode;

use super::sample::{Sample, SampleKind};

/// Failure to decode a measurement payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed measurement: {raw:?}")]
    Malformed { raw: String },
}

impl ParseError {
    fn malformed(raw: &str) -> Self {
        ParseError::Malformed {
            raw: raw.to_string(),
        }
    }

    /// The payload that failed to decode.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::Malformed { raw } => raw,
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::MalformedMeasurement
    }
}

/// Decodes a raw payload into a typed sample. Pure.
pub fn parse(raw: &str) -> Result<Sample, ParseError> {
    let (value_text, rest) = raw.split_once(';').ok_or_else(|| ParseError::malformed(raw))?;

    let mut chars = rest.chars();
    let tag = chars.next_back().ok_or_else(|| ParseError::malformed(raw))?;
    let kind = SampleKind::from_tag(tag).ok_or_else(|| ParseError::malformed(raw))?;
    let frequency_text = chars.as_str();

    let value = parse_number(value_text).ok_or_else(|| ParseError::malformed(raw))?;
    let frequency = parse_number(frequency_text).ok_or_else(|| ParseError::malformed(raw))?;

    Ok(Sample::new(kind, value, frequency))
}

fn parse_number(text: &str) -> Option<f64> {
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);

    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let well_formed = match fraction {
        Some(fraction) => all_digits(integer) && !fraction.is_empty() && all_digits(fraction),
        None => !integer.is_empty() && all_digits(integer),
    };
    if !well_formed {
        return None;
    }

    text.parse::<f64>().ok()
}
