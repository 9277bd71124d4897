//! Timecodes for positions in the source video.
//!
//! Strategy documents write positions as `HH:MM:SS.mmm`, `MM:SS.mmm`, plain
//! seconds (`"83.5"`), or JSON numbers. A comma is accepted as the decimal
//! separator so SRT-style values can be pasted in directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A position in the source video with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode {
    millis: u64,
}

/// Reasons a timecode string is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimecodeError {
    #[error("empty timecode")]
    Empty,

    #[error("invalid timecode {0:?}: expected HH:MM:SS(.mmm), MM:SS(.mmm) or seconds")]
    Malformed(String),

    /// Minutes or seconds of 60 or more, or a total too large to represent.
    #[error("invalid timecode {0:?}: out of range")]
    OutOfRange(String),

    #[error("invalid timecode {0}: must be a finite, non-negative number of seconds")]
    InvalidSeconds(f64),
}

impl Timecode {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn from_secs_f64(secs: f64) -> Result<Self, TimecodeError> {
        let millis = (secs * 1000.0).round();
        if !secs.is_finite() || secs < 0.0 || millis >= u64::MAX as f64 {
            return Err(TimecodeError::InvalidSeconds(secs));
        }
        Ok(Self {
            millis: millis as u64,
        })
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Renderer-facing form: `HH:MM:SS.mmm`.
    pub fn to_ffmpeg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.millis / 3_600_000;
        let minutes = (self.millis % 3_600_000) / 60_000;
        let seconds = (self.millis % 60_000) / 1000;
        let millis = self.millis % 1000;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TimecodeError::Empty);
        }

        let malformed = || TimecodeError::Malformed(trimmed.to_string());
        let normalized = trimmed.replace(',', ".");
        let parts: Vec<&str> = normalized.split(':').collect();
        if parts.len() > 3 {
            return Err(malformed());
        }

        let (last, leading) = parts.split_last().ok_or_else(malformed)?;
        let (whole_secs, frac) = match last.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (*last, ""),
        };

        let seconds = parse_digits(whole_secs).ok_or_else(malformed)?;
        let millis = parse_fraction_millis(frac).ok_or_else(malformed)?;

        let mut units = Vec::with_capacity(leading.len());
        for part in leading {
            units.push(parse_digits(part).ok_or_else(malformed)?);
        }

        let (hours, minutes) = match units.as_slice() {
            [] => (0, 0),
            [m] => (0, *m),
            [h, m] => (*h, *m),
            _ => return Err(malformed()),
        };

        if !leading.is_empty() && seconds >= 60 {
            return Err(TimecodeError::OutOfRange(trimmed.to_string()));
        }
        if leading.len() == 2 && minutes >= 60 {
            return Err(TimecodeError::OutOfRange(trimmed.to_string()));
        }

        let millis = hours
            .checked_mul(60)
            .and_then(|m| m.checked_add(minutes))
            .and_then(|m| m.checked_mul(60))
            .and_then(|s| s.checked_add(seconds))
            .and_then(|s| s.checked_mul(1000))
            .and_then(|ms| ms.checked_add(millis))
            .ok_or_else(|| TimecodeError::OutOfRange(trimmed.to_string()))?;
        Ok(Self { millis })
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Fractional seconds to milliseconds, truncating beyond three digits.
fn parse_fraction_millis(frac: &str) -> Option<u64> {
    if frac.is_empty() {
        return Some(0);
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits: String = frac.chars().take(3).collect();
    while digits.len() < 3 {
        digits.push('0');
    }
    digits.parse().ok()
}

impl Serialize for Timecode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timecode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Seconds(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Raw::Seconds(secs) => Timecode::from_secs_f64(secs).map_err(serde::de::Error::custom),
        }
    }
}
