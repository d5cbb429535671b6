//! `"H:M:S"` duration strings.
//!
//! Settings files and the CLI express program durations the way a bench
//! scientist writes them: `'0:0:10'` is ten seconds, `'1::'` one hour,
//! `'1:20:'` one hour twenty minutes. A bare number is seconds.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DurationParseError {
    #[error("invalid duration '{0}': expected 'H:M:S' or seconds")]
    Invalid(String),
    #[error("negative duration '{0}'")]
    Negative(String),
}

/// Parses `"H:M:S"` (any field may be empty), `"M:S"`, or plain seconds.
pub fn parse_hms(text: &str) -> Result<Duration, DurationParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DurationParseError::Invalid(text.to_string()));
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return Err(DurationParseError::Invalid(text.to_string()));
    }

    let mut fields = [0.0f64; 3];
    // Right-align: "M:S" means minutes and seconds.
    let offset = 3 - parts.len();
    for (i, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        fields[offset + i] = part
            .parse()
            .map_err(|_| DurationParseError::Invalid(text.to_string()))?;
    }

    let seconds = fields[0] * 3600.0 + fields[1] * 60.0 + fields[2];
    if seconds < 0.0 || !seconds.is_finite() {
        return Err(DurationParseError::Negative(text.to_string()));
    }
    Ok(Duration::from_secs_f64(seconds))
}
