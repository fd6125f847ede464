//! Parsing of config values with unit suffixes.

use std::time::Duration;

use crate::error::UnitError;

/// Parse an interval like `"30"`, `"30s"`, `"5m"`, `"2h"` or `"1d"`.
///
/// A bare number is seconds.
pub fn parse_interval(s: &str) -> Result<Duration, UnitError> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        return Err(UnitError::Empty);
    };

    let (number, multiplier) = match unit {
        '0'..='9' => (s, 1),
        's' => (&s[..s.len() - 1], 1),
        'm' => (&s[..s.len() - 1], 60),
        'h' => (&s[..s.len() - 1], 60 * 60),
        'd' => (&s[..s.len() - 1], 24 * 60 * 60),
        other => return Err(UnitError::InvalidUnit(other)),
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| UnitError::InvalidNumber(number.to_string()))?;
    let secs = value
        .checked_mul(multiplier)
        .ok_or_else(|| UnitError::InvalidNumber(s.to_string()))?;
    Ok(Duration::from_secs(secs))
}

/// Parse a message count like `"500"`, `"2k"` or `"1.5m"`.
///
/// `k` multiplies by one thousand, `m` by one million. A fractional mantissa
/// is allowed with a suffix; the result is truncated.
pub fn parse_count(s: &str) -> Result<u64, UnitError> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        return Err(UnitError::Empty);
    };

    let (number, multiplier) = match unit {
        '0'..='9' => {
            return s
                .parse()
                .map_err(|_| UnitError::InvalidNumber(s.to_string()));
        }
        'k' => (&s[..s.len() - 1], 1_000.0),
        'm' => (&s[..s.len() - 1], 1_000_000.0),
        other => return Err(UnitError::InvalidUnit(other)),
    };

    let mantissa: f64 = number
        .trim()
        .parse()
        .map_err(|_| UnitError::InvalidNumber(number.to_string()))?;
    let value = mantissa * multiplier;
    if !value.is_finite() || value < 0.0 || value > u64::MAX as f64 {
        return Err(UnitError::InvalidNumber(s.to_string()));
    }
    Ok(value as u64)
}
