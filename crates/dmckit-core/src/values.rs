//! Numeric reply parsing and unit helpers
//!
//! DMC replies are free-form ASCII: a single value, a comma/whitespace
//! separated list, or the literal `?` for an undeclared symbol. The parsing
//! policy here is shared by status reads and both array transfer directions:
//! try the whole reply as a decimal float first, then fall back to scanning
//! tokens for the first one composed solely of numeric characters.

use crate::error::{DmcError, Result};

/// Check whether a reply is the literal "undeclared symbol" token
///
/// The controller answers `?` when a symbol or array element has not been
/// declared. This is a readiness condition, not a parse failure.
pub fn is_undeclared(reply: &str) -> bool {
    reply.trim() == "?"
}

/// Parse every numeric token out of a multi-value reply
///
/// Splits on whitespace and commas (replies mix `\r`, `\n`, `, ` freely)
/// and keeps the tokens that parse as floats, in order. Non-numeric tokens
/// are skipped, matching how the controller pads replies with prompts.
pub fn parse_number_list(reply: &str) -> Vec<f64> {
    reply
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse::<f64>().ok())
        .collect()
}

fn is_numeric_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

/// Parse a single numeric value out of a reply
///
/// Tries the trimmed reply as a decimal float directly; on failure,
/// re-splits on commas/whitespace and takes the first token composed solely
/// of digits, sign, decimal point, or exponent marker. If no such token
/// exists the reply is a parse error carrying the original text.
pub fn parse_float_reply(reply: &str) -> Result<f64> {
    let trimmed = reply.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Ok(v);
    }

    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .find(|t| is_numeric_token(t))
        .and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(|| DmcError::parse(reply))
}

/// Clamp a value into `[min_value, max_value]`
pub fn clamp(value: f64, min_value: f64, max_value: f64) -> f64 {
    value.max(min_value).min(max_value)
}

/// Check a single bit in a digital status bitfield
pub fn bit_is_set(bits: u32, index: u32) -> bool {
    bits & (1 << index) != 0
}

/// Convert encoder pulses to millimetres
///
/// Returns 0.0 when `counts_per_mm` is zero rather than dividing by zero;
/// an unconfigured axis reads as stationary.
pub fn pulses_to_mm(pulses: f64, counts_per_mm: f64) -> f64 {
    if counts_per_mm == 0.0 {
        0.0
    } else {
        pulses / counts_per_mm
    }
}

/// Convert millimetres to encoder pulses
pub fn mm_to_pulses(mm: f64, counts_per_mm: f64) -> f64 {
    mm * counts_per_mm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_direct_float() {
        assert_eq!(parse_float_reply(" 10000.0000\r\n").unwrap(), 10000.0);
        assert_eq!(parse_float_reply("-1.5e2").unwrap(), -150.0);
    }

    #[test]
    fn parse_embedded_token() {
        // Prompt noise around the value still yields the number.
        assert_eq!(parse_float_reply(": 42.5 :").unwrap(), 42.5);
        assert_eq!(parse_float_reply("val, 7.0").unwrap(), 7.0);
    }

    #[test]
    fn parse_garbage_is_error() {
        let err = parse_float_reply("no numbers here").unwrap_err();
        match err {
            DmcError::Parse { text } => assert_eq!(text, "no numbers here"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_undeclared_is_not_a_number() {
        assert!(is_undeclared(" ?\r\n"));
        assert!(parse_float_reply("?").is_err());
    }

    #[test]
    fn number_list_mixed_separators() {
        let nums = parse_number_list(" 1.0, 2.0\r\n3.5,4");
        assert_eq!(nums, vec![1.0, 2.0, 3.5, 4.0]);
    }

    #[test]
    fn number_list_skips_noise() {
        let nums = parse_number_list(":: 1.0, ?, 2.0");
        assert_eq!(nums, vec![1.0, 2.0]);
    }

    #[test]
    fn bits_and_clamp() {
        assert!(bit_is_set(0b1000_0000, 7));
        assert!(!bit_is_set(0b1000_0000, 6));
        assert_eq!(clamp(5.0, 0.0, 4.0), 4.0);
        assert_eq!(clamp(-1.0, 0.0, 4.0), 0.0);
    }

    #[test]
    fn pulse_conversions() {
        assert_eq!(pulses_to_mm(1000.0, 100.0), 10.0);
        assert_eq!(pulses_to_mm(1000.0, 0.0), 0.0);
        assert_eq!(mm_to_pulses(10.0, 100.0), 1000.0);
    }
}
