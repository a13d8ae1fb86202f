//! Binary NUMERIC encoding and decoding
//!
//! tokio-postgres has no built-in NUMERIC support, so the wire format is
//! decoded here into its canonical text form and encoded from decimal text.

use std::fmt::Write;

use tokio_postgres::types::{FromSql, Type};

type BoxError = Box<dyn std::error::Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// A NUMERIC value in the text form PostgreSQL itself prints
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PgNumeric(pub String);

impl PgNumeric {
    pub(crate) fn to_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

/// Decode the binary payload: a header of digit count, weight, sign and display
/// scale, followed by base-10000 digit groups.
pub(crate) fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: header too short".into());
    }

    let ndigits = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid NUMERIC payload: sign {other:#06x}").into()),
    }

    if raw.len() != 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: digit count mismatch".into());
    }

    let digits: Vec<u16> = raw[8..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    if digits.iter().any(|&group| group > 9999) {
        return Err("invalid NUMERIC payload: digit group out of range".into());
    }

    let group = |index: i32| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG && digits.iter().any(|&g| g != 0) {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        write!(out, "{}", group(0))?;
        for index in 1..=weight {
            write!(out, "{:04}", group(index))?;
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", group(index))?;
            index += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Encode a decimal literal (`-12.50`, `0.0001`, `NaN`, `Infinity`) into the
/// binary payload `decode_numeric` reads.
pub(crate) fn encode_numeric(text: &str) -> Result<Vec<u8>, BoxError> {
    let text = text.trim();
    let special = match text.to_ascii_lowercase().as_str() {
        "nan" => Some(NUMERIC_NAN),
        "infinity" | "+infinity" | "inf" | "+inf" => Some(NUMERIC_PINF),
        "-infinity" | "-inf" => Some(NUMERIC_NINF),
        _ => None,
    };
    if let Some(sign) = special {
        return Ok(header(0, 0, sign, 0));
    }

    let invalid = || -> BoxError { format!("invalid NUMERIC literal: {text:?}").into() };

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }

    let dscale = u16::try_from(frac_part.len()).map_err(|_| invalid())?;
    let int_part = int_part.trim_start_matches('0');

    // Left-pad the integer part and right-pad the fraction to whole groups.
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let padded: Vec<u8> = std::iter::repeat_n(b'0', int_pad)
        .chain(int_part.bytes())
        .chain(frac_part.bytes())
        .chain(std::iter::repeat_n(b'0', frac_pad))
        .collect();

    let mut groups: Vec<u16> = padded
        .chunks_exact(4)
        .map(|chunk| chunk.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0')))
        .collect();
    let mut weight = i32::try_from((int_part.len() + int_pad) / 4).map_err(|_| invalid())? - 1;

    let leading = groups.iter().take_while(|&&g| g == 0).count();
    groups.drain(..leading);
    weight -= leading as i32;
    while groups.last() == Some(&0) {
        groups.pop();
    }

    if groups.is_empty() {
        return Ok(header(0, 0, NUMERIC_POS, dscale));
    }

    let ndigits = u16::try_from(groups.len()).map_err(|_| invalid())?;
    let weight = i16::try_from(weight).map_err(|_| invalid())?;
    let sign = if negative { NUMERIC_NEG } else { NUMERIC_POS };

    let mut raw = header(ndigits, weight, sign, dscale);
    for group in groups {
        raw.extend_from_slice(&group.to_be_bytes());
    }
    Ok(raw)
}

fn header(ndigits: u16, weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
    let mut raw = Vec::with_capacity(8 + ndigits as usize * 2);
    raw.extend_from_slice(&ndigits.to_be_bytes());
    raw.extend_from_slice(&weight.to_be_bytes());
    raw.extend_from_slice(&sign.to_be_bytes());
    raw.extend_from_slice(&dscale.to_be_bytes());
    raw
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = header(digits.len() as u16, weight, sign, dscale);
        for digit in digits {
            raw.extend_from_slice(&digit.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_integer_and_fraction() {
        assert_eq!(decode_numeric(&payload(0, NUMERIC_POS, 1, &[12, 5000])).unwrap(), "12.5");
        assert_eq!(
            decode_numeric(&payload(1, NUMERIC_POS, 0, &[1234, 5678])).unwrap(),
            "12345678"
        );
    }

    #[test]
    fn test_trailing_zero_groups_are_implied() {
        assert_eq!(decode_numeric(&payload(2, NUMERIC_POS, 0, &[1])).unwrap(), "100000000");
    }

    #[test]
    fn test_small_fractions_keep_leading_zeros() {
        assert_eq!(decode_numeric(&payload(-1, NUMERIC_POS, 4, &[1])).unwrap(), "0.0001");
        assert_eq!(
            decode_numeric(&payload(-2, NUMERIC_POS, 8, &[1])).unwrap(),
            "0.00000001"
        );
    }

    #[test]
    fn test_display_scale_is_honoured() {
        assert_eq!(decode_numeric(&payload(0, NUMERIC_POS, 3, &[7])).unwrap(), "7.000");
        assert_eq!(decode_numeric(&payload(-1, NUMERIC_NEG, 2, &[5000])).unwrap(), "-0.50");
    }

    #[test]
    fn test_zero_and_special_values() {
        assert_eq!(decode_numeric(&payload(0, NUMERIC_POS, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&payload(0, NUMERIC_NEG, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&payload(0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert_eq!(decode_numeric(&payload(0, NUMERIC_NINF, 0, &[])).unwrap(), "-Infinity");
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(PgNumeric("12.5".into()).to_f64(), Some(12.5));
        assert_eq!(PgNumeric("-Infinity".into()).to_f64(), Some(f64::NEG_INFINITY));
        assert!(PgNumeric("NaN".into()).to_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(decode_numeric(&[0, 1]).is_err());
        assert!(decode_numeric(&payload(0, 0x1234, 0, &[1])).is_err());
        assert!(decode_numeric(&payload(0, NUMERIC_POS, 0, &[10_000])).is_err());

        let mut truncated = payload(0, NUMERIC_POS, 0, &[1, 2]);
        truncated.pop();
        assert!(decode_numeric(&truncated).is_err());
    }

    #[test]
    fn test_encode_matches_server_layout() {
        assert_eq!(encode_numeric("2.25").unwrap(), payload(0, NUMERIC_POS, 2, &[2, 2500]));
        assert_eq!(encode_numeric("5").unwrap(), payload(0, NUMERIC_POS, 0, &[5]));
        assert_eq!(encode_numeric("100000000").unwrap(), payload(2, NUMERIC_POS, 0, &[1]));
        assert_eq!(encode_numeric("0.00000001").unwrap(), payload(-2, NUMERIC_POS, 8, &[1]));
        assert_eq!(encode_numeric("-0.50").unwrap(), payload(-1, NUMERIC_NEG, 2, &[5000]));
        assert_eq!(encode_numeric("-0.00").unwrap(), payload(0, NUMERIC_POS, 2, &[]));
        assert_eq!(encode_numeric("Infinity").unwrap(), payload(0, NUMERIC_PINF, 0, &[]));
        assert_eq!(encode_numeric("NaN").unwrap(), payload(0, NUMERIC_NAN, 0, &[]));
    }

    #[test]
    fn test_encoded_values_decode_to_same_text() {
        for text in ["12.50", "12345678.0001", "-9999.9999", "0.0001", "7.000"] {
            assert_eq!(decode_numeric(&encode_numeric(text).unwrap()).unwrap(), text);
        }
    }

    #[test]
    fn test_encode_rejects_non_numeric_text() {
        for text in ["", "-", ".", "1.2.3", "12a", "1e5", "--1"] {
            assert!(encode_numeric(text).is_err(), "{text:?} should be rejected");
        }
    }
}
