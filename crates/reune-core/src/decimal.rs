//! Fixed two-place decimals.
//!
//! Amounts and percentages are `BigDecimal` values carried at scale 2. On the
//! wire and in storage they are strings (`"25.00"`) so no precision is lost to
//! binary floating point. Inputs may be JSON numbers or numeric strings.

use crate::error::{Result, ReuneError};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DECIMAL_PLACES: i64 = 2;
pub const MAX_DIGITS: i64 = 18;

/// Raw decimal as submitted by a client, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecimalInput {
    Number(serde_json::Number),
    Text(String),
}

impl DecimalInput {
    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for DecimalInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for DecimalInput {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Parse and bound-check a submitted amount.
///
/// At most two fractional digits and `MAX_DIGITS - 2` integral digits.
pub fn parse_amount(field: &str, input: &DecimalInput) -> Result<BigDecimal> {
    let text = input.as_text();
    let value = BigDecimal::from_str(&text)
        .map_err(|_| ReuneError::validation(field, "a valid number is required"))?
        .normalized();

    let (_, scale) = value.as_bigint_and_exponent();
    if scale > DECIMAL_PLACES {
        return Err(ReuneError::validation(
            field,
            format!("ensure that there are no more than {DECIMAL_PLACES} decimal places"),
        ));
    }
    let integral_digits = value.digits() as i64 - scale;
    if integral_digits > MAX_DIGITS - DECIMAL_PLACES {
        return Err(ReuneError::validation(
            field,
            format!(
                "ensure that there are no more than {} digits before the decimal point",
                MAX_DIGITS - DECIMAL_PLACES
            ),
        ));
    }
    Ok(to_two_places(&value))
}

pub fn required_amount(field: &str, input: Option<&DecimalInput>) -> Result<BigDecimal> {
    match input {
        Some(raw) => parse_amount(field, raw),
        None => Err(ReuneError::validation(field, "this field is required")),
    }
}

/// Round half-even to two places and fix the scale at two.
pub fn to_two_places(value: &BigDecimal) -> BigDecimal {
    value.round(DECIMAL_PLACES).with_scale(DECIMAL_PLACES)
}

/// Canonical text form: always exactly two fractional digits (`"0.00"`,
/// `"-3.50"`, `"25.00"`).
///
/// `BigDecimal`'s `Display` drops the scale of zero, so this builds the string
/// from the unscaled integer instead.
pub fn format_two_places(value: &BigDecimal) -> String {
    let (unscaled, _) = to_two_places(value).as_bigint_and_exponent();
    let digits = unscaled.to_string();
    let (sign, magnitude) = match digits.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", digits.as_str()),
    };
    let padded = format!("{magnitude:0>3}");
    let (whole, frac) = padded.split_at(padded.len() - DECIMAL_PLACES as usize);
    format!("{sign}{whole}.{frac}")
}

/// `#[serde(with = "crate::decimal::two_places")]`
pub mod two_places {
    use super::{format_two_places, to_two_places};
    use bigdecimal::BigDecimal;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(value: &BigDecimal, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format_two_places(value))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<BigDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        let value = BigDecimal::from_str(&raw).map_err(D::Error::custom)?;
        Ok(to_two_places(&value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> DecimalInput {
        DecimalInput::from(s)
    }

    fn amount(s: &str) -> String {
        format_two_places(&parse_amount("v", &text(s)).unwrap())
    }

    #[test]
    fn parses_numbers_and_strings() {
        assert_eq!(amount("50"), "50.00");
        assert_eq!(amount(" 12.5 "), "12.50");
        let n: DecimalInput = serde_json::from_str("0.1").unwrap();
        assert_eq!(format_two_places(&parse_amount("v", &n).unwrap()), "0.10");
        let neg: DecimalInput = serde_json::from_str("-3").unwrap();
        assert_eq!(format_two_places(&parse_amount("v", &neg).unwrap()), "-3.00");
    }

    #[test]
    fn trailing_zeros_do_not_count_as_places() {
        assert_eq!(amount("7.500"), "7.50");
    }

    #[test]
    fn rejects_non_numeric() {
        for bad in ["abc", "", "NaN", "1,5"] {
            let err = parse_amount("current_value", &text(bad)).unwrap_err();
            assert!(
                matches!(err, ReuneError::Validation { ref field, .. } if field == "current_value"),
                "input {bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_three_decimal_places() {
        assert!(parse_amount("v", &text("1.234")).is_err());
    }

    #[test]
    fn rejects_too_many_integral_digits() {
        assert!(parse_amount("v", &text("12345678901234567")).is_err());
        assert!(parse_amount("v", &text("1234567890123456")).is_ok());
    }

    #[test]
    fn zero_is_accepted() {
        assert_eq!(amount("0"), "0.00");
        assert_eq!(amount("0.00"), "0.00");
        assert_eq!(amount("-0"), "0.00");
    }

    #[test]
    fn formats_with_exactly_two_places() {
        let cases = [
            ("0", "0.00"),
            ("0.5", "0.50"),
            ("0.05", "0.05"),
            ("-0.05", "-0.05"),
            ("-3.5", "-3.50"),
            ("100", "100.00"),
            ("33.333", "33.33"),
            ("1234567890123456.78", "1234567890123456.78"),
        ];
        for (raw, expected) in cases {
            let value = BigDecimal::from_str(raw).unwrap();
            assert_eq!(format_two_places(&value), expected, "formatting {raw}");
        }
    }

    #[test]
    fn required_amount_missing() {
        assert!(required_amount("target_value", None).is_err());
    }

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "two_places")]
        value: BigDecimal,
    }

    #[test]
    fn two_places_writes_strings() {
        let h = Holder {
            value: BigDecimal::from(25),
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"value":"25.00"}"#);
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, BigDecimal::from(25));
    }

    #[test]
    fn two_places_writes_zero_with_places() {
        let h = Holder {
            value: BigDecimal::from(0),
        };
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"value":"0.00"}"#);
    }
}
