//! Field-level checks shared by every record type.
//!
//! All of these run before a write transaction is opened, so a rejected
//! request never touches storage.

use crate::error::{Result, ReuneError};

/// Trimmed, non-blank text with an optional length cap.
pub fn required_text(field: &str, value: Option<String>, max_len: Option<usize>) -> Result<String> {
    let Some(raw) = value else {
        return Err(ReuneError::validation(field, "this field is required"));
    };
    let text = raw.trim().to_string();
    if text.is_empty() {
        return Err(ReuneError::validation(field, "this field may not be blank"));
    }
    if let Some(max) = max_len {
        if text.chars().count() > max {
            return Err(ReuneError::validation(
                field,
                format!("ensure this field has no more than {max} characters"),
            ));
        }
    }
    Ok(text)
}

/// Trimmed text; blank becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required<T>(field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| ReuneError::validation(field, "this field is required"))
}

/// Integer score on the 1–5 scale used by confidence, assessment and mood.
pub fn score(field: &str, value: Option<i64>) -> Result<u8> {
    let v = required(field, value)?;
    if !(1..=5).contains(&v) {
        return Err(ReuneError::validation(
            field,
            format!("must be between 1 and 5, got {v}"),
        ));
    }
    Ok(v as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims() {
        let v = required_text("title", Some("  Grow revenue ".into()), None).unwrap();
        assert_eq!(v, "Grow revenue");
    }

    #[test]
    fn required_text_rejects_missing_and_blank() {
        assert!(matches!(
            required_text("title", None, None),
            Err(ReuneError::Validation { ref field, .. }) if field == "title"
        ));
        assert!(required_text("title", Some("   ".into()), None).is_err());
    }

    #[test]
    fn required_text_enforces_max_len() {
        let long = "x".repeat(501);
        assert!(required_text("title", Some(long), Some(500)).is_err());
        assert!(required_text("title", Some("x".repeat(500)), Some(500)).is_ok());
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" ok ".into())), Some("ok".into()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn score_bounds() {
        assert_eq!(score("confidence", Some(1)).unwrap(), 1);
        assert_eq!(score("confidence", Some(5)).unwrap(), 5);
        assert!(score("confidence", Some(0)).is_err());
        assert!(score("confidence", Some(6)).is_err());
        assert!(score("confidence", None).is_err());
    }
}
