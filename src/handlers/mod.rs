//! HTTP handlers. Every user-facing handler takes [`AuthUser`] and scopes
//! its store calls by that user's id.
//!
//! [`AuthUser`]: crate::middleware::auth::AuthUser

pub mod accountability;
pub mod admin;
pub mod cron;
pub mod gifts;
pub mod recipients;
pub mod recommendations;
pub mod settings;
pub mod sms;
pub mod weather;

use crate::error::StashError;

/// Trimmed, non-empty value or a 400 naming the field.
fn required(value: Option<&str>, field: &str) -> Result<String, StashError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(StashError::bad_request(format!("{field} is required"))),
    }
}

fn max_len(value: Option<&str>, max: usize, field: &str) -> Result<(), StashError> {
    match value {
        Some(v) if v.chars().count() > max => Err(StashError::bad_request(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims() {
        assert_eq!(required(Some("  Emma "), "name").unwrap(), "Emma");
        assert!(required(Some("   "), "name").is_err());
        assert!(required(None, "name").is_err());
    }

    #[test]
    fn length_counts_chars() {
        assert!(max_len(Some("ééé"), 3, "x").is_ok());
        assert!(max_len(Some("abcd"), 3, "x").is_err());
        assert!(max_len(None, 0, "x").is_ok());
    }
}
