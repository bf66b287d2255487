//! Workspace version tokens.
//!
//! Versions travel as decimal strings and are compared numerically. A
//! workspace that predates versioning stores no token at all; it counts
//! as version 0 and the first confirm moves it to "1".

use crate::{KilnError, Result};

/// Parses a version token. Only ASCII decimal digits are accepted, so a
/// token like "+7" or "v3" is rejected rather than silently coerced.
pub fn parse(token: &str) -> Result<u64> {
    let trimmed = token.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KilnError::Validation(format!(
            "invalid workspace version {token:?}"
        )));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| KilnError::Validation(format!("invalid workspace version {token:?}")))
}

/// Numeric value of a stored version; an unversioned workspace counts as 0.
pub fn stored(version: Option<&str>) -> Result<u64> {
    match version {
        None => Ok(0),
        Some(v) => parse(v),
    }
}

/// Canonical token form of a numeric version.
pub fn token(version: u64) -> String {
    version.to_string()
}
