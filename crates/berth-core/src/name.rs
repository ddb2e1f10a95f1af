//! Name sanitization for storage keys.
//!
//! Every user-supplied name (worker, client, gateway, application, version)
//! passes through [`sanitize_name`] before it becomes a path segment.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid name {raw:?}: nothing usable left after sanitization")]
pub struct InvalidName {
    pub raw: String,
}

/// A name that is safe to use as a single storage path segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SanitizedName(String);

impl SanitizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Strip everything outside `[A-Za-z0-9._-]`, then any leading dots.
///
/// Distinct raw inputs may collapse to the same sanitized value
/// (`"my app"` and `"my/app"` both become `"myapp"`); callers treat that
/// as a collision on create.
pub fn sanitize_name(raw: &str) -> Result<SanitizedName, InvalidName> {
    let kept: String = raw.trim().chars().filter(|c| is_allowed(*c)).collect();
    let kept = kept.trim_start_matches('.');
    if kept.is_empty() {
        return Err(InvalidName {
            raw: raw.to_string(),
        });
    }
    Ok(SanitizedName(kept.to_string()))
}
