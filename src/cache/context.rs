//! Viewer context and composite keys.
//!
//! Keys have the shape `language:role:identifier`. The separator is escaped
//! inside the language and role segments so prefix deletion stays unambiguous.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Language used when the caller supplies none.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Role used for unauthenticated viewers.
pub const ANONYMOUS_ROLE: &str = "anonymous";

/// Separates composite key segments.
pub const KEY_SEPARATOR: char = ':';

/// Who is looking at the content, for caches whose values vary by viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheContext {
    pub language_code: String,
    pub role: String,
}

impl CacheContext {
    /// Builds a context; empty fields fall back to `en` and the anonymous role.
    pub fn new(language_code: impl Into<String>, role: impl Into<String>) -> Self {
        let language_code = language_code.into();
        let role = role.into();
        Self {
            language_code: if language_code.is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                language_code
            },
            role: if role.is_empty() {
                ANONYMOUS_ROLE.to_string()
            } else {
                role
            },
        }
    }

    /// Anonymous viewer in the given language.
    pub fn anonymous(language_code: impl Into<String>) -> Self {
        Self::new(language_code, ANONYMOUS_ROLE)
    }

    /// Prefix shared by every key of this context, separator included.
    pub fn prefix(&self) -> String {
        format!(
            "{}{sep}{}{sep}",
            escape_segment(&self.language_code),
            escape_segment(&self.role),
            sep = KEY_SEPARATOR
        )
    }

    /// Composite key for a slug or a rendered numeric id.
    pub fn key(&self, identifier: impl fmt::Display) -> String {
        format!("{}{}", self.prefix(), identifier)
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Escapes `%` and the separator so a segment can never contain a bare `:`.
fn escape_segment(segment: &str) -> String {
    if !segment.contains(['%', KEY_SEPARATOR]) {
        return segment.to_string();
    }
    segment.replace('%', "%25").replace(KEY_SEPARATOR, "%3A")
}
