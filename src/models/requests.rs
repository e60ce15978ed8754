//! Request DTOs for the admin API

use serde::Deserialize;

use crate::cache::ANONYMOUS_ROLE;

/// Query string of `GET /pages/:lang/:slug`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Viewer role; anonymous when absent
    #[serde(default)]
    pub role: Option<String>,
}

impl PageQuery {
    /// The requested role, or the anonymous role.
    pub fn role(&self) -> &str {
        self.role
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(ANONYMOUS_ROLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_defaults_to_anonymous() {
        assert_eq!(PageQuery::default().role(), ANONYMOUS_ROLE);
        let empty = PageQuery { role: Some(String::new()) };
        assert_eq!(empty.role(), ANONYMOUS_ROLE);
        let admin = PageQuery { role: Some("admin".to_string()) };
        assert_eq!(admin.role(), "admin");
    }
}
