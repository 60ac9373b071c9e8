//! Validated value types shared by the services and the CLI.

use std::fmt;

use super::error::DomainError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_GROUP_TITLE_LEN: usize = 200;
pub const MAX_GROUP_SLUG_LEN: usize = 20;

/// First path segments owned by fixed routes. A user with one of these names
/// would have an unreachable profile.
const RESERVED_USERNAMES: &[&str] = &["new", "follow", "group", "media", "auth"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("username must not be empty"));
        }
        if value.chars().count() > MAX_USERNAME_LEN {
            return Err(DomainError::validation(format!(
                "username must be at most {MAX_USERNAME_LEN} characters"
            )));
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(DomainError::validation(
                "username may contain only letters, digits and @/./+/-/_",
            ));
        }
        if RESERVED_USERNAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(value))
        {
            return Err(DomainError::validation(format!(
                "username `{value}` is reserved"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupSlug(String);

impl GroupSlug {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("group slug must not be empty"));
        }
        if value.len() > MAX_GROUP_SLUG_LEN {
            return Err(DomainError::validation(format!(
                "group slug must be at most {MAX_GROUP_SLUG_LEN} characters"
            )));
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(DomainError::validation(
                "group slug may contain only letters, digits, hyphens and underscores",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

pub fn validate_group_title(raw: &str) -> Result<String, DomainError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::validation("group title must not be empty"));
    }
    if value.chars().count() > MAX_GROUP_TITLE_LEN {
        return Err(DomainError::validation(format!(
            "group title must be at most {MAX_GROUP_TITLE_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_accepts_django_style_charset() {
        let name = Username::parse(" jane.doe+test@host ").expect("valid username");
        assert_eq!(name.as_str(), "jane.doe+test@host");
    }

    #[test]
    fn username_rejects_route_segments() {
        assert!(Username::parse("new").is_err());
        assert!(Username::parse("Follow").is_err());
        assert!(Username::parse("with space").is_err());
    }

    #[test]
    fn group_slug_length_is_bounded() {
        assert!(GroupSlug::parse("a".repeat(MAX_GROUP_SLUG_LEN).as_str()).is_ok());
        assert!(GroupSlug::parse("a".repeat(MAX_GROUP_SLUG_LEN + 1).as_str()).is_err());
        assert!(GroupSlug::parse("cats/dogs").is_err());
    }

    #[test]
    fn group_title_is_trimmed() {
        assert_eq!(validate_group_title("  Cats  ").expect("title"), "Cats");
        assert!(validate_group_title("   ").is_err());
    }
}
