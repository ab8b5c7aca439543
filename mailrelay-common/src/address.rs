use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    str::FromStr,
};

use crate::error::AddressError;

/// A plain `username@domain` mailbox.
///
/// Two addresses are equal when their usernames match exactly and their
/// domains match ignoring ASCII case.
#[derive(Clone, Debug)]
pub struct EmailAddress {
    username: String,
    domain: String,
}

impl EmailAddress {
    /// Build an address from its parts.
    ///
    /// # Errors
    /// If either part is empty, or the username contains an `@`.
    pub fn new(
        username: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let username = username.into();
        let domain = domain.into();

        if username.is_empty() || username.contains('@') {
            return Err(AddressError::InvalidUsername(username));
        }

        if domain.is_empty() || domain.contains('@') {
            return Err(AddressError::InvalidDomain(domain));
        }

        Ok(Self { username, domain })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The full `username@domain` form, as used in `MAIL FROM` and `RCPT TO`.
    #[must_use]
    pub fn address(&self) -> String {
        self.to_string()
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.domain)
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && self.domain.eq_ignore_ascii_case(&other.domain)
    }
}

impl Eq for EmailAddress {}

impl Hash for EmailAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
        self.domain.to_ascii_lowercase().hash(state);
    }
}

impl FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(s);

        let (username, domain) = s
            .rsplit_once('@')
            .ok_or_else(|| AddressError::MissingAt(s.to_string()))?;

        Self::new(username, domain)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_and_display() {
        let address: EmailAddress = "alice@example.com".parse().unwrap();
        assert_eq!(address.username(), "alice");
        assert_eq!(address.domain(), "example.com");
        assert_eq!(address.address(), "alice@example.com");
    }

    #[test]
    fn parse_strips_angle_brackets() {
        let address: EmailAddress = "<bob@example.org>".parse().unwrap();
        assert_eq!(address.address(), "bob@example.org");
    }

    #[test]
    fn domain_comparison_ignores_case() {
        let lower: EmailAddress = "carol@example.com".parse().unwrap();
        let upper: EmailAddress = "carol@EXAMPLE.Com".parse().unwrap();
        assert_eq!(lower, upper);

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(set.contains(&upper));
    }

    #[test]
    fn username_comparison_is_exact() {
        let a: EmailAddress = "Dave@example.com".parse().unwrap();
        let b: EmailAddress = "dave@example.com".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            "no-at-sign".parse::<EmailAddress>(),
            Err(AddressError::MissingAt(_))
        ));
        assert!(matches!(
            "@example.com".parse::<EmailAddress>(),
            Err(AddressError::InvalidUsername(_))
        ));
        assert!(matches!(
            "erin@".parse::<EmailAddress>(),
            Err(AddressError::InvalidDomain(_))
        ));
    }
}
