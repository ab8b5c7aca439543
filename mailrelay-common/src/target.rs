//! Remote SMTP servers that outbound delivery may connect to.

use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};

use serde::Deserialize;

use crate::{error::ConfigError, internal};

/// Port used when a target does not name one.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Username and password presented with `AUTH LOGIN`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single `(host, port)` candidate for delivery, optionally with credentials.
///
/// Lists of targets are ordered: earlier entries are attempted first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct MailExchangeTarget {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
}

impl MailExchangeTarget {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Build a target from a mail exchanger name that may carry a `:port` suffix.
    ///
    /// Unlike [`FromStr`], this never fails: an unparsable port is logged and
    /// replaced with port 25, and a missing host becomes `localhost`.
    #[must_use]
    pub fn from_exchange(exchange: &str) -> Self {
        let Some((host, port)) = exchange.split_once(':') else {
            return Self::new(exchange, DEFAULT_SMTP_PORT);
        };

        let port = port.parse().unwrap_or_else(|err| {
            internal!(
                level = WARN,
                "Invalid port '{port}' for mail exchanger {exchange} ({err}), using {DEFAULT_SMTP_PORT}"
            );
            DEFAULT_SMTP_PORT
        });

        let host = if host.is_empty() { "localhost" } else { host };

        Self::new(host, port)
    }
}

impl Display for MailExchangeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses the relay form `host[:port][/username:password]`.
impl FromStr for MailExchangeTarget {
    type Err = ConfigError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let entry = entry.trim();
        let invalid = |reason: String| ConfigError::InvalidRelay {
            entry: entry.to_string(),
            reason,
        };

        let (server, credentials) = match entry.split_once('/') {
            Some((server, credentials)) => (server, Some(credentials)),
            None => (entry, None),
        };

        let (host, port) = match server.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|err| invalid(format!("invalid port '{port}': {err}")))?,
            ),
            None => (server, DEFAULT_SMTP_PORT),
        };

        let host = if host.is_empty() { "localhost" } else { host };
        let target = Self::new(host, port);

        match credentials {
            None => Ok(target),
            Some(credentials) => {
                let (username, password) = credentials.split_once(':').ok_or_else(|| {
                    invalid("credentials must be written as username:password".to_string())
                })?;

                Ok(target.with_credentials(Credentials::new(username, password)))
            }
        }
    }
}

impl TryFrom<String> for MailExchangeTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
