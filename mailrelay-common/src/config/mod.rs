//! Configuration types for the mailrelay MTA.
//!
//! These are plain serde values. Consumers copy what they need when a worker
//! pool or delivery session is built, so replacing a loaded configuration
//! never affects work already in flight.
//!
//! - [`timeouts`]: timeouts for outbound delivery

pub mod timeouts;

use std::net::{IpAddr, SocketAddr};

use serde::Deserialize;

pub use self::timeouts::DeliveryTimeouts;
use crate::{error::ConfigError, target::MailExchangeTarget};

/// A port the server accepts connections on, and how many workers serve it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    pub port: u16,

    /// Address to bind. `None` listens on all interfaces.
    #[serde(default)]
    pub address: Option<IpAddr>,

    /// Number of workers accepting on this port.
    ///
    /// Default: 5
    #[serde(default = "default_threads")]
    pub threads: usize,
}

const fn default_threads() -> usize {
    5
}

impl ListenerConfig {
    #[must_use]
    pub const fn new(port: u16, address: Option<IpAddr>, threads: usize) -> Self {
        Self {
            port,
            address,
            threads,
        }
    }

    /// The socket address to bind, falling back to the unspecified IPv4 address.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.address
                .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
            self.port,
        )
    }
}

/// Outbound delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeliveryConfig {
    /// Domains this server is responsible for. The first is used as the
    /// `EHLO`/`HELO` identity.
    pub local_domains: Vec<String>,

    /// Relays used for every outbound message, in the order they are tried.
    ///
    /// When non-empty, MX lookups are skipped entirely.
    #[serde(default)]
    pub default_relays: Vec<MailExchangeTarget>,

    #[serde(default)]
    pub timeouts: DeliveryTimeouts,
}

impl DeliveryConfig {
    /// The identity announced in `EHLO`/`HELO`.
    ///
    /// # Errors
    /// If no local domain is configured.
    pub fn local_domain(&self) -> Result<&str, ConfigError> {
        self.local_domains
            .first()
            .map(String::as_str)
            .filter(|domain| !domain.is_empty())
            .ok_or(ConfigError::MissingField("local_domains"))
    }

    /// Check the values that cannot be expressed in the type.
    ///
    /// # Errors
    /// If `local_domains` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.local_domain().map(|_| ())
    }
}
