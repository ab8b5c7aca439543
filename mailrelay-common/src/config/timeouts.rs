//! Timeout configuration for outbound SMTP delivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client-side timeouts used by a delivery session.
///
/// Every read from the remote server is bounded by `read_secs`; a read that
/// takes longer fails the session rather than hanging it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTimeouts {
    /// Timeout for establishing the TCP connection to each candidate target.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for each read of a server reply (and each write flush).
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::read_secs")]
    pub read_secs: u64,
}

impl DeliveryTimeouts {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }
}

impl Default for DeliveryTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            read_secs: defaults::read_secs(),
        }
    }
}

mod defaults {
    pub const fn connect_secs() -> u64 {
        30
    }
    pub const fn read_secs() -> u64 {
        60
    }
}
