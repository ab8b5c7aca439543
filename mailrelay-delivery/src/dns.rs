//! MX record lookups for mail delivery.
//!
//! [`MxResolver`] is the seam between target resolution and DNS: production
//! code uses [`DnsResolver`] (hickory), tests substitute a stub.

use std::time::Duration;

use hickory_resolver::{
    TokioResolver,
    config::ResolverOpts,
    name_server::TokioConnectionProvider,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during DNS resolution.
#[derive(Debug, Error)]
pub enum DnsError {
    /// DNS query failed due to network or resolver issues.
    #[error("DNS lookup failed: {0}")]
    LookupFailed(#[from] hickory_resolver::ResolveError),

    /// DNS query timed out.
    #[error("DNS query timed out for domain: {0}")]
    Timeout(String),
}

/// Configuration for DNS resolver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsConfig {
    /// DNS query timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    5
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One MX answer: the exchange name exactly as DNS returned it, and its preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub priority: u16,
    pub exchange: String,
}

impl MxRecord {
    #[must_use]
    pub fn new(priority: u16, exchange: impl Into<String>) -> Self {
        Self {
            priority,
            exchange: exchange.into(),
        }
    }
}

/// Something that can answer MX queries.
pub trait MxResolver: Send + Sync {
    /// The MX records for `domain`, in answer order.
    ///
    /// A domain without MX records yields an empty list rather than an error.
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, DnsError>> + Send;
}

/// MX lookups through the system resolver configuration.
#[derive(Debug)]
pub struct DnsResolver {
    resolver: TokioResolver,
    timeout: Duration,
}

impl DnsResolver {
    /// Creates a new DNS resolver from the system configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new(config: &DnsConfig) -> Result<Self, DnsError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self { resolver, timeout })
    }
}

/// The resolver retries internally, so its own timeout is per attempt and the
/// whole lookup is allowed twice that.
const fn lookup_deadline(timeout: Duration) -> Duration {
    timeout.saturating_mul(2)
}

impl MxResolver for DnsResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        debug!("Looking up MX records for {domain}");

        let lookup = tokio::time::timeout(
            lookup_deadline(self.timeout),
            self.resolver.mx_lookup(domain),
        )
        .await
        .map_err(|_| DnsError::Timeout(domain.to_string()))?;

        match lookup {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
                .collect()),
            Err(err) if err.is_no_records_found() => {
                debug!("No MX records for {domain}");
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}
