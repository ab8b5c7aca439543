//! Choosing which servers a message for a domain should be handed to.

use mailrelay_common::{MailExchangeTarget, internal, tracing};
use mailrelay_tracing::traced;
use thiserror::Error;

use crate::dns::{MxRecord, MxResolver};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Neither configured relays nor DNS produced a single candidate.
    #[error("No mail exchanger found for {domain}")]
    NoTargetsFound { domain: String },
}

/// Produces the ordered list of targets to try for a recipient domain.
///
/// Configured default relays take precedence over DNS: when any are
/// configured they are returned verbatim for every domain, with their own
/// credentials, and no lookup is made.
#[derive(Debug)]
pub struct TargetResolver<R> {
    default_relays: Vec<MailExchangeTarget>,
    dns: R,
}

impl<R: MxResolver> TargetResolver<R> {
    pub const fn new(default_relays: Vec<MailExchangeTarget>, dns: R) -> Self {
        Self {
            default_relays,
            dns,
        }
    }

    /// Candidate targets for `domain`, most preferred first.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NoTargetsFound`] when the MX lookup fails or returns
    /// nothing. The two cases are only distinguished in the log.
    #[traced(instrument(level = tracing::Level::TRACE, skip(self)), timing(precision = "ms"))]
    pub async fn resolve_targets(
        &self,
        domain: &str,
    ) -> Result<Vec<MailExchangeTarget>, ResolveError> {
        if !self.default_relays.is_empty() {
            return Ok(self.default_relays.clone());
        }

        let records = match self.dns.lookup_mx(domain).await {
            Ok(records) => records,
            Err(err) => {
                internal!(level = WARN, "MX lookup for {domain} failed: {err}");
                Vec::new()
            }
        };

        if records.is_empty() {
            internal!(level = WARN, "No MX records for {domain}");
            return Err(ResolveError::NoTargetsFound {
                domain: domain.to_string(),
            });
        }

        Ok(order_targets(records))
    }
}

/// Sort by ascending priority, keeping answer order within a priority.
fn order_targets(mut records: Vec<MxRecord>) -> Vec<MailExchangeTarget> {
    records.sort_by_key(|record| record.priority);

    records
        .iter()
        .map(|record| {
            let exchange = record.exchange.strip_suffix('.').unwrap_or(&record.exchange);
            tracing::debug!("Mail exchanger {exchange} (priority {})", record.priority);
            MailExchangeTarget::from_exchange(exchange)
        })
        .collect()
}
