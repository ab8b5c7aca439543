//! Outbound delivery: picking a mail exchanger for a recipient domain and
//! handing a message to it over SMTP.
//!
//! - [`dns`]: MX lookups behind the [`MxResolver`] seam
//! - [`resolver`]: configured relays or DNS, ordered by preference
//! - [`session`]: one delivery attempt, from connect to `QUIT`
//!
//! Scheduling retries is the caller's job; a failed attempt reports what
//! went wrong through [`DeliveryFailure`] and nothing more.

pub mod dns;
mod error;
mod message;
pub mod resolver;
pub mod session;

pub use dns::{DnsConfig, DnsError, DnsResolver, MxRecord, MxResolver};
pub use error::{DeliveryFailure, FailureKind};
pub use message::OutboundMessage;
pub use resolver::{ResolveError, TargetResolver};
pub use session::{DeliverySettings, SmtpDelivery};
