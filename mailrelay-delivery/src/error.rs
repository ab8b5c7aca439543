//! Typed failures for a single delivery attempt.
//!
//! Every failure names the step that went wrong ([`FailureKind`]), the
//! recipient domain, a human-readable detail, and the server reply code when
//! the failure was a rejection. Whether and when to retry is left to the
//! caller; [`DeliveryFailure::is_permanent`] is the hint for that decision.

use std::fmt;

use mailrelay_smtp::{ClientError, Response, ResponseCode};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Neither relays nor DNS named a server for the domain.
    NoTargetsFound,
    /// Every candidate server refused the connection or timed out.
    NoServerReachable,
    /// The connection could not be configured before talking SMTP.
    TransportSetupFailed,
    /// The server did not greet with `220`.
    UnexpectedGreeting,
    /// Both `EHLO` and `HELO` were refused.
    HandshakeRejected,
    AuthenticationRejected,
    /// `MAIL FROM` or `RCPT TO` was refused.
    EnvelopeRejected,
    /// `DATA` or the message content was refused.
    DataRejected,
    /// Read/write failure, timeout, or the server hanging up.
    TransportError,
    /// The server sent something that is not an SMTP reply.
    ProtocolViolation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoTargetsFound => "No targets found",
            Self::NoServerReachable => "No server reachable",
            Self::TransportSetupFailed => "Transport setup failed",
            Self::UnexpectedGreeting => "Unexpected greeting",
            Self::HandshakeRejected => "Handshake rejected",
            Self::AuthenticationRejected => "Authentication rejected",
            Self::EnvelopeRejected => "Envelope rejected",
            Self::DataRejected => "Data rejected",
            Self::TransportError => "Transport error",
            Self::ProtocolViolation => "Protocol violation",
        })
    }
}

/// Why a delivery attempt did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} delivering to {domain}: {detail}")]
pub struct DeliveryFailure {
    pub kind: FailureKind,
    pub domain: String,
    pub detail: String,
    /// The reply that caused the failure, for rejections.
    pub reply: Option<ResponseCode>,
}

impl DeliveryFailure {
    pub(crate) fn new(kind: FailureKind, domain: &str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            domain: domain.to_string(),
            detail: detail.into(),
            reply: None,
        }
    }

    /// The server answered `step` with something other than what was needed.
    pub(crate) fn rejected(kind: FailureKind, domain: &str, step: &str, response: &Response) -> Self {
        Self {
            reply: Some(response.code.clone()),
            ..Self::new(kind, domain, format!("{step} rejected: {response}"))
        }
    }

    /// The client failed during `step` without a usable reply.
    pub(crate) fn client(domain: &str, step: &str, error: &ClientError) -> Self {
        let kind = match error {
            _ if error.is_transport() => FailureKind::TransportError,
            ClientError::Setup(_) => FailureKind::TransportSetupFailed,
            _ => FailureKind::ProtocolViolation,
        };

        Self::new(kind, domain, format!("{step}: {error}"))
    }

    /// Whether a retry is pointless: the server rejected with a `5xx` reply.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply.as_ref().is_some_and(ResponseCode::is_permanent)
    }

    /// Returns `true` if this failure may succeed on a later attempt.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        !self.is_permanent()
    }
}
