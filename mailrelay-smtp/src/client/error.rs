//! Error types for the SMTP client.

use std::{io, time::Duration};

use thiserror::Error;

/// The server broke the reply format, or went away in the middle of it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The connection closed before a complete reply was read.
    #[error("Connection closed by the server")]
    ConnectionClosed,

    /// A reply line too short to carry a status code.
    #[error("Reply line too short: '{0}'")]
    TooShort(String),

    /// A reply line that did not end within the given number of octets.
    #[error("Reply line longer than {0} octets")]
    LineTooLong(u64),
}

/// Errors that can occur when using the SMTP client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// IO error occurred during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server did not answer (or accept our data) in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The server sent something that is not an SMTP reply.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// The connection could not be prepared for use.
    #[error("Unable to configure connection: {0}")]
    Setup(String),
}

impl ClientError {
    /// Whether the failure came from the transport rather than the reply content.
    ///
    /// A peer closing the connection mid-reply counts as a transport failure.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Timeout(_) | Self::ProtocolViolation(ProtocolViolation::ConnectionClosed)
        )
    }
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
