//! Error types for the mailrelay-common crate.
//!
//! Foundational errors shared by the acceptor, the connection processors
//! it drives, and the configuration types.

use std::io;

use thiserror::Error;

/// Errors that can occur while parsing an [`EmailAddress`](crate::EmailAddress).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address is missing an '@': {0}")]
    MissingAt(String),

    #[error("Invalid username: '{0}'")]
    InvalidUsername(String),

    #[error("Invalid domain: '{0}'")]
    InvalidDomain(String),
}

/// Errors that can occur while reading configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required configuration field is missing or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A relay server entry could not be parsed.
    #[error("Invalid relay server '{entry}': {reason}")]
    InvalidRelay { entry: String, reason: String },
}

/// Errors that can occur while a processor serves a single connection.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Protocol error occurred during session.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection error occurred.
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),
}

/// Errors that can occur in the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to socket address.
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("Failed to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),
}
