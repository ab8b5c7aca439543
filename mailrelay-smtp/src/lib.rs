//! SMTP client primitives used for outbound delivery.

pub mod client;

pub use client::{ClientError, ProtocolViolation, Response, ResponseCode, SmtpClient};
