//! Outbound SMTP client.
//!
//! [`SmtpClient`] owns one connection and exchanges CRLF-terminated commands
//! for replies, bounding every read by a timeout. It has no opinion about
//! which replies are acceptable; the delivery session decides that.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use mailrelay_smtp::client::SmtpClient;
//! use tokio::net::TcpStream;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:25").await?;
//! let mut client = SmtpClient::new(stream, Duration::from_secs(60))?;
//!
//! let greeting = client.read_response().await?;
//! assert!(greeting.is("220"));
//!
//! let reply = client.ehlo("example.com").await?;
//! if !reply.is("250") {
//!     client.helo("example.com").await?;
//! }
//!
//! client.quit().await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod response;
mod smtp_client;

pub use error::{ClientError, ProtocolViolation, Result};
pub use response::{Response, ResponseCode, read_response};
pub use smtp_client::SmtpClient;
