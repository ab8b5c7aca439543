//! SMTP reply parsing.
//!
//! A reply is one or more lines. Every line but the last has a `-` as its
//! fourth character:
//!
//! ```text
//! 250-mail.example.com
//! 250-SIZE 10000000
//! 250 HELP
//! ```
//!
//! Only the code of the first line is significant; the rest are consumed so
//! the next read starts at a fresh reply.

use std::fmt;

use mailrelay_common::incoming;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::error::{ProtocolViolation, Result};

/// Longest reply line accepted, terminator included.
pub const MAX_REPLY_LINE: u64 = 1000;

/// The first three characters of a reply.
///
/// This is kept as text; callers classify it with prefix checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseCode(String);

impl ResponseCode {
    fn from_line(line: &str) -> Result<Self> {
        let code: String = line.chars().take(3).collect();
        if code.chars().count() < 3 {
            return Err(ProtocolViolation::TooShort(line.to_string()).into());
        }

        Ok(Self(code))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison with an expected code, e.g. `"250"`.
    #[must_use]
    pub fn is(&self, expected: &str) -> bool {
        self.0 == expected
    }

    /// `5xx`
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.0.starts_with('5')
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete reply: its code and every (trimmed) line it spanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub fn is(&self, expected: &str) -> bool {
        self.code.is(expected)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lines.first().map_or("", String::as_str))
    }
}

fn is_continuation(line: &str) -> bool {
    line.chars().nth(3) == Some('-')
}

async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::new();
    let read = (&mut *reader)
        .take(MAX_REPLY_LINE)
        .read_until(b'\n', &mut buffer)
        .await?;

    if read == 0 {
        return Err(ProtocolViolation::ConnectionClosed.into());
    }

    if read as u64 == MAX_REPLY_LINE && !buffer.ends_with(b"\n") {
        return Err(ProtocolViolation::LineTooLong(MAX_REPLY_LINE).into());
    }

    Ok(String::from_utf8_lossy(&buffer).trim().to_string())
}

/// Read one complete reply from `reader`.
///
/// # Errors
///
/// - [`ProtocolViolation::ConnectionClosed`] if the stream ends before the
///   reply does
/// - [`ProtocolViolation::TooShort`] if the first line has fewer than three
///   characters
/// - [`ProtocolViolation::LineTooLong`] if any line exceeds [`MAX_REPLY_LINE`]
/// - [`ClientError::Io`](super::ClientError::Io) for transport failures
pub async fn read_response<R>(reader: &mut R) -> Result<Response>
where
    R: AsyncBufRead + Unpin,
{
    let first = read_line(reader).await?;
    incoming!("{first}");

    let code = ResponseCode::from_line(&first)?;
    let mut more = is_continuation(&first);
    let mut lines = vec![first];

    while more {
        let line = read_line(reader).await?;
        incoming!("{line}");

        more = is_continuation(&line);
        lines.push(line);
    }

    Ok(Response { code, lines })
}
