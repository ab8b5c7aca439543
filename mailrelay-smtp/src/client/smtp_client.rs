//! A line-oriented SMTP client over a single TCP connection.

use std::time::Duration;

use mailrelay_common::{internal, outgoing};
use tokio::{
    io::{AsyncWriteExt, BufReader, BufWriter},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use super::{
    error::{ClientError, Result},
    response::{self, Response},
};

/// Shown in logs in place of authentication payloads.
const REDACTED: &str = "<redacted>";

/// Bound `operation` by `limit`, reporting an elapsed limit as [`ClientError::Timeout`].
async fn timed<T>(limit: Duration, operation: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| ClientError::Timeout(limit))?
}

/// An SMTP client for sending commands and receiving responses.
///
/// Every reply read and every flush of written data is bounded by the read
/// timeout given at construction.
pub struct SmtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    read_timeout: Duration,
    peer: String,
}

impl SmtpClient {
    /// Take ownership of a connected stream.
    ///
    /// # Errors
    ///
    /// [`ClientError::Setup`] if `read_timeout` is zero or the socket cannot be
    /// configured. Nothing has been sent to the server at that point.
    pub fn new(stream: TcpStream, read_timeout: Duration) -> Result<Self> {
        if read_timeout.is_zero() {
            return Err(ClientError::Setup(
                "read timeout must be greater than zero".to_string(),
            ));
        }

        stream
            .set_nodelay(true)
            .map_err(|err| ClientError::Setup(format!("unable to set TCP_NODELAY: {err}")))?;

        let peer = stream
            .peer_addr()
            .map_or_else(|_| String::from("<unknown>"), |addr| addr.to_string());
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            read_timeout,
            peer,
        })
    }

    /// The remote address, for log messages.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Reads a complete reply from the server, including the greeting sent
    /// right after connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, times out, or the reply is malformed.
    pub async fn read_response(&mut self) -> Result<Response> {
        timed(self.read_timeout, response::read_response(&mut self.reader)).await
    }

    async fn write_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let writer = &mut self.writer;

        timed(self.read_timeout, async move {
            for line in lines {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\r\n").await?;
            }
            writer.flush().await?;
            Ok::<(), ClientError>(())
        })
        .await
    }

    /// Sends a command to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        outgoing!("{command}");
        self.write_lines([command]).await
    }

    /// Sends a command and reads the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// Sends EHLO with the specified domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("EHLO {domain}")).await
    }

    /// Sends HELO with the specified domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn helo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("HELO {domain}")).await
    }

    /// Starts an `AUTH LOGIN` exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn auth_login(&mut self) -> Result<Response> {
        self.command("AUTH LOGIN").await
    }

    /// Sends one (already encoded) authentication payload and reads the reply.
    ///
    /// The payload is never logged.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn auth_payload(&mut self, payload: &str) -> Result<Response> {
        outgoing!("{REDACTED}");
        self.write_lines([payload]).await?;
        self.read_response().await
    }

    /// Sends MAIL FROM command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// Sends RCPT TO command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// Sends DATA command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Sends the message lines verbatim, then the terminating `.` line, and
    /// reads the reply.
    ///
    /// Lines must already be dot-stuffed.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn send_data(&mut self, lines: &[String]) -> Result<Response> {
        for line in lines {
            outgoing!("{line}");
        }
        outgoing!(".");

        self.write_lines(lines.iter().map(String::as_str).chain(["."]))
            .await?;
        self.read_response().await
    }

    /// Sends QUIT command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    /// Shut down the write side and drop the connection.
    ///
    /// Failures here are logged only; the connection is gone either way.
    pub async fn close(mut self) {
        let writer = &mut self.writer;
        let result = timed(self.read_timeout, async move {
            writer.shutdown().await?;
            Ok::<(), ClientError>(())
        })
        .await;

        if let Err(err) = result {
            internal!(level = DEBUG, "Closing connection to {}: {err}", self.peer);
        }
    }
}
