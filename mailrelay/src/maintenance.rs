use std::net::SocketAddr;

use mailrelay_common::{error::SessionError, internal, outgoing, traits::ConnectionProcessor};
use tokio::{io::AsyncWriteExt, net::TcpStream};

/// Turns every client away with a `421`, the reply RFC 5321 reserves for a
/// server that is not accepting mail right now.
///
/// Listeners serve this until a protocol handler is plugged in.
#[derive(Debug, Clone)]
pub struct Maintenance {
    reply: String,
}

impl Maintenance {
    #[must_use]
    pub fn new(local_domain: &str) -> Self {
        Self {
            reply: format!(
                "421 {local_domain} Service not available, closing transmission channel"
            ),
        }
    }
}

impl ConnectionProcessor for Maintenance {
    async fn process(&mut self, mut stream: TcpStream, peer: SocketAddr) -> Result<(), SessionError> {
        internal!("Turning away {peer}");
        outgoing!("{}", self.reply);

        stream.write_all(self.reply.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.shutdown().await?;

        Ok(())
    }

    fn ty() -> &'static str {
        "maintenance"
    }
}
