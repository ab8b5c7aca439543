//! One outbound SMTP delivery attempt, from target selection to `QUIT`.

use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use mailrelay_common::{
    Credentials, EmailAddress, MailExchangeTarget, config::DeliveryConfig, error::ConfigError,
    internal, tracing,
};
use mailrelay_smtp::{
    SmtpClient,
    client::{self, Response},
};
use mailrelay_tracing::traced;
use tokio::net::TcpStream;

use crate::{
    dns::MxResolver,
    error::{DeliveryFailure, FailureKind},
    message::OutboundMessage,
    resolver::TargetResolver,
};

/// The values a delivery needs from configuration, copied once so a reload
/// never changes an attempt in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    /// Announced in `EHLO`/`HELO`.
    pub local_domain: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl DeliverySettings {
    /// # Errors
    /// If no local domain is configured.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            local_domain: config.local_domain()?.to_string(),
            connect_timeout: config.timeouts.connect_timeout(),
            read_timeout: config.timeouts.read_timeout(),
        })
    }
}

/// Delivers messages to one recipient at a time over SMTP.
///
/// Each [`deliver`](Self::deliver) call makes exactly one attempt: targets are
/// tried in order until one accepts the TCP connection, and the outcome of the
/// SMTP dialog with that server is final.
#[derive(Debug)]
pub struct SmtpDelivery<R> {
    resolver: TargetResolver<R>,
    settings: DeliverySettings,
}

impl<R: MxResolver> SmtpDelivery<R> {
    pub const fn new(resolver: TargetResolver<R>, settings: DeliverySettings) -> Self {
        Self { resolver, settings }
    }

    /// # Errors
    /// If the configuration has no local domain.
    pub fn from_config(config: &DeliveryConfig, dns: R) -> Result<Self, ConfigError> {
        Ok(Self::new(
            TargetResolver::new(config.default_relays.clone(), dns),
            DeliverySettings::from_config(config)?,
        ))
    }

    pub const fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Hand `message` to a server responsible for `recipient`.
    ///
    /// # Errors
    ///
    /// A [`DeliveryFailure`] describing the first step that did not succeed.
    #[traced(instrument(level = tracing::Level::INFO, skip(self, message), fields(recipient = %recipient)), timing(precision = "ms"))]
    pub async fn deliver(
        &self,
        recipient: &EmailAddress,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryFailure> {
        let domain = recipient.domain();

        let targets = self
            .resolver
            .resolve_targets(domain)
            .await
            .map_err(|err| DeliveryFailure::new(FailureKind::NoTargetsFound, domain, err.to_string()))?;

        let (stream, target) = self.connect(domain, &targets).await?;

        let mut client = SmtpClient::new(stream, self.settings.read_timeout)
            .map_err(|err| DeliveryFailure::client(domain, "Configuring connection", &err))?;

        let result = Transaction {
            client: &mut client,
            domain,
            local_domain: &self.settings.local_domain,
            credentials: target.credentials(),
        }
        .run(recipient, message)
        .await;

        client.close().await;

        match &result {
            Ok(()) => internal!(level = INFO, "Delivered message for {recipient} to {target}"),
            Err(failure) => internal!(level = WARN, "Delivery to {recipient} via {target} failed: {failure}"),
        }

        result
    }

    /// Connect to the first target that accepts within the connect timeout.
    async fn connect<'t>(
        &self,
        domain: &str,
        targets: &'t [MailExchangeTarget],
    ) -> Result<(TcpStream, &'t MailExchangeTarget), DeliveryFailure> {
        let limit = self.settings.connect_timeout;

        for target in targets {
            match tokio::time::timeout(limit, TcpStream::connect((target.host(), target.port())))
                .await
            {
                Ok(Ok(stream)) => {
                    internal!(level = DEBUG, "Connected to {target} for {domain}");
                    return Ok((stream, target));
                }
                Ok(Err(err)) => internal!(level = WARN, "Unable to connect to {target}: {err}"),
                Err(_) => internal!(
                    level = WARN,
                    "Connecting to {target} timed out after {limit:?}"
                ),
            }
        }

        Err(DeliveryFailure::new(
            FailureKind::NoServerReachable,
            domain,
            format!(
                "None of {} candidate server(s) accepted a connection",
                targets.len()
            ),
        ))
    }
}

/// The SMTP dialog with the server that accepted the connection.
struct Transaction<'a> {
    client: &'a mut SmtpClient,
    domain: &'a str,
    local_domain: &'a str,
    credentials: Option<&'a Credentials>,
}

impl Transaction<'_> {
    async fn run(
        mut self,
        recipient: &EmailAddress,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryFailure> {
        let reply = self.client.read_response().await;
        self.expect_reply(reply, "220", FailureKind::UnexpectedGreeting, "Greeting")?;

        let extended = self.identify().await?;

        // Only an ESMTP session can authenticate
        if extended && let Some(credentials) = self.credentials {
            self.authenticate(credentials).await?;
        }

        let reply = self
            .client
            .mail_from(&message.from_address().address())
            .await;
        self.expect_reply(reply, "250", FailureKind::EnvelopeRejected, "MAIL FROM")?;

        let reply = self.client.rcpt_to(&recipient.address()).await;
        self.expect_reply(reply, "250", FailureKind::EnvelopeRejected, "RCPT TO")?;

        let reply = self.client.data().await;
        self.expect_reply(reply, "354", FailureKind::DataRejected, "DATA")?;

        let reply = self.client.send_data(message.data_lines()).await;
        self.expect_reply(reply, "250", FailureKind::DataRejected, "Message content")?;

        self.quit().await
    }

    fn expect_reply(
        &self,
        reply: client::Result<Response>,
        code: &str,
        kind: FailureKind,
        step: &str,
    ) -> Result<Response, DeliveryFailure> {
        let response = reply.map_err(|err| DeliveryFailure::client(self.domain, step, &err))?;

        if response.is(code) {
            Ok(response)
        } else {
            Err(DeliveryFailure::rejected(kind, self.domain, step, &response))
        }
    }

    /// `EHLO`, falling back to `HELO`. Returns whether `EHLO` was accepted.
    async fn identify(&mut self) -> Result<bool, DeliveryFailure> {
        match self.client.ehlo(self.local_domain).await {
            Ok(response) if response.is("250") => return Ok(true),
            Ok(response) => internal!(
                level = DEBUG,
                "{} refused EHLO ({response}), trying HELO",
                self.client.peer()
            ),
            Err(err) => return Err(DeliveryFailure::client(self.domain, "EHLO", &err)),
        }

        let reply = self.client.helo(self.local_domain).await;
        self.expect_reply(reply, "250", FailureKind::HandshakeRejected, "HELO")?;

        Ok(false)
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), DeliveryFailure> {
        let reply = self.client.auth_login().await;
        self.expect_reply(reply, "334", FailureKind::AuthenticationRejected, "AUTH LOGIN")?;

        let reply = self
            .client
            .auth_payload(&BASE64_STANDARD.encode(credentials.username()))
            .await;
        self.expect_reply(reply, "334", FailureKind::AuthenticationRejected, "AUTH username")?;

        let reply = self
            .client
            .auth_payload(&BASE64_STANDARD.encode(credentials.password()))
            .await;
        self.expect_reply(reply, "235", FailureKind::AuthenticationRejected, "AUTH password")?;

        internal!(
            level = DEBUG,
            "Authenticated to {} as {}",
            self.client.peer(),
            credentials.username()
        );

        Ok(())
    }

    async fn quit(self) -> Result<(), DeliveryFailure> {
        match self.client.quit().await {
            Ok(response) if response.is("221") => Ok(()),
            Ok(response) => {
                internal!(
                    level = WARN,
                    "Unexpected reply to QUIT from {}: {response}",
                    self.client.peer()
                );
                Ok(())
            }
            Err(err) => Err(DeliveryFailure::client(self.domain, "QUIT", &err)),
        }
    }
}
