//! Mock SMTP server for testing delivery scenarios
//!
//! This module provides a scripted mock SMTP server that can:
#![allow(dead_code)] // Test utility module - not all methods used in every test
//! - Answer each command with a configurable reply
//! - Walk through an `AUTH LOGIN` exchange
//! - Hang up immediately (still observing the client's close) or never greet
//! - Record received commands and count connections the client closed
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_server::MockSmtpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockSmtpServer::builder()
//!     .with_greeting(220, "Test server ready")
//!     .with_rcpt_to_response(550, "User unknown")
//!     .build()
//!     .await?;
//!
//! // Server is now running on server.addr()
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    /// EHLO command with hostname
    Ehlo(String),
    /// HELO command with hostname
    Helo(String),
    /// `AUTH LOGIN`
    AuthLogin,
    /// A line sent during the `AUTH LOGIN` exchange, still base64 encoded
    AuthPayload(String),
    /// MAIL FROM command
    MailFrom(String),
    /// RCPT TO command
    RcptTo(String),
    /// DATA command
    Data,
    /// Message lines (after DATA), excluding the terminating dot
    MessageContent(Vec<String>),
    /// QUIT command
    Quit,
    /// Unknown/other command
    Other(String),
}

/// Response configuration for SMTP commands
#[derive(Debug, Clone)]
pub struct SmtpResponse {
    /// SMTP status code (e.g., 250, 550)
    pub code: u16,
    /// Response message
    pub message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct EhloResponse {
    code: u16,
    capabilities: Vec<String>,
}

impl EhloResponse {
    fn to_bytes(&self) -> Vec<u8> {
        let mut response = String::new();
        let cap_count = self.capabilities.len();

        for (i, cap) in self.capabilities.iter().enumerate() {
            if i < cap_count - 1 {
                let _ = write!(&mut response, "{}-{}\r\n", self.code, cap);
            } else {
                let _ = write!(&mut response, "{} {}\r\n", self.code, cap);
            }
        }

        response.into_bytes()
    }
}

/// What the server does right after accepting a connection
#[derive(Clone, Copy, PartialEq, Eq)]
enum OnConnect {
    Greet,
    Hangup,
    Silent,
}

/// Mock SMTP server configuration
#[derive(Clone)]
struct MockServerConfig {
    on_connect: OnConnect,
    greeting: SmtpResponse,
    ehlo_response: EhloResponse,
    helo_response: SmtpResponse,
    auth_responses: [SmtpResponse; 3],
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    quit_response: SmtpResponse,
    response_delay: Option<Duration>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            on_connect: OnConnect::Greet,
            greeting: SmtpResponse::new(220, "Mock SMTP Server"),
            ehlo_response: EhloResponse {
                code: 250,
                capabilities: vec!["localhost".to_string(), "AUTH LOGIN".to_string()],
            },
            helo_response: SmtpResponse::new(250, "Hello"),
            auth_responses: [
                SmtpResponse::new(334, "VXNlcm5hbWU6"),
                SmtpResponse::new(334, "UGFzc3dvcmQ6"),
                SmtpResponse::new(235, "Authentication successful"),
            ],
            mail_from_response: SmtpResponse::new(250, "OK"),
            rcpt_to_response: SmtpResponse::new(250, "OK"),
            data_response: SmtpResponse::new(354, "Start mail input; end with <CRLF>.<CRLF>"),
            data_end_response: SmtpResponse::new(250, "OK: Message accepted"),
            quit_response: SmtpResponse::new(221, "Bye"),
            response_delay: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    connections: AtomicUsize,
    closed_by_client: AtomicUsize,
}

/// Mock SMTP server for testing
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    /// Create a new builder for configuring the mock server
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::new()
    }

    /// Get the address the server is listening on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get all commands received by the server
    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    /// Number of connections accepted so far
    #[must_use]
    pub fn connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    /// Wait until `count` connections have been closed from the client side
    pub async fn wait_for_client_close(&self, count: usize) -> bool {
        timeout(Duration::from_secs(5), async {
            while self.counters.closed_by_client.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Read until the client closes its side, so the close can be observed
    async fn drain(
        reader: &mut BufReader<tokio::net::tcp::ReadHalf<'_>>,
        counters: &Counters,
    ) -> std::io::Result<()> {
        let mut rest = String::new();
        while reader.read_line(&mut rest).await? > 0 {
            rest.clear();
        }
        counters.closed_by_client.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Handle a single client connection
    #[allow(clippy::too_many_lines)]
    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
        counters: Arc<Counters>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        match config.on_connect {
            OnConnect::Greet => {}
            OnConnect::Hangup => {
                // Close our side without a greeting, then wait for the client to close theirs
                writer.shutdown().await?;
                return Self::drain(&mut reader, &counters).await.map_err(Into::into);
            }
            OnConnect::Silent => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }
        }
        let mut line = String::new();
        let mut auth_step = None;

        // Send greeting
        writer.write_all(&config.greeting.to_bytes()).await?;
        writer.flush().await?;

        loop {
            line.clear();

            if reader.read_line(&mut line).await? == 0 {
                counters.closed_by_client.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }

            let cmd_line = line.trim();
            tracing::debug!("Mock server received: {}", cmd_line);

            // Lines inside an AUTH LOGIN exchange are payloads, not commands
            if let Some(step) = auth_step {
                commands
                    .write()
                    .await
                    .push(SmtpCommand::AuthPayload(cmd_line.to_string()));

                let response: &SmtpResponse = &config.auth_responses[step];
                auth_step = (step < 2 && response.code == 334).then_some(step + 1);

                writer.write_all(&response.to_bytes()).await?;
                writer.flush().await?;
                continue;
            }

            // Parse command
            let parts: Vec<&str> = cmd_line.splitn(2, ' ').collect();
            let command = parts[0].to_uppercase();

            let (response, smtp_cmd) = match command.as_str() {
                "EHLO" => {
                    let hostname = parts.get(1).unwrap_or(&"").to_string();
                    (config.ehlo_response.to_bytes(), SmtpCommand::Ehlo(hostname))
                }
                "HELO" => {
                    let hostname = parts.get(1).unwrap_or(&"").to_string();
                    (config.helo_response.to_bytes(), SmtpCommand::Helo(hostname))
                }
                "AUTH" => {
                    let response = &config.auth_responses[0];
                    if response.code == 334 {
                        auth_step = Some(1);
                    }
                    (response.to_bytes(), SmtpCommand::AuthLogin)
                }
                "MAIL" => {
                    let from = parts.get(1).unwrap_or(&"").to_string();
                    (
                        config.mail_from_response.to_bytes(),
                        SmtpCommand::MailFrom(from),
                    )
                }
                "RCPT" => {
                    let to = parts.get(1).unwrap_or(&"").to_string();
                    (config.rcpt_to_response.to_bytes(), SmtpCommand::RcptTo(to))
                }
                "DATA" => (config.data_response.to_bytes(), SmtpCommand::Data),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    writer.write_all(&config.quit_response.to_bytes()).await?;
                    writer.flush().await?;
                    return Self::drain(&mut reader, &counters).await.map_err(Into::into);
                }
                _ => (
                    SmtpResponse::new(500, "Unknown command").to_bytes(),
                    SmtpCommand::Other(cmd_line.to_string()),
                ),
            };

            // Store command
            commands.write().await.push(smtp_cmd.clone());

            // Apply response delay if configured
            if let Some(delay) = config.response_delay {
                tokio::time::sleep(delay).await;
            }

            writer.write_all(&response).await?;
            writer.flush().await?;

            // Read message content until we see <CRLF>.<CRLF>
            if matches!(smtp_cmd, SmtpCommand::Data) && config.data_response.code == 354 {
                let mut message_content = Vec::new();
                let mut data_line = String::new();

                loop {
                    data_line.clear();
                    if reader.read_line(&mut data_line).await? == 0 {
                        counters.closed_by_client.fetch_add(1, Ordering::SeqCst);
                        return Ok(());
                    }

                    let data_line = data_line.trim_end_matches(['\r', '\n']);
                    if data_line == "." {
                        break;
                    }
                    message_content.push(data_line.to_string());
                }

                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(message_content));

                writer
                    .write_all(&config.data_end_response.to_bytes())
                    .await?;
                writer.flush().await?;
            }
        }
    }
}

/// Builder for configuring a `MockSmtpServer`
pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    /// Set the greeting message
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    /// Close every connection as soon as it is accepted, without a greeting
    #[must_use]
    pub const fn with_immediate_close(mut self) -> Self {
        self.config.on_connect = OnConnect::Hangup;
        self
    }

    /// Accept connections but never send anything
    #[must_use]
    pub const fn with_silence(mut self) -> Self {
        self.config.on_connect = OnConnect::Silent;
        self
    }

    /// Set the EHLO response with capabilities
    #[must_use]
    pub fn with_ehlo_response(mut self, code: u16, capabilities: Vec<String>) -> Self {
        self.config.ehlo_response = EhloResponse { code, capabilities };
        self
    }

    /// Set the HELO response
    #[must_use]
    pub fn with_helo_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.helo_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the reply to `AUTH LOGIN` (0), the username (1) or the password (2)
    #[must_use]
    pub fn with_auth_response(mut self, step: usize, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_responses[step] = SmtpResponse::new(code, message);
        self
    }

    /// Set the MAIL FROM response
    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the RCPT TO response
    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the DATA command response
    #[must_use]
    pub fn with_data_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the response after message content (after `<CRLF>.<CRLF>`)
    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    /// Set the QUIT response
    #[must_use]
    pub fn with_quit_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.quit_response = SmtpResponse::new(code, message);
        self
    }

    /// Add a delay before sending each command response
    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Build and start the mock SMTP server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        // Bind to a random available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let counters = Arc::new(Counters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let commands_clone = Arc::clone(&commands);
        let counters_clone = Arc::clone(&counters);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept connection with timeout to allow checking shutdown flag
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    counters_clone.connections.fetch_add(1, Ordering::SeqCst);

                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands_clone);
                    let counters = Arc::clone(&counters_clone);

                    tokio::spawn(async move {
                        if let Err(e) =
                            MockSmtpServer::handle_client(stream, config, commands, counters).await
                        {
                            tracing::debug!("Mock server client error: {}", e);
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received: commands,
            counters,
            shutdown,
        })
    }
}
