use std::path::{Path, PathBuf};

use anyhow::Context;
use mailrelay_common::{
    EmailAddress,
    config::{DeliveryConfig, ListenerConfig},
    internal,
    listener::{PoolState, WorkerPool},
    tracing,
};
use mailrelay_delivery::{DnsConfig, DnsResolver, OutboundMessage, SmtpDelivery};
use mailrelay_tracing::traced;
use serde::Deserialize;

use crate::maintenance::Maintenance;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MAILRELAY_CONFIG";

const DEFAULT_CONFIG_PATHS: [&str; 2] = [
    "./mailrelay.config.ron",
    "/etc/mailrelay/mailrelay.config.ron",
];

/// Everything the `mailrelay` binary is configured with.
#[derive(Debug, Deserialize)]
pub struct MailRelay {
    #[serde(alias = "listener", default)]
    listeners: Vec<ListenerConfig>,
    delivery: DeliveryConfig,
    #[serde(default)]
    dns: DnsConfig,
}

/// Find the configuration file using the following precedence:
/// 1. An explicit path (`--config`)
/// 2. `MAILRELAY_CONFIG` environment variable
/// 3. ./mailrelay.config.ron (current working directory)
/// 4. /etc/mailrelay/mailrelay.config.ron (system-wide config)
///
/// # Errors
///
/// If an explicitly named file does not exist, or none of the defaults do.
pub fn find_config_file(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("Configuration file does not exist: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    if let Some(path) = DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
    {
        return Ok(path);
    }

    let paths_tried = DEFAULT_CONFIG_PATHS
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}

#[traced(instrument(level = tracing::Level::TRACE))]
async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

impl MailRelay {
    /// Parse and validate a RON configuration.
    ///
    /// # Errors
    ///
    /// If the text is not a valid configuration.
    pub fn from_ron(text: &str) -> anyhow::Result<Self> {
        let relay: Self = ron::from_str(text)?;
        relay.delivery.validate()?;
        Ok(relay)
    }

    /// # Errors
    ///
    /// If the file cannot be read or is not a valid configuration.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::from_ron(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn listeners(&self) -> &[ListenerConfig] {
        &self.listeners
    }

    pub const fn delivery(&self) -> &DeliveryConfig {
        &self.delivery
    }

    /// Serve every configured listener until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// If signal handlers cannot be installed.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "s"))]
    pub async fn serve(self) -> anyhow::Result<()> {
        let local_domain = self.delivery.local_domain()?.to_string();

        let mut pools: Vec<_> = self
            .listeners
            .into_iter()
            .map(|listener| {
                let local_domain = local_domain.clone();
                WorkerPool::new(listener, move || Maintenance::new(&local_domain))
            })
            .collect();

        for pool in &mut pools {
            pool.start().await;
        }

        if !pools.iter().any(|pool| pool.state() == PoolState::Running) {
            internal!(level = WARN, "No listener is accepting connections");
        }

        internal!(level = INFO, "Controller running");

        let result = shutdown_signal().await;

        internal!(level = INFO, "Shutting down...");

        for pool in &mut pools {
            pool.shutdown().await;
        }

        result
    }

    /// Make exactly one attempt to deliver `body` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// If the resolver cannot be created or the delivery fails.
    #[traced(instrument(level = tracing::Level::TRACE, skip(self, body), err), timing(precision = "ms"))]
    pub async fn send(
        &self,
        from: EmailAddress,
        to: &EmailAddress,
        body: &str,
    ) -> anyhow::Result<()> {
        let dns = DnsResolver::new(&self.dns)?;
        let delivery = SmtpDelivery::from_config(&self.delivery, dns)?;
        let message = OutboundMessage::from_body(from, body);

        delivery.deliver(to, &message).await?;

        Ok(())
    }
}
