//! Test support for delivery integration tests

pub mod mock_server;

use mailrelay_delivery::{DnsError, MxRecord, MxResolver};

pub use mock_server::{MockSmtpServer, SmtpCommand};

/// Answers every MX query with the same records
#[derive(Debug, Clone, Default)]
pub struct StaticMx {
    records: Vec<MxRecord>,
}

impl StaticMx {
    pub const fn new(records: Vec<MxRecord>) -> Self {
        Self { records }
    }
}

impl MxResolver for StaticMx {
    async fn lookup_mx(&self, _domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        Ok(self.records.clone())
    }
}
