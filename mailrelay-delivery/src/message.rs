use mailrelay_common::EmailAddress;

/// A message ready to be handed to a remote server.
///
/// `data_lines` are sent verbatim after `DATA`, one per line, and must not
/// include the terminating `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    from_address: EmailAddress,
    data_lines: Vec<String>,
}

impl OutboundMessage {
    #[must_use]
    pub const fn new(from_address: EmailAddress, data_lines: Vec<String>) -> Self {
        Self {
            from_address,
            data_lines,
        }
    }

    /// Split a raw body into lines, doubling any leading `.` so no line can be
    /// mistaken for the end of the data.
    #[must_use]
    pub fn from_body(from_address: EmailAddress, body: &str) -> Self {
        let data_lines = body
            .lines()
            .map(|line| {
                if line.starts_with('.') {
                    format!(".{line}")
                } else {
                    line.to_string()
                }
            })
            .collect();

        Self::new(from_address, data_lines)
    }

    #[must_use]
    pub const fn from_address(&self) -> &EmailAddress {
        &self.from_address
    }

    #[must_use]
    pub fn data_lines(&self) -> &[String] {
        &self.data_lines
    }
}
