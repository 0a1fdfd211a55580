//! Connection configuration types.

use std::time::Duration;

use crate::literal::{DEFAULT_LITERAL_THRESHOLD, DEFAULT_MAX_LITERAL_SIZE};

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS right after the greeting (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout, including the TLS handshake.
    pub connect_timeout: Duration,
    /// Timeout for reading one response.
    pub io_timeout: Duration,
    /// Literals larger than this many bytes go to the literal factory.
    pub literal_threshold: usize,
    /// Largest literal the server may announce; bigger ones fail the read.
    pub max_literal_size: usize,
    /// First character of every command tag.
    pub tag_prefix: char,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    io_timeout: Duration,
    literal_threshold: usize,
    max_literal_size: usize,
    tag_prefix: char,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            literal_threshold: DEFAULT_LITERAL_THRESHOLD,
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
            tag_prefix: 'A',
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the size above which literals are handed to the literal factory.
    #[must_use]
    pub const fn literal_threshold(mut self, bytes: usize) -> Self {
        self.literal_threshold = bytes;
        self
    }

    /// Sets the largest literal size accepted from the server.
    #[must_use]
    pub const fn max_literal_size(mut self, bytes: usize) -> Self {
        self.max_literal_size = bytes;
        self
    }

    /// Sets the tag prefix.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.tag_prefix = prefix;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            literal_threshold: self.literal_threshold,
            max_literal_size: self.max_literal_size,
            tag_prefix: self.tag_prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.literal_threshold, 4096);
        assert_eq!(config.max_literal_size, 1 << 30);
        assert_eq!(config.tag_prefix, 'A');
        assert_eq!(config.io_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .connect_timeout(Duration::from_secs(10))
            .literal_threshold(0)
            .max_literal_size(1024)
            .tag_prefix('T')
            .build();

        assert_eq!(config.port, 143);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.literal_threshold, 0);
        assert_eq!(config.max_literal_size, 1024);
        assert_eq!(config.tag_prefix, 'T');
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = Config::builder("localhost")
            .security(Security::None)
            .port(1143)
            .build();
        assert_eq!(config.port, 1143);
    }
}
