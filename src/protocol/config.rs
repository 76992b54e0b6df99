//! Connection configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host name or IP address (default "localhost")
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// TCP port (default 6379)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sent with AUTH right after connecting, if set
    #[serde(default)]
    pub password: Option<String>,

    /// Logical database selected right after connecting, if set
    #[serde(default)]
    pub database: Option<u32>,

    /// Connect timeout in milliseconds (none = OS default)
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,

    /// Read/write timeout in milliseconds (none = block forever)
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            password: None,
            database: None,
            connect_timeout_ms: None,
            read_timeout_ms: None,
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for `hostname:port` with everything else defaulted
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the AUTH password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the logical database index
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = Some(database);
        self
    }

    /// Returns `hostname:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Checks the values a socket would reject
    pub fn validate(&self) -> Result<(), String> {
        if self.hostname.trim().is_empty() {
            return Err("hostname must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be > 0".to_string());
        }
        // A zero duration is an error for set_read_timeout and connect_timeout
        if self.connect_timeout_ms == Some(0) {
            return Err("connect_timeout_ms must be > 0".to_string());
        }
        if self.read_timeout_ms == Some(0) {
            return Err("read_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}
