//! # Configuration Management
//!
//! Structured configuration for the three protocol roles.
//!
//! ## Configuration Sources
//! - TOML files via [`CpConfig::from_file`]
//! - Direct instantiation with defaults
//! - Environment-variable overrides via [`CpConfig::from_env`]
//!
//! Durations are written in milliseconds on the wire format of the config
//! file. The per-attempt timeout policy range follows the protocol: 2000 ms
//! is the reference value, anything in 2000–3000 ms is a valid choice.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CpError, Result};
use crate::protocol::{
    ATTEMPT_TIMEOUT, COOKIE_STORE_CAPACITY, COOKIE_TTL, MAX_ATTEMPTS, PENDING_CAPACITY,
};

/// Top-level configuration covering all three roles. A process typically uses
/// one section and leaves the others at their defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CpConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub cookie_server: CookieServerConfig,

    #[serde(default)]
    pub command_server: CommandServerConfig,
}

impl CpConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CpError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| CpError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Load defaults, then apply `CP_PROTOCOL_*` environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CP_PROTOCOL_COMMAND_SERVER_ADDR") {
            config.client.command_server_addr.clone_from(&addr);
            config.command_server.bind_addr = addr;
        }

        if let Ok(addr) = std::env::var("CP_PROTOCOL_COOKIE_SERVER_ADDR") {
            config.client.cookie_server_addr.clone_from(&addr);
            config.command_server.cookie_server_addr.clone_from(&addr);
            config.cookie_server.bind_addr = addr;
        }

        if let Ok(timeout) = std::env::var("CP_PROTOCOL_ATTEMPT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.attempt_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(ttl) = std::env::var("CP_PROTOCOL_COOKIE_TTL_MS") {
            if let Ok(val) = ttl.parse::<u64>() {
                config.cookie_server.cookie_ttl = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of findings. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.cookie_server.validate());
        errors.extend(self.command_server.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CpError::Config(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Client-role configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Command server address (e.g., "127.0.0.1:2000")
    pub command_server_addr: String,

    /// Cookie server address (e.g., "127.0.0.1:2001")
    pub cookie_server_addr: String,

    /// Fixed per-attempt receive timeout
    #[serde(with = "duration_serde")]
    pub attempt_timeout: Duration,

    /// Attempt budget for receive and cookie-acquisition loops
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command_server_addr: String::from("127.0.0.1:2000"),
            cookie_server_addr: String::from("127.0.0.1:2001"),
            attempt_timeout: ATTEMPT_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        validate_addr(&mut errors, "client.command_server_addr", &self.command_server_addr);
        validate_addr(&mut errors, "client.cookie_server_addr", &self.cookie_server_addr);

        let millis = self.attempt_timeout.as_millis();
        if !(2000..=3000).contains(&millis) {
            errors.push(format!(
                "attempt timeout outside the 2000-3000 ms policy range: {millis} ms"
            ));
        }

        if self.max_attempts == 0 {
            errors.push("max attempts must be greater than 0".to_string());
        }

        errors
    }
}

/// Cookie-server-role configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookieServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Cookie lifetime; older entries are treated as absent
    #[serde(with = "duration_serde")]
    pub cookie_ttl: Duration,

    /// Maximum number of distinct client addresses tracked
    pub store_capacity: usize,
}

impl Default for CookieServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::from("127.0.0.1:2001"),
            cookie_ttl: COOKIE_TTL,
            store_capacity: COOKIE_STORE_CAPACITY,
        }
    }
}

impl CookieServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        validate_addr(&mut errors, "cookie_server.bind_addr", &self.bind_addr);

        if self.cookie_ttl.as_millis() < 1000 {
            errors.push("cookie TTL too short (minimum: 1s)".to_string());
        }

        if self.store_capacity == 0 {
            errors.push("cookie store capacity must be greater than 0".to_string());
        }

        errors
    }
}

/// Command-server-role configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Cookie server to verify presented cookies against
    pub cookie_server_addr: String,

    /// Maximum number of commands awaiting verification
    pub pending_capacity: usize,
}

impl Default for CommandServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::from("127.0.0.1:2000"),
            cookie_server_addr: String::from("127.0.0.1:2001"),
            pending_capacity: PENDING_CAPACITY,
        }
    }
}

impl CommandServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        validate_addr(&mut errors, "command_server.bind_addr", &self.bind_addr);
        validate_addr(
            &mut errors,
            "command_server.cookie_server_addr",
            &self.cookie_server_addr,
        );

        if self.pending_capacity == 0 {
            errors.push("pending capacity must be greater than 0".to_string());
        }

        errors
    }
}

fn validate_addr(errors: &mut Vec<String>, field: &str, addr: &str) {
    if addr.is_empty() {
        errors.push(format!("{field} cannot be empty"));
    } else if addr.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "{field}: invalid address format '{addr}' (expected format: '127.0.0.1:2000')"
        ));
    }
}

/// Helper module for Duration serialization/deserialization as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
