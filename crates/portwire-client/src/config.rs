use std::path::{Path, PathBuf};
use std::time::Duration;

use portwire_frame::DEFAULT_MAX_PAYLOAD;
use portwire_transport::DEFAULT_SOCKET_PATH;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default per-operation socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Default extra timeout for operations that touch disk.
pub const DEFAULT_DISK_TIMEOUT: Duration = Duration::from_secs(900);

/// Client configuration.
///
/// Loadable from JSON; durations are written as (fractional) seconds and
/// every field is optional:
///
/// ```json
/// { "socket_path": "/run/portod.socket", "timeout": 30, "auto_reconnect": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Daemon socket path.
    pub socket_path: PathBuf,
    /// Socket timeout applied to every send and receive.
    #[serde(with = "seconds")]
    pub timeout: Duration,
    /// Extra timeout for disk-bound calls.
    #[serde(with = "seconds")]
    pub disk_timeout: Duration,
    /// Reconnect transparently when the connection is missing or broken.
    pub auto_reconnect: bool,
    /// Largest response frame accepted.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            timeout: DEFAULT_TIMEOUT,
            disk_timeout: DEFAULT_DISK_TIMEOUT,
            auto_reconnect: true,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_disk_timeout(mut self, disk_timeout: Duration) -> Self {
        self.disk_timeout = disk_timeout;
        self
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ClientError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| ClientError::Config(format!("invalid config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Socket timeouts of zero are rejected by the OS; refuse them early.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ClientError::Config("timeout must be positive".into()));
        }
        if self.disk_timeout.is_zero() {
            return Err(ClientError::Config("disk_timeout must be positive".into()));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(ClientError::Config("socket_path must not be empty".into()));
        }
        Ok(())
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/run/portod.socket"));
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.disk_timeout, Duration::from_secs(900));
        assert!(config.auto_reconnect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ClientConfig::from_json(r#"{"timeout": 2.5, "auto_reconnect": false}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(!config.auto_reconnect);
        assert_eq!(config.disk_timeout, DEFAULT_DISK_TIMEOUT);
    }

    #[test]
    fn json_roundtrip() {
        let config = ClientConfig::new("/tmp/d.sock")
            .with_timeout(Duration::from_secs(7))
            .with_disk_timeout(Duration::from_secs(70));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_json(r#"{"timeout": 0}"#),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"timeout": -1}"#),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"socket_path": ""}"#),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "portwire-config-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::write(&path, r#"{"socket_path": "/tmp/x.sock"}"#).unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/x.sock"));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            ClientConfig::load(&path),
            Err(ClientError::Config(_))
        ));
    }
}
