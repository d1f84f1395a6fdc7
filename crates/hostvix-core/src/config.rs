//! Host connection configuration.

use crate::error::VixError;
use hostvix_api::{ConnectParams, HostType};
use serde::Deserialize;
use std::fmt;

/// Ask the host library for its newest API version.
pub const LATEST_API_VERSION: i32 = -1;

/// Settings for [`HostSession::connect`](crate::HostSession::connect).
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Service provider (default: library default).
    pub host_type: HostType,
    /// Remote host name; `None` targets the local host.
    pub host_name: Option<String>,
    /// Remote port; 0 selects the provider's default.
    pub port: u16,
    pub user_name: Option<String>,
    pub password: Option<String>,
    /// API version to negotiate (default: latest).
    pub api_version: i32,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host_type: HostType::Default,
            host_name: None,
            port: 0,
            user_name: None,
            password: None,
            api_version: LATEST_API_VERSION,
        }
    }
}

impl fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("host_type", &self.host_type)
            .field("host_name", &self.host_name)
            .field("port", &self.port)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl ConnectConfig {
    /// Create a new config builder.
    pub fn builder() -> ConnectConfigBuilder {
        ConnectConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOSTVIX_HOST_TYPE` | `default` (or server, workstation, player, vsphere, ...) |
    /// | `HOSTVIX_HOST` | unset (local host) |
    /// | `HOSTVIX_PORT` | `0` |
    /// | `HOSTVIX_USER` | unset |
    /// | `HOSTVIX_PASSWORD` | unset |
    pub fn from_env() -> Self {
        let default = Self::default();
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            host_type: std::env::var("HOSTVIX_HOST_TYPE")
                .map(|v| HostType::parse(&v))
                .unwrap_or(default.host_type),
            host_name: non_empty("HOSTVIX_HOST"),
            port: std::env::var("HOSTVIX_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            user_name: non_empty("HOSTVIX_USER"),
            password: non_empty("HOSTVIX_PASSWORD"),
            api_version: default.api_version,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), VixError> {
        if self.host_type.is_remote() && self.host_name.is_none() {
            return Err(VixError::Config(format!(
                "host_name is required for {} hosts",
                self.host_type
            )));
        }
        if self.host_name.as_deref() == Some("") {
            return Err(VixError::Config("host_name must not be empty".into()));
        }
        if self.port != 0 && self.host_name.is_none() {
            return Err(VixError::Config("port requires host_name".into()));
        }
        if self.password.is_some() && self.user_name.is_none() {
            return Err(VixError::Config("password requires user_name".into()));
        }
        Ok(())
    }

    /// Borrowed view passed to the connect job.
    pub fn params(&self) -> ConnectParams<'_> {
        ConnectParams {
            api_version: self.api_version,
            host_type: self.host_type,
            host_name: self.host_name.as_deref(),
            port: self.port,
            user_name: self.user_name.as_deref(),
            password: self.password.as_deref(),
        }
    }
}

/// Builder for ConnectConfig.
#[derive(Debug, Default)]
pub struct ConnectConfigBuilder {
    config: ConnectConfig,
}

impl ConnectConfigBuilder {
    /// Set the service provider.
    pub fn host_type(mut self, host_type: HostType) -> Self {
        self.config.host_type = host_type;
        self
    }

    /// Set the remote host name.
    pub fn host(mut self, name: impl Into<String>) -> Self {
        self.config.host_name = Some(name.into());
        self
    }

    /// Set the remote port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set login credentials.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.user_name = Some(user.into());
        self.config.password = Some(password.into());
        self
    }

    /// Pin the API version instead of negotiating the latest.
    pub fn api_version(mut self, version: i32) -> Self {
        self.config.api_version = version;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ConnectConfig, VixError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConnectConfig::default();
        assert_eq!(config.host_type, HostType::Default);
        assert!(config.host_name.is_none());
        assert_eq!(config.port, 0);
        assert_eq!(config.api_version, LATEST_API_VERSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validation_remote_needs_host() {
        let result = ConnectConfig::builder().host_type(HostType::Server).build();
        assert!(matches!(result, Err(VixError::Config(_))));
    }

    #[test]
    fn test_builder_validation_port_needs_host() {
        let result = ConnectConfig::builder().port(902).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_success() {
        let config = ConnectConfig::builder()
            .host_type(HostType::Server)
            .host("esx01")
            .port(902)
            .credentials("root", "secret")
            .build()
            .expect("should build successfully");

        assert_eq!(config.host_name.as_deref(), Some("esx01"));
        let params = config.params();
        assert_eq!(params.port, 902);
        assert_eq!(params.user_name, Some("root"));
        assert_eq!(params.password, Some("secret"));
    }

    #[test]
    fn test_password_without_user_is_rejected() {
        let config = ConnectConfig {
            password: Some("secret".into()),
            ..ConnectConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectConfig::builder()
            .credentials("root", "secret")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("root"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ConnectConfig =
            serde_json::from_str(r#"{"host_type": "server", "host_name": "esx01"}"#).unwrap();
        assert_eq!(config.host_type, HostType::Server);
        assert_eq!(config.host_name.as_deref(), Some("esx01"));
        assert_eq!(config.api_version, LATEST_API_VERSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_uses_defaults() {
        std::env::remove_var("HOSTVIX_HOST_TYPE");
        std::env::remove_var("HOSTVIX_HOST");
        std::env::remove_var("HOSTVIX_PORT");
        std::env::remove_var("HOSTVIX_USER");
        std::env::remove_var("HOSTVIX_PASSWORD");

        let config = ConnectConfig::from_env();
        assert_eq!(config, ConnectConfig::default());
    }
}
