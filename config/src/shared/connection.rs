use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::shared::ValidationError;

/// Application name reported to the source warehouse.
const APPLICATION_NAME: &str = "warehouse_replicator";

/// Connection settings for the source warehouse (spoken to over the Postgres wire protocol).
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking the password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceConnectionConfig {
    /// Hostname or IP address of the cluster endpoint.
    pub host: String,
    /// Port of the cluster endpoint.
    #[serde(default = "default_source_port")]
    pub port: u16,
    /// Database name.
    pub name: String,
    /// Username used to authenticate.
    pub username: String,
    /// Password used to authenticate.
    pub password: Option<SecretString>,
    /// TLS settings.
    #[serde(default)]
    pub tls: TlsConfig,
    /// Connect timeout in milliseconds. `None` leaves it to the driver.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

impl SourceConnectionConfig {
    /// Default Redshift port.
    pub const DEFAULT_PORT: u16 = 5439;

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()
    }

    /// Builds the [`tokio_postgres::Config`] for this source.
    ///
    /// Certificates are not part of the returned options; the caller installs them on the
    /// rustls connector.
    pub fn connect_options(&self) -> TokioPgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            TokioPgSslMode::Require
        } else {
            TokioPgSslMode::Disable
        };

        let mut config = TokioPgConnectOptions::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.name)
            .user(&self.username)
            .application_name(APPLICATION_NAME)
            .ssl_mode(ssl_mode);

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        if let Some(connect_timeout_ms) = self.connect_timeout_ms {
            config.connect_timeout(std::time::Duration::from_millis(connect_timeout_ms));
        }

        config
    }
}

/// TLS settings for the source connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    #[serde(default)]
    pub trusted_root_certs: String,
    /// Whether TLS is enabled for the connection.
    #[serde(default)]
    pub enabled: bool,
}

impl TlsConfig {
    /// Checks that certificates are present when TLS is enabled.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

fn default_source_port() -> u16 {
    SourceConnectionConfig::DEFAULT_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_requires_root_certs() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        assert_eq!(tls.validate(), Err(ValidationError::MissingTrustedRootCerts));
        assert!(TlsConfig::default().validate().is_ok());
    }

    #[test]
    fn connect_options_carry_connection_fields() {
        let config: SourceConnectionConfig = serde_json::from_str(
            r#"{"host": "cluster.example.com", "name": "dev", "username": "loader", "password": "secret"}"#,
        )
        .unwrap();

        let options = config.connect_options();

        assert_eq!(config.port, SourceConnectionConfig::DEFAULT_PORT);
        assert_eq!(options.get_user(), Some("loader"));
        assert_eq!(options.get_dbname(), Some("dev"));
        assert_eq!(options.get_ports(), &[5439]);
        assert_eq!(options.get_ssl_mode(), TokioPgSslMode::Disable);
    }
}
