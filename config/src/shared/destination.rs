use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Destination warehouse configuration.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Keeps rows in process memory. Useful for dry runs.
    Memory {
        /// Namespace the tables are created in.
        namespace: String,
    },
    /// Snowflake through its SQL REST API.
    Snowflake {
        /// Account identifier, e.g. `myorg-myaccount`.
        account: String,
        /// Database holding the destination schema.
        database: String,
        /// Schema the replicated tables are created in.
        schema: String,
        /// Warehouse used to run statements.
        warehouse: Option<String>,
        /// Role used to run statements.
        role: Option<String>,
        /// Bearer token sent with every request.
        token: SecretString,
        /// How Snowflake should interpret `token`.
        #[serde(default)]
        token_type: SnowflakeTokenType,
        /// Request timeout in milliseconds.
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
}

impl DestinationConfig {
    /// Default timeout for a single Snowflake statement request.
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

    /// Returns the namespace (schema) tables are reconciled in.
    pub fn namespace(&self) -> &str {
        match self {
            DestinationConfig::Memory { namespace } => namespace,
            DestinationConfig::Snowflake { schema, .. } => schema,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DestinationConfig::Memory { namespace } if namespace.trim().is_empty() => {
                Err(ValidationError::InvalidFieldValue {
                    field: "destination.memory.namespace".to_string(),
                    constraint: "must not be empty".to_string(),
                })
            }
            DestinationConfig::Snowflake {
                account,
                database,
                schema,
                ..
            } => {
                for (field, value) in [
                    ("account", account),
                    ("database", database),
                    ("schema", schema),
                ] {
                    if value.trim().is_empty() {
                        return Err(ValidationError::InvalidFieldValue {
                            field: format!("destination.snowflake.{field}"),
                            constraint: "must not be empty".to_string(),
                        });
                    }
                }

                Ok(())
            }
            DestinationConfig::Memory { .. } => Ok(()),
        }
    }
}

/// Token kinds accepted by the Snowflake SQL API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnowflakeTokenType {
    /// OAuth access token.
    #[default]
    Oauth,
    /// JWT signed with a key pair registered for the user.
    KeypairJwt,
    /// Programmatic access token.
    ProgrammaticAccessToken,
}

impl SnowflakeTokenType {
    /// Value of the `X-Snowflake-Authorization-Token-Type` header.
    pub fn header_value(&self) -> &'static str {
        match self {
            SnowflakeTokenType::Oauth => "OAUTH",
            SnowflakeTokenType::KeypairJwt => "KEYPAIR_JWT",
            SnowflakeTokenType::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    DestinationConfig::DEFAULT_REQUEST_TIMEOUT_MS
}
