use std::collections::BTreeMap;
use std::time::Duration;

use config::shared::SnowflakeTokenType;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// The user agent reported to Snowflake.
const USER_AGENT: &str = "warehouse-replicator/0.1";

/// Wait between two polls of a statement that is still running.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Binding type of every parameter. Snowflake casts text to the column type.
const TEXT_BINDING_TYPE: &str = "TEXT";

#[derive(Debug, Serialize)]
struct Binding<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartitionInfo {
    #[serde(default)]
    row_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    statement_handle: Option<String>,
    message: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct PartitionResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

/// Rows returned by a statement, every value rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementResult {
    pub rows: Vec<Vec<Option<String>>>,
}

/// A client for the Snowflake SQL API.
///
/// Statements are submitted synchronously. When Snowflake answers that a statement is still
/// running the client polls it until it finishes. Result partitions beyond the first are fetched
/// so callers always see the complete result.
#[derive(Debug, Clone)]
pub struct SnowflakeClient {
    client: Client,
    statements_url: String,
    database: String,
    warehouse: Option<String>,
    role: Option<String>,
    token: SecretString,
    token_type: SnowflakeTokenType,
    timeout: Duration,
}

impl SnowflakeClient {
    /// Creates a client for `account`, running statements in `database`.
    pub fn new(
        account: &str,
        database: String,
        warehouse: Option<String>,
        role: Option<String>,
        token: SecretString,
        token_type: SnowflakeTokenType,
        timeout: Duration,
    ) -> EtlResult<SnowflakeClient> {
        let base_url = format!("https://{account}.snowflakecomputing.com");

        Self::new_with_base_url(
            &base_url, database, warehouse, role, token, token_type, timeout,
        )
    }

    /// Creates a client sending requests to `base_url` instead of the account host.
    ///
    /// Intended for proxies and local emulators.
    pub fn new_with_base_url(
        base_url: &str,
        database: String,
        warehouse: Option<String>,
        role: Option<String>,
        token: SecretString,
        token_type: SnowflakeTokenType,
        timeout: Duration,
    ) -> EtlResult<SnowflakeClient> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(SnowflakeClient {
            client,
            statements_url: format!("{}/api/v2/statements", base_url.trim_end_matches('/')),
            database,
            warehouse,
            role,
            token,
            token_type,
            timeout,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Executes a statement with positional text bindings (`?` placeholders).
    pub async fn execute(
        &self,
        statement: &str,
        bindings: &[Option<String>],
    ) -> EtlResult<StatementResult> {
        let bindings = bindings
            .iter()
            .enumerate()
            .map(|(index, value)| {
                (
                    (index + 1).to_string(),
                    Binding {
                        kind: TEXT_BINDING_TYPE,
                        value: value.as_deref(),
                    },
                )
            })
            .collect();

        let request = StatementRequest {
            statement,
            timeout: self.timeout.as_secs(),
            database: &self.database,
            warehouse: self.warehouse.as_deref(),
            role: self.role.as_deref(),
            bindings,
        };

        debug!(statement, "submitting statement to snowflake");

        let response = self
            .authorized(self.client.post(&self.statements_url))
            .json(&request)
            .send()
            .await?;
        let mut response = Self::check_status(response).await?;

        while response.status() == StatusCode::ACCEPTED {
            let accepted: StatementResponse = response.json().await?;
            let Some(handle) = accepted.statement_handle else {
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Snowflake accepted a statement without a handle"
                );
            };

            tokio::time::sleep(POLL_INTERVAL).await;
            let url = format!("{}/{handle}", self.statements_url);
            response = Self::check_status(self.authorized(self.client.get(&url)).send().await?)
                .await?;
        }

        let completed: StatementResponse = response.json().await?;
        let mut rows = completed.data;

        let partitions = completed
            .result_set_meta_data
            .map(|metadata| metadata.partition_info)
            .unwrap_or_default();
        let expected_rows: u64 = partitions.iter().map(|partition| partition.row_count).sum();
        if partitions.len() > 1 {
            let Some(handle) = completed.statement_handle else {
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Snowflake returned a partitioned result without a handle"
                );
            };

            for partition in 1..partitions.len() {
                let url = format!("{}/{handle}?partition={partition}", self.statements_url);
                let response =
                    Self::check_status(self.authorized(self.client.get(&url)).send().await?)
                        .await?;
                let partition: PartitionResponse = response.json().await?;
                rows.extend(partition.data);
            }
        }

        debug!(
            message = completed.message.as_deref().unwrap_or_default(),
            rows = rows.len(),
            expected_rows,
            "snowflake statement completed"
        );

        Ok(StatementResult { rows })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(self.token.expose_secret())
            .header(
                "X-Snowflake-Authorization-Token-Type",
                self.token_type.header_value(),
            )
            .header("Accept", "application/json")
    }

    /// Turns non-success responses into errors, keeping Snowflake's message as detail.
    async fn check_status(response: Response) -> EtlResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StatementResponse>(&body)
            .ok()
            .and_then(|response| response.message)
            .unwrap_or(body);

        info!(%status, "snowflake rejected a request");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => bail!(
                ErrorKind::AuthenticationError,
                "Snowflake authentication failed",
                format!("HTTP {status}: {message}")
            ),
            _ => bail!(
                ErrorKind::DestinationQueryFailed,
                "Snowflake statement failed",
                format!("HTTP {status}: {message}")
            ),
        }
    }
}
