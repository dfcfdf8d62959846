use std::time::{Duration, Instant};

use config::shared::DestinationConfig;
use tracing::{debug, info};

use crate::bail;
use crate::clients::snowflake::SnowflakeClient;
use crate::destination::{ColumnSchema, Destination};
use crate::error::{ErrorKind, EtlResult};
use crate::types::Record;

/// Column of `SHOW TABLES` holding the table name.
const SHOW_TABLES_NAME_COLUMN: usize = 1;

/// Quotes a Snowflake identifier, upper-casing it like unquoted identifiers are.
fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.to_uppercase().replace('"', "\"\""))
}

/// Destination writing to Snowflake through its SQL API.
///
/// Tables live in `database.namespace`. Bulk writes are a single `MERGE` keyed on the primary
/// key, so re-delivered rows overwrite their previous version.
#[derive(Debug, Clone)]
pub struct SnowflakeDestination {
    client: SnowflakeClient,
}

impl SnowflakeDestination {
    pub fn new(client: SnowflakeClient) -> Self {
        Self { client }
    }

    /// Builds a destination from configuration. Returns `None` for non-Snowflake configurations.
    pub fn from_config(config: &DestinationConfig) -> EtlResult<Option<Self>> {
        let DestinationConfig::Snowflake {
            account,
            database,
            warehouse,
            role,
            token,
            token_type,
            request_timeout_ms,
            ..
        } = config
        else {
            return Ok(None);
        };

        let client = SnowflakeClient::new(
            account,
            database.clone(),
            warehouse.clone(),
            role.clone(),
            token.clone(),
            *token_type,
            Duration::from_millis(*request_timeout_ms),
        )?;

        Ok(Some(Self::new(client)))
    }

    fn qualified_namespace(&self, namespace: &str) -> String {
        format!(
            "{}.{}",
            quote_identifier(self.client.database()),
            quote_identifier(namespace)
        )
    }

    fn qualified_table(&self, namespace: &str, table_name: &str) -> String {
        format!(
            "{}.{}",
            self.qualified_namespace(namespace),
            quote_identifier(table_name)
        )
    }
}

/// Renders the `CREATE TABLE` statement of a table.
fn create_table_statement(qualified_table: &str, columns: &[ColumnSchema]) -> String {
    let columns = columns
        .iter()
        .map(|column| format!("{} {}", quote_identifier(&column.name), column.destination_type))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {qualified_table} ({columns})")
}

/// Renders a `MERGE` upserting `rows` rows of `columns` keyed on `primary_key`.
///
/// Values are bound positionally, row after row.
fn merge_statement(
    qualified_table: &str,
    columns: &[String],
    primary_key: &[String],
    rows: usize,
) -> String {
    let quoted_columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();

    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders.as_str(); rows].join(", ");

    let on = primary_key
        .iter()
        .map(|column| {
            let column = quote_identifier(column);
            format!("target.{column} = source.{column}")
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let updates = quoted_columns
        .iter()
        .filter(|column| {
            !primary_key
                .iter()
                .any(|key| quote_identifier(key) == **column)
        })
        .map(|column| format!("target.{column} = source.{column}"))
        .collect::<Vec<_>>();

    let column_list = quoted_columns.join(", ");
    let source_values = quoted_columns
        .iter()
        .map(|column| format!("source.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statement = format!(
        "MERGE INTO {qualified_table} AS target \
         USING (SELECT * FROM VALUES {values} AS v ({column_list})) AS source \
         ON {on}"
    );
    if !updates.is_empty() {
        statement.push_str(&format!(
            " WHEN MATCHED THEN UPDATE SET {}",
            updates.join(", ")
        ));
    }
    statement.push_str(&format!(
        " WHEN NOT MATCHED THEN INSERT ({column_list}) VALUES ({source_values})"
    ));

    statement
}

impl Destination for SnowflakeDestination {
    fn name() -> &'static str {
        "snowflake"
    }

    async fn create_namespace_if_missing(&self, namespace: &str) -> EtlResult<()> {
        let statement = format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            self.qualified_namespace(namespace)
        );
        self.client.execute(&statement, &[]).await?;

        info!(namespace, "ensured snowflake schema exists");

        Ok(())
    }

    async fn list_tables(&self, namespace: &str) -> EtlResult<Vec<String>> {
        let statement = format!(
            "SHOW TABLES IN SCHEMA {}",
            self.qualified_namespace(namespace)
        );
        let result = self.client.execute(&statement, &[]).await?;

        let mut tables = Vec::with_capacity(result.rows.len());
        for row in result.rows {
            let Some(Some(name)) = row.into_iter().nth(SHOW_TABLES_NAME_COLUMN) else {
                bail!(
                    ErrorKind::DestinationSchemaError,
                    "Snowflake table listing has no name column",
                    format!("schema {namespace}")
                );
            };
            tables.push(name);
        }

        Ok(tables)
    }

    async fn create_table(
        &self,
        namespace: &str,
        table_name: &str,
        columns: &[ColumnSchema],
    ) -> EtlResult<()> {
        let statement =
            create_table_statement(&self.qualified_table(namespace, table_name), columns);
        self.client.execute(&statement, &[]).await?;

        info!(namespace, table = table_name, "created snowflake table");

        Ok(())
    }

    async fn bulk_insert(
        &self,
        namespace: &str,
        table_name: &str,
        primary_key: &[String],
        records: Vec<Record>,
    ) -> EtlResult<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let columns = first.columns().to_vec();

        for key in primary_key {
            if !columns.iter().any(|column| column.eq_ignore_ascii_case(key)) {
                bail!(
                    ErrorKind::InvalidData,
                    "Record is missing a primary key column",
                    format!("column {key} of table {table_name}")
                );
            }
        }

        let mut bindings = Vec::with_capacity(columns.len() * records.len());
        for record in &records {
            bindings.extend(record.values().iter().map(|value| value.to_text()));
        }

        let statement = merge_statement(
            &self.qualified_table(namespace, table_name),
            &columns,
            primary_key,
            records.len(),
        );

        let started = Instant::now();
        self.client.execute(&statement, &bindings).await?;
        debug!(
            table = table_name,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "merged records into snowflake"
        );

        Ok(())
    }
}
