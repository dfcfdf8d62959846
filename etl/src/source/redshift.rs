use std::error::Error;
use std::io::BufReader;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use config::shared::SourceConnectionConfig;
use futures::{StreamExt, TryStreamExt};
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, Connection, NoTls, Row, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info};

use crate::conversions::numeric::PgNumeric;
use crate::error::{EtlError, EtlResult};
use crate::replication::query::ExtractionQuery;
use crate::source::{QueryResult, Source};
use crate::types::{Cell, ColumnDescriptor, SourceTypeCode, TableRow};

/// Spawns a background task driving a source connection until it terminates.
fn spawn_source_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        let result = connection.await;

        match result {
            Err(err) => error!("an error occurred during the source connection: {}", err),
            Ok(()) => info!("source connection terminated successfully"),
        }
    }
    .instrument(span);

    // The client terminates the connection when dropped, so the handle is not tracked.
    tokio::spawn(task);
}

/// Raw value of a column whose type has no dedicated decoding.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Source reading from a Redshift cluster over the Postgres wire protocol.
#[derive(Debug, Clone)]
pub struct RedshiftSource {
    client: Arc<Client>,
}

impl RedshiftSource {
    /// Connects to the cluster, over TLS when enabled in the configuration.
    pub async fn connect(config: &SourceConnectionConfig) -> EtlResult<Self> {
        match config.tls.enabled {
            true => RedshiftSource::connect_tls(config).await,
            false => RedshiftSource::connect_no_tls(config).await,
        }
    }

    async fn connect_no_tls(config: &SourceConnectionConfig) -> EtlResult<Self> {
        let (client, connection) = config.connect_options().connect(NoTls).await?;
        spawn_source_connection::<NoTls>(connection);

        info!(host = %config.host, "connected to source without tls");

        Ok(RedshiftSource {
            client: Arc::new(client),
        })
    }

    async fn connect_tls(config: &SourceConnectionConfig) -> EtlResult<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader = BufReader::new(config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            let cert = cert?;
            root_store.add(cert)?;
        }

        let tls_config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        let (client, connection) = config
            .connect_options()
            .connect(MakeRustlsConnect::new(tls_config))
            .await?;
        spawn_source_connection::<MakeRustlsConnect>(connection);

        info!(host = %config.host, "connected to source with tls");

        Ok(RedshiftSource {
            client: Arc::new(client),
        })
    }
}

impl Source for RedshiftSource {
    fn name() -> &'static str {
        "redshift"
    }

    async fn execute(&self, query: &ExtractionQuery) -> EtlResult<QueryResult> {
        let sql = query.to_sql();
        debug!(%sql, "executing extraction query");

        let statement = self.client.prepare(&sql).await?;

        let column_types: Vec<Type> = statement
            .columns()
            .iter()
            .map(|column| column.type_().clone())
            .collect();
        let columns = statement
            .columns()
            .iter()
            .map(|column| {
                ColumnDescriptor::new(column.name(), SourceTypeCode::Oid(column.type_().oid()))
            })
            .collect();

        let params: [&(dyn ToSql + Sync); 0] = [];
        let rows = self
            .client
            .query_raw(&statement, params)
            .await?
            .map_err(EtlError::from)
            .and_then(move |row| {
                let decoded = decode_row(&row, &column_types);
                async move { decoded }
            })
            .boxed();

        Ok(QueryResult { columns, rows })
    }
}

fn decode_row(row: &Row, column_types: &[Type]) -> EtlResult<TableRow> {
    let mut values = Vec::with_capacity(column_types.len());
    for (index, column_type) in column_types.iter().enumerate() {
        values.push(decode_cell(row, index, column_type)?);
    }

    Ok(TableRow::new(values))
}

fn decode_cell(row: &Row, index: usize, column_type: &Type) -> EtlResult<Cell> {
    let cell = match *column_type {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.map(Cell::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(Cell::I16),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.map(Cell::I32),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.map(Cell::I64),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index)?.map(Cell::F32),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.map(Cell::F64),
        Type::NUMERIC => row
            .try_get::<_, Option<PgNumeric>>(index)?
            .map(Cell::Numeric),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(index)?.map(Cell::String)
        }
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(index)?.map(Cell::Date),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(Cell::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(Cell::TimestampTz),
        _ => match row.try_get::<_, Option<RawValue>>(index)? {
            Some(RawValue(raw)) => Some(decode_unknown(raw, column_type)?),
            None => None,
        },
    };

    Ok(cell.unwrap_or(Cell::Null))
}

#[cfg(feature = "unknown-types-to-bytes")]
fn decode_unknown(raw: Vec<u8>, _column_type: &Type) -> EtlResult<Cell> {
    Ok(Cell::Bytes(raw))
}

#[cfg(not(feature = "unknown-types-to-bytes"))]
fn decode_unknown(raw: Vec<u8>, column_type: &Type) -> EtlResult<Cell> {
    String::from_utf8(raw).map(Cell::String).map_err(|err| {
        crate::etl_error!(
            crate::error::ErrorKind::ConversionError,
            "Unsupported source column type",
            format!("type {column_type} is not valid UTF-8 text"),
            source: err
        )
    })
}
