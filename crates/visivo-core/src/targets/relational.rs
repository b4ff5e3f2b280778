use std::future::Future;
use std::io;

use rusqlite::types::Value as SqlValue;
use serde_json::{Number, Value, json};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Column, ColumnIndex, Connection, Decode, Executor, Row, Statement, TypeInfo};
use tokio::runtime::{Builder, Handle, Runtime};

use super::{ConnectionStrategy, QueryRows, Record, TargetConnection};
use crate::error::ConnectionError;
use crate::models::Target;
use crate::models::target::DEFAULT_HOST;
use crate::query::Dialect;

const CLOSED: &str = "connection is already closed";

/// One strategy for every relational backend, parameterized by dialect.
/// SQLite goes through rusqlite against the `database` path; the server
/// dialects go through the typed sqlx drivers built from the target fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationalStrategy {
    dialect: Dialect,
}

impl RelationalStrategy {
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl ConnectionStrategy for RelationalStrategy {
    fn open(&self, target: &Target) -> Result<Box<dyn TargetConnection>, ConnectionError> {
        match self.dialect {
            Dialect::Sqlite => Ok(Box::new(SqliteConnection::open(target)?)),
            Dialect::Postgresql | Dialect::Mysql => {
                Ok(Box::new(DriverConnection::open(target, self.dialect)?))
            }
            Dialect::Snowflake => Err(ConnectionError::UnsupportedBackend(format!(
                "{} (relational)",
                self.dialect
            ))),
        }
    }
}

struct SqliteConnection {
    target: String,
    connection: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    fn open(target: &Target) -> Result<Self, ConnectionError> {
        let connection = rusqlite::Connection::open(&target.database)
            .map_err(|error| ConnectionError::connect(&target.name, error))?;
        Ok(Self {
            target: target.name.clone(),
            connection: Some(connection),
        })
    }
}

impl TargetConnection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<QueryRows, ConnectionError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| ConnectionError::query(&self.target, CLOSED))?;
        let query_error = |error: rusqlite::Error| ConnectionError::query(&self.target, error);

        let mut statement = connection.prepare(sql).map_err(query_error)?;
        let columns = statement
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        let mut rows = statement.query([]).map_err(query_error)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut record = Record::new();
            for (index, column) in columns.iter().enumerate() {
                let value = row.get::<usize, SqlValue>(index).map_err(query_error)?;
                record.insert(column.clone(), json_value_from_sql(value));
            }
            records.push(record);
        }

        Ok(QueryRows {
            columns,
            rows: records,
        })
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        match self.connection.take() {
            Some(connection) => connection
                .close()
                .map_err(|(_, error)| ConnectionError::query(&self.target, error)),
            None => Ok(()),
        }
    }
}

/// sqlx connection driven by a private current-thread runtime, so the
/// blocking [`TargetConnection`] contract holds without an ambient executor.
struct DriverConnection {
    target: String,
    runtime: Option<Runtime>,
    connection: Option<ServerConnection>,
}

impl DriverConnection {
    fn open(target: &Target, dialect: Dialect) -> Result<Self, ConnectionError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| ConnectionError::Runtime {
                target: target.name.clone(),
                source,
            })?;
        let mut driver = Self {
            target: target.name.clone(),
            runtime: Some(runtime),
            connection: None,
        };

        let connected = drive(
            driver.runtime.as_ref(),
            &driver.target,
            ServerConnection::connect(dialect, target),
        )?;
        driver.connection =
            Some(connected.map_err(|error| ConnectionError::connect(&target.name, error))?);
        Ok(driver)
    }
}

impl TargetConnection for DriverConnection {
    fn execute(&mut self, sql: &str) -> Result<QueryRows, ConnectionError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| ConnectionError::query(&self.target, CLOSED))?;

        drive(self.runtime.as_ref(), &self.target, connection.fetch(sql))?
            .map_err(|error| ConnectionError::query(&self.target, error))
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        match self.connection.take() {
            Some(connection) => drive(self.runtime.as_ref(), &self.target, connection.close())?
                .map_err(|error| ConnectionError::query(&self.target, error)),
            None => Ok(()),
        }
    }
}

impl Drop for DriverConnection {
    fn drop(&mut self) {
        // A plain runtime drop panics when the caller is itself async.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Runs `future` to completion on the connection's runtime. Callers already
/// inside a tokio runtime cannot nest `block_on`, so the future is driven
/// from a scoped thread instead.
fn drive<F>(
    runtime: Option<&Runtime>,
    target: &str,
    future: F,
) -> Result<F::Output, ConnectionError>
where
    F: Future + Send,
    F::Output: Send,
{
    let runtime = runtime.ok_or_else(|| ConnectionError::query(target, CLOSED))?;
    if Handle::try_current().is_err() {
        return Ok(runtime.block_on(future));
    }

    std::thread::scope(|scope| scope.spawn(move || runtime.block_on(future)).join()).map_err(
        |_| ConnectionError::Runtime {
            target: target.to_string(),
            source: io::Error::other("driver thread panicked"),
        },
    )
}

enum ServerConnection {
    Postgres(PgConnection),
    MySql(MySqlConnection),
}

impl ServerConnection {
    async fn connect(dialect: Dialect, target: &Target) -> Result<Self, sqlx::Error> {
        match dialect {
            Dialect::Mysql => MySqlConnection::connect_with(&mysql_options(target))
                .await
                .map(Self::MySql),
            _ => PgConnection::connect_with(&postgres_options(target))
                .await
                .map(Self::Postgres),
        }
    }

    /// Describes the statement for its columns, then runs it over the text
    /// protocol so every server type arrives in its literal form.
    async fn fetch(&mut self, sql: &str) -> Result<QueryRows, sqlx::Error> {
        match self {
            Self::Postgres(connection) => {
                let statement = (&mut *connection).prepare(sql).await?;
                let columns = describe(statement.columns());
                let rows = (&mut *connection).fetch_all(sqlx::raw_sql(sql)).await?;
                text_rows(columns, &rows)
            }
            Self::MySql(connection) => {
                let statement = (&mut *connection).prepare(sql).await?;
                let columns = describe(statement.columns());
                let rows = (&mut *connection).fetch_all(sqlx::raw_sql(sql)).await?;
                text_rows(columns, &rows)
            }
        }
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Postgres(connection) => connection.close().await,
            Self::MySql(connection) => connection.close().await,
        }
    }
}

fn postgres_options(target: &Target) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(target.host.as_deref().unwrap_or(DEFAULT_HOST))
        .database(&target.database);
    if let Some(port) = target.port {
        options = options.port(port);
    }
    if let Some(username) = target.username.as_deref() {
        options = options.username(username);
    }
    if let Some(password) = target.password() {
        options = options.password(password);
    }
    if let Some(schema) = target.db_schema.as_deref() {
        options = options.options([("search_path", schema)]);
    }
    options
}

fn mysql_options(target: &Target) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(target.host.as_deref().unwrap_or(DEFAULT_HOST))
        .database(&target.database);
    if let Some(port) = target.port {
        options = options.port(port);
    }
    if let Some(username) = target.username.as_deref() {
        options = options.username(username);
    }
    if let Some(password) = target.password() {
        options = options.password(password);
    }
    options
}

struct DescribedColumn {
    name: String,
    type_name: String,
}

fn describe<C: Column>(columns: &[C]) -> Vec<DescribedColumn> {
    columns
        .iter()
        .map(|column| DescribedColumn {
            name: column.name().to_string(),
            type_name: column.type_info().name().to_string(),
        })
        .collect()
}

fn text_rows<R>(columns: Vec<DescribedColumn>, rows: &[R]) -> Result<QueryRows, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut record = Record::new();
        for (index, column) in columns.iter().enumerate() {
            let value = match row.try_get_unchecked::<Option<String>, _>(index) {
                Ok(text) => decode_text_cell(&column.type_name, text),
                Err(_) => row
                    .try_get_unchecked::<Option<Vec<u8>>, _>(index)?
                    .map_or(Value::Null, |bytes| json!(encode_blob_hex(&bytes))),
            };
            record.insert(column.name.clone(), value);
        }
        records.push(record);
    }

    Ok(QueryRows {
        columns: columns.into_iter().map(|column| column.name).collect(),
        rows: records,
    })
}

/// Text-protocol cells are typed by the server's column type name. Numeric
/// types that do not fit a JSON number, and every temporal type, stay text.
fn decode_text_cell(type_name: &str, cell: Option<String>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    let upper = type_name.to_ascii_uppercase();
    let base = upper.split_whitespace().next().unwrap_or_default();

    match base {
        "INT2" | "INT4" | "INT8" | "OID" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT"
        | "INTEGER" | "BIGINT" | "YEAR" => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<u64>().map(Value::from))
            .unwrap_or(Value::String(text)),
        "FLOAT4" | "FLOAT8" | "FLOAT" | "DOUBLE" | "REAL" | "NUMERIC" | "DECIMAL" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::String(text), Value::Number),
        "BOOL" | "BOOLEAN" => match text.as_str() {
            "t" | "true" | "1" => Value::Bool(true),
            "f" | "false" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}

fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value as SqlValue;
    use serde_json::{Value, json};

    use super::{RelationalStrategy, decode_text_cell, json_value_from_sql, postgres_options};
    use crate::models::Target;
    use crate::query::Dialect;
    use crate::targets::ConnectionStrategy;

    #[test]
    fn sqlite_values_map_to_json() {
        assert_eq!(json_value_from_sql(SqlValue::Null), Value::Null);
        assert_eq!(json_value_from_sql(SqlValue::Integer(7)), json!(7));
        assert_eq!(json_value_from_sql(SqlValue::Real(1.5)), json!(1.5));
        assert_eq!(
            json_value_from_sql(SqlValue::Blob(vec![0x0a, 0xff])),
            json!("0aff")
        );
    }

    #[test]
    fn in_memory_sqlite_runs_and_closes_twice() {
        let target: Target = serde_json::from_value(json!({
            "name": "memory",
            "type": "sqlite",
            "database": ":memory:"
        }))
        .expect("target should deserialize");

        let mut connection = RelationalStrategy::new(Dialect::Sqlite)
            .open(&target)
            .expect("in-memory database should open");
        let rows = connection
            .execute("select 1 as one, 'a' as letter, null as nothing")
            .expect("select should run");
        assert_eq!(rows.columns, vec!["one", "letter", "nothing"]);
        assert_eq!(rows.rows[0]["one"], json!(1));
        assert_eq!(rows.rows[0]["nothing"], Value::Null);

        connection.close().expect("first close");
        connection.close().expect("second close is a no-op");
        assert!(connection.execute("select 1").is_err());
    }

    #[test]
    fn server_cells_decode_by_column_type() {
        let cell = |text: &str| Some(text.to_string());
        assert_eq!(decode_text_cell("INT8", cell("42")), json!(42));
        assert_eq!(
            decode_text_cell("BIGINT UNSIGNED", cell("18446744073709551615")),
            json!(u64::MAX)
        );
        assert_eq!(decode_text_cell("NUMERIC", cell("12.50")), json!(12.5));
        assert_eq!(decode_text_cell("DECIMAL", cell("NaN")), json!("NaN"));
        assert_eq!(decode_text_cell("BOOL", cell("t")), json!(true));
        assert_eq!(decode_text_cell("BOOLEAN", cell("0")), json!(false));
        assert_eq!(
            decode_text_cell("TIMESTAMPTZ", cell("2024-03-01 10:00:00+00")),
            json!("2024-03-01 10:00:00+00")
        );
        assert_eq!(decode_text_cell("DATE", cell("2024-03-01")), json!("2024-03-01"));
        assert_eq!(decode_text_cell("NUMERIC", None), Value::Null);
    }

    #[test]
    fn postgres_options_come_from_target_fields() {
        let target: Target = serde_json::from_value(json!({
            "name": "pg",
            "database": "analytics",
            "host": "db.internal",
            "port": 5434,
            "username": "postgres",
            "password": "p@ss"
        }))
        .expect("target should deserialize");

        let options = postgres_options(&target);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5434);
        assert_eq!(options.get_database(), Some("analytics"));
        assert_eq!(options.get_username(), "postgres");
    }
}
