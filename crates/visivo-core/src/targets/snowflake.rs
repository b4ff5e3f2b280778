//! Snowflake over its REST session API: log in for a session token, run one
//! statement synchronously, then delete the session.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{ConnectionStrategy, QueryRows, Record, TargetConnection};
use crate::error::ConnectionError;
use crate::models::Target;

pub const CLIENT_APP_ID: &str = "visivo-core";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeStrategy {
    timeout: Duration,
}

impl Default for SnowflakeStrategy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SnowflakeStrategy {
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ConnectionStrategy for SnowflakeStrategy {
    fn open(&self, target: &Target) -> Result<Box<dyn TargetConnection>, ConnectionError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| ConnectionError::connect(&target.name, error))?;

        let base_url = base_url(target)?;
        let token = login(&client, &base_url, target)?;
        Ok(Box::new(SnowflakeConnection {
            target: target.name.clone(),
            client,
            base_url,
            token: Some(token),
        }))
    }
}

/// `host` overrides the account URL, which is useful for proxies and
/// private links.
pub fn base_url(target: &Target) -> Result<String, ConnectionError> {
    if let Some(host) = target.host.as_deref().filter(|host| !host.is_empty()) {
        let host = host.trim_end_matches('/');
        return Ok(if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        });
    }

    let account = required(target, "account", target.account.as_deref())?;
    Ok(format!("https://{account}.snowflakecomputing.com"))
}

fn required<'a>(
    target: &Target,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ConnectionError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConnectionError::MissingTargetField {
            target: target.name.clone(),
            field,
        })
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,

    #[serde(default)]
    message: Option<String>,

    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ResultData {
    #[serde(default)]
    rowtype: Vec<RowType>,

    #[serde(default)]
    rowset: Vec<Vec<Option<String>>>,

    /// Remaining rows, staged as separate downloads.
    #[serde(default)]
    chunks: Vec<ResultChunk>,

    #[serde(default, rename = "chunkHeaders")]
    chunk_headers: BTreeMap<String, String>,

    #[serde(default)]
    qrmk: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultChunk {
    url: String,

    #[serde(default, rename = "rowCount")]
    row_count: usize,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,

    #[serde(rename = "type")]
    kind: String,
}

fn login(client: &Client, base_url: &str, target: &Target) -> Result<String, ConnectionError> {
    let account = required(target, "account", target.account.as_deref())?;
    let username = required(target, "username", target.username.as_deref())?;
    let password = required(target, "password", target.password())?;

    let mut url = Url::parse(&format!("{base_url}/session/v1/login-request"))
        .map_err(|error| ConnectionError::connect(&target.name, error))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("databaseName", &target.database);
        if let Some(warehouse) = target.warehouse.as_deref() {
            query.append_pair("warehouse", warehouse);
        }
        if let Some(schema) = target.db_schema.as_deref() {
            query.append_pair("schemaName", schema);
        }
    }

    let body = json!({
        "data": {
            "ACCOUNT_NAME": account_name(account),
            "LOGIN_NAME": username,
            "PASSWORD": password,
            "CLIENT_APP_ID": CLIENT_APP_ID,
            "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
        }
    });

    let envelope: Envelope<LoginData> = send(client.post(url).json(&body))
        .map_err(|error| ConnectionError::connect(&target.name, error))?;
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } => Ok(data.token),
        Envelope { message, .. } => Err(ConnectionError::connect(
            &target.name,
            message.unwrap_or_else(|| "login rejected".to_string()),
        )),
    }
}

/// Locator prefix of an account identifier (`ax28471.us-west-2.aws` logs in
/// as `ax28471`).
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, String> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .map_err(|error| format!("request failed: {error}"))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        return Err(format!("snowflake http error {status}: {text}"));
    }
    response
        .json()
        .map_err(|error| format!("snowflake returned invalid JSON: {error}"))
}

struct SnowflakeConnection {
    target: String,
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl SnowflakeConnection {
    fn fetch_chunk(
        &self,
        chunk: &ResultChunk,
        headers: &HeaderMap,
    ) -> Result<Vec<Vec<Option<String>>>, String> {
        let response = self
            .client
            .get(&chunk.url)
            .headers(headers.clone())
            .send()
            .map_err(|error| format!("chunk download failed: {error}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("snowflake chunk http error {status}"));
        }
        let body = response
            .text()
            .map_err(|error| format!("chunk download failed: {error}"))?;

        let rows = parse_chunk(&body)?;
        if chunk.row_count != 0 && rows.len() != chunk.row_count {
            return Err(format!(
                "chunk declared {} rows but held {}",
                chunk.row_count,
                rows.len()
            ));
        }
        Ok(rows)
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            format!("Snowflake Token=\"{token}\""),
        )
    }
}

impl TargetConnection for SnowflakeConnection {
    fn execute(&mut self, sql: &str) -> Result<QueryRows, ConnectionError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ConnectionError::query(&self.target, "session is already closed"))?;

        let url = format!(
            "{}/queries/v1/query-request?requestId={}",
            self.base_url,
            uuid::Uuid::new_v4()
        );
        let body = json!({"sqlText": sql, "asyncExec": false, "sequenceId": 1});
        let request = self.authorized(self.client.post(url).json(&body), token);

        let envelope: Envelope<ResultData> =
            send(request).map_err(|error| ConnectionError::query(&self.target, error))?;
        let mut data = match envelope {
            Envelope {
                success: true,
                data: Some(data),
                ..
            } => data,
            Envelope { message, .. } => {
                return Err(ConnectionError::query(
                    &self.target,
                    message.unwrap_or_else(|| "query rejected".to_string()),
                ));
            }
        };

        if !data.chunks.is_empty() {
            let headers = chunk_headers(&data)
                .map_err(|error| ConnectionError::query(&self.target, error))?;
            for chunk in &data.chunks {
                let rows = self
                    .fetch_chunk(chunk, &headers)
                    .map_err(|error| ConnectionError::query(&self.target, error))?;
                data.rowset.extend(rows);
            }
        }

        Ok(rows_from_result(data))
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };
        let url = format!("{}/session?delete=true", self.base_url);
        let request = self.authorized(self.client.post(url), &token);
        send::<Value>(request)
            .map(|_| ())
            .map_err(|error| ConnectionError::query(&self.target, error))
    }
}

/// Chunks are fetched with the headers the result names, or with the
/// server-side encryption key when only `qrmk` is given.
fn chunk_headers(data: &ResultData) -> Result<HeaderMap, String> {
    let mut pairs = data
        .chunk_headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect::<Vec<_>>();
    if let (true, Some(key)) = (pairs.is_empty(), data.qrmk.as_deref()) {
        pairs.push((
            "x-amz-server-side-encryption-customer-algorithm".to_string(),
            "AES256".to_string(),
        ));
        pairs.push((
            "x-amz-server-side-encryption-customer-key".to_string(),
            key.to_string(),
        ));
    }

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|error| format!("invalid chunk header {name}: {error}"))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|error| format!("invalid chunk header value: {error}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// A chunk body is a comma-separated run of row arrays without the
/// enclosing brackets.
fn parse_chunk(body: &str) -> Result<Vec<Vec<Option<String>>>, String> {
    let rows = body.trim().trim_end_matches(',');
    serde_json::from_str(&format!("[{rows}]"))
        .map_err(|error| format!("snowflake chunk is not valid JSON: {error}"))
}

fn rows_from_result(data: ResultData) -> QueryRows {
    let columns = data
        .rowtype
        .iter()
        .map(|column| column.name.clone())
        .collect::<Vec<_>>();

    let rows = data
        .rowset
        .into_iter()
        .map(|cells| {
            data.rowtype
                .iter()
                .zip(cells)
                .map(|(column, cell)| (column.name.clone(), decode_cell(&column.kind, cell)))
                .collect::<Record>()
        })
        .collect();

    QueryRows { columns, rows }
}

/// Rowset cells arrive as strings; the column's declared type decides how
/// they become JSON.
fn decode_cell(kind: &str, cell: Option<String>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    match kind.to_ascii_lowercase().as_str() {
        "fixed" => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<f64>().map(Value::from))
            .unwrap_or(Value::String(text)),
        "real" => text
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "boolean" => match text.as_str() {
            "1" | "true" | "TRUE" => Value::Bool(true),
            "0" | "false" | "FALSE" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}
