use std::fmt::{Debug, Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use super::slot::Named;

const REDACTED: &str = "**********";

/// Host used when a server target leaves `host` unset.
pub const DEFAULT_HOST: &str = "localhost";

/// Backend kind declared by a target's `type` field.
///
/// Unknown kinds are kept so the connection layer can reject them with the
/// declared name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BackendKind {
    Sqlite,
    #[default]
    Postgresql,
    Mysql,
    Snowflake,
    Other(String),
}

impl BackendKind {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Snowflake => "snowflake",
            Self::Other(name) => name,
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "sqlite" => Self::Sqlite,
            "postgresql" => Self::Postgresql,
            "mysql" => Self::Mysql,
            "snowflake" => Self::Snowflake,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn known() -> [Self; 4] {
        [Self::Sqlite, Self::Postgresql, Self::Mysql, Self::Snowflake]
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for BackendKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Self::from_key(&key))
    }
}

impl JsonSchema for BackendKind {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "BackendKind".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "examples": ["sqlite", "postgresql", "mysql", "snowflake"]
        })
    }
}

/// A credential that never prints or serializes its value.
#[derive(Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret({REDACTED})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Connection information for one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Target {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: BackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub database: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,

    /// Snowflake only: the account identifier, e.g. `ax28471.us-west-2.aws`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Snowflake only: compute warehouse used for queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_schema: Option<String>,
}

impl Named for Target {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Target {
    /// Fields this target's backend kind needs beyond `database`.
    #[must_use]
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self.kind {
            BackendKind::Snowflake => &["account", "username", "password"],
            _ => &[],
        }
    }

    /// First required field that is unset, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        self.required_fields()
            .iter()
            .copied()
            .find(|field| self.field_value(field).is_none_or(str::is_empty))
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "account" => self.account.as_deref(),
            "username" => self.username.as_deref(),
            "password" => self.password(),
            "warehouse" => self.warehouse.as_deref(),
            "host" => self.host.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(Secret::expose)
    }

    /// Connection URL of the target, with userinfo and path percent-encoded.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        self.render_url(self.password())
    }

    /// Same as [`Target::url`] with the password masked.
    #[must_use]
    pub fn display_url(&self) -> String {
        let masked = self.password.as_ref().map(|_| REDACTED);
        match self.render_url(masked) {
            Ok(url) => url.into(),
            Err(error) => format!("<invalid {} url: {error}>", self.kind),
        }
    }

    fn render_url(&self, password: Option<&str>) -> Result<Url, url::ParseError> {
        if self.kind == BackendKind::Sqlite {
            return Url::parse(&format!("sqlite://{}", self.database));
        }

        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let mut url = Url::parse(&format!("{}://{host}", self.kind))?;
        // Setters only fail on URLs without a host.
        let no_host = |()| url::ParseError::EmptyHost;
        url.set_port(self.port).map_err(no_host)?;
        if let Some(username) = self.username.as_deref() {
            url.set_username(username).map_err(no_host)?;
            url.set_password(password).map_err(no_host)?;
        }
        url.set_path(&format!("/{}", self.database));
        Ok(url)
    }
}
