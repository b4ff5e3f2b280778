use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::slot::Named;
use super::target::Secret;

/// Delivery channel for test-failure notifications, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    Slack(SlackAlert),
    Email(EmailAlert),
    Console(ConsoleAlert),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlackAlert {
    pub name: String,
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailAlert {
    pub name: String,
    pub subject: String,
    pub to: String,

    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsoleAlert {
    pub name: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

const fn default_smtp_port() -> u16 {
    2525
}

impl Named for Alert {
    fn name(&self) -> &str {
        match self {
            Self::Slack(alert) => &alert.name,
            Self::Email(alert) => &alert.name,
            Self::Console(alert) => &alert.name,
        }
    }
}

impl Alert {
    #[must_use]
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Email(_) => "email",
            Self::Console(_) => "console",
        }
    }
}
