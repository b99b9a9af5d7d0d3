use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered set of caller-supplied statement templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Statements {
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Statements {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsernameConfig {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub verify_connection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub config: Map<String, Value>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct NewUserRequest {
    #[serde(default)]
    pub username_config: UsernameConfig,
    #[serde(default)]
    pub statements: Statements,
    pub password: String,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUserResponse {
    pub username: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub new_password: String,
    #[serde(default)]
    pub statements: Statements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeExpiration {
    pub new_expiration: DateTime<Utc>,
    #[serde(default)]
    pub statements: Statements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<ChangePassword>,
    #[serde(default)]
    pub expiration: Option<ChangeExpiration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateUserResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    pub username: String,
    #[serde(default)]
    pub statements: Statements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteUserResponse {}

// Passwords stay out of Debug output.
impl std::fmt::Debug for NewUserRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUserRequest")
            .field("username_config", &self.username_config)
            .field("statements", &self.statements)
            .field("password", &crate::error::REDACTED)
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl std::fmt::Debug for ChangePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePassword")
            .field("new_password", &crate::error::REDACTED)
            .field("statements", &self.statements)
            .finish()
    }
}
