//! Create / rotate / revoke of database accounts.
//!
//! [`Hana`] is the surface handed to the host. All three lifecycle
//! operations hold the connection guard for their whole duration and run
//! their statements in a single transaction.

use crate::config::ConnectionConfig;
use crate::db::provider::{ConnectionProvider, SqlConnection};
use crate::db::schema::{
    DEACTIVATE_USER, DEFAULT_EXPIRATION_CHANGE, DEFAULT_PASSWORD_CHANGE, DROP_USER_RESTRICT,
};
use crate::db::sqlx_any::SqlxProvider;
use crate::db::template::{StatementSource, Substitutions, escaped_forms};
use crate::db::transaction::Transaction;
use crate::error::{HdbError, REDACTED};
use crate::service::connection_guard::{ConnectionGuard, Lease};
use crate::service::context::RequestContext;
use crate::service::username::{UsernameGenerator, normalize_password, normalize_username};
use crate::types::{
    ChangeExpiration, ChangePassword, DeleteUserRequest, DeleteUserResponse, InitializeRequest,
    InitializeResponse, NewUserRequest, NewUserResponse, UpdateUserRequest, UpdateUserResponse,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::form_urlencoded;

pub const TYPE_NAME: &str = "hdb";

/// HANA's literal format for `VALID UNTIL`.
const EXPIRATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEFAULT_REVOCATION: &[&str] = &[DEACTIVATE_USER, DROP_USER_RESTRICT];

/// Progress of the built-in soft drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStage {
    Active,
    Deactivated,
    Dropped,
}

pub struct Hana<P: ConnectionProvider = SqlxProvider> {
    guard: ConnectionGuard<P>,
    usernames: UsernameGenerator,
    secrets: RwLock<Vec<String>>,
}

impl Hana<SqlxProvider> {
    pub fn new() -> Self {
        Self::with_provider(SqlxProvider)
    }
}

impl Default for Hana<SqlxProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ConnectionProvider> Hana<P> {
    pub fn with_provider(provider: P) -> Self {
        Self {
            guard: ConnectionGuard::new(provider),
            usernames: UsernameGenerator::hana(),
            secrets: RwLock::new(Vec::new()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    /// Configured secret values mapped to their replacement text, for log scrubbing.
    pub fn secret_values(&self) -> HashMap<String, String> {
        self.config_secrets()
            .into_iter()
            .map(|secret| (secret, REDACTED.to_string()))
            .collect()
    }

    fn config_secrets(&self) -> Vec<String> {
        match self.secrets.read() {
            Ok(secrets) => secrets.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Configured secrets plus `extra`, each also in the escaped forms it
    /// takes inside rendered statements. Call with the guard held so a
    /// concurrent `initialize` cannot swap the admin password underneath.
    fn secrets_with(&self, extra: &[&str]) -> Vec<String> {
        let mut secrets = self.config_secrets();
        for secret in extra.iter().filter(|s| !s.is_empty()) {
            secrets.push(secret.to_string());
            secrets.extend(escaped_forms(secret));
        }
        secrets
    }

    /// Validate and store the connection config, optionally verifying it.
    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        req: InitializeRequest,
    ) -> Result<InitializeResponse, HdbError> {
        let raw_password = req
            .config
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let encoded: String = form_urlencoded::byte_serialize(raw_password.as_bytes()).collect();

        ctx.run(async {
            let secrets = self.secrets_with(&[raw_password.as_str(), encoded.as_str()]);
            self.reconfigure(req).await.map_err(|e| e.redact(&secrets))
        })
        .await
        .inspect_err(|e| warn!(error = %e, "initialize failed"))
    }

    async fn reconfigure(&self, req: InitializeRequest) -> Result<InitializeResponse, HdbError> {
        let config = ConnectionConfig::from_map(req.config)?.normalize()?;
        let response = InitializeResponse {
            config: config.to_map()?,
        };

        let mut lease = self.guard.lock().await;
        lease.reconfigure(config.clone()).await;
        match self.secrets.write() {
            Ok(mut secrets) => *secrets = config.secrets(),
            Err(poisoned) => *poisoned.into_inner() = config.secrets(),
        }

        if req.verify_connection {
            lease.verify().await.map_err(|e| match e {
                HdbError::Connection(msg) => {
                    HdbError::Connection(format!("error verifying connection: {msg}"))
                }
                other => other,
            })?;
        }

        info!(
            url = %config.redacted_url(),
            verified = req.verify_connection,
            "connection configured"
        );
        Ok(response)
    }

    /// Generate a username and create the account with the caller's statements.
    #[instrument(skip_all, fields(
        display_name = %req.username_config.display_name,
        role_name = %req.username_config.role_name
    ))]
    pub async fn new_user(
        &self,
        ctx: &RequestContext,
        req: NewUserRequest,
    ) -> Result<NewUserResponse, HdbError> {
        let password = normalize_password(&req.password);

        ctx.run(async {
            let mut lease = self.guard.lock().await;
            let secrets = self.secrets_with(&[req.password.as_str(), password.as_str()]);
            self.create(&mut lease, &req, &password)
                .await
                .map_err(|e| e.redact(&secrets))
        })
        .await
        .inspect_err(|e| warn!(error = %e, "create user failed"))
    }

    async fn create(
        &self,
        lease: &mut Lease<'_, P>,
        req: &NewUserRequest,
        password: &str,
    ) -> Result<NewUserResponse, HdbError> {
        if req.statements.is_empty() {
            return Err(HdbError::Configuration(
                "empty creation statements".to_string(),
            ));
        }

        let generated = self.usernames.generate(
            &req.username_config.display_name,
            &req.username_config.role_name,
        )?;
        let username = normalize_username(&generated);
        let expiration = format_expiration(req.expiration);

        let statements = StatementSource::Caller(&req.statements.commands)
            .render(&Substitutions::create(&username, password, &expiration))?;

        let conn = lease.connection().await?;
        execute_atomically(conn, &statements).await?;

        info!(
            username = %username,
            statements = statements.len(),
            "user created"
        );
        Ok(NewUserResponse { username })
    }

    /// Rotate password and/or expiration in one transaction.
    #[instrument(skip_all, fields(username = %req.username))]
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        req: UpdateUserRequest,
    ) -> Result<UpdateUserResponse, HdbError> {
        let new_password = req
            .password
            .as_ref()
            .map(|p| p.new_password.as_str())
            .unwrap_or_default();

        ctx.run(async {
            let mut lease = self.guard.lock().await;
            let secrets = self.secrets_with(&[new_password]);
            self.update(&mut lease, &req)
                .await
                .map_err(|e| e.redact(&secrets))
        })
        .await
        .inspect_err(|e| warn!(error = %e, "update user failed"))
    }

    async fn update(
        &self,
        lease: &mut Lease<'_, P>,
        req: &UpdateUserRequest,
    ) -> Result<UpdateUserResponse, HdbError> {
        if req.password.is_none() && req.expiration.is_none() {
            debug!("no change requested");
            return Ok(UpdateUserResponse {});
        }

        let mut statements = Vec::new();
        if let Some(change) = req.password.as_ref() {
            statements.extend(password_statements(&req.username, change)?);
        }
        if let Some(change) = req.expiration.as_ref() {
            statements.extend(expiration_statements(&req.username, change)?);
        }

        let conn = lease.connection().await?;
        execute_atomically(conn, &statements).await?;

        info!(
            password = req.password.is_some(),
            expiration = req.expiration.is_some(),
            statements = statements.len(),
            "user updated"
        );
        Ok(UpdateUserResponse {})
    }

    /// Revoke with the caller's statements, or soft drop when none are given.
    #[instrument(skip_all, fields(username = %req.username))]
    pub async fn delete_user(
        &self,
        ctx: &RequestContext,
        req: DeleteUserRequest,
    ) -> Result<DeleteUserResponse, HdbError> {
        ctx.run(async {
            let mut lease = self.guard.lock().await;
            let secrets = self.config_secrets();
            self.delete(&mut lease, &req)
                .await
                .map_err(|e| e.redact(&secrets))
        })
        .await
        .inspect_err(|e| warn!(error = %e, "delete user failed"))
    }

    async fn delete(
        &self,
        lease: &mut Lease<'_, P>,
        req: &DeleteUserRequest,
    ) -> Result<DeleteUserResponse, HdbError> {
        if req.username.is_empty() {
            return Err(HdbError::Validation("must provide username".to_string()));
        }

        let source = StatementSource::resolve(&req.statements.commands, DEFAULT_REVOCATION);
        let statements = source.render(&Substitutions::revocation(&req.username))?;

        let conn = lease.connection().await?;
        let mut tx = Transaction::begin(conn).await?;
        let outcome = if source.is_builtin() {
            soft_drop(&mut tx, &statements).await
        } else {
            tx.execute_all(&statements).await
        };
        finish(tx, outcome).await?;

        info!(default = source.is_builtin(), "user revoked");
        Ok(DeleteUserResponse {})
    }

    /// Close the connection; the next operation reopens it from the stored config.
    pub async fn close(&self) {
        self.guard.lock().await.close().await;
    }
}

fn format_expiration(at: DateTime<Utc>) -> String {
    at.format(EXPIRATION_FORMAT).to_string()
}

fn password_statements(username: &str, change: &ChangePassword) -> Result<Vec<String>, HdbError> {
    if username.is_empty() || change.new_password.is_empty() {
        return Err(HdbError::Validation(
            "must provide both username and password".to_string(),
        ));
    }
    StatementSource::resolve(&change.statements.commands, DEFAULT_PASSWORD_CHANGE)
        .render(&Substitutions::password_change(username, &change.new_password))
}

fn expiration_statements(
    username: &str,
    change: &ChangeExpiration,
) -> Result<Vec<String>, HdbError> {
    let expiration = format_expiration(change.new_expiration);
    if username.is_empty() || expiration.is_empty() {
        return Err(HdbError::Validation(
            "must provide both username and expiration".to_string(),
        ));
    }
    StatementSource::resolve(&change.statements.commands, DEFAULT_EXPIRATION_CHANGE)
        .render(&Substitutions::expiration_change(username, &expiration))
}

/// Deactivate, then drop with `RESTRICT`. A failed drop undoes the deactivation.
async fn soft_drop(tx: &mut Transaction, statements: &[String]) -> Result<(), HdbError> {
    let mut stage = RevocationStage::Active;
    for (sql, next) in statements
        .iter()
        .zip([RevocationStage::Deactivated, RevocationStage::Dropped])
    {
        if let Err(e) = tx.execute(sql).await {
            warn!(stage = ?stage, "soft drop failed; rolling back");
            return Err(e);
        }
        stage = next;
        debug!(stage = ?stage, "soft drop advanced");
    }
    Ok(())
}

async fn execute_atomically<C: SqlConnection + ?Sized>(
    conn: &C,
    statements: &[String],
) -> Result<(), HdbError> {
    let mut tx = Transaction::begin(conn).await?;
    let outcome = tx.execute_all(statements).await;
    finish(tx, outcome).await
}

async fn finish(tx: Transaction, outcome: Result<(), HdbError>) -> Result<(), HdbError> {
    match outcome {
        Ok(()) => tx.commit().await,
        Err(e) => {
            tx.rollback().await;
            Err(e)
        }
    }
}
