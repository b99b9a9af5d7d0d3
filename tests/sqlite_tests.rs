use chrono::{TimeZone, Utc};
use hdb_credentials::types::{
    ChangePassword, DeleteUserRequest, InitializeRequest, NewUserRequest, Statements,
    UpdateUserRequest, UsernameConfig,
};
use hdb_credentials::{Hana, HdbError, RequestContext};
use serde_json::{Value, json};
use sqlx::{Row, SqlitePool};
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

const INSERT_ACCOUNT: &str =
    "INSERT INTO accounts (name, password, valid_until) VALUES ('{{name}}', '{{password}}', '{{expiration}}')";

struct TempDb {
    path: PathBuf,
    url: String,
}

impl TempDb {
    async fn new(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();

        let mut path = std::env::temp_dir();
        path.push(format!(
            "hdb-credentials-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));
        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePool::connect(&url).await.expect("open sqlite");
        sqlx::query(
            "CREATE TABLE accounts (name TEXT PRIMARY KEY, password TEXT NOT NULL, valid_until TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .expect("create table");
        pool.close().await;

        Self { path, url }
    }

    async fn rows(&self) -> Vec<(String, String, String)> {
        let pool = SqlitePool::connect(&self.url).await.expect("open sqlite");
        let rows = sqlx::query("SELECT name, password, valid_until FROM accounts ORDER BY name")
            .fetch_all(&pool)
            .await
            .expect("select accounts")
            .into_iter()
            .map(|row| (row.get(0), row.get(1), row.get(2)))
            .collect();
        pool.close().await;
        rows
    }

    async fn plugin(&self) -> Hana {
        let config = match json!({ "connection_url": self.url }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let plugin = Hana::new();
        plugin
            .initialize(
                &RequestContext::background(),
                InitializeRequest {
                    config,
                    verify_connection: true,
                },
            )
            .await
            .expect("initialize");
        plugin
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn new_user(password: &str, commands: &[&str]) -> NewUserRequest {
    NewUserRequest {
        username_config: UsernameConfig {
            display_name: "app".to_string(),
            role_name: "reader".to_string(),
        },
        statements: Statements::new(commands.iter().copied()),
        password: password.to_string(),
        expiration: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
    }
}

#[tokio::test]
async fn create_stores_quoted_values_verbatim() {
    let db = TempDb::new("create").await;
    let plugin = db.plugin().await;

    let resp = plugin
        .new_user(
            &RequestContext::background(),
            new_user(r#"o'brien-"q""#, &[INSERT_ACCOUNT]),
        )
        .await
        .expect("create");

    assert_eq!(
        db.rows().await,
        vec![(
            resp.username,
            r#"o'brien_"q""#.to_string(),
            "2030-01-02 03:04:05".to_string()
        )]
    );
    plugin.close().await;
}

#[tokio::test]
async fn failing_statement_leaves_no_rows() {
    let db = TempDb::new("rollback").await;
    let plugin = db.plugin().await;

    let err = plugin
        .new_user(
            &RequestContext::background(),
            new_user("pw", &[INSERT_ACCOUNT, "INSERT INTO missing_table VALUES ('{{name}}')"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HdbError::Execution(_)));
    assert!(db.rows().await.is_empty());
    plugin.close().await;
}

#[tokio::test]
async fn rotate_and_revoke_with_caller_statements() {
    let db = TempDb::new("rotate").await;
    let plugin = db.plugin().await;
    let ctx = RequestContext::background();

    let username = plugin
        .new_user(&ctx, new_user("first", &[INSERT_ACCOUNT]))
        .await
        .expect("create")
        .username;

    plugin
        .update_user(
            &ctx,
            UpdateUserRequest {
                username: username.clone(),
                password: Some(ChangePassword {
                    new_password: "second".to_string(),
                    statements: Statements::new([
                        "UPDATE accounts SET password = '{{password}}' WHERE name = '{{username}}'",
                    ]),
                }),
                expiration: None,
            },
        )
        .await
        .expect("update");
    let rows = db.rows().await;
    assert_eq!(rows[0].1, "second");

    plugin
        .delete_user(
            &ctx,
            DeleteUserRequest {
                username,
                statements: Statements::new(["DELETE FROM accounts WHERE name = '{{name}}'"]),
            },
        )
        .await
        .expect("delete");
    assert!(db.rows().await.is_empty());
    plugin.close().await;
}

#[tokio::test]
async fn builtin_revocation_failure_keeps_the_account() {
    let db = TempDb::new("soft-drop").await;
    let plugin = db.plugin().await;
    let ctx = RequestContext::background();

    let username = plugin
        .new_user(&ctx, new_user("pw", &[INSERT_ACCOUNT]))
        .await
        .expect("create")
        .username;

    // SQLite has no ALTER USER, so the soft drop fails on its first step.
    let err = plugin
        .delete_user(
            &ctx,
            DeleteUserRequest {
                username,
                statements: Statements::default(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HdbError::Execution(_)));
    assert_eq!(db.rows().await.len(), 1);
    plugin.close().await;
}
