use hdb_credentials::config::Config;
use hdb_credentials::types::{DeleteUserRequest, InitializeRequest, NewUserRequest, UpdateUserRequest};
use hdb_credentials::{Hana, HdbError, RequestContext};
use mimalloc::MiMalloc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// One JSON line on stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum HostRequest {
    NewUser(NewUserRequest),
    UpdateUser(UpdateUserRequest),
    DeleteUser(DeleteUserRequest),
    Type,
}

/// One JSON line on stdout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum HostResponse {
    Ok(Value),
    Error { kind: &'static str, message: String },
}

impl<T: Serialize> From<Result<T, HdbError>> for HostResponse {
    fn from(res: Result<T, HdbError>) -> Self {
        match res.and_then(|v| serde_json::to_value(v).map_err(HdbError::execution)) {
            Ok(v) => HostResponse::Ok(v),
            Err(e) => HostResponse::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        url = %cfg.connection.redacted_url(),
        verify_connection = cfg.verify_connection,
        request_timeout_secs = cfg.request_timeout_secs,
        loglevel = %cfg.loglevel
    );

    let plugin = Hana::new();
    plugin
        .initialize(
            &RequestContext::background().with_timeout(cfg.request_timeout()),
            InitializeRequest {
                config: cfg.connection.to_map()?,
                verify_connection: cfg.verify_connection,
            },
        )
        .await?;
    info!(plugin_type = plugin.type_name(), "plugin initialized; reading requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handle(&plugin, cfg.request_timeout(), &line).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    plugin.close().await;
    Ok(())
}

async fn handle(plugin: &Hana, timeout: Duration, line: &str) -> HostResponse {
    let request: HostRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            // Only the position: the payload may contain a password.
            warn!(line = e.line(), column = e.column(), "malformed request");
            return HostResponse::Error {
                kind: "request",
                message: format!(
                    "malformed request at line {} column {}",
                    e.line(),
                    e.column()
                ),
            };
        }
    };

    let ctx = RequestContext::background().with_timeout(timeout);
    match request {
        HostRequest::NewUser(req) => plugin.new_user(&ctx, req).await.into(),
        HostRequest::UpdateUser(req) => plugin.update_user(&ctx, req).await.into(),
        HostRequest::DeleteUser(req) => plugin.delete_user(&ctx, req).await.into(),
        HostRequest::Type => HostResponse::Ok(json!({ "type": plugin.type_name() })),
    }
}
