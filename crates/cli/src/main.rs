//! Replica assistant console
//!
//! Reads one query per line from stdin and prints the answer as JSON.
//! Lines starting with `{` are parsed as a full `ChatRequest`. Lines
//! starting with `:` are commands (`:status`, `:stats`, `:clear`,
//! `:reload`, `:provider <name>`, `:quit`).

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use replica_agent::{quota_key, AssistantContext, ChatOutcome, ChatRequest, ChatService};
use replica_config::{load_settings, Settings};

struct Identity {
    user_id: Option<String>,
    session_id: String,
}

impl Identity {
    /// `--user <id>` and `--session <id>`; the session defaults to a fresh id
    fn from_args() -> Self {
        let mut user_id = None;
        let mut session_id = None;
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--user" => user_id = args.next(),
                "--session" => session_id = args.next(),
                other => eprintln!("Ignoring unknown argument: {}", other),
            }
        }
        Self {
            user_id,
            session_id: session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        }
    }

    fn request(&self, line: &str) -> anyhow::Result<ChatRequest> {
        let mut request = if line.starts_with('{') {
            serde_json::from_str::<ChatRequest>(line).context("invalid request JSON")?
        } else {
            ChatRequest::new(line)
        };
        if request.user_id.is_none() {
            request.user_id = self.user_id.clone();
        }
        if request.session_id.is_none() {
            request.session_id = Some(self.session_id.clone());
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to read .env: {}", e);
        }
    }

    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("REPLICA_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };
    settings.validate().context("invalid configuration")?;

    init_tracing(&settings);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = env.as_deref().unwrap_or("default"),
        "Starting replica assistant"
    );

    let ctx = Arc::new(AssistantContext::from_settings(&settings).await?);
    let service = ChatService::new(ctx.clone());
    let identity = Identity::from_args();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            let mut parts = command.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("quit"), _) | (Some("exit"), _) => break,
                (Some("status"), _) => {
                    let status = serde_json::json!({
                        "providers": ctx.manager.status(),
                        "routing": ctx.router.stats(),
                    });
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                (Some("stats"), _) => {
                    let stats = serde_json::json!({
                        "cache": service.cache_stats().await,
                        "metrics": service.metrics(),
                    });
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                (Some("clear"), _) => service.clear_cache().await,
                (Some("reload"), _) => ctx.manager.reinitialize(),
                (Some("provider"), Some(name)) => {
                    let session = Some(identity.session_id.as_str());
                    let user_key = quota_key(identity.user_id.as_deref(), session);
                    match ctx
                        .router
                        .force_provider_for_user(&user_key, name, session)
                        .await
                    {
                        Ok(()) => eprintln!("Pinned to {}", name),
                        Err(e) => eprintln!("{}", e),
                    }
                }
                _ => eprintln!("Unknown command: {}", line),
            }
            continue;
        }

        let request = match identity.request(line) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("{:#}", e);
                continue;
            }
        };

        match service.process(&request).await {
            Ok(ChatOutcome::Answered(response)) => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            Ok(outcome @ ChatOutcome::QuotaExceeded { .. }) => {
                let body = serde_json::json!({
                    "error": "Query limit reached",
                    "detail": outcome.message(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}

/// Console tracing on stderr so stdout stays machine-readable
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("replica={}", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}
