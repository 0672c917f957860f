mod config;
mod dataset;
mod ipc;
mod store;
mod suggest;

use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MISSING_KEY_NOTICE: &str = "Gemini API key is missing. Please set the GEMINI_API_KEY environment variable or secret.";

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

// stdout carries the protocol, so logs go to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("PTMD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if env_bool("PTMD_LOG_JSON", false) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn build_state() -> ipc::AppState {
    let mut notices = Vec::new();
    let (cfg, problems) = config::Config::from_env();
    for e in problems {
        tracing::warn!(error = %e, "configuration value ignored");
        notices.push(format!("Configuration error: {e}"));
    }

    let generator: Option<Box<dyn suggest::TextGenerator>> = match cfg.api_key.clone() {
        Some(key) => match suggest::GeminiClient::new(&cfg, key) {
            Ok(client) => Some(Box::new(client)),
            Err(e) => {
                tracing::error!(error = %e, "could not build text-generation client");
                notices.push(format!("Suggestions unavailable: {e}"));
                None
            }
        },
        None => {
            tracing::warn!("no API key configured, suggestions disabled");
            notices.push(MISSING_KEY_NOTICE.to_string());
            None
        }
    };

    tracing::info!(
        data_file = %cfg.data_file.display(),
        model = %cfg.model,
        timeout_secs = cfg.timeout.as_secs(),
        "ptmd starting"
    );
    let mut state = ipc::AppState::new(cfg, generator);
    state.notices = notices;
    state
}

fn main() {
    init_tracing();
    let mut state = build_state();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
}
