use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use helios_leadbot::config::BotConfig;
use helios_leadbot::error::FlowError;
use helios_leadbot::flow::{ConversationSession, SessionDeps};
use helios_leadbot::lead::{JsonFileStore, MemoryStore, SessionStore};
use helios_leadbot::routes::{ChatState, chat_routes, spawn_session_sweeper};
use helios_leadbot::surface::TerminalSurface;

/// How often the chat API drops stale conversations.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    let deps = SessionDeps::helios(config.clone()).context("Invalid dialog script")?;

    eprintln!("🤖 Helios lead bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: {}", config.webhook_url);

    // ── HTTP chat API ────────────────────────────────────────────────────
    if let Some(port) = config.http_port {
        let state = ChatState::new(deps.clone());
        spawn_session_sweeper(state.clone(), SESSION_SWEEP_INTERVAL);
        let app = chat_routes(state);
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("Failed to bind chat API port {port}"))?;
        eprintln!("   Chat API: http://0.0.0.0:{port}/api/chat");
        tokio::spawn(async move {
            tracing::info!(port, "Chat API server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Chat API server stopped");
            }
        });
    }

    eprintln!("   Type a reply or an option number. /reset to start over, /quit to exit.\n");

    // ── Terminal conversation ────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = match &config.session_store_path {
        Some(path) => Arc::new(JsonFileStore::new(path.clone())),
        None => Arc::new(MemoryStore::new()),
    };
    let mut session = ConversationSession::resume_or_create(deps, TerminalSurface::new(), store)
        .context("Failed to load session id")?;
    tracing::info!(session_id = %session.session_id(), "Terminal session ready");

    session.start().await?;
    run_repl(&mut session).await
}

/// Logs go to a daily file under `HELIOS_LOG_DIR` when set, otherwise to
/// stderr at `warn` so they stay out of the conversation.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    match std::env::var("HELIOS_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "helios-leadbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter("warn"))
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

async fn run_repl(session: &mut ConversationSession<TerminalSurface>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        session.settle().await?;
        if session.is_ended() {
            eprintln!("   (/reset para comenzar de nuevo, /quit para salir)");
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        let result = match input {
            "" => continue,
            "/quit" => break,
            "/reset" => session.reset().await,
            _ => match pick_option(session, input) {
                Some(value) => session.choose(&value).await,
                None => session.submit_free_text(input).await,
            },
        };

        match result {
            // Rejected turns already showed their notice.
            Ok(()) | Err(FlowError::InvalidTurn { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    eprintln!("👋 Goodbye!");
    Ok(())
}

/// Map "2" (1-based) or an option value like "A" to a visible option.
fn pick_option(session: &ConversationSession<TerminalSurface>, input: &str) -> Option<String> {
    let options = session.visible_options();
    if let Ok(n) = input.parse::<usize>() {
        return options.get(n.checked_sub(1)?).map(|o| o.value.clone());
    }
    options
        .iter()
        .find(|o| o.value.eq_ignore_ascii_case(input))
        .map(|o| o.value.clone())
}
