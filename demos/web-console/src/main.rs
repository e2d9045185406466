//! Agent console served over a WebSocket, driven by the simulated agent.
//!
//! Run with: cargo run -p web-console-demo [config.toml]
//!
//! Then open http://localhost:8080 in your browser.

use std::{net::SocketAddr, sync::Arc};

use agent_console_core::ConsoleConfig;
use agent_console_session::Console;
use agent_console_transport::{EventBus, SimulatedBackend, websocket::create_router};
use anyhow::Context;
use axum::{response::Html, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ConsoleConfig::load(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => ConsoleConfig::default(),
    }
    .apply_env_overrides();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let bus = Arc::new(EventBus::new());
    let backend = Arc::new(SimulatedBackend::new(Arc::clone(&bus), &config.channel));
    let console = Console::start(&config, backend, bus.as_ref())
        .context("Failed to subscribe to the agent log channel")?;

    bus.emit(&config.channel, "INIT", "🚀 Initializing agent console...");
    bus.emit(&config.channel, "INIT", "✓ Simulated agent ready");

    let app = create_router(console.clone()).route("/", get(index_handler));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    bus.emit(&config.channel, "SHUTDOWN", "👋 Shutting down agent console");
    console.shutdown();
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Agent Console</title>
    <style>
        body { margin: 0; font-family: system-ui, sans-serif; background: #0f1117; color: #e6e6e6; }
        #app { display: flex; height: 100vh; }
        #chat { flex: 45; display: flex; flex-direction: column; border-right: 1px solid #2a2d36; }
        #transcript { flex: 1; overflow-y: auto; padding: 16px; }
        .user { color: #f5c542; }
        .assistant { color: #6ee7a8; }
        #form { display: flex; padding: 8px; gap: 8px; }
        #goal { flex: 1; padding: 8px; background: #1a1d26; color: inherit; border: 1px solid #2a2d36; }
        #diagnostic { color: #ff6b6b; padding: 0 16px 8px; min-height: 1em; }
        #mission { flex: 55; overflow-y: auto; padding: 16px; font-family: monospace; }
        .log-navigate { color: #4fd1e8; }
        .log-click { color: #d67ee8; }
        .log-type { color: #7ea8ff; }
        .log-highlight { color: #f5c542; }
        .log-snapshot { color: #5b8def; }
        .log-planning { color: #e88ed6; }
        .log-init { color: #9aa0a6; }
        .log-user { color: #ffffff; }
        .log-error { color: #ff6b6b; }
        .log-complete { color: #6ee7a8; }
        .log-shutdown { color: #666a73; }
        .ts { color: #666a73; }
    </style>
</head>
<body>
    <div id="app">
        <div id="chat">
            <div id="transcript">
                <p><b>Welcome</b><br>Try asking: "Navigate to google.com", "Search for AI news"</p>
            </div>
            <div id="diagnostic"></div>
            <form id="form">
                <input id="goal" placeholder="Enter a command..." autocomplete="off">
                <button id="send" type="submit">→</button>
            </form>
        </div>
        <div id="mission"><p id="empty">Awaiting agent activity...</p></div>
    </div>
    <script>
        const transcript = document.getElementById('transcript');
        const mission = document.getElementById('mission');
        const goal = document.getElementById('goal');
        const send = document.getElementById('send');
        const diagnostic = document.getElementById('diagnostic');
        const ws = new WebSocket(`ws://${location.host}/ws/chat`);

        ws.onmessage = (event) => {
            const msg = JSON.parse(event.data);
            switch (msg.type) {
                case 'log': {
                    document.getElementById('empty')?.remove();
                    const line = document.createElement('div');
                    line.className = 'log-' + msg.category;
                    const ts = document.createElement('span');
                    ts.className = 'ts';
                    ts.textContent = `[${msg.timestamp}]`;
                    line.append(ts, ` [${msg.level}] `, msg.message);
                    mission.append(line);
                    mission.scrollTop = mission.scrollHeight;
                    break;
                }
                case 'transcript': {
                    const entry = document.createElement('p');
                    entry.className = msg.role;
                    entry.textContent = msg.content;
                    transcript.append(entry);
                    transcript.scrollTop = transcript.scrollHeight;
                    break;
                }
                case 'state':
                    goal.disabled = msg.processing;
                    send.textContent = msg.processing ? '⟳' : '→';
                    if (msg.processing) diagnostic.textContent = '';
                    break;
                case 'error':
                    diagnostic.textContent = msg.message;
                    break;
            }
        };

        document.getElementById('form').onsubmit = (event) => {
            event.preventDefault();
            if (!goal.value.trim()) return;
            ws.send(JSON.stringify({ type: 'goal', goal: goal.value }));
            goal.value = '';
        };
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_inserts_backend_text_as_text_nodes() {
        assert!(!INDEX_HTML.contains("innerHTML"));
        assert!(INDEX_HTML.contains("line.append(ts, ` [${msg.level}] `, msg.message)"));
    }
}
