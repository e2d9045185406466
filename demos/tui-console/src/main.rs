//! Agent console in the terminal, driven by the simulated agent.
//!
//! Run with: cargo run -p tui-console-demo [config.toml]

use std::{io, sync::Arc, time::Duration};

use agent_console_core::ConsoleConfig;
use agent_console_session::{Console, ConsoleHandle};
use agent_console_transport::{
    EventBus, SimulatedBackend,
    tui::{KeyAction, key_action, render_console},
};
use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ConsoleConfig::load(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => ConsoleConfig::default(),
    }
    .apply_env_overrides();

    let bus = Arc::new(EventBus::new());
    let backend = Arc::new(SimulatedBackend::new(Arc::clone(&bus), &config.channel));
    let console = Console::start(&config, backend, bus.as_ref())
        .context("Failed to subscribe to the agent log channel")?;
    bus.emit(&config.channel, "INIT", "🚀 Agent console ready");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run_app(&mut terminal, &console).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    console.shutdown();
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    console: &ConsoleHandle,
) -> anyhow::Result<()> {
    let timeline = console.timeline();
    let mut scroll_back: u16 = 0;

    loop {
        let view = console.current();
        let records = timeline.snapshot();
        terminal.draw(|f| render_console(f, &view, &records, scroll_back))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key_action(&key, &view.input, view.state.is_processing()) {
            Some(KeyAction::Edit(text)) => {
                console.set_input(text)?;
                // Next key press must see this edit.
                console.flush().await?;
            }
            Some(KeyAction::Submit) => {
                scroll_back = 0;
                console.submit_input()?;
                console.flush().await?;
            }
            Some(KeyAction::ScrollUp) => scroll_back = scroll_back.saturating_add(1),
            Some(KeyAction::ScrollDown) => scroll_back = scroll_back.saturating_sub(1),
            Some(KeyAction::Quit) => return Ok(()),
            None => {}
        }
    }
}
