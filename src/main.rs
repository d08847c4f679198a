mod api;
mod config;
mod export;
mod models;
mod tui;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

use api::RosterClient;
use config::Config;
use tui::App;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--init") {
        let path = Config::generate_default()?;
        println!("Generated config file at: {}", path.display());
        println!("Edit it with your roster server URL, then run roster-tui.");
        return Ok(());
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("roster-tui — A terminal admin panel for a student roster");
        println!();
        println!("USAGE:");
        println!("  roster-tui           Start the TUI");
        println!("  roster-tui --init    Generate a default config file");
        println!();
        println!("CONFIG:");
        println!("  File: ~/.config/roster-tui/config.toml");
        println!("  Or set the ROSTER_URL environment variable.");
        println!();
        println!("KEYBINDINGS:");
        println!("  j / k / Up / Down   Navigate the table");
        println!("  a                   Add a student");
        println!("  e / Enter           Edit the selected student");
        println!("  d / D               Delete selected / delete all");
        println!("  u                   Import a CSV (with preview)");
        println!("  /                   Search (blank shows everything)");
        println!("  x                   Export the roster as HTML");
        println!("  r                   Refresh");
        println!("  q / Ctrl+C          Quit");
        return Ok(());
    }

    init_tracing();

    let config = Config::load().with_context(|| {
        "Failed to load configuration.\n\
         Run `roster-tui --init` to generate a config file,\n\
         or set the ROSTER_URL environment variable."
    })?;

    let client = RosterClient::new(&config.server_url)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, client).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
    }

    Ok(())
}

/// Log to a file under the cache dir so the alternate screen stays clean.
/// Level comes from RUST_LOG; the default is quiet.
fn init_tracing() {
    let Some(dir) = dirs::cache_dir().map(|d| d.join("roster-tui")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(dir.join("roster-tui.log")) else {
        return;
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    client: RosterClient,
) -> Result<()> {
    let mut app = App::new(client);

    app.start_fetch(None);
    terminal.draw(|f| tui::ui::render(f, &mut app))?;

    loop {
        app.frame_count = app.frame_count.wrapping_add(1);
        terminal.draw(|f| tui::ui::render(f, &mut app))?;

        if let Some(event) = tui::event::poll_event(Duration::from_millis(100))? {
            if let Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) = event
            {
                tui::event::handle_key(&mut app, code, modifiers);
            }
        }

        if !app.running {
            break;
        }

        // Apply completed background work without blocking the event loop.
        app.poll_fetch_result();
        app.poll_edit_result();
        app.poll_preview_result();
        app.poll_action_result();

        // Every mutation round-trips to the server and then reloads the
        // full list. The reload stays queued while a fetch is in flight.
        app.flush_refresh();
    }

    Ok(())
}
