mod color;
mod data;
mod map_draw;
mod search;
mod state;
mod stats;
mod ui;
mod viewport;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use data::DatasetKind;
use ratatui::{Terminal, backend::CrosstermBackend};
use state::AppState;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Terminal choropleth atlas for barangay-level election results.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// GeoJSON feature collection with per-barangay vote properties
    #[arg(short, long, value_name = "FILE", default_value = "data/barangays.geojson")]
    data: PathBuf,

    /// Candidate list (JSON array, file order is display order)
    #[arg(short, long, value_name = "FILE", default_value = "data/candidates.json")]
    candidates: PathBuf,

    /// Vote table to open with
    #[arg(long, value_enum, default_value = "senate")]
    dataset: DatasetKind,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut state = AppState::new(cli.data, cli.candidates, cli.dataset)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut state);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, state: &mut AppState) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, state))?;

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => {
                    if state.handle_key(code) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => state.handle_mouse(mouse),
                _ => {}
            }
        }
    }
}
