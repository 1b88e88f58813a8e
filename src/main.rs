use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::EnableMouseCapture,
    execute,
    terminal::{EnterAlternateScreen, enable_raw_mode},
};
use log::{LevelFilter, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, WriteLogger};

use lexiread::app::{App, run_app_with_event_source};
use lexiread::document_store::HttpDocumentStore;
use lexiread::event_source::TerminalEventSource;
use lexiread::panic_handler::{initialize_panic_handler, restore_terminal};
use lexiread::settings::Settings;
use lexiread::theme::{self, ThemeId};
use lexiread::vocab_store::HttpVocabStore;

#[derive(Parser)]
#[command(
    name = "lexiread",
    about = "Terminal reader with inline vocabulary highlighting",
    version
)]
struct Cli {
    /// Reading server base URL; overrides the configured one.
    #[arg(long)]
    server: Option<String>,

    /// Open this document id immediately instead of starting on the shelf.
    #[arg(long)]
    open: Option<i64>,

    /// Log file path. Defaults to lexiread.log next to the binary's cwd.
    #[arg(long, default_value = "lexiread.log")]
    log_file: PathBuf,

    /// Log debug-level detail instead of info.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = File::create(&cli.log_file)
        .with_context(|| format!("cannot create log file {}", cli.log_file.display()))?;
    WriteLogger::init(level, Config::default(), log_file)?;

    initialize_panic_handler();

    let settings = Settings::load();
    if let Some(theme) = ThemeId::from_name(&settings.theme) {
        theme::set_theme(theme);
    }
    let server_url = cli.server.unwrap_or_else(|| settings.server_url.clone());
    info!("starting against {server_url}");

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(
        Box::new(HttpVocabStore::new(server_url.clone())),
        Box::new(HttpDocumentStore::new(server_url)),
    );
    if let Some(id) = cli.open {
        app.open_by_id(id);
    }
    let mut events = TerminalEventSource;
    let result = run_app_with_event_source(&mut terminal, &mut app, &mut events);

    restore_terminal();
    result
}
