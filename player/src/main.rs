use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{debug, error, info, warn};
use ratatui::{Terminal, backend::CrosstermBackend, style::Color};

use cinevault_core::{AppConfig, JsonCatalog};

mod app;
mod cli;
mod commands;
mod events;
mod ui;

use app::App;
use cli::TitlesCommand;

#[derive(Parser)]
#[command(name = "cinevault", version, about = "Browse a movie catalog and stream its titles in the terminal")]
struct Cli {
    /// Catalog file (defaults to the one in the config)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Open the catalog browser (default)
    Browse,
    /// Open the player on a catalog title
    Watch {
        id: i64,
        /// Episode number for series, starting at 1
        #[arg(long)]
        episode: Option<usize>,
    },
    /// Open the player on an arbitrary source URL
    Play { url: String },
    /// Show how a source URL would be played
    Classify { url: String },
    /// Manage catalog titles
    #[command(subcommand)]
    Titles(TitlesCommand),
}

/// What the TUI opens on
enum StartView {
    Catalog,
    Title { id: i64, episode: Option<usize> },
    Source(String),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(catalog) = &cli.catalog {
        config.catalog_path = catalog.clone();
    }

    let start = match cli.command {
        None | Some(CliCommand::Browse) => StartView::Catalog,
        Some(CliCommand::Watch { id, episode }) => StartView::Title { id, episode },
        Some(CliCommand::Play { url }) => StartView::Source(url),
        Some(CliCommand::Classify { url }) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
            return cli::print_classification(&url);
        }
        Some(CliCommand::Titles(action)) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
            let mut catalog = JsonCatalog::open(&config.catalog_path)
                .with_context(|| format!("Failed to open catalog {}", config.catalog_path.display()))?;
            return cli::run_titles(&mut catalog, action);
        }
    };

    init_file_logger(&config.log_path)?;
    info!("Starting cinevault {}", env!("CARGO_PKG_VERSION"));
    run_tui(config, start)
}

/// The terminal belongs to the TUI, so logs go to a file
fn init_file_logger(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            let datetime = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(buf, "[{}] {:<5} {}: {}", datetime, record.level(), record.target(), record.args())
        })
        .init();
    Ok(())
}

fn run_tui(config: AppConfig, start: StartView) -> Result<()> {
    // Set up clean terminal restoration on panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        error!("PANIC: {}", panic_info);
        orig_hook(panic_info);
    }));

    let mut app = App::new(config)?;
    match start {
        StartView::Catalog => {}
        StartView::Title { id, episode } => app.watch_title(id, episode.map(|n| n.saturating_sub(1)))?,
        StartView::Source(url) => app.watch_url(&url)?,
    }

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
        let _ = disable_raw_mode();
        return Err(e).context("Failed to set up terminal");
    }
    debug!("Terminal setup complete");

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(term) => term,
        Err(e) => {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to create terminal");
        }
    };

    let result = event_loop(&mut terminal, &mut app);

    info!("Shutting down");
    // Drop the session first so the player and its hooks are released
    app.close_watch();

    let cleanup_result = (|| -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    })();

    if let Err(e) = cleanup_result {
        error!("Error during cleanup: {:#}", e);
        eprintln!("Error during cleanup: {:#}", e);
    }
    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(33);
    let mut last_tick = Instant::now() - tick_rate;

    while !app.should_quit {
        if last_tick.elapsed() >= tick_rate {
            if let Err(e) = terminal.draw(|f| ui::draw_ui(f, app)) {
                // a failed frame is not worth crashing over
                warn!("Terminal draw error: {}", e);
            }
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10))? {
            match event::read() {
                Ok(Event::Key(key)) => {
                    if events::is_terminate_key(&key) {
                        info!("Quit key pressed");
                        app.should_quit = true;
                        break;
                    }
                    if let Err(e) = app.handle_key_event(key) {
                        warn!("Key handler error: {:#}", e);
                        app.set_status(format!("Error: {}", e), Color::Red);
                    }
                }
                Ok(Event::Mouse(mouse)) => app.handle_mouse_event(mouse),
                Ok(Event::Resize(w, h)) => {
                    debug!("Resize event: {}x{}", w, h);
                    last_tick = Instant::now() - tick_rate;
                }
                Ok(_) => {}
                Err(e) => warn!("Error reading event: {}", e),
            }
        }

        app.update(Instant::now());
    }
    Ok(())
}
