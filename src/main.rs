use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use fleetwatch::app::{write_snapshot, App};
use fleetwatch::config::{Settings, DEFAULT_CONFIG_FILE};
use fleetwatch::logging::setup_logging;
use fleetwatch::monitor::{poll_once, Monitor};
use fleetwatch::{events, ui};

/// How long workers get to stop after quit before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on how long the loop blocks waiting for input.
const EVENT_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(version)]
#[command(about = "Live terminal dashboard for self-hosted services, containers and connectivity")]
struct Args {
    /// Path to the TOML config file (default: fleetwatch.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Refresh interval in seconds, overriding `render_interval`
    #[arg(short, long)]
    refresh: Option<u64>,

    /// File that receives log output
    #[arg(long, default_value = "fleetwatch.log")]
    log_file: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Poll every source once, export the snapshot to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_file, &args.log_level)?;

    let (config_path, explicit) = match args.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let mut settings = Settings::load(&config_path, explicit)?;
    if let Some(secs) = args.refresh {
        if secs == 0 {
            bail!("--refresh must be at least 1 second");
        }
        settings.render_interval = Duration::from_secs(secs);
    }
    info!(
        services = settings.services.len(),
        log_sources = settings.logs.len(),
        "Configuration loaded"
    );

    let rt = Runtime::new().context("Failed to start async runtime")?;

    // Handle export mode (non-interactive)
    if let Some(export_path) = args.export {
        return export_to_file(&rt, &settings, &export_path);
    }

    let monitor = rt.block_on(async { Monitor::start(&settings) })?;
    let result = run_tui(&monitor, settings.render_interval);

    let aborted = rt.block_on(monitor.shutdown(SHUTDOWN_GRACE));
    if aborted > 0 {
        warn!(aborted, "Forced worker shutdown");
    }
    info!("Exiting");

    result
}

/// Run the dashboard until quit or interrupt.
fn run_tui(monitor: &Monitor, refresh_interval: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let mut app = App::new(monitor.aggregator());
    let result = run_app(&mut terminal, &mut app, monitor, refresh_interval);

    // Workers stop whichever way the loop ended
    monitor.request_shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    monitor: &Monitor,
    refresh_interval: Duration,
) -> Result<()> {
    let shutdown = monitor.shutdown_signal();
    let mut last_draw: Option<Instant> = None;
    let mut dirty = true;

    while app.running {
        if *shutdown.borrow() {
            break;
        }

        let size = terminal.size()?;
        if app.observe_size(size.width, size.height) {
            dirty = true;
        }

        let due = last_draw.is_none_or(|t| t.elapsed() >= refresh_interval);
        if dirty || due {
            let snapshot = app.snapshot();
            terminal.draw(|frame| ui::draw(frame, app, &snapshot))?;
            last_draw = Some(Instant::now());
            dirty = false;
        }

        let until_next = last_draw
            .map(|t| refresh_interval.saturating_sub(t.elapsed()))
            .unwrap_or_default();
        if let Some(event) = events::poll_event(until_next.min(EVENT_POLL))? {
            match event {
                Event::Key(key) => {
                    events::handle_key_event(app, key);
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }
    }

    Ok(())
}

/// Run one poll round and write the resulting snapshot.
fn export_to_file(rt: &Runtime, settings: &Settings, export_path: &Path) -> Result<()> {
    let aggregator = rt.block_on(poll_once(settings))?;
    write_snapshot(&aggregator.snapshot(), export_path)?;

    println!("Exported dashboard snapshot to: {}", export_path.display());
    Ok(())
}
