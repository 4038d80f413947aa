use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use rungs::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    display::DisplayMode,
    logging,
    questions::ArithmeticSource,
    runtime::{CrosstermEventSource, FixedTicker, PracticeEventSource, Runner, Ticker},
    session::{PracticeMode, Session},
    stats::ProgressDb,
    ui,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin, BufWriter},
    path::PathBuf,
    time::Duration,
};

const TICK_RATE_MS: u64 = 100;

/// adaptive practice questions that find and follow your level
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Adaptive practice in the terminal: a short calibration finds your level, then every answer nudges it up or down while earlier material comes back for review."
)]
pub struct Cli {
    /// start practice at this level, skipping calibration
    #[clap(short = 'l', long)]
    level: Option<f64>,

    /// ignore saved progress and calibrate again
    #[clap(long)]
    recalibrate: bool,

    /// worksheet mode: always ask at the current level, no review questions
    #[clap(long)]
    worksheet: bool,

    /// disable random review so every question is asked at the current level
    #[clap(long)]
    deterministic: bool,

    /// how the level is shown while practicing
    #[clap(short = 'd', long, value_enum)]
    display_mode: Option<DisplayMode>,

    /// config file to use instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// progress database to use instead of the default location
    #[clap(long)]
    db: Option<PathBuf>,

    /// write the answer history as CSV to this path and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// print the effective config as JSON and exit
    #[clap(long)]
    print_config: bool,

    /// delete saved progress and answer history, then exit
    #[clap(long)]
    reset: bool,
}

impl Cli {
    fn load_config(&self) -> Config {
        let store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let mut config = store.load();
        if self.deterministic {
            config.review.deterministic = true;
        }
        if let Some(mode) = self.display_mode {
            config.display_mode = mode;
        }
        config
    }

    fn open_db(&self) -> Result<ProgressDb, rungs::stats::StoreError> {
        match &self.db {
            Some(path) => ProgressDb::open(path),
            None => ProgressDb::open_default(),
        }
    }

    fn practice_mode(&self) -> PracticeMode {
        if self.worksheet {
            PracticeMode::Worksheet
        } else {
            PracticeMode::Learning
        }
    }

    /// Explicit level, then saved progress, then calibration.
    fn build_session(&self, config: Config, db: Option<&ProgressDb>) -> Session {
        let mode = self.practice_mode();
        if let Some(level) = self.level {
            return Session::resume(config, mode, level, 0);
        }
        if !self.recalibrate {
            let snapshot = db.and_then(|db| match db.latest_snapshot() {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::warn!(%err, "could not read saved progress");
                    None
                }
            });
            if let Some(snapshot) = snapshot {
                tracing::info!(level = snapshot.level, streak = snapshot.streak, "resuming saved progress");
                return Session::resume(config, mode, snapshot.level, snapshot.streak);
            }
        }
        Session::calibrate(config, mode)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // logging is best effort
    let _log_guard = AppDirs::log_path().and_then(|path| logging::init_logging(&path).ok());

    let config = cli.load_config();

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = &cli.export_csv {
        let db = cli.open_db()?;
        let written = db.export_csv(BufWriter::new(File::create(path)?))?;
        println!("exported {} answers to {}", written, path.display());
        return Ok(());
    }

    if cli.reset {
        let db = cli.open_db()?;
        db.clear_all()?;
        tracing::info!("saved progress cleared");
        println!("progress cleared");
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let db = match cli.open_db() {
        Ok(db) => Some(db),
        Err(err) => {
            tracing::warn!(%err, "progress will not be saved");
            None
        }
    };
    let session = cli.build_session(config, db.as_ref());

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let mut app = App::new(session, Box::new(ArithmeticSource), StdRng::from_entropy())
        .with_events(runner.sender());
    if let Some(db) = db {
        app = app.with_db(db);
    }

    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: PracticeEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    app.start();
    loop {
        terminal.draw(|f| {
            let area = f.area();
            ui::draw(app, area, f.buffer_mut())
        })?;

        app.on_event(runner.step());
        if app.should_quit {
            break;
        }
    }
    Ok(())
}
