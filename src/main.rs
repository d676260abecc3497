pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use flashgrid::{
    app_dirs::AppDirs,
    board::{Grid, TileId},
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore, MAX_GRID_SIDE, MIN_GRID_SIDE},
    controller::{Activation, SessionController},
    feedback::{BellPlayer, CueBank},
    runtime::{CrosstermEventSource, FixedTicker, GameEvent, GameEventSource, Runner, Ticker},
    session::{GameMode, SessionSummary},
    SessionError,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 100;
const DURATION_STEP: u32 = 5;

/// Keyboard shortcuts for the top-left 4x4 block of tiles, one string per row.
const TILE_KEYS: [&str; 4] = ["1234", "qwer", "asdf", "zxcv"];

/// hit the highlighted tile before the clock runs out
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal reaction game: one tile lights up at a time, click it (or press its key) before the clock or your nerves run out. Hitting any other tile ends the session."
)]
pub struct Cli {
    /// win condition: reach the target score, or survive until the time runs out
    #[clap(short = 'm', long, value_enum)]
    mode: Option<GameMode>,

    /// session length in seconds for time-limit mode (minimum 30)
    #[clap(short = 'd', long)]
    duration: Option<u32>,

    /// score needed to win in score mode (minimum 10)
    #[clap(short = 't', long)]
    target: Option<u32>,

    /// number of tiles per side of the square board
    #[clap(short = 'g', long, value_parser = clap::value_parser!(u16).range(MIN_GRID_SIDE as i64..=MAX_GRID_SIDE as i64))]
    grid: Option<u16>,

    /// start with sound cues muted
    #[clap(long)]
    mute: bool,

    /// write logs to this file instead of the default state directory
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// store the effective settings as the defaults for the next run
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer command line flags over the stored configuration
    fn apply(&self, mut config: Config) -> Config {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(target) = self.target {
            config.target_score = target;
        }
        if let Some(grid) = self.grid {
            config.grid_side = grid;
        }
        if self.mute {
            config.sound = false;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Setup,
    Playing,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

pub type Controller = SessionController<Grid, BellPlayer<Box<dyn Write>>, StdRng, SystemClock>;

pub struct App {
    pub settings: Config,
    pub controller: Controller,
    pub state: AppState,
    /// One-line prompt shown on the setup screen, e.g. for invalid settings.
    pub notice: Option<String>,
    pub summary: Option<SessionSummary>,
}

impl App {
    pub fn new(settings: Config, cue_out: Box<dyn Write>) -> Self {
        let mut feedback = BellPlayer::new(cue_out, CueBank::default());
        feedback.set_enabled(settings.sound);

        let controller = SessionController::new(
            Grid::square(settings.clamped_grid_side()),
            feedback,
            StdRng::from_entropy(),
            SystemClock,
        );

        Self {
            settings,
            controller,
            state: AppState::Setup,
            notice: None,
            summary: None,
        }
    }

    pub fn start(&mut self) {
        match self.controller.start_session(self.settings.session_config()) {
            Ok(()) => {
                self.state = AppState::Playing;
                self.notice = None;
                self.summary = None;
            }
            Err(SessionError::SessionAlreadyActive) => {
                tracing::debug!("ignoring start while playing");
            }
            Err(err @ SessionError::InvalidConfig { .. }) => {
                tracing::info!("refusing to start: {err}");
                self.notice = Some(err.to_string());
            }
            Err(err @ SessionError::EmptyBoard) => {
                tracing::error!("refusing to start: {err}");
                self.notice = Some(err.to_string());
            }
        }
    }

    /// Runs due timers and picks up a finished session.
    pub fn pump(&mut self) {
        self.controller.pump();
        self.sync();
    }

    fn sync(&mut self) {
        if let Some(summary) = self.controller.take_summary() {
            self.summary = Some(summary);
            self.state = AppState::Summary;
        }
    }

    pub fn activate(&mut self, tile: TileId) -> Activation {
        let activation = self.controller.handle_tile_activation(tile);
        self.sync();
        activation
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            if self.controller.end_session(false).is_some() {
                tracing::info!("session abandoned on quit");
            }
            return Flow::Quit;
        }

        match self.state {
            AppState::Setup => self.on_setup_key(key),
            AppState::Playing => {
                if let KeyCode::Char(c) = key.code {
                    if let Some(tile) = tile_for_key(c, self.controller.board()) {
                        self.activate(tile);
                    }
                }
            }
            AppState::Summary => match key.code {
                KeyCode::Enter => self.start(),
                _ => self.state = AppState::Setup,
            },
        }
        Flow::Continue
    }

    fn on_setup_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => self.start(),
            KeyCode::Char('m') => self.settings.mode = self.settings.mode.toggled(),
            KeyCode::Left => {
                self.settings.duration_secs =
                    self.settings.duration_secs.saturating_sub(DURATION_STEP)
            }
            KeyCode::Right => {
                self.settings.duration_secs =
                    self.settings.duration_secs.saturating_add(DURATION_STEP)
            }
            KeyCode::Down => {
                self.settings.target_score = self.settings.target_score.saturating_sub(1)
            }
            KeyCode::Up => {
                self.settings.target_score = self.settings.target_score.saturating_add(1)
            }
            KeyCode::Char('s') => {
                self.settings.sound = !self.settings.sound;
                self.controller
                    .feedback_mut()
                    .set_enabled(self.settings.sound);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.resize_board(1),
            KeyCode::Char('-') => self.resize_board(-1),
            _ => return,
        }
        // editing the settings clears a stale prompt; a failed start sets a new one
        if !matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
            self.notice = None;
        }
    }

    fn resize_board(&mut self, delta: i32) {
        let side = (self.settings.clamped_grid_side() as i32 + delta)
            .clamp(MIN_GRID_SIDE as i32, MAX_GRID_SIDE as i32) as u16;
        if let Some(board) = self.controller.board_mut() {
            *board = Grid::square(side);
            self.settings.grid_side = side;
        }
    }

    /// `area` is the full terminal area the UI was drawn into.
    pub fn on_mouse(&mut self, mouse: MouseEvent, area: Rect) {
        if self.state != AppState::Playing {
            return;
        }
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            if let Some(tile) =
                ui::tile_at(area, self.controller.board(), mouse.column, mouse.row)
            {
                self.activate(tile);
            }
        }
    }
}

/// Maps a shortcut key to a tile, if the board has a tile in that slot.
pub fn tile_for_key(c: char, grid: &Grid) -> Option<TileId> {
    let c = c.to_ascii_lowercase();
    TILE_KEYS.iter().enumerate().find_map(|(row, keys)| {
        let col = keys.chars().position(|k| k == c)?;
        grid.id_at(col as u16, row as u16)
    })
}

/// Shortcut label drawn on a tile.
pub fn key_for_tile(col: u16, row: u16) -> Option<char> {
    TILE_KEYS
        .get(row as usize)
        .and_then(|keys| keys.chars().nth(col as usize))
}

fn init_logging(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
    {
        return Err(io::Error::other(err));
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let log_path = cli.log_file.clone().unwrap_or_else(AppDirs::log_path);
    if let Err(err) = init_logging(&log_path) {
        eprintln!("logging disabled ({}): {err}", log_path.display());
    }

    let store = FileConfigStore::new();
    let settings = cli.apply(store.load());
    if cli.save_config {
        store.save(&settings)?;
        tracing::info!(path = %store.path().display(), "saved settings");
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings, Box::new(io::stdout()));
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: GameEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            GameEvent::Tick | GameEvent::Resize => {}
            GameEvent::Key(key) => {
                if app.on_key(key) == Flow::Quit {
                    break;
                }
            }
            GameEvent::Mouse(mouse) => {
                let size = terminal.size()?;
                app.on_mouse(mouse, Rect::new(0, 0, size.width, size.height));
            }
        }

        app.pump();
    }

    Ok(())
}
