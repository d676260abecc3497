use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::session::{GameMode, SessionConfig};

pub const DEFAULT_GRID_SIDE: u16 = 4;
pub const MIN_GRID_SIDE: u16 = 2;
pub const MAX_GRID_SIDE: u16 = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mode: GameMode,
    pub duration_secs: u32,
    pub target_score: u32,
    pub grid_side: u16,
    pub sound: bool,
}

impl Default for Config {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            mode: session.mode,
            duration_secs: session.duration_secs,
            target_score: session.target_score,
            grid_side: DEFAULT_GRID_SIDE,
            sound: true,
        }
    }
}

impl Config {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.mode,
            duration_secs: self.duration_secs,
            target_score: self.target_score,
        }
    }

    pub fn clamped_grid_side(&self) -> u16 {
        self.grid_side.clamp(MIN_GRID_SIDE, MAX_GRID_SIDE)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), "ignoring unreadable config: {err}");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
