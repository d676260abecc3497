use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "flashgrid";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("flashgrid_config.json"))
    }

    pub fn log_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
                .join("flashgrid.log")
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|pd| pd.data_local_dir().join("flashgrid.log"))
                .unwrap_or_else(|| PathBuf::from("flashgrid.log"))
        }
    }
}
