//! Standard configuration file location

use std::path::PathBuf;

/// Application directory name under the platform config dir
const APP_DIR: &str = "mixdeck";

/// Default config file path
///
/// Returns `<config_dir>/mixdeck/config.yaml` (e.g. `~/.config/mixdeck/config.yaml`
/// on Linux), falling back to the working directory when the platform has no
/// config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.yaml")
}
