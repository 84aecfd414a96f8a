/// Config file loading and creation for the duelrank CLI.
///
/// Config lives at ~/.config/duelrank/config.toml.
/// All fields are optional — CLI args override config values.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::bail;

#[derive(Deserialize, Default)]
pub struct DuelrankConfig {
    pub items: Option<String>,
    pub data_dir: Option<String>,
    pub max_comparisons: Option<usize>,
    pub session_max_age_hours: Option<i64>,
    pub global_top: Option<usize>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# duelrank configuration
# All values here can be overridden by CLI flags.

# File with the items to rank: a JSON array (of names or of
# {\"id\": .., \"name\": .., \"image\": ..} records) or one name per line.
# items = \"/path/to/characters.json\"

# Where session and global ranking state is kept.
# Default: ~/.local/share/duelrank
# data_dir = \"/path/to/state\"

# Stop a session after this many comparisons (unset = run to a full order).
# max_comparisons = 100

# Sessions untouched for longer than this are discarded on startup.
# session_max_age_hours = 24

# How many entries `duelrank global` shows by default.
# global_top = 10
";

/// Returns the default config path: ~/.config/duelrank/config.toml
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".config").join("duelrank").join("config.toml")
}

/// Returns the default data directory: ~/.local/share/duelrank
pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".local").join("share").join("duelrank")
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> DuelrankConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            toml::from_str(&content)
                .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DuelrankConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    }
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    // Create parent directories
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
