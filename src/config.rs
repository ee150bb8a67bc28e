use std::env;
use std::path::PathBuf;

use crate::path::SearchPath;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SMALLSH_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Settings taken from the environment at startup.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub search_path: SearchPath,
    /// Target of a bare `cd`.
    pub home: Option<PathBuf>,
    pub log_filter: String,
}

impl ShellConfig {
    pub fn from_env() -> Self {
        let home = env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .or_else(dirs_next::home_dir);
        ShellConfig {
            search_path: SearchPath::from_env(),
            home,
            log_filter: env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}
