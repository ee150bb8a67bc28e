use std::path::PathBuf;

/// Ordered list of directories searched for external programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Splits a colon-separated search-path string. An empty string (or an
    /// empty component) stands for the current directory.
    pub fn parse(path: &str) -> Self {
        let dirs = path
            .split(':')
            .map(|dir| {
                if dir.is_empty() {
                    PathBuf::from(".")
                } else {
                    PathBuf::from(dir)
                }
            })
            .collect();
        SearchPath { dirs }
    }

    /// Reads `PATH`, falling back to the current directory when it is unset.
    pub fn from_env() -> Self {
        match std::env::var("PATH") {
            Ok(path) => Self::parse(&path),
            Err(_) => Self::parse(""),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every location worth trying for `program`, in search order.
    /// A name with a slash in it is used as given.
    pub fn candidates(&self, program: &str) -> Vec<PathBuf> {
        if program.contains('/') {
            return vec![PathBuf::from(program)];
        }
        self.dirs.iter().map(|dir| dir.join(program)).collect()
    }
}
