use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;

use nix::libc;
use nix::unistd::{close, dup, dup2};
use tracing::warn;

use crate::error::{Result, ShellError};
use crate::jobs::Termination;

/// Built-in commands, run inside the shell process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Status,
}

impl Builtin {
    /// `exit` is not listed here; the executor handles it before anything
    /// else is looked at.
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "status" => Some(Builtin::Status),
            _ => None,
        }
    }
}

/// Changes the working directory to `argv[1]`, or to `home` when no path is
/// given. `PWD` is updated so children see the new directory.
pub fn change_dir(argv: &[String], home: Option<&PathBuf>) -> Result<()> {
    let target = match argv {
        [_] => home.cloned().ok_or(ShellError::NoHome)?,
        [_, path] => PathBuf::from(path),
        _ => return Err(ShellError::TooManyArgs("cd".to_string())),
    };
    env::set_current_dir(&target).map_err(|source| ShellError::Cd {
        path: target.display().to_string(),
        source,
    })?;
    if let Ok(cwd) = env::current_dir() {
        env::set_var("PWD", cwd);
    }
    Ok(())
}

/// Prints the last foreground status, into `outfile` when one is given.
pub fn print_status(status: Termination, outfile: Option<&File>) -> Result<()> {
    let _redirect = match outfile {
        Some(file) => Some(StdoutRedirect::install(file)?),
        None => None,
    };
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", status)?;
    stdout.flush()?;
    Ok(())
}

/// Standard output pointed at a file for as long as this lives; the previous
/// descriptor is saved with `dup` and put back on drop.
pub struct StdoutRedirect {
    saved: RawFd,
}

impl StdoutRedirect {
    pub fn install(file: &File) -> Result<Self> {
        io::stdout().flush()?;
        let saved = dup(libc::STDOUT_FILENO).map_err(io::Error::from)?;
        if let Err(err) = dup2(file.as_raw_fd(), libc::STDOUT_FILENO) {
            let _ = close(saved);
            return Err(io::Error::from(err).into());
        }
        Ok(StdoutRedirect { saved })
    }
}

impl Drop for StdoutRedirect {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Err(err) = dup2(self.saved, libc::STDOUT_FILENO) {
            warn!("failed to restore standard output: {}", err);
        }
        let _ = close(self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::lookup("status"), Some(Builtin::Status));
        assert_eq!(Builtin::lookup("exit"), None);
        assert_eq!(Builtin::lookup("ls"), None);
    }

    #[test]
    fn test_cd_errors() {
        let err = change_dir(&argv(&["cd", "/definitely/not/here"]), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cd: /definitely/not/here: No such file or directory"
        );
        assert!(matches!(
            change_dir(&argv(&["cd"]), None),
            Err(ShellError::NoHome)
        ));
        assert!(matches!(
            change_dir(&argv(&["cd", "a", "b"]), None),
            Err(ShellError::TooManyArgs(_))
        ));
    }

    #[test]
    fn test_status_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.txt");
        let file = File::create(&path).unwrap();
        print_status(Termination::Signaled(15), Some(&file)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "terminated by signal 15\n"
        );
    }
}
