use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{self, Stdio};
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::builtins::{self, Builtin};
use crate::error::ShellError;
use crate::jobs::{JobTable, Termination};
use crate::parser::{Command, Invocation, Redirect};
use crate::path::SearchPath;
use crate::signals::SignalState;

const DEV_NULL: &str = "/dev/null";

/// What the main loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    ParseFailed,
    ExecFailed,
    Exit,
}

/// Opened redirection targets.
#[derive(Debug, Default)]
struct Streams {
    stdin: Option<File>,
    stdout: Option<File>,
}

/// Runs parsed commands and keeps the state that outlives a single command:
/// background jobs and the last foreground status.
pub struct Executor {
    jobs: JobTable,
    status: Termination,
    search_path: SearchPath,
    home: Option<PathBuf>,
    signals: Arc<SignalState>,
}

impl Executor {
    pub fn new(search_path: SearchPath, home: Option<PathBuf>, signals: Arc<SignalState>) -> Self {
        Executor {
            jobs: JobTable::new(),
            status: Termination::Exited(0),
            search_path,
            home,
            signals,
        }
    }

    pub fn status(&self) -> Termination {
        self.status
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobTable {
        &mut self.jobs
    }

    /// Executes one command line.
    pub fn execute(&mut self, cmd: &Command) -> Outcome {
        let Some(program) = cmd.program() else {
            return Outcome::Continue;
        };
        if program == "exit" {
            return Outcome::Exit;
        }

        let invocation = match cmd.resolve() {
            Ok(invocation) => invocation,
            Err(err) => {
                debug!(words = ?cmd.words(), "unusable command line");
                report(&err.into());
                self.status = Termination::Exited(1);
                return Outcome::ParseFailed;
            }
        };
        let background = invocation.background && !self.signals.foreground_only();

        let streams = match open_streams(&invocation, background) {
            Ok(streams) => streams,
            Err(err) => {
                report(&err);
                self.status = Termination::Exited(1);
                return Outcome::Continue;
            }
        };

        if let Some(builtin) = Builtin::lookup(&invocation.argv[0]) {
            self.run_builtin(builtin, &invocation, &streams);
            return Outcome::Continue;
        }

        let child = match self.spawn(&invocation, streams, background) {
            Ok(child) => child,
            Err(err) => {
                report(&err);
                if !background {
                    self.status = Termination::Exited(1);
                }
                return Outcome::ExecFailed;
            }
        };
        let pid = Pid::from_raw(child.id() as i32);

        if background {
            println!("background pid is {}", pid);
            flush_stdout();
            self.jobs.add(pid);
            debug!(running = self.jobs.len(), "background job registered");
        } else {
            self.wait_foreground(pid);
        }
        Outcome::Continue
    }

    fn run_builtin(&mut self, builtin: Builtin, invocation: &Invocation, streams: &Streams) {
        let result = match builtin {
            Builtin::Cd => builtins::change_dir(&invocation.argv, self.home.as_ref()),
            Builtin::Status => builtins::print_status(self.status, streams.stdout.as_ref()),
        };
        if let Err(err) = result {
            report(&err);
        }
    }

    /// Starts the program from the first search-path entry that works.
    fn spawn(
        &self,
        invocation: &Invocation,
        streams: Streams,
        background: bool,
    ) -> Result<process::Child, ShellError> {
        let program = &invocation.argv[0];
        let mut last_err = None;
        flush_stdout();

        for candidate in self.search_path.candidates(program) {
            let mut command = process::Command::new(&candidate);
            command.arg0(program).args(&invocation.argv[1..]);
            if let Some(file) = &streams.stdin {
                command.stdin(Stdio::from(file.try_clone()?));
            }
            if let Some(file) = &streams.stdout {
                command.stdout(Stdio::from(file.try_clone()?));
            }
            // SAFETY: only sigaction is called between fork and exec, and it
            // is async-signal-safe.
            unsafe {
                command.pre_exec(move || child_signals(background));
            }

            match command.spawn() {
                Ok(child) => {
                    debug!(pid = child.id(), path = %candidate.display(), background, "spawned");
                    return Ok(child);
                }
                Err(err) => {
                    let keep_previous = err.kind() == io::ErrorKind::NotFound
                        && last_err
                            .as_ref()
                            .map_or(false, |prev: &io::Error| prev.kind() != io::ErrorKind::NotFound);
                    if !keep_previous {
                        last_err = Some(err);
                    }
                }
            }
        }

        Err(ShellError::Spawn {
            program: program.clone(),
            source: last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)),
        })
    }

    /// Blocks until `pid` terminates and records how it ended.
    fn wait_foreground(&mut self, pid: Pid) {
        self.signals.begin_foreground();
        let termination = loop {
            match waitpid(pid, None) {
                Ok(status) => {
                    if let Some(termination) = Termination::from_wait_status(status) {
                        break termination;
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    warn!(pid = pid.as_raw(), "waitpid failed: {}", err);
                    break Termination::Exited(1);
                }
            }
        };
        let interrupted = self.signals.take_interrupt();
        debug!(pid = pid.as_raw(), %termination, interrupted, "foreground job finished");

        let termination = foreground_result(termination, interrupted);
        if let Termination::Signaled(signal) = termination {
            println!("terminated by signal {}", signal);
        }
        flush_stdout();
        self.status = termination;
    }
}

/// Opens every redirect target in the order written, so earlier targets
/// are created even when a later one replaces them, and a failure stops at
/// the operator that caused it. Background commands read from and write to
/// `/dev/null` unless redirected.
fn open_streams(invocation: &Invocation, background: bool) -> Result<Streams, ShellError> {
    let mut streams = Streams::default();
    for redirect in &invocation.redirects {
        match redirect {
            Redirect::Input(path) => streams.stdin = Some(open_input(path)?),
            Redirect::Output(target) => {
                streams.stdout = Some(open_output(&target.path, target.append)?)
            }
        }
    }
    if background && invocation.infile().is_none() {
        streams.stdin = Some(open_input(DEV_NULL)?);
    }
    if background && invocation.outfile().is_none() {
        streams.stdout = Some(open_output(DEV_NULL, false)?);
    }
    Ok(streams)
}

fn open_input(path: &str) -> Result<File, ShellError> {
    File::open(path).map_err(|source| ShellError::RedirectOpen {
        path: path.to_string(),
        source,
    })
}

fn open_output(path: &str, append: bool) -> Result<File, ShellError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o600);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options.open(path).map_err(|source| ShellError::RedirectOpen {
        path: path.to_string(),
        source,
    })
}

/// An interrupt delivered while the child ran counts as termination by
/// SIGINT, even when the child survived it.
fn foreground_result(termination: Termination, interrupted: bool) -> Termination {
    match termination {
        Termination::Exited(_) if interrupted => Termination::Signaled(Signal::SIGINT as i32),
        other => other,
    }
}

/// Signal dispositions for a child about to exec: Ctrl-Z never stops it, and
/// Ctrl-C only reaches it in the foreground.
fn child_signals(background: bool) -> io::Result<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    let on_interrupt = if background { &ignore } else { &default };
    unsafe {
        sigaction(Signal::SIGTSTP, &ignore)?;
        sigaction(Signal::SIGINT, on_interrupt)?;
    }
    Ok(())
}

fn report(err: &ShellError) {
    flush_stdout();
    eprintln!("smallsh: {}", err);
}

fn flush_stdout() {
    let _ = io::stdout().flush();
}
