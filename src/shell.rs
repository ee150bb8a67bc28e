use std::io::{self, Read, Write};
use std::sync::Arc;

use tracing::debug;

use crate::config::ShellConfig;
use crate::editor::{Line, LineEditor};
use crate::exec::{Executor, Outcome};
use crate::history::History;
use crate::parser::{parse_command_line, Parsed};
use crate::signals::SignalState;

/// Global prompt string.
pub static PROMPT: &str = ": ";

/// Runs the main shell loop on the process's standard streams until `exit`
/// or end of input. Returns the shell's exit status.
pub fn run_shell(config: ShellConfig, signals: Arc<SignalState>) -> io::Result<i32> {
    let mut editor = LineEditor::stdio();
    let mut executor = Executor::new(config.search_path, config.home, Arc::clone(&signals));
    let mut history = History::new();

    loop {
        announce(&signals, &mut executor);

        print!("{}", PROMPT);
        io::stdout().flush()?;

        if !step(&mut editor, &mut history, &mut executor)? {
            break;
        }
    }
    debug!(
        status = %executor.status(),
        history = history.len(),
        running = executor.jobs().len(),
        "shell exiting"
    );
    Ok(0)
}

/// Reports a pending foreground-only toggle, then every finished
/// background job.
fn announce(signals: &SignalState, executor: &mut Executor) {
    if let Some(change) = signals.take_mode_change() {
        debug!(foreground_only = signals.foreground_only(), "mode toggled");
        println!("{}", change);
    }
    if executor.jobs().is_empty() {
        return;
    }
    for (pid, termination) in executor.jobs_mut().reap_all() {
        println!("background pid {} is done: {}", pid, termination);
    }
}

/// Reads and runs one line. `false` once the shell should stop.
fn step<R: Read, W: Write>(
    editor: &mut LineEditor<R, W>,
    history: &mut History,
    executor: &mut Executor,
) -> io::Result<bool> {
    let line = match editor.read_line(history)? {
        Line::Eof => return Ok(false),
        Line::Blank => return Ok(true),
        Line::Submitted(line) => line,
    };
    let command = match parse_command_line(&line) {
        Parsed::Comment => return Ok(true),
        Parsed::Command(command) => command,
    };
    let outcome = executor.execute(&command);
    debug!(?outcome, line = %line, "executed");
    Ok(outcome != Outcome::Exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::SearchPath;
    use std::io::Cursor;

    #[test]
    fn test_step_until_exit() {
        let input = b"# a comment\n\nfalse\n   \nexit\ntrue\n".to_vec();
        let mut editor = LineEditor::new(Cursor::new(input), Vec::new(), false);
        let mut history = History::new();
        let mut executor = Executor::new(SearchPath::from_env(), None, SignalState::new());

        let mut steps = 0;
        while step(&mut editor, &mut history, &mut executor).unwrap() {
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(0), Some("# a comment"));
        assert_eq!(history.get(2), Some("exit"));
        assert_eq!(executor.status(), crate::jobs::Termination::Exited(1));
    }

    #[test]
    fn test_step_stops_at_end_of_input() {
        let mut editor = LineEditor::new(Cursor::new(b"true".to_vec()), Vec::new(), false);
        let mut history = History::new();
        let mut executor = Executor::new(SearchPath::from_env(), None, SignalState::new());
        assert!(step(&mut editor, &mut history, &mut executor).unwrap());
        assert!(!step(&mut editor, &mut history, &mut executor).unwrap());
    }
}
