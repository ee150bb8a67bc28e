use std::io::{self, Read, Write};
use std::os::unix::io::RawFd;

use nix::libc;
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use nix::unistd;
use tracing::warn;

use crate::history::History;

const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;
const CTRL_H: u8 = 0x08;
const CTRL_D: u8 = 0x04;
const TAB: u8 = b'\t';

/// Result of one `read_line` call.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// A line with visible content; it has been added to the history.
    Submitted(String),
    /// Nothing but whitespace was entered.
    Blank,
    /// Input ended before anything was typed.
    Eof,
}

/// Terminal put into raw mode (no line buffering, no echo). The previous
/// settings are put back when this is dropped.
pub struct RawMode {
    fd: RawFd,
    saved: Termios,
}

impl RawMode {
    pub fn enable(fd: RawFd) -> nix::Result<Self> {
        let saved = termios::tcgetattr(fd)?;
        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(fd, SetArg::TCSANOW, &raw)?;
        Ok(RawMode { fd, saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = termios::tcsetattr(self.fd, SetArg::TCSANOW, &self.saved) {
            warn!("failed to restore terminal mode: {}", err);
        }
    }
}

/// Standard input read directly from its descriptor, so nothing typed ahead
/// for a foreground child gets buffered inside the shell.
pub struct StdinFd;

impl Read for StdinFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        unistd::read(libc::STDIN_FILENO, buf).map_err(io::Error::from)
    }
}

/// The line being edited. `cursor` is a character offset in `0..=chars.len()`.
#[derive(Debug, Default)]
struct Buffer {
    chars: Vec<char>,
    cursor: usize,
}

enum End {
    Newline,
    Eof,
}

/// Character-at-a-time line editor with cursor movement and history recall.
pub struct LineEditor<R, W> {
    input: R,
    output: W,
    terminal: Option<RawFd>,
    echo: bool,
}

impl LineEditor<StdinFd, io::Stdout> {
    /// Editor on the process's standard streams. Raw mode and echo are only
    /// used when standard input is a terminal.
    pub fn stdio() -> Self {
        let tty = unistd::isatty(libc::STDIN_FILENO).unwrap_or(false);
        LineEditor {
            input: StdinFd,
            output: io::stdout(),
            terminal: tty.then_some(libc::STDIN_FILENO),
            echo: tty,
        }
    }
}

impl<R: Read, W: Write> LineEditor<R, W> {
    #[cfg(test)]
    pub fn new(input: R, output: W, echo: bool) -> Self {
        LineEditor {
            input,
            output,
            terminal: None,
            echo,
        }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Reads one line, echoing edits as they happen. Non-blank lines are
    /// appended to `history`.
    pub fn read_line(&mut self, history: &mut History) -> io::Result<Line> {
        let _raw = match self.terminal {
            Some(fd) => Some(RawMode::enable(fd)?),
            None => None,
        };
        history.rewind();

        let mut buf = Buffer::default();
        let end = loop {
            let Some(byte) = self.next_byte()? else {
                break End::Eof;
            };
            match byte {
                b'\n' | b'\r' | 0 => break End::Newline,
                CTRL_D if buf.chars.is_empty() => break End::Eof,
                DEL | CTRL_H => self.backspace(&mut buf)?,
                ESC => self.escape(&mut buf, history)?,
                // completion has nothing to complete against
                TAB => {}
                b if b < 0x20 => {}
                b => {
                    if let Some(c) = self.decode(b)? {
                        self.insert(&mut buf, c)?;
                    }
                }
            }
            self.output.flush()?;
        };

        self.emit("\n")?;
        self.output.flush()?;

        let text: String = buf.chars.iter().collect();
        if text.is_empty() && matches!(end, End::Eof) {
            return Ok(Line::Eof);
        }
        if text.trim().is_empty() {
            return Ok(Line::Blank);
        }
        history.append(&text);
        Ok(Line::Submitted(text))
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Completes a UTF-8 sequence that starts with `lead`. Malformed input is
    /// dropped.
    fn decode(&mut self, lead: u8) -> io::Result<Option<char>> {
        let width = match lead {
            0x00..=0x7f => return Ok(Some(lead as char)),
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Ok(None),
        };
        let mut bytes = vec![lead];
        for _ in 1..width {
            match self.next_byte()? {
                Some(b) => bytes.push(b),
                None => return Ok(None),
            }
        }
        Ok(std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.chars().next()))
    }

    fn escape(&mut self, buf: &mut Buffer, history: &mut History) -> io::Result<()> {
        match self.next_byte()? {
            Some(b'[') | Some(b'O') => {}
            _ => return Ok(()),
        }
        let Some(mut last) = self.next_byte()? else {
            return Ok(());
        };
        if !(0x40..=0x7e).contains(&last) {
            // parameterised sequence such as ESC [ 3 ~
            while !(0x40..=0x7e).contains(&last) {
                match self.next_byte()? {
                    Some(b) => last = b,
                    None => return Ok(()),
                }
            }
            return Ok(());
        }
        match last {
            b'A' => {
                if let Some(entry) = history.older() {
                    let entry = entry.to_string();
                    self.replace(buf, &entry)?;
                }
            }
            b'B' => {
                if let Some(entry) = history.newer() {
                    let entry = entry.to_string();
                    self.replace(buf, &entry)?;
                }
            }
            b'C' => {
                if buf.cursor < buf.chars.len() {
                    buf.cursor += 1;
                    self.emit("\x1b[C")?;
                }
            }
            b'D' => {
                if buf.cursor > 0 {
                    buf.cursor -= 1;
                    self.emit("\x1b[D")?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn insert(&mut self, buf: &mut Buffer, c: char) -> io::Result<()> {
        buf.chars.insert(buf.cursor, c);
        let shown: String = buf.chars[buf.cursor..].iter().collect();
        self.emit(&shown)?;
        buf.cursor += 1;
        self.move_left(buf.chars.len() - buf.cursor)
    }

    fn backspace(&mut self, buf: &mut Buffer) -> io::Result<()> {
        if buf.cursor == 0 {
            return Ok(());
        }
        buf.cursor -= 1;
        buf.chars.remove(buf.cursor);
        let tail: String = buf.chars[buf.cursor..].iter().collect();
        self.emit("\x1b[D")?;
        self.emit(&tail)?;
        self.emit(" ")?;
        self.move_left(buf.chars.len() - buf.cursor + 1)
    }

    /// Erases what is on screen and shows `text` instead, cursor at the end.
    fn replace(&mut self, buf: &mut Buffer, text: &str) -> io::Result<()> {
        let trailing = buf.chars.len() - buf.cursor;
        if trailing > 0 {
            self.emit(&format!("\x1b[{}C", trailing))?;
        }
        for _ in 0..buf.chars.len() {
            self.emit("\x1b[D \x1b[D")?;
        }
        buf.chars = text.chars().collect();
        buf.cursor = buf.chars.len();
        self.emit(text)
    }

    fn move_left(&mut self, n: usize) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.emit(&format!("\x1b[{}D", n))
    }

    fn emit(&mut self, s: &str) -> io::Result<()> {
        if self.echo {
            self.output.write_all(s.as_bytes())?;
        }
        Ok(())
    }
}
