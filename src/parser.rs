use once_cell::sync::Lazy;
use thiserror::Error;

/// Decimal pid of the shell, substituted for `$$`.
static SHELL_PID: Lazy<String> = Lazy::new(|| std::process::id().to_string());

/// Errors found while separating redirections and `&` from the arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}: missing file name")]
    MissingTarget(String),
    #[error("&: only allowed at the end of a command")]
    MisplacedBackground,
    #[error("missing command")]
    MissingCommand,
}

/// Result of parsing one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    /// The line starts with `#`.
    Comment,
    Command(Command),
}

/// A tokenized command line. The words still include redirection operators
/// and the background marker; `resolve` separates them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    words: Vec<String>,
}

/// Output redirection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: String,
    pub append: bool,
}

/// One `<`, `>` or `>>` and the file after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Input(String),
    Output(OutputTarget),
}

/// A command ready to run: arguments with all special tokens removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Command and its arguments.
    pub argv: Vec<String>,
    /// Redirections in the order they were written.
    pub redirects: Vec<Redirect>,
    /// Trailing `&` was present.
    pub background: bool,
}

impl Invocation {
    /// The input file that takes effect: the last `<`.
    pub fn infile(&self) -> Option<&str> {
        self.redirects.iter().rev().find_map(|r| match r {
            Redirect::Input(path) => Some(path.as_str()),
            Redirect::Output(_) => None,
        })
    }

    /// The output target that takes effect: the last `>` or `>>`.
    pub fn outfile(&self) -> Option<&OutputTarget> {
        self.redirects.iter().rev().find_map(|r| match r {
            Redirect::Output(target) => Some(target),
            Redirect::Input(_) => None,
        })
    }
}

impl Command {
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn program(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    /// Strips the trailing `&` first, then every `<`, `>` and `>>` together
    /// with the file name after it. Every redirection is kept in order; the
    /// last one of each direction is the one that takes effect.
    pub fn resolve(&self) -> Result<Invocation, ParseError> {
        let mut words: &[String] = &self.words;
        let mut background = false;
        if words.last().map(String::as_str) == Some("&") {
            background = true;
            words = &words[..words.len() - 1];
        }

        let mut argv = Vec::new();
        let mut redirects = Vec::new();
        let mut iter = words.iter();
        while let Some(word) = iter.next() {
            match word.as_str() {
                "<" | ">" | ">>" => {
                    let target = match iter.next() {
                        Some(t) if !is_operator(t) => t.clone(),
                        _ => return Err(ParseError::MissingTarget(word.clone())),
                    };
                    redirects.push(if word == "<" {
                        Redirect::Input(target)
                    } else {
                        Redirect::Output(OutputTarget {
                            path: target,
                            append: word == ">>",
                        })
                    });
                }
                "&" => return Err(ParseError::MisplacedBackground),
                _ => argv.push(word.clone()),
            }
        }

        if argv.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        Ok(Invocation {
            argv,
            redirects,
            background,
        })
    }
}

fn is_operator(word: &str) -> bool {
    matches!(word, "<" | ">" | ">>" | "&")
}

/// Parses one input line into words separated by runs of spaces, replacing
/// `$$` with the shell's pid.
pub fn parse_command_line(cmdline: &str) -> Parsed {
    parse_with_pid(cmdline, &SHELL_PID)
}

fn parse_with_pid(cmdline: &str, pid: &str) -> Parsed {
    if cmdline.starts_with('#') {
        return Parsed::Comment;
    }
    let words = cmdline
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| word.replacen("$$", pid, 1))
        .collect();
    Parsed::Command(Command { words })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> Command {
        match parse_with_pid(line, "4242") {
            Parsed::Command(cmd) => cmd,
            Parsed::Comment => panic!("unexpected comment: {}", line),
        }
    }

    #[test]
    fn test_split_on_space_runs() {
        let cmd = command("  ls   -l  /tmp ");
        assert_eq!(cmd.words(), &["ls", "-l", "/tmp"]);
        assert_eq!(cmd.program(), Some("ls"));
    }

    #[test]
    fn test_empty_line() {
        assert!(command("").words().is_empty());
        assert!(command("    ").words().is_empty());
    }

    #[test]
    fn test_comment() {
        assert_eq!(parse_with_pid("# ls -l", "1"), Parsed::Comment);
        assert_eq!(parse_with_pid("#", "1"), Parsed::Comment);
        assert!(matches!(parse_with_pid(" #x", "1"), Parsed::Command(_)));
    }

    #[test]
    fn test_pid_substitution_first_occurrence_only() {
        let cmd = command("echo $$ pre$$post $$$$");
        assert_eq!(cmd.words(), &["echo", "4242", "pre4242post", "4242$$"]);
    }

    #[test]
    fn test_real_pid_substitution() {
        match parse_command_line("echo $$") {
            Parsed::Command(cmd) => {
                assert_eq!(cmd.words()[1], std::process::id().to_string())
            }
            Parsed::Comment => panic!("not a comment"),
        }
    }

    #[test]
    fn test_resolve_redirections_and_background() {
        let inv = command("sort < in.txt >> out.txt &").resolve().unwrap();
        assert_eq!(inv.argv, vec!["sort"]);
        assert_eq!(inv.infile(), Some("in.txt"));
        assert_eq!(
            inv.outfile(),
            Some(&OutputTarget {
                path: "out.txt".to_string(),
                append: true
            })
        );
        assert!(inv.background);
    }

    #[test]
    fn test_resolve_operators_anywhere() {
        let inv = command("> out.txt echo hi").resolve().unwrap();
        assert_eq!(inv.argv, vec!["echo", "hi"]);
        assert!(!inv.outfile().unwrap().append);
        assert!(!inv.background);
    }

    #[test]
    fn test_last_redirect_wins() {
        let inv = command("cat < a > c < b >> d").resolve().unwrap();
        assert_eq!(inv.infile(), Some("b"));
        assert_eq!(inv.outfile().unwrap().path, "d");
        assert_eq!(
            inv.redirects,
            vec![
                Redirect::Input("a".to_string()),
                Redirect::Output(OutputTarget {
                    path: "c".to_string(),
                    append: false
                }),
                Redirect::Input("b".to_string()),
                Redirect::Output(OutputTarget {
                    path: "d".to_string(),
                    append: true
                }),
            ]
        );
    }

    #[test]
    fn test_resolve_keeps_words() {
        let cmd = command("echo hi > out.txt &");
        let _ = cmd.resolve().unwrap();
        assert_eq!(cmd.words(), &["echo", "hi", ">", "out.txt", "&"]);
    }

    #[test]
    fn test_malformed_redirection() {
        assert_eq!(
            command("cat <").resolve(),
            Err(ParseError::MissingTarget("<".to_string()))
        );
        assert_eq!(
            command("echo hi >> &").resolve(),
            Err(ParseError::MissingTarget(">>".to_string()))
        );
        assert_eq!(
            command("echo > > x").resolve(),
            Err(ParseError::MissingTarget(">".to_string()))
        );
    }

    #[test]
    fn test_misplaced_background() {
        assert_eq!(
            command("sleep 1 & echo").resolve(),
            Err(ParseError::MisplacedBackground)
        );
        assert_eq!(command("&").resolve(), Err(ParseError::MissingCommand));
        assert_eq!(
            command("> out.txt").resolve(),
            Err(ParseError::MissingCommand)
        );
    }
}
