//! Operator command intake.
//!
//! A dedicated thread reads lines from stdin and applies them to the shared
//! session state. The only command is `d` (either case): delete the last
//! closed recording.

use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

use owo_colors::OwoColorize;
use tracing::debug;

use swingsense_core::{Error, Result, SessionHandle, UndoOutcome};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Delete the most recently closed recording.
    UndoLast,
    /// Anything else. Reported, no effect.
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let token = line.trim();
        if token.is_empty() {
            return None;
        }
        if token.eq_ignore_ascii_case("d") {
            Some(Command::UndoLast)
        } else {
            Some(Command::Unknown(token.to_string()))
        }
    }
}

/// How a reply should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Notice,
    Failure,
}

/// Apply `command` and describe the result for the operator.
pub fn execute(handle: &SessionHandle, command: &Command) -> (Tone, String) {
    match command {
        Command::UndoLast => describe_undo(&handle.undo_last()),
        Command::Unknown(text) => (
            Tone::Notice,
            format!("Unknown command '{}'. Type 'd' to delete the last recording.", text),
        ),
    }
}

fn describe_undo(result: &Result<UndoOutcome>) -> (Tone, String) {
    match result {
        Ok(UndoOutcome::Deleted {
            session,
            index_reclaimed,
        }) => {
            let mut message = format!("Deleted {}", session.path.display());
            if *index_reclaimed {
                message.push_str(&format!("; next recording reuses #{}", session.index));
            }
            (Tone::Success, message)
        }
        Ok(other) => (Tone::Success, format!("{:?}", other)),
        Err(Error::NothingToUndo) => (Tone::Notice, "Nothing to undo".to_string()),
        Err(e) => (Tone::Failure, format!("Undo failed: {}", e)),
    }
}

fn paint(tone: Tone, message: &str, color: bool) -> String {
    if !color {
        return message.to_string();
    }
    match tone {
        Tone::Success => message.green().to_string(),
        Tone::Notice => message.yellow().to_string(),
        Tone::Failure => message.red().to_string(),
    }
}

/// Read commands from `reader` until EOF, writing replies to `out`.
pub fn run_intake<R: BufRead, W: Write>(handle: &SessionHandle, reader: R, mut out: W, color: bool) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!("Command input closed: {}", e);
                break;
            }
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        let (tone, message) = execute(handle, &command);
        let _ = writeln!(out, "{}", paint(tone, &message, color));
    }
    debug!("Command intake finished");
}

/// Run [`run_intake`] on its own thread, replying on stderr.
pub fn spawn_command_intake<R>(handle: SessionHandle, reader: R, color: bool) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("command-intake".to_string())
        .spawn(move || run_intake(&handle, reader, io::stderr(), color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use swingsense_core::{SampleRecord, SessionManager};

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("d"), Some(Command::UndoLast));
        assert_eq!(Command::parse("D\n"), Some(Command::UndoLast));
        assert_eq!(Command::parse("  d  "), Some(Command::UndoLast));
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   \r\n"), None);
        assert_eq!(
            Command::parse("delete"),
            Some(Command::Unknown("delete".to_string()))
        );
    }

    #[test]
    fn test_undo_via_intake() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::new(dir.path(), "swing");
        let handle = sessions.handle();

        let session = sessions.on_start().unwrap();
        sessions
            .on_sample(&SampleRecord::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0))
            .unwrap();
        sessions.on_stop();

        let mut out = Vec::new();
        run_intake(&handle, Cursor::new("\nx\nd\nD\n"), &mut out, false);
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Unknown command 'x'"));
        assert!(lines[1].starts_with("Deleted "));
        assert!(lines[1].ends_with("next recording reuses #1"));
        assert_eq!(lines[2], "Nothing to undo");
        assert!(!session.path.exists());
        assert_eq!(handle.snapshot().next_index, 1);
    }

    #[test]
    fn test_spawned_intake_runs_to_eof() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path(), "swing");
        let thread = spawn_command_intake(sessions.handle(), Cursor::new("d\n"), false).unwrap();
        thread.join().unwrap();
        assert_eq!(sessions.snapshot().next_index, 1);
    }

    #[test]
    fn test_paint_without_color_is_plain() {
        assert_eq!(paint(Tone::Failure, "boom", false), "boom");
        assert_ne!(paint(Tone::Failure, "boom", true), "boom");
    }
}
