//! Interactive commands read from stdin.

use anyhow::{Result, bail};
use ovbridge_editor::OptionKind;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `culture <value>` / `language <value>`
    Select(OptionKind, String),
    /// `show`
    Show,
    /// `quit`
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let arg = rest.trim();

    let command = match (verb, arg) {
        ("culture", "") | ("language", "") => bail!("usage: {verb} <value>"),
        ("culture", value) => Command::Select(OptionKind::Culture, value.to_string()),
        ("language", value) => Command::Select(OptionKind::Language, value.to_string()),
        ("show", _) => Command::Show,
        ("quit" | "exit", _) => Command::Quit,
        _ => bail!("unknown command '{verb}' (expected culture, language, show or quit)"),
    };
    Ok(Some(command))
}

/// Forward stdin lines to a channel until EOF.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
