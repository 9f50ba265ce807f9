// src/shell/command_parser.rs
use anyhow::{Context, Result};

const BACKGROUND_MARKER: &str = "&";

/// One command line, split into arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub argv: Vec<String>,
    pub background: bool,
}

impl ParsedCommand {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments joined by single spaces, without the background marker.
    pub fn command_text(&self) -> String {
        self.argv.join(" ")
    }
}

pub struct CommandParser;

impl CommandParser {
    /// Parses a raw input line.
    ///
    /// Returns `None` for blank lines and `#` comments.
    pub fn parse(input: &str) -> Result<Option<ParsedCommand>> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let mut argv = shellwords::split(trimmed)
            .with_context(|| format!("Failed to parse command: {}", trimmed))?;
        if argv.is_empty() {
            return Ok(None);
        }

        // A lone "&" is a command name, not a marker.
        let background =
            argv.len() > 1 && argv.last().map(String::as_str) == Some(BACKGROUND_MARKER);
        if background {
            argv.pop();
        }

        Ok(Some(ParsedCommand { argv, background }))
    }
}
