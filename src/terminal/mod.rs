use anyhow::{Context, Result};
use log::{debug, warn};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor, EditMode};
use std::path::PathBuf;

pub enum ReadOutcome {
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D or end of piped input.
    Eof,
}

pub struct Terminal {
    editor: DefaultEditor,
    prompt: String,
    history_file: Option<PathBuf>,
}

impl Terminal {
    pub fn new(prompt: String, history_file: Option<PathBuf>) -> Result<Self> {
        let config = Config::builder()
            .edit_mode(EditMode::Emacs)
            .auto_add_history(false)
            .build();

        let mut editor =
            DefaultEditor::with_config(config).context("Failed to initialize line editor")?;

        if let Some(path) = &history_file {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    warn!("Failed to load history from {}: {}", path.display(), e);
                }
            }
        }

        Ok(Terminal {
            editor,
            prompt,
            history_file,
        })
    }

    pub fn read_line(&mut self) -> Result<ReadOutcome> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && self.history_file.is_some() {
                    self.editor.add_history_entry(trimmed)?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(anyhow::anyhow!("Error reading input: {}", err)),
        }
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Some(path) = &self.history_file {
            debug!("saving history to {}", path.display());
            if let Err(e) = self.editor.save_history(path) {
                warn!("Failed to save history: {}", e);
            }
        }
    }
}
