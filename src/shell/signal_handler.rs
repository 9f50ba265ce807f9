use log::debug;
use signal_hook::consts::{SIGINT, SIGQUIT};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Keeps the shell alive when Ctrl+C or Ctrl+\ is aimed at a foreground child.
///
/// Exec restores default dispositions in the child, so only the shell
/// itself ignores these signals.
pub struct SignalHandler {
    interrupted: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn initialize() -> io::Result<Self> {
        debug!("Initializing signal handlers");
        let interrupted = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGINT, interrupted.clone())?;
        signal_hook::flag::register(SIGQUIT, interrupted.clone())?;
        Ok(Self { interrupted })
    }

    /// Reports and clears a pending interrupt.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Ends the line a Ctrl+C'd foreground child left behind, so the next
    /// prompt starts at column zero.
    pub fn acknowledge(&self, out: &mut impl Write) -> io::Result<bool> {
        if !self.was_interrupted() {
            return Ok(false);
        }
        debug!("foreground command was interrupted");
        writeln!(out)?;
        out.flush()?;
        Ok(true)
    }
}
