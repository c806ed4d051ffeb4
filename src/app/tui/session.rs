use std::io;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};

/// Owns raw mode, the alternate screen and the hidden cursor for the
/// lifetime of the viewer. Dropping it restores the terminal even when the
/// event loop bails out with an error.
pub(super) struct TuiSession {
    restored: bool,
}

impl TuiSession {
    pub(super) fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let session = Self { restored: false };
        execute!(io::stdout(), EnterAlternateScreen, Hide)
            .context("failed to enter alternate screen")?;
        Ok(session)
    }

    pub(super) fn leave(mut self) -> Result<()> {
        self.restored = true;
        restore()
    }
}

fn restore() -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(io::stdout(), Show, LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    Ok(())
}

impl Drop for TuiSession {
    fn drop(&mut self) {
        if !self.restored {
            let _ = restore();
        }
    }
}
