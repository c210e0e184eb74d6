//! New-message sound hook. Playback is fire-and-forget: a failure is logged
//! and never blocks event handling.

use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait NotificationSound {
    fn play(&self) -> Result<(), SoundError>;
}

/// Play `sound`, logging instead of propagating failures.
pub fn play_or_log(sound: &dyn NotificationSound) {
    if let Err(e) = sound.play() {
        tracing::warn!(error = %e, "Notification sound failed");
    }
}

/// Default player: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSound;

impl NotificationSound for SilentSound {
    fn play(&self) -> Result<(), SoundError> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl NotificationSound for TerminalBell {
    fn play(&self) -> Result<(), SoundError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}
