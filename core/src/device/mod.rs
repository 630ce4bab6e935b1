//! Output devices and the players they hand to sounds.

mod hardware;
mod mixer;
mod null;

pub use hardware::CpalOutput;
pub use mixer::MixerPlayer;
pub use null::NullOutput;

use crate::error::Result;
use crate::source::SoundSource;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

/// One sound's handle on the output device.
///
/// The player pulls bytes from its [`SoundSource`] ahead of playback; bytes
/// pulled but not yet heard are counted by
/// [`DevicePlayer::unplayed_buffer_bytes`].
#[cfg_attr(test, mockall::automock)]
pub trait DevicePlayer: Send + Sync {
    fn play(&self);

    fn pause(&self);

    /// `false` once paused, or once the source is exhausted and every pulled
    /// byte has been played.
    fn is_playing(&self) -> bool;

    fn set_volume(&self, volume: f64);

    fn volume(&self) -> f64;

    fn unplayed_buffer_bytes(&self) -> usize;

    /// Pauses and discards pulled bytes, so the next play starts from the
    /// source's current position.
    fn reset(&self);

    fn close(&self) -> Result<()>;
}

pub trait OutputDevice: Send + Sync {
    fn new_player(&self, source: Arc<SoundSource>) -> Box<dyn DevicePlayer>;

    /// Halts all output.
    fn suspend(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;
}

/// Joins a device thread, logging a panic instead of propagating it.
/// Returns `true` when the thread exited normally.
pub(crate) fn join_device_thread(thread: JoinHandle<()>) -> bool {
    let name = thread.thread().name().unwrap_or("device").to_owned();

    match thread.join() {
        Ok(()) => true,
        Err(_) => {
            warn!(thread = %name, "output thread panicked");
            false
        }
    }
}
