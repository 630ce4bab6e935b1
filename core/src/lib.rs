//! Seekable PCM playback control.
//!
//! Sounds are opened through an [`AudioSystem`], either streamed from their
//! file through a [`SeekStream`] or decoded up front into a [`SoundBuffer`],
//! and played, paused, looped and seeked through [`Sound`].

mod buffer;
mod config;
mod convert;
pub mod decoder;
pub mod device;
mod error;
mod format;
mod sound;
mod source;
mod stream;
mod system;
mod timing;

pub use buffer::SoundBuffer;
pub use config::{AudioConfig, Backend};
pub use convert::{f32_to_unsigned_pcm16, write_unsigned_pcm16};
pub use decoder::{PcmDecoder, ReadOutcome};
pub use error::{Error, Result};
pub use format::{
    BitDepth, ChannelCount, PcmFormat, SampleRate, SoundInfo, SoundMode, SoundType,
};
pub use sound::{PlaybackState, Sound};
pub use source::SoundSource;
pub use stream::SeekStream;
pub use system::AudioSystem;
