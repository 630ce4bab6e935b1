use crate::buffer::SoundBuffer;
use crate::config::{AudioConfig, Backend};
use crate::decoder::{open_decoder, read_all, PcmDecoder};
use crate::device::{CpalOutput, NullOutput, OutputDevice};
use crate::error::{Error, Result};
use crate::format::{PcmFormat, SoundInfo, SoundMode, SoundType};
use crate::sound::Sound;
use crate::source::SoundSource;
use crate::stream::SeekStream;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared audio context: the PCM format every sound is decoded to and the
/// output device their players run on.
///
/// Cloning is cheap; clones share the device, which shuts down when the last
/// clone and the last sound opened through it are dropped.
#[derive(Clone)]
pub struct AudioSystem {
    format: PcmFormat,
    output: Arc<dyn OutputDevice>,
}

impl AudioSystem {
    /// Opens the output device `config` selects.
    pub fn init(config: &AudioConfig) -> Result<Self> {
        let output: Arc<dyn OutputDevice> = match config.backend {
            Backend::Cpal => {
                Arc::new(CpalOutput::open(config.format, config.player_buffer_bytes)?)
            }
            Backend::Null => {
                Arc::new(NullOutput::start(config.format, config.player_buffer_bytes)?)
            }
        };

        info!(format = ?config.format, backend = ?config.backend, "audio system ready");

        Ok(AudioSystem::with_output(config.format, output))
    }

    /// Uses a caller-provided output device.
    pub fn with_output(format: PcmFormat, output: Arc<dyn OutputDevice>) -> Self {
        AudioSystem { format, output }
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Opens `path` for playback decoded from the file as it plays.
    pub fn open_streaming(&self, path: impl AsRef<Path>) -> Result<Sound> {
        let path = path.as_ref();
        self.open_streaming_inner(path)
            .map_err(|e| Error::load(path, e))
    }

    fn open_streaming_inner(&self, path: &Path) -> Result<Sound> {
        let kind = detect(path)?;
        let decoder = open_decoder(kind, File::open(path)?)?;

        debug!(path = %path.display(), ?kind, "opened streaming sound");

        self.streaming_sound(kind, decoder)
    }

    /// Decodes all of `path` into memory.
    pub fn open_memory(&self, path: impl AsRef<Path>) -> Result<Sound> {
        let path = path.as_ref();
        self.open_memory_inner(path).map_err(|e| Error::load(path, e))
    }

    fn open_memory_inner(&self, path: &Path) -> Result<Sound> {
        let kind = detect(path)?;
        let bytes = std::fs::read(path)?;

        let mut decoder = open_decoder(kind, Cursor::new(bytes))?;
        let capacity = decoder.known_length().unwrap_or(0);
        let pcm = read_all(decoder.as_mut(), capacity)?;
        decoder.close()?;

        debug!(path = %path.display(), ?kind, bytes = pcm.len(), "decoded sound into memory");

        Ok(self.memory_sound(kind, pcm))
    }

    /// Streams from a caller-provided decoder.
    pub fn streaming_sound(
        &self,
        sound_type: SoundType,
        decoder: Box<dyn PcmDecoder>,
    ) -> Result<Sound> {
        let stream = SeekStream::new(decoder)?;

        let info = SoundInfo {
            sound_type,
            mode: SoundMode::Streaming,
            size: stream.len(),
        };

        Ok(self.sound(info, SoundSource::Streaming(stream)))
    }

    /// Plays PCM bytes already in this system's format.
    pub fn memory_sound(&self, sound_type: SoundType, pcm: Vec<u8>) -> Sound {
        self.buffer_sound(sound_type, SoundBuffer::new(pcm))
    }

    pub(crate) fn buffer_sound(&self, sound_type: SoundType, buffer: SoundBuffer) -> Sound {
        let info = SoundInfo {
            sound_type,
            mode: SoundMode::Memory,
            size: buffer.len() as u64,
        };

        self.sound(info, SoundSource::Memory(buffer))
    }

    fn sound(&self, info: SoundInfo, source: SoundSource) -> Sound {
        let source = Arc::new(source);
        let player = self.output.new_player(Arc::clone(&source));
        Sound::from_parts(self.clone(), info, source, player)
    }

    /// Halts every sound on the device. Individual sounds keep their state.
    pub fn pause_all(&self) -> Result<()> {
        self.output.suspend()
    }

    pub fn resume_all(&self) -> Result<()> {
        self.output.resume()
    }

    pub fn play_time_from_byte_count(&self, byte_count: u64) -> Duration {
        self.format.play_time_from_byte_count(byte_count)
    }

    pub fn byte_count_from_play_time(&self, play_time: Duration) -> u64 {
        self.format.byte_count_from_play_time(play_time)
    }
}

fn detect(path: &Path) -> Result<SoundType> {
    match SoundType::from_path(path) {
        SoundType::Unknown => Err(Error::UnsupportedFormat(path.to_path_buf())),
        kind => Ok(kind),
    }
}
