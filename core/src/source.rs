use crate::buffer::SoundBuffer;
use crate::decoder::ReadOutcome;
use crate::error::Result;
use crate::format::SoundMode;
use crate::stream::SeekStream;
use std::io::SeekFrom;

/// The PCM a sound plays from: a decoder streamed from its file, or bytes
/// decoded up front.
pub enum SoundSource {
    Streaming(SeekStream),
    Memory(SoundBuffer),
}

impl SoundSource {
    pub fn mode(&self) -> SoundMode {
        match self {
            SoundSource::Streaming(_) => SoundMode::Streaming,
            SoundSource::Memory(_) => SoundMode::Memory,
        }
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self {
            SoundSource::Streaming(stream) => stream.read(buf),
            SoundSource::Memory(buffer) => Ok(buffer.read(buf)),
        }
    }

    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        match self {
            SoundSource::Streaming(stream) => stream.seek(pos),
            SoundSource::Memory(buffer) => buffer.seek(pos),
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            SoundSource::Streaming(stream) => stream.position(),
            SoundSource::Memory(buffer) => buffer.position(),
        }
    }

    /// Position of the first audio byte; zero for memory sources.
    pub fn data_start(&self) -> u64 {
        match self {
            SoundSource::Streaming(stream) => stream.data_start(),
            SoundSource::Memory(_) => 0,
        }
    }

    /// Decoded PCM length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            SoundSource::Streaming(stream) => stream.len(),
            SoundSource::Memory(buffer) => buffer.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_buffer(&self) -> Option<&SoundBuffer> {
        match self {
            SoundSource::Memory(buffer) => Some(buffer),
            SoundSource::Streaming(_) => None,
        }
    }

    /// Releases the open file of a streaming source.
    pub fn close(&self) -> Result<()> {
        match self {
            SoundSource::Streaming(stream) => stream.close(),
            SoundSource::Memory(_) => Ok(()),
        }
    }
}
