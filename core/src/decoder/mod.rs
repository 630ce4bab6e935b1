//! Forward-reading PCM decoders.
//!
//! A [`PcmDecoder`] turns a container file into canonical PCM bytes. Decoders
//! only need to read forward and rewind to their absolute start;
//! [`crate::SeekStream`] builds arbitrary seeking on top of that.

mod codec;
mod wav;

pub use codec::SymphoniaDecoder;
pub use wav::WavDecoder;

use crate::error::{Error, Result};
use crate::format::SoundType;
use std::collections::VecDeque;
use symphonia::core::io::MediaSource;

/// Result of one read: bytes produced and whether the stream is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes: usize,
    pub end_of_stream: bool,
}

impl ReadOutcome {
    pub fn data(bytes: usize) -> Self {
        ReadOutcome {
            bytes,
            end_of_stream: false,
        }
    }

    pub fn end_of_stream() -> Self {
        ReadOutcome {
            bytes: 0,
            end_of_stream: true,
        }
    }
}

pub trait PcmDecoder: Send {
    /// Fills `buf` with decoded PCM bytes.
    ///
    /// Exhaustion is `ReadOutcome::end_of_stream()`, not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// Decoded payload length in bytes, when the container records it.
    fn known_length(&self) -> Option<u64>;

    /// Size of one decoded frame, the unit of [`PcmDecoder::seek_to_frame`].
    fn bytes_per_frame(&self) -> u64;

    /// Position of the first audio byte. Positions before it hold container
    /// headers and are never addressable.
    fn data_start(&self) -> u64 {
        0
    }

    fn supports_seek(&self) -> bool {
        false
    }

    /// Moves forward to `frame`, counted from the first audio frame.
    fn seek_to_frame(&mut self, _frame: u64) -> Result<()> {
        Err(Error::SeekUnsupported)
    }

    /// Returns to the absolute start of the stream, positioned at
    /// [`PcmDecoder::data_start`].
    fn rewind(&mut self) -> Result<()>;

    /// Releases the underlying file.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Opens the decoder for `sound_type` over `source`.
pub fn open_decoder<S>(
    sound_type: SoundType,
    source: S,
) -> Result<Box<dyn PcmDecoder>>
where
    S: MediaSource + 'static,
{
    match sound_type {
        SoundType::Wav => Ok(Box::new(WavDecoder::new(source)?)),
        SoundType::Mp3 | SoundType::Ogg => {
            Ok(Box::new(SymphoniaDecoder::new(source, sound_type)?))
        }
        SoundType::Unknown => {
            Err(Error::Decoder(String::from("No decoder for unknown sound type")))
        }
    }
}

const MIN_READ_CHUNK: usize = 4096;

/// Reads `decoder` to the end.
///
/// `capacity` pre-sizes the output; it may be smaller or larger than what the
/// decoder ends up producing.
pub fn read_all(decoder: &mut dyn PcmDecoder, capacity: u64) -> Result<Vec<u8>> {
    let mut chunk = vec![0u8; MIN_READ_CHUNK];
    let mut out = Vec::with_capacity(capacity.try_into().unwrap_or(0));

    loop {
        let outcome = decoder.read(&mut chunk)?;
        out.extend_from_slice(&chunk[..outcome.bytes]);

        if outcome.end_of_stream {
            return Ok(out);
        }
    }
}

/// Decoded bytes not yet handed to a reader.
#[derive(Debug, Default)]
pub(crate) struct PendingBytes {
    bytes: VecDeque<u8>,
}

impl PendingBytes {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend(bytes);
    }

    pub fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.bytes.len());

        for (dst, src) in buf.iter_mut().zip(self.bytes.drain(..n)) {
            *dst = src;
        }

        n
    }
}
