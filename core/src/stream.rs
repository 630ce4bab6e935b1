//! Seek emulation over forward-only decoders.

use crate::decoder::{PcmDecoder, ReadOutcome};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::SeekFrom;
use tracing::debug;

const SKIP_CHUNK: usize = 4096;

struct Cursor {
    decoder: Option<Box<dyn PcmDecoder>>,
    /// Logical byte position; never below `data_start`.
    position: u64,
}

/// Bidirectionally seekable PCM byte stream over a [`PcmDecoder`].
///
/// Backward seeks rewind the decoder to its absolute start and then seek
/// forward. Every operation runs under one lock: the decoder has a single
/// position shared by the device player's reads and user seeks.
pub struct SeekStream {
    cursor: Mutex<Cursor>,
    data_start: u64,
    len: u64,
    bytes_per_frame: u64,
}

impl SeekStream {
    /// Wraps `decoder`. When the decoder cannot report its length the stream
    /// is read through once to count it, then rewound.
    pub fn new(mut decoder: Box<dyn PcmDecoder>) -> Result<Self> {
        let data_start = decoder.data_start();
        let bytes_per_frame = decoder.bytes_per_frame().max(1);

        let len = match decoder.known_length() {
            Some(len) => len,
            None => {
                let len = count_remaining(decoder.as_mut())?;
                decoder.rewind()?;
                debug!(len, "measured stream length");
                len
            }
        };

        Ok(SeekStream {
            cursor: Mutex::new(Cursor {
                decoder: Some(decoder),
                position: data_start,
            }),
            data_start,
            len,
            bytes_per_frame,
        })
    }

    /// Decoded payload length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    pub fn position(&self) -> u64 {
        self.cursor.lock().position
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let mut cursor = self.cursor.lock();
        let Cursor { decoder, position } = &mut *cursor;

        let Some(decoder) = decoder.as_deref_mut() else {
            return Ok(ReadOutcome::end_of_stream());
        };

        let outcome = decoder.read(buf)?;
        *position += outcome.bytes as u64;
        Ok(outcome)
    }

    /// Moves to `pos` and returns the new position.
    ///
    /// Targets before [`SeekStream::data_start`] clamp to it. Decoder errors are
    /// returned as-is.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let mut cursor = self.cursor.lock();
        let Cursor { decoder, position } = &mut *cursor;

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                (self.data_start + self.len).checked_add_signed(delta)
            }
        }
        .ok_or(Error::NegativeSeekPosition)?;

        let decoder = decoder.as_deref_mut().ok_or(Error::Closed)?;

        if target < *position {
            debug!(from = *position, to = target, "rewinding for backward seek");
            decoder.rewind()?;
            *position = self.data_start;
        }

        let target = target.max(self.data_start);

        if target > *position {
            if decoder.supports_seek() {
                let offset = target - self.data_start;
                decoder.seek_to_frame(offset / self.bytes_per_frame)?;
                // The decoder lands on a frame boundary
                skip_forward(decoder, offset % self.bytes_per_frame)?;
            } else {
                skip_forward(decoder, target - *position)?;
            }
        }

        *position = target;
        Ok(target)
    }

    /// Releases the decoder and its file. Later reads report end of stream;
    /// closing again is a no-op.
    pub fn close(&self) -> Result<()> {
        let decoder = self.cursor.lock().decoder.take();

        match decoder {
            Some(decoder) => decoder.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.lock().decoder.is_none()
    }
}

fn count_remaining(decoder: &mut dyn PcmDecoder) -> Result<u64> {
    let mut scratch = vec![0u8; SKIP_CHUNK];
    let mut total = 0u64;

    loop {
        let outcome = decoder.read(&mut scratch)?;
        total += outcome.bytes as u64;

        if outcome.end_of_stream {
            return Ok(total);
        }
    }
}

/// Reads and discards up to `count` bytes. Stops early at end of stream.
fn skip_forward(decoder: &mut dyn PcmDecoder, mut count: u64) -> Result<()> {
    let mut scratch = vec![0u8; SKIP_CHUNK];

    while count > 0 {
        let want = count.min(SKIP_CHUNK as u64) as usize;
        let outcome = decoder.read(&mut scratch[..want])?;
        count -= outcome.bytes as u64;

        if outcome.end_of_stream || outcome.bytes == 0 {
            break;
        }
    }

    Ok(())
}
