//! In-memory random-access PCM.

use crate::decoder::ReadOutcome;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::ops::Range;
use std::sync::Arc;

/// Decoded PCM bytes with an independent read cursor.
///
/// [`SoundBuffer::copy`] and [`SoundBuffer::clip`] share the underlying bytes
/// and never copy them; each buffer keeps its own cursor.
pub struct SoundBuffer {
    data: Arc<[u8]>,
    view: Range<usize>,
    cursor: Mutex<u64>,
}

impl SoundBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        SoundBuffer::from_shared(data.into())
    }

    pub fn from_shared(data: Arc<[u8]>) -> Self {
        let view = 0..data.len();
        SoundBuffer {
            data,
            view,
            cursor: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[self.view.clone()]
    }

    pub fn position(&self) -> u64 {
        *self.cursor.lock()
    }

    /// Copies from the cursor into `buf`.
    ///
    /// Reports end of stream only when nothing could be copied.
    pub fn read(&self, buf: &mut [u8]) -> ReadOutcome {
        let mut cursor = self.cursor.lock();
        let bytes = self.as_bytes();

        let start = match usize::try_from(*cursor) {
            Ok(start) if start < bytes.len() => start,
            _ => return ReadOutcome::end_of_stream(),
        };

        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        *cursor += n as u64;
        ReadOutcome::data(n)
    }

    /// Moves the cursor and returns the new position.
    ///
    /// A negative result fails with [`Error::NegativeSeekPosition`] and leaves
    /// the cursor where it was. Positions at or past the end are allowed; reads
    /// from there report end of stream.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let mut cursor = self.cursor.lock();

        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => cursor.checked_add_signed(delta),
            SeekFrom::End(delta) => (self.len() as u64).checked_add_signed(delta),
        }
        .ok_or(Error::NegativeSeekPosition)?;

        *cursor = new_pos;
        Ok(new_pos)
    }

    /// A buffer over the same bytes with its cursor at the start.
    pub fn copy(&self) -> SoundBuffer {
        SoundBuffer {
            data: Arc::clone(&self.data),
            view: self.view.clone(),
            cursor: Mutex::new(0),
        }
    }

    /// A buffer over the `[from, to)` fraction of this buffer's bytes.
    ///
    /// Fractions are clamped to `[0, 1]`; `to` below `from` gives an empty
    /// buffer.
    pub fn clip(&self, from: f64, to: f64) -> SoundBuffer {
        let len = self.len();
        let start = fraction_of(len, from);
        let end = fraction_of(len, to).max(start);

        SoundBuffer {
            data: Arc::clone(&self.data),
            view: self.view.start + start..self.view.start + end,
            cursor: Mutex::new(0),
        }
    }
}

fn fraction_of(len: usize, fraction: f64) -> usize {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };

    ((len as f64 * fraction) as usize).min(len)
}
