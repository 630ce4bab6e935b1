use super::{PcmDecoder, PendingBytes, ReadOutcome};
use crate::error::{Error, Result};
use hound::SampleFormat;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

const FILL_SAMPLES: usize = 4096;

/// Counts the bytes hound consumes so the data chunk offset is observable
/// after the header has been parsed.
struct Tracked<R> {
    inner: R,
    pos: Arc<AtomicU64>,
}

impl<R: Read> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

impl<R: Seek> Seek for Tracked<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let abs = self.inner.seek(pos)?;
        self.pos.store(abs, Ordering::Relaxed);
        Ok(abs)
    }
}

/// Integer PCM WAV decoder.
///
/// 16-bit samples come out as little-endian bytes, 8-bit samples as unsigned
/// bytes. Positions are file offsets, so [`PcmDecoder::data_start`] is the
/// offset of the data chunk payload.
pub struct WavDecoder<R: Read + Seek> {
    reader: Option<hound::WavReader<Tracked<BufReader<R>>>>,
    offset: Arc<AtomicU64>,
    data_start: u64,
    channels: u16,
    bits_per_sample: u16,
    total_samples: u64,
    pending: PendingBytes,
}

impl<R: Read + Seek> WavDecoder<R> {
    pub fn new(source: R) -> Result<Self> {
        let offset = Arc::new(AtomicU64::new(0));
        let reader = hound::WavReader::new(Tracked {
            inner: BufReader::new(source),
            pos: Arc::clone(&offset),
        })?;

        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(Error::Decoder("Float samples are unsupported".into()));
        }

        if spec.bits_per_sample != 8 && spec.bits_per_sample != 16 {
            return Err(Error::Decoder("Samples must be 8- or 16-bits".into()));
        }

        let data_start = offset.load(Ordering::Relaxed);
        let total_samples = u64::from(reader.len());

        debug!(
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            data_start,
            "opened WAV stream"
        );

        Ok(WavDecoder {
            reader: Some(reader),
            offset,
            data_start,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            total_samples,
            pending: PendingBytes::default(),
        })
    }

    fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    fn fill(&mut self, want_bytes: usize) -> Result<()> {
        let bytes_per_sample = self.bytes_per_sample();
        let reader = self.reader.as_mut().ok_or(Error::Closed)?;
        let sample_ct = want_bytes
            .div_ceil(bytes_per_sample)
            .clamp(1, FILL_SAMPLES);
        let mut bytes = Vec::with_capacity(sample_ct * 2);

        for sample in reader.samples::<i16>().take(sample_ct) {
            let sample = sample?;

            if self.bits_per_sample == 8 {
                bytes.push((sample + 128) as u8);
            } else {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }

        self.pending.extend(&bytes);
        Ok(())
    }
}

impl<R: Read + Seek + Send> PcmDecoder for WavDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::data(0));
        }

        if self.pending.is_empty() {
            self.fill(buf.len())?;
        }

        match self.pending.drain_into(buf) {
            0 => Ok(ReadOutcome::end_of_stream()),
            n => Ok(ReadOutcome::data(n)),
        }
    }

    fn known_length(&self) -> Option<u64> {
        Some(self.total_samples * self.bytes_per_sample() as u64)
    }

    fn bytes_per_frame(&self) -> u64 {
        u64::from(self.channels) * self.bytes_per_sample() as u64
    }

    fn data_start(&self) -> u64 {
        self.data_start
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(Error::Closed)?;
        let frame = frame.min(u64::from(reader.duration()));

        // Bounded by duration() above, so it fits
        reader.seek(frame as u32)?;
        self.pending.clear();
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        let reader = self.reader.take().ok_or(Error::Closed)?;
        let mut inner = reader.into_inner();
        inner.seek(SeekFrom::Start(0))?;

        self.reader = Some(hound::WavReader::new(inner)?);
        self.pending.clear();

        debug_assert_eq!(self.offset.load(Ordering::Relaxed), self.data_start);
        Ok(())
    }
}
