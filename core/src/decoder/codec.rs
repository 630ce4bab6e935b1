use super::{PcmDecoder, PendingBytes, ReadOutcome};
use crate::convert::f32_to_unsigned_pcm16;
use crate::error::{Error, Result};
use crate::format::SoundType;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// MP3 and OGG/Vorbis decoder.
///
/// Packets are decoded to interleaved `f32` and converted to 16-bit PCM, so
/// one frame is `2 * channels` bytes.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    n_frames: Option<u64>,
    pending: PendingBytes,
    /// Frames before this timestamp are dropped after an accurate seek.
    skip_until: Option<u64>,
    eof: bool,
}

impl SymphoniaDecoder {
    pub fn new<S>(source: S, sound_type: SoundType) -> Result<Self>
    where
        S: MediaSource + 'static,
    {
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        let extension = match sound_type {
            SoundType::Mp3 => Some("mp3"),
            SoundType::Ogg => Some("ogg"),
            _ => None,
        };
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decoder("No audio track found".into()))?;

        let track_id = track.id;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        let sample_rate = track.codec_params.sample_rate;

        let mut this = SymphoniaDecoder {
            format,
            decoder,
            track_id,
            channels,
            n_frames: None,
            pending: PendingBytes::default(),
            skip_until: None,
            eof: false,
        };

        let n_frames = this.measure_frames()?;
        this.n_frames = Some(n_frames);

        debug!(
            ?sound_type,
            channels,
            sample_rate,
            n_frames,
            "opened compressed stream"
        );

        Ok(this)
    }

    /// Sums packet durations over the whole track without decoding, then
    /// returns to the start.
    ///
    /// Container headers may omit the length or only estimate it; decoded
    /// output always matches the packet durations.
    fn measure_frames(&mut self) -> Result<u64> {
        let mut frames = 0u64;

        loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => {
                    frames += packet.dur();
                }
                Ok(_) | Err(SymphoniaError::ResetRequired) => {}
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.seek_to_ts(0)?;
        Ok(frames)
    }

    /// Decodes the next packet into `pending`. Returns `false` at the end of
    /// the stream.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames() as u64;
            let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            samples.copy_interleaved_ref(decoded);

            let channels = spec.channels.count();
            if channels != self.channels {
                debug!(from = self.channels, to = channels, "channel count changed");
                self.channels = channels;
            }

            let mut skip_frames = 0u64;
            if let Some(target) = self.skip_until {
                let ts = packet.ts();
                if ts + frames <= target {
                    continue;
                }
                skip_frames = target.saturating_sub(ts);
                self.skip_until = None;
            }

            let skip_samples = (skip_frames as usize * channels).min(samples.samples().len());
            self.pending
                .extend(&f32_to_unsigned_pcm16(&samples.samples()[skip_samples..]));
            return Ok(true);
        }
    }

    fn seek_to_ts(&mut self, ts: u64) -> Result<()> {
        self.pending.clear();
        self.skip_until = None;
        self.eof = false;

        if self.n_frames.is_some_and(|n| ts >= n) {
            self.eof = true;
            return Ok(());
        }

        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts,
                track_id: self.track_id,
            },
        );

        match seeked {
            Ok(seeked) => {
                self.decoder.reset();
                if seeked.actual_ts < seeked.required_ts {
                    self.skip_until = Some(seeked.required_ts);
                }
                Ok(())
            }
            Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                self.eof = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl PcmDecoder for SymphoniaDecoder {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::data(0));
        }

        while self.pending.is_empty() && !self.eof {
            if !self.decode_next()? {
                self.eof = true;
            }
        }

        match self.pending.drain_into(buf) {
            0 => Ok(ReadOutcome::end_of_stream()),
            n => Ok(ReadOutcome::data(n)),
        }
    }

    fn known_length(&self) -> Option<u64> {
        self.n_frames.map(|frames| frames * self.bytes_per_frame())
    }

    fn bytes_per_frame(&self) -> u64 {
        2 * self.channels as u64
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<()> {
        self.seek_to_ts(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.seek_to_ts(0)
    }
}
