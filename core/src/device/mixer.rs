use super::DevicePlayer;
use crate::error::Result;
use crate::format::{BitDepth, PcmFormat};
use crate::source::SoundSource;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// Sums every playing voice into interleaved `f32` output.
///
/// Lock order is the voice list, then a voice, then that voice's source.
pub(crate) struct Mixer {
    format: PcmFormat,
    chunk_bytes: usize,
    voices: Mutex<Vec<Arc<Voice>>>,
}

struct Voice {
    source: Arc<SoundSource>,
    state: Mutex<VoiceState>,
}

struct VoiceState {
    playing: bool,
    closed: bool,
    volume: f64,
    pending: VecDeque<u8>,
    scratch: Vec<u8>,
}

impl Mixer {
    pub fn new(format: PcmFormat, chunk_bytes: usize) -> Arc<Self> {
        Arc::new(Mixer {
            format,
            chunk_bytes: chunk_bytes.max(format.bytes_per_frame() as usize),
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn player(self: &Arc<Self>, source: Arc<SoundSource>) -> MixerPlayer {
        let voice = Arc::new(Voice {
            source,
            state: Mutex::new(VoiceState {
                playing: false,
                closed: false,
                volume: 1.0,
                pending: VecDeque::new(),
                scratch: vec![0u8; self.chunk_bytes],
            }),
        });

        self.voices.lock().push(Arc::clone(&voice));

        MixerPlayer {
            mixer: Arc::clone(self),
            voice,
        }
    }

    /// Renders the next `out.len()` interleaved samples.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);

        for voice in self.voices.lock().iter() {
            voice.mix_into(out, self.format.bit_depth);
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    fn remove(&self, voice: &Arc<Voice>) {
        self.voices.lock().retain(|v| !Arc::ptr_eq(v, voice));
    }
}

impl Voice {
    fn mix_into(&self, out: &mut [f32], depth: BitDepth) {
        let mut state = self.state.lock();
        if !state.playing {
            return;
        }

        let width = usize::from(depth.bytes());
        let volume = state.volume as f32;

        for slot in out.iter_mut() {
            if state.pending.len() < width && !self.refill(&mut state) {
                // Exhausted: a trailing partial sample is never heard
                state.pending.clear();
                state.playing = false;
                break;
            }

            let sample = match depth {
                BitDepth::OneByte => {
                    let b = state.pending.pop_front().unwrap_or(128);
                    (f32::from(b) - 128.0) / 128.0
                }
                BitDepth::TwoBytes => {
                    let lo = state.pending.pop_front().unwrap_or(0);
                    let hi = state.pending.pop_front().unwrap_or(0);
                    f32::from(i16::from_le_bytes([lo, hi])) / 32768.0
                }
            };

            *slot += sample * volume;
        }
    }

    /// Pulls the next chunk from the source. Returns `false` when nothing more
    /// is available.
    fn refill(&self, state: &mut VoiceState) -> bool {
        let VoiceState {
            pending, scratch, ..
        } = state;

        match self.source.read(scratch) {
            Ok(outcome) if outcome.bytes > 0 => {
                pending.extend(&scratch[..outcome.bytes]);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("device player stopped on read error: {}", e);
                false
            }
        }
    }
}

/// [`DevicePlayer`] backed by a voice in a software [`Mixer`].
pub struct MixerPlayer {
    mixer: Arc<Mixer>,
    voice: Arc<Voice>,
}

impl DevicePlayer for MixerPlayer {
    fn play(&self) {
        let mut state = self.voice.state.lock();
        if !state.closed {
            state.playing = true;
        }
    }

    fn pause(&self) {
        self.voice.state.lock().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.voice.state.lock().playing
    }

    fn set_volume(&self, volume: f64) {
        self.voice.state.lock().volume = volume;
    }

    fn volume(&self) -> f64 {
        self.voice.state.lock().volume
    }

    fn unplayed_buffer_bytes(&self) -> usize {
        self.voice.state.lock().pending.len()
    }

    fn reset(&self) {
        let mut state = self.voice.state.lock();
        state.playing = false;
        state.pending.clear();
    }

    fn close(&self) -> Result<()> {
        {
            let mut state = self.voice.state.lock();
            state.closed = true;
            state.playing = false;
            state.pending.clear();
        }

        self.mixer.remove(&self.voice);
        Ok(())
    }
}

impl Drop for MixerPlayer {
    fn drop(&mut self) {
        self.mixer.remove(&self.voice);
    }
}
