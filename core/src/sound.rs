//! The playback controller.

use crate::buffer::SoundBuffer;
use crate::device::DevicePlayer;
use crate::error::{Error, Result};
use crate::format::{SoundInfo, SoundMode};
use crate::source::SoundSource;
use crate::system::AudioSystem;
use parking_lot::{Condvar, Mutex, RwLock};
use std::io::SeekFrom;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(1);
const WAIT_DIVISOR: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    PlayingLooping,
}

/// A loaded sound and the device player it plays through.
///
/// Every method takes `&self`; a sound can be shared between threads and
/// paused from any of them while it plays or loops in the background.
pub struct Sound {
    inner: Arc<Inner>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    system: AudioSystem,
    info: SoundInfo,
    player: Box<dyn DevicePlayer>,
    /// `None` once closed.
    source: RwLock<Option<Arc<SoundSource>>>,
    looping: Mutex<bool>,
    loop_done: Condvar,
}

impl Sound {
    pub(crate) fn from_parts(
        system: AudioSystem,
        info: SoundInfo,
        source: Arc<SoundSource>,
        player: Box<dyn DevicePlayer>,
    ) -> Self {
        Sound {
            inner: Arc::new(Inner {
                system,
                info,
                player,
                source: RwLock::new(Some(source)),
                looping: Mutex::new(false),
                loop_done: Condvar::new(),
            }),
            loop_task: Mutex::new(None),
        }
    }

    pub fn info(&self) -> SoundInfo {
        self.inner.info
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_looping() {
            PlaybackState::PlayingLooping
        } else if self.is_playing() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    /// Starts playback from the current position and returns immediately.
    pub fn play_async(&self) {
        if self.is_closed() || self.inner.player.is_playing() {
            return;
        }

        self.inner.player.play();
    }

    /// Plays from the current position until the sound finishes or is
    /// paused.
    pub fn play_sync(&self) {
        self.play_async();
        self.wait();
    }

    /// Stops playback and any loop. The position is kept.
    pub fn pause(&self) {
        self.inner.pause();
    }

    /// Blocks until the current play finishes or is paused.
    pub fn wait(&self) {
        self.inner.wait();
    }

    /// Plays the sound `times` times in total, from the start after the
    /// first play. A negative count loops until paused; zero does nothing.
    ///
    /// An earlier loop is stopped first.
    pub fn loop_async(&self, times: i64) {
        if times == 0 || self.is_closed() {
            return;
        }

        let mut task = self.loop_task.lock();

        if let Some(previous) = task.take() {
            self.inner.pause();
            if previous.join().is_err() {
                warn!("previous loop thread panicked");
            }
        } else if self.inner.player.is_playing() {
            self.inner.pause();
        }

        let replays = u64::try_from(times).ok().map(|n| n - 1);

        *self.inner.looping.lock() = true;
        self.inner.player.play();

        debug!(times, "loop started");

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(String::from("quaver-loop"))
            .spawn(move || inner.run_loop(replays));

        match spawned {
            Ok(handle) => *task = Some(handle),
            Err(e) => {
                warn!("could not start loop thread: {}", e);
                self.inner.stop_looping();
            }
        }
    }

    /// Blocks until the current loop ends, by finishing or by a pause.
    pub fn wait_loop(&self) {
        let mut looping = self.inner.looping.lock();

        while *looping {
            self.inner.loop_done.wait(&mut looping);
        }
    }

    /// Moves to `percent` of the sound, clamped to `[0, 1]`.
    pub fn seek_to_percent(&self, percent: f64) -> Result<()> {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 1.0)
        };

        let offset = (self.inner.info.size as f64 * percent) as u64;
        self.seek_to_offset(offset)
    }

    /// Moves to `time` from the start, clamped to the sound's length.
    pub fn seek_to_time(&self, time: Duration) -> Result<()> {
        let offset = self
            .inner
            .system
            .byte_count_from_play_time(time.min(self.total_time()));

        self.seek_to_offset(offset)
    }

    fn seek_to_offset(&self, offset: u64) -> Result<()> {
        let source = self.inner.source()?;

        let bytes_per_frame = self.inner.system.format().bytes_per_frame();
        let offset = offset.min(self.inner.info.size);
        let offset = offset - offset % bytes_per_frame;

        // A paused player would otherwise resume with bytes from the old
        // position
        if !self.inner.player.is_playing() {
            self.inner.player.reset();
        }

        source.seek(SeekFrom::Start(source.data_start() + offset))?;
        debug!(offset, "seeked");

        Ok(())
    }

    /// Panics unless `volume` is within `[0, 1]`.
    pub fn set_volume(&self, volume: f64) {
        assert!(
            (0.0..=1.0).contains(&volume),
            "volume must be within [0, 1], got {}",
            volume
        );

        self.inner.player.set_volume(volume);
    }

    pub fn volume(&self) -> f64 {
        self.inner.player.volume()
    }

    pub fn total_time(&self) -> Duration {
        self.inner.system.play_time_from_byte_count(self.inner.info.size)
    }

    /// Time left to play from the current position, counting bytes the device
    /// player has pulled but not yet played. Zero once closed.
    pub fn remaining_time(&self) -> Duration {
        self.inner.remaining_time()
    }

    pub fn is_playing(&self) -> bool {
        !self.is_closed() && self.inner.player.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        *self.inner.looping.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.source.read().is_none()
    }

    /// A new sound over the same decoded bytes, with its own position and
    /// this sound's volume.
    ///
    /// Panics on streaming or closed sounds.
    pub fn copy(&self) -> Sound {
        self.derive(|buffer| buffer.copy())
    }

    /// A new sound playing the `[from, to)` fraction of this one. Fractions
    /// are clamped to `[0, 1]`.
    ///
    /// Panics on streaming or closed sounds.
    pub fn clip(&self, from: f64, to: f64) -> Sound {
        self.derive(|buffer| buffer.clip(from, to))
    }

    fn derive(&self, f: impl FnOnce(&SoundBuffer) -> SoundBuffer) -> Sound {
        let buffer = {
            let source = self.inner.source.read();

            match source.as_deref().and_then(SoundSource::as_buffer) {
                Some(buffer) => f(buffer),
                None if self.inner.info.mode == SoundMode::Streaming => {
                    panic!("only in-memory sounds can be copied or clipped")
                }
                None => panic!("sound is closed"),
            }
        };

        let sound = self
            .inner
            .system
            .buffer_sound(self.inner.info.sound_type, buffer);
        sound.inner.player.set_volume(self.volume());
        sound
    }

    /// Stops playback and releases the file and the device player.
    ///
    /// Closing again is a no-op. When both the stream and the player fail to
    /// close, the error carries both.
    pub fn close(&self) -> Result<()> {
        let Some(source) = self.inner.source.write().take() else {
            return Ok(());
        };

        self.inner.stop_looping();

        let stream_result = source.close();
        let player_result = self.inner.player.close();
        drop(source);

        if let Some(task) = self.loop_task.lock().take() {
            if task.join().is_err() {
                warn!("loop thread panicked");
            }
        }

        debug!(sound_type = ?self.inner.info.sound_type, "sound closed");

        match (stream_result, player_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(stream), Err(player)) => Err(Error::Close {
                stream: Box::new(stream),
                player: Box::new(player),
            }),
        }
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close sound: {}", e);
        }
    }
}

impl Inner {
    fn source(&self) -> Result<Arc<SoundSource>> {
        self.source.read().as_ref().map(Arc::clone).ok_or(Error::Closed)
    }

    fn pause(&self) {
        let mut looping = self.looping.lock();
        *looping = false;
        self.player.pause();
        self.loop_done.notify_all();
    }

    fn stop_looping(&self) {
        *self.looping.lock() = false;
        self.loop_done.notify_all();
    }

    fn wait(&self) {
        while self.player.is_playing() {
            let step = self.remaining_time() / WAIT_DIVISOR;
            if step <= POLL_INTERVAL {
                break;
            }
            thread::sleep(step);
        }

        while self.player.is_playing() {
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn remaining_time(&self) -> Duration {
        let Ok(source) = self.source() else {
            return Duration::ZERO;
        };

        let size = self.info.size;
        let played = source.position().saturating_sub(source.data_start());
        let unplayed = self.player.unplayed_buffer_bytes() as u64;
        let remaining = size.saturating_sub(played).saturating_add(unplayed);

        self.system.play_time_from_byte_count(remaining.min(size))
    }

    /// Background body of [`Sound::loop_async`]. `replays` is `None` for an
    /// endless loop.
    fn run_loop(&self, mut replays: Option<u64>) {
        loop {
            self.wait();

            let looping = self.looping.lock();
            if !*looping || replays == Some(0) {
                break;
            }

            if let Err(e) = self.replay() {
                debug!("loop stopped: {}", e);
                break;
            }

            if let Some(n) = replays.as_mut() {
                *n -= 1;
            }
        }

        self.stop_looping();
        debug!("loop finished");
    }

    fn replay(&self) -> Result<()> {
        let source = self.source()?;
        source.seek(SeekFrom::Start(source.data_start()))?;
        self.player.play();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use crate::decoder::testing::RampDecoder;
    use crate::device::MockDevicePlayer;
    use crate::format::SoundType;
    use crate::stream::SeekStream;

    fn system() -> AudioSystem {
        AudioSystem::init(&AudioConfig::headless()).unwrap()
    }

    /// One second of CD-quality stereo.
    fn one_second(system: &AudioSystem) -> Sound {
        system.memory_sound(SoundType::Wav, vec![0u8; 176_400])
    }

    fn position(sound: &Sound) -> u64 {
        sound.inner.source().unwrap().position()
    }

    fn mocked(source: SoundSource, player: MockDevicePlayer) -> Sound {
        let info = SoundInfo {
            sound_type: SoundType::Wav,
            mode: source.mode(),
            size: source.len(),
        };
        Sound::from_parts(system(), info, Arc::new(source), Box::new(player))
    }

    #[test]
    fn close_closes_the_player_once() {
        let mut player = MockDevicePlayer::new();
        player.expect_close().times(1).returning(|| Ok(()));

        let sound = mocked(SoundSource::Memory(SoundBuffer::new(vec![0; 64])), player);

        sound.close().unwrap();
        sound.close().unwrap();
        assert!(sound.is_closed());
        drop(sound);
    }

    #[test]
    fn close_reports_both_failures() {
        let mut player = MockDevicePlayer::new();
        player
            .expect_close()
            .times(1)
            .returning(|| Err(Error::Device(String::from("gone"))));

        let mut decoder = RampDecoder::new(44, 4096);
        decoder.fail_close = true;
        let stream = SeekStream::new(Box::new(decoder)).unwrap();

        let sound = mocked(SoundSource::Streaming(stream), player);

        match sound.close() {
            Err(Error::Close { stream, player }) => {
                assert!(matches!(*stream, Error::Decoder(_)));
                assert!(matches!(*player, Error::Device(_)));
            }
            other => panic!("unexpected close result: {:?}", other.err()),
        }

        assert!(sound.close().is_ok());
    }

    #[test]
    fn close_reports_a_single_failure() {
        let mut player = MockDevicePlayer::new();
        player
            .expect_close()
            .returning(|| Err(Error::Device(String::from("gone"))));

        let sound = mocked(SoundSource::Memory(SoundBuffer::new(vec![0; 64])), player);

        assert!(matches!(sound.close(), Err(Error::Device(_))));
    }

    #[test]
    fn paused_seek_resets_the_player() {
        let mut player = MockDevicePlayer::new();
        player.expect_is_playing().return_const(false);
        player.expect_reset().times(1).return_const(());
        player.expect_close().returning(|| Ok(()));

        let sound = mocked(SoundSource::Memory(SoundBuffer::new(vec![0; 400])), player);

        sound.seek_to_percent(0.5).unwrap();
        assert_eq!(position(&sound), 200);
    }

    #[test]
    fn playing_seek_keeps_pulled_bytes() {
        let mut player = MockDevicePlayer::new();
        player.expect_is_playing().return_const(true);
        player.expect_reset().never();
        player.expect_close().returning(|| Ok(()));

        let sound = mocked(SoundSource::Memory(SoundBuffer::new(vec![0; 400])), player);

        sound.seek_to_percent(0.25).unwrap();
        assert_eq!(position(&sound), 100);
    }

    #[test]
    #[should_panic(expected = "volume must be within [0, 1]")]
    fn volume_above_one_panics() {
        let mut player = MockDevicePlayer::new();
        player.expect_close().returning(|| Ok(()));

        let sound = mocked(SoundSource::Memory(SoundBuffer::new(vec![0; 4])), player);
        sound.set_volume(1.5);
    }

    #[test]
    #[should_panic(expected = "volume must be within [0, 1]")]
    fn negative_volume_panics() {
        let system = system();
        one_second(&system).set_volume(-0.1);
    }

    #[test]
    fn volume_round_trips() {
        let system = system();
        let sound = one_second(&system);
        sound.set_volume(0.0);
        assert_eq!(sound.volume(), 0.0);
        sound.set_volume(1.0);
        assert_eq!(sound.volume(), 1.0);
    }

    #[test]
    fn seeks_clamp_and_align_to_frames() {
        let system = system();
        let sound = one_second(&system);

        sound.seek_to_percent(2.0).unwrap();
        assert_eq!(position(&sound), 176_400);
        assert_eq!(sound.remaining_time(), Duration::ZERO);

        sound.seek_to_percent(-1.0).unwrap();
        assert_eq!(position(&sound), 0);

        // 0.1234 of the sound is not a whole frame
        sound.seek_to_percent(0.1234).unwrap();
        assert_eq!(position(&sound) % 4, 0);

        sound.seek_to_time(Duration::from_millis(250)).unwrap();
        assert_eq!(position(&sound), 44_100);
        assert_eq!(sound.remaining_time(), Duration::from_millis(750));

        sound.seek_to_time(Duration::from_secs(60)).unwrap();
        assert_eq!(position(&sound), 176_400);
    }

    #[test]
    fn streaming_seeks_are_offset_by_data_start() {
        let system = system();
        let sound = system
            .streaming_sound(SoundType::Wav, Box::new(RampDecoder::new(44, 176_400)))
            .unwrap();

        sound.seek_to_percent(0.5).unwrap();
        assert_eq!(position(&sound), 44 + 88_200);
        assert_eq!(sound.remaining_time(), Duration::from_millis(500));

        sound.seek_to_percent(0.0).unwrap();
        assert_eq!(position(&sound), 44);
        assert_eq!(sound.remaining_time(), sound.total_time());
    }

    #[test]
    fn closed_sound_is_inert() {
        let system = system();
        let sound = one_second(&system);
        sound.close().unwrap();

        sound.play_async();
        sound.loop_async(3);
        sound.wait();
        sound.wait_loop();

        assert!(!sound.is_playing());
        assert!(!sound.is_looping());
        assert_eq!(sound.state(), PlaybackState::Stopped);
        assert!(matches!(sound.seek_to_percent(0.5), Err(Error::Closed)));
        assert!(matches!(
            sound.seek_to_time(Duration::from_millis(1)),
            Err(Error::Closed)
        ));
        assert_eq!(sound.remaining_time(), Duration::ZERO);
        assert_eq!(sound.total_time(), Duration::from_secs(1));
    }

    #[test]
    fn zero_loop_does_nothing() {
        let system = system();
        let sound = one_second(&system);
        sound.loop_async(0);

        assert_eq!(sound.state(), PlaybackState::Stopped);
        assert!(sound.loop_task.lock().is_none());
    }

    #[test]
    fn pause_ends_a_loop() {
        let system = system();
        let sound = one_second(&system);

        sound.loop_async(-1);
        assert_eq!(sound.state(), PlaybackState::PlayingLooping);

        sound.pause();
        sound.wait_loop();
        assert!(!sound.is_looping());
        assert!(!sound.is_playing());
    }

    #[test]
    fn copy_keeps_volume_and_starts_at_zero() {
        let system = system();
        let sound = one_second(&system);
        sound.set_volume(0.25);
        sound.seek_to_percent(0.5).unwrap();

        let copy = sound.copy();
        assert_eq!(copy.volume(), 0.25);
        assert_eq!(position(&copy), 0);
        assert_eq!(copy.info(), sound.info());
        assert_eq!(position(&sound), 88_200);
    }

    #[test]
    fn clip_reports_its_own_size() {
        let system = system();
        let sound = one_second(&system);

        let clip = sound.clip(0.25, 0.75);
        assert_eq!(clip.info().size, 88_200);
        assert_eq!(clip.total_time(), Duration::from_millis(500));
        assert_eq!(clip.info().mode, SoundMode::Memory);

        assert_eq!(sound.clip(0.9, 0.1).info().size, 0);
    }

    #[test]
    #[should_panic(expected = "only in-memory sounds")]
    fn copy_of_streaming_sound_panics() {
        let system = system();
        let sound = system
            .streaming_sound(SoundType::Ogg, Box::new(RampDecoder::new(0, 4096)))
            .unwrap();
        sound.copy();
    }

    #[test]
    #[should_panic(expected = "only in-memory sounds")]
    fn clip_of_streaming_sound_panics() {
        let system = system();
        let sound = system
            .streaming_sound(SoundType::Mp3, Box::new(RampDecoder::new(0, 4096)))
            .unwrap();
        sound.clip(0.0, 0.5);
    }
}
