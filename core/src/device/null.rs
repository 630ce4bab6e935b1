use super::mixer::Mixer;
use super::{join_device_thread, DevicePlayer, OutputDevice};
use crate::error::Result;
use crate::format::PcmFormat;
use crate::source::SoundSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

const TICK: Duration = Duration::from_millis(2);

/// Output device without sound hardware.
///
/// A background thread consumes every player at the format's real-time byte
/// rate and discards the mix, so timing behaves as on a real device.
pub struct NullOutput {
    mixer: Arc<Mixer>,
    suspended: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NullOutput {
    pub fn start(format: PcmFormat, player_buffer_bytes: usize) -> Result<Self> {
        let mixer = Mixer::new(format, player_buffer_bytes);
        let suspended = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread = thread::Builder::new()
            .name(String::from("quaver-null-output"))
            .spawn({
                let mixer = Arc::clone(&mixer);
                let suspended = Arc::clone(&suspended);
                let shutdown = Arc::clone(&shutdown);
                move || drain_in_real_time(&mixer, &suspended, &shutdown)
            })?;

        debug!(?format, "null output started");

        Ok(NullOutput {
            mixer,
            suspended,
            shutdown,
            thread: Some(thread),
        })
    }
}

fn drain_in_real_time(mixer: &Mixer, suspended: &AtomicBool, shutdown: &AtomicBool) {
    let format = mixer.format();
    let rate = u128::from(format.sample_rate.hz());
    let channels = usize::from(format.channels.count());

    let started = Instant::now();
    let mut frames_done = 0u128;
    let mut scratch = Vec::new();

    while !shutdown.load(Ordering::Acquire) {
        thread::sleep(TICK);

        let frames_due = started.elapsed().as_nanos() * rate / 1_000_000_000;
        let frames = (frames_due - frames_done) as usize;
        frames_done = frames_due;

        if suspended.load(Ordering::Acquire) || frames == 0 {
            continue;
        }

        scratch.resize(frames * channels, 0.0f32);
        mixer.render(&mut scratch);
    }
}

impl OutputDevice for NullOutput {
    fn new_player(&self, source: Arc<SoundSource>) -> Box<dyn DevicePlayer> {
        Box::new(self.mixer.player(source))
    }

    fn suspend(&self) -> Result<()> {
        self.suspended.store(true, Ordering::Release);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.suspended.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            join_device_thread(thread);
        }
    }
}
