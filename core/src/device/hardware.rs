use super::mixer::Mixer;
use super::{join_device_thread, DevicePlayer, OutputDevice};
use crate::error::{Error, Result};
use crate::format::PcmFormat;
use crate::source::SoundSource;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, SupportedStreamConfig};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

const NO_OUTPUT: &str = "No output device found";

enum Command {
    Suspend(Sender<Result<()>>),
    Resume(Sender<Result<()>>),
    Shutdown,
}

/// The default cpal output device.
///
/// A cpal stream may not leave the thread that built it, so a dedicated
/// thread owns the stream and takes suspend and resume requests over a
/// channel.
pub struct CpalOutput {
    mixer: Arc<Mixer>,
    commands: Mutex<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    pub fn open(format: PcmFormat, player_buffer_bytes: usize) -> Result<Self> {
        let mixer = Mixer::new(format, player_buffer_bytes);
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(String::from("quaver-output"))
            .spawn({
                let mixer = Arc::clone(&mixer);
                move || device_thread(mixer, receiver, ready_tx)
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                join_device_thread(thread);
                return Err(e);
            }
            Err(_) => {
                join_device_thread(thread);
                return Err(Error::Device(String::from("output thread exited")));
            }
        }

        Ok(CpalOutput {
            mixer,
            commands: Mutex::new(commands),
            thread: Some(thread),
        })
    }

    fn request(&self, command: fn(Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply, response) = mpsc::channel();

        self.commands
            .lock()
            .send(command(reply))
            .map_err(|_| Error::Device(String::from("output thread exited")))?;

        response
            .recv()
            .map_err(|_| Error::Device(String::from("output thread exited")))?
    }
}

impl OutputDevice for CpalOutput {
    fn new_player(&self, source: Arc<SoundSource>) -> Box<dyn DevicePlayer> {
        Box::new(self.mixer.player(source))
    }

    fn suspend(&self) -> Result<()> {
        self.request(Command::Suspend)
    }

    fn resume(&self) -> Result<()> {
        self.request(Command::Resume)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if self.commands.lock().send(Command::Shutdown).is_err() {
            debug!("output thread already exited");
        }

        if let Some(thread) = self.thread.take() {
            join_device_thread(thread);
        }
    }
}

fn device_thread(
    mixer: Arc<Mixer>,
    commands: Receiver<Command>,
    ready: Sender<Result<()>>,
) {
    let stream = match build_stream(mixer) {
        Ok(stream) => stream,
        Err(e) => {
            if let Err(unsent) = ready.send(Err(e)) {
                warn!("output failed to open with nobody waiting: {:?}", unsent.0);
            }
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        debug!("output opened with nobody waiting");
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            Command::Suspend(reply) => {
                reply_to(reply, stream.pause().map_err(device_error));
            }
            Command::Resume(reply) => {
                reply_to(reply, stream.play().map_err(device_error));
            }
            Command::Shutdown => break,
        }
    }

    debug!("output thread finished");
}

fn reply_to(reply: Sender<Result<()>>, result: Result<()>) {
    if let Err(unsent) = reply.send(result) {
        debug!("dropping reply to an abandoned request: {:?}", unsent.0);
    }
}

fn build_stream(mixer: Arc<Mixer>) -> Result<cpal::Stream> {
    let format = mixer.format();

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Device(String::from(NO_OUTPUT)))?;

    let stream_config = stream_config(&device, format)?;
    let device_channels = usize::from(stream_config.channels());

    info!(
        device = %device.name().unwrap_or_default(),
        rate = stream_config.sample_rate().0,
        channels = device_channels,
        "opening output stream"
    );

    let source_channels = usize::from(format.channels.count());
    let mut scratch = Vec::new();

    let stream = device
        .build_output_stream(
            &stream_config.into(),
            move |buf: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if device_channels == source_channels {
                    mixer.render(buf);
                    return;
                }

                let frames = buf.len() / device_channels;
                scratch.resize(frames * source_channels, 0.0f32);
                mixer.render(&mut scratch);
                remap_channels(&scratch, source_channels, buf, device_channels);
            },
            |e| warn!("output stream error: {}", e),
            None,
        )
        .map_err(device_error)?;

    stream.play().map_err(device_error)?;

    Ok(stream)
}

fn stream_config(
    device: &cpal::Device,
    format: PcmFormat,
) -> Result<SupportedStreamConfig> {
    let rate = SampleRate(format.sample_rate.hz());
    let channels = format.channels.count();

    let mut configs = device
        .supported_output_configs()
        .map_err(device_error)?
        .filter(|cfg| cfg.sample_format() == SampleFormat::F32)
        .collect::<Vec<_>>();

    // Prefer the sound's own channel layout
    configs.sort_by_key(|cfg| cfg.channels() != channels);

    configs
        .iter()
        .find_map(|range| range.try_with_sample_rate(rate))
        .ok_or_else(|| {
            Error::Device(format!(
                "Could not find an output configuration @ {}Hz",
                rate.0
            ))
        })
}

/// Copies interleaved frames between channel layouts. Mono is duplicated into
/// every output channel; folding to mono averages the first two channels.
fn remap_channels(src: &[f32], src_channels: usize, dst: &mut [f32], dst_channels: usize) {
    for (in_frame, out_frame) in src
        .chunks_exact(src_channels)
        .zip(dst.chunks_exact_mut(dst_channels))
    {
        if dst_channels == 1 && src_channels > 1 {
            out_frame[0] = (in_frame[0] + in_frame[1]) / 2.0;
            continue;
        }

        for (ch, sample) in out_frame.iter_mut().enumerate() {
            *sample = in_frame[ch.min(src_channels - 1)];
        }
    }
}

fn device_error(e: impl std::fmt::Display) -> Error {
    Error::Device(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_fills_every_channel() {
        let mut dst = [0.0f32; 4];
        remap_channels(&[0.25, -0.5], 1, &mut dst, 2);
        assert_eq!(dst, [0.25, 0.25, -0.5, -0.5]);
    }

    #[test]
    fn stereo_folds_to_mono() {
        let mut dst = [0.0f32; 2];
        remap_channels(&[0.5, 0.0, -1.0, 1.0], 2, &mut dst, 1);
        assert_eq!(dst, [0.25, 0.0]);
    }

    #[test]
    fn stereo_spreads_to_surround() {
        let mut dst = [0.0f32; 4];
        remap_channels(&[0.1, 0.2], 2, &mut dst, 4);
        assert_eq!(dst, [0.1, 0.2, 0.2, 0.2]);
    }
}
