use quaver_core::decoder::{read_all, WavDecoder};
use quaver_core::{
    AudioConfig, AudioSystem, Error, PlaybackState, SeekStream, SoundMode, SoundType,
};
use std::fs::File;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// CD-quality stereo: 176.4 bytes per millisecond.
fn write_wav(dir: &Path, name: &str, millis: u32) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let path = dir.join(name);
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();

    for i in 0..44100 * millis / 1000 {
        let s = ((i % 100) as i16 - 50) * 300;
        writer.write_sample(s).unwrap();
        writer.write_sample(-s).unwrap();
    }

    writer.finalize().unwrap();
    path
}

fn system() -> AudioSystem {
    AudioSystem::init(&AudioConfig::headless()).unwrap()
}

#[test]
fn memory_and_streaming_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 200);
    let system = system();

    let memory = system.open_memory(&path).unwrap();
    let streaming = system.open_streaming(&path).unwrap();

    assert_eq!(memory.info().size, 35_280);
    assert_eq!(streaming.info().size, 35_280);
    assert_eq!(memory.info().mode, SoundMode::Memory);
    assert_eq!(streaming.info().mode, SoundMode::Streaming);
    assert_eq!(streaming.info().sound_type, SoundType::Wav);
    assert_eq!(memory.total_time(), Duration::from_millis(200));
    assert_eq!(streaming.remaining_time(), Duration::from_millis(200));
}

#[test]
fn mp3_without_length_header_streams_its_full_size() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/mono22k.mp3");
    let system = system();

    let memory = system.open_memory(&path).unwrap();
    let streaming = system.open_streaming(&path).unwrap();

    assert_eq!(streaming.info().sound_type, SoundType::Mp3);
    assert_eq!(memory.info().size, 51_840);
    assert_eq!(streaming.info().size, memory.info().size);

    streaming.seek_to_percent(1.0).unwrap();
    assert_eq!(streaming.remaining_time(), Duration::ZERO);
}

#[test]
fn play_sync_runs_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wave", 150);
    let system = system();

    for sound in [
        system.open_memory(&path).unwrap(),
        system.open_streaming(&path).unwrap(),
    ] {
        let started = Instant::now();
        sound.play_sync();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(120), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
        assert!(!sound.is_playing());
        assert_eq!(sound.remaining_time(), Duration::ZERO);
        assert_eq!(sound.state(), PlaybackState::Stopped);
    }
}

#[test]
fn seek_then_play_covers_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 400);
    let system = system();
    let sound = system.open_streaming(&path).unwrap();

    sound.seek_to_percent(0.5).unwrap();
    assert_eq!(sound.remaining_time(), Duration::from_millis(200));

    let started = Instant::now();
    sound.play_sync();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(170), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(390), "{:?}", elapsed);
}

#[test]
fn backward_seek_on_streaming_sound() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 200);
    let system = system();
    let sound = system.open_streaming(&path).unwrap();

    sound.seek_to_percent(0.75).unwrap();
    assert_eq!(sound.remaining_time(), Duration::from_millis(50));

    sound.seek_to_percent(0.25).unwrap();
    assert_eq!(sound.remaining_time(), Duration::from_millis(150));

    sound.seek_to_time(Duration::ZERO).unwrap();
    assert_eq!(sound.remaining_time(), sound.total_time());
}

#[test]
fn stream_over_wav_matches_decoded_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 100);

    let mut decoder = WavDecoder::new(File::open(&path).unwrap()).unwrap();
    let pcm = read_all(&mut decoder, 0).unwrap();

    let stream =
        SeekStream::new(Box::new(WavDecoder::new(File::open(&path).unwrap()).unwrap()))
            .unwrap();
    assert_eq!(stream.data_start(), 44);
    assert_eq!(stream.len(), pcm.len() as u64);

    // Header bytes are never addressable
    assert_eq!(stream.seek(SeekFrom::Start(0)).unwrap(), 44);

    stream.seek(SeekFrom::Start(44 + 8000)).unwrap();
    let mut buf = [0u8; 64];
    stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..], &pcm[8000..8064]);

    stream.seek(SeekFrom::Start(44 + 400)).unwrap();
    stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..], &pcm[400..464]);

    stream.close().unwrap();
}

#[test]
fn loop_plays_the_requested_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 100);
    let system = system();
    let sound = system.open_memory(&path).unwrap();

    let started = Instant::now();
    sound.loop_async(3);
    assert!(sound.is_looping());
    sound.wait_loop();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(260), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2000), "{:?}", elapsed);
    assert!(!sound.is_looping());
    assert!(!sound.is_playing());
}

#[test]
fn pause_from_another_thread_ends_an_endless_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 60);
    let system = system();
    let sound = Arc::new(system.open_streaming(&path).unwrap());

    sound.loop_async(-1);

    let pauser = thread::spawn({
        let sound = Arc::clone(&sound);
        move || {
            thread::sleep(Duration::from_millis(200));
            sound.pause();
        }
    });

    let started = Instant::now();
    sound.wait_loop();
    let elapsed = started.elapsed();
    pauser.join().unwrap();

    assert!(elapsed >= Duration::from_millis(150), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
    assert!(!sound.is_playing());
    assert_eq!(sound.state(), PlaybackState::Stopped);
}

#[test]
fn relooping_replaces_the_running_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 50);
    let system = system();
    let sound = system.open_memory(&path).unwrap();

    sound.loop_async(-1);
    thread::sleep(Duration::from_millis(80));
    sound.loop_async(1);
    sound.wait_loop();

    assert!(!sound.is_looping());
    assert!(!sound.is_playing());
}

#[test]
fn copies_play_independently() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 80);
    let system = system();
    let sound = system.open_memory(&path).unwrap();
    sound.seek_to_percent(0.5).unwrap();

    let copy = sound.copy();
    copy.play_sync();

    assert_eq!(copy.remaining_time(), Duration::ZERO);
    assert_eq!(sound.remaining_time(), Duration::from_millis(40));
    assert!(!sound.is_playing());
}

#[test]
fn pause_all_holds_every_sound() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 100);
    let system = system();
    let sound = system.open_memory(&path).unwrap();

    system.pause_all().unwrap();
    sound.play_async();
    thread::sleep(Duration::from_millis(60));

    assert!(sound.is_playing());
    assert_eq!(sound.remaining_time(), sound.total_time());

    system.resume_all().unwrap();
    sound.wait();
    assert_eq!(sound.remaining_time(), Duration::ZERO);
}

#[test]
fn unknown_extension_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.flac");
    std::fs::write(&path, b"fLaC").unwrap();

    let err = match system().open_streaming(&path) {
        Err(e) => e,
        Ok(_) => panic!("flac should not open"),
    };

    match err {
        Error::Load { source, .. } => {
            assert!(matches!(*source, Error::UnsupportedFormat(_)))
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn malformed_wav_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"RIFF\x04\x00\x00\x00JUNK").unwrap();

    assert!(matches!(
        system().open_memory(&path),
        Err(Error::Load { .. })
    ));
}

#[test]
fn close_is_idempotent_and_final() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 100);
    let system = system();
    let sound = system.open_streaming(&path).unwrap();

    sound.loop_async(-1);
    sound.close().unwrap();
    sound.close().unwrap();

    assert!(sound.is_closed());
    assert!(!sound.is_looping());
    sound.wait_loop();
    assert!(matches!(sound.seek_to_percent(0.0), Err(Error::Closed)));
    assert_eq!(sound.total_time(), Duration::from_millis(100));
}
