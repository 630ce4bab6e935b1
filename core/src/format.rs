use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleRate {
    Hz44100,
    Hz48000,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
        }
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = String;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            44100 => Ok(SampleRate::Hz44100),
            48000 => Ok(SampleRate::Hz48000),
            other => Err(format!("Unsupported sample rate {}Hz", other)),
        }
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> u32 {
        rate.hz()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ChannelCount {
    Mono,
    Stereo,
}

impl ChannelCount {
    pub fn count(self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
        }
    }
}

impl TryFrom<u16> for ChannelCount {
    type Error = String;

    fn try_from(count: u16) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(ChannelCount::Mono),
            2 => Ok(ChannelCount::Stereo),
            other => Err(format!("Unsupported channel count {}", other)),
        }
    }
}

impl From<ChannelCount> for u16 {
    fn from(channels: ChannelCount) -> u16 {
        channels.count()
    }
}

/// Width of one sample, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    /// Unsigned 8-bit samples.
    OneByte,
    /// Signed little-endian 16-bit samples.
    TwoBytes,
}

impl BitDepth {
    pub fn bytes(self) -> u16 {
        match self {
            BitDepth::OneByte => 1,
            BitDepth::TwoBytes => 2,
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = String;

    fn try_from(bytes: u16) -> Result<Self, Self::Error> {
        match bytes {
            1 => Ok(BitDepth::OneByte),
            2 => Ok(BitDepth::TwoBytes),
            other => Err(format!("Unsupported bit depth of {} bytes", other)),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> u16 {
        depth.bytes()
    }
}

/// PCM layout shared by the output device and every sound opened against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    pub bit_depth: BitDepth,
}

impl PcmFormat {
    pub fn new(
        sample_rate: SampleRate,
        channels: ChannelCount,
        bit_depth: BitDepth,
    ) -> Self {
        PcmFormat {
            sample_rate,
            channels,
            bit_depth,
        }
    }

    pub fn bytes_per_sample(&self) -> u64 {
        self.bit_depth.bytes().into()
    }

    /// Bytes in one frame: one sample for every channel.
    pub fn bytes_per_frame(&self) -> u64 {
        u64::from(self.channels.count()) * self.bytes_per_sample()
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_frame() * u64::from(self.sample_rate.hz())
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        PcmFormat::new(
            SampleRate::Hz44100,
            ChannelCount::Stereo,
            BitDepth::TwoBytes,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundType {
    Mp3,
    Wav,
    Ogg,
    Unknown,
}

impl SoundType {
    /// Detects the sound type from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("mp3") => SoundType::Mp3,
            Some("wav") | Some("wave") => SoundType::Wav,
            Some("ogg") => SoundType::Ogg,
            _ => SoundType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundMode {
    /// Decoded incrementally from the open file during playback.
    Streaming,
    /// Fully decoded into memory before playback.
    Memory,
}

/// Static information about a loaded sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundInfo {
    pub sound_type: SoundType,
    pub mode: SoundMode,
    /// Decoded PCM size in bytes.
    pub size: u64,
}
