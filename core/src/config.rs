use crate::format::PcmFormat;
use serde::{Deserialize, Serialize};

/// Output backend driving the device players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The host's default output device, through cpal.
    #[default]
    Cpal,
    /// Consumes audio in real time without sound hardware.
    Null,
}

/// Settings for [`crate::AudioSystem::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub format: PcmFormat,

    /// Bytes a device player pulls from its source per refill. This is also
    /// the most a player can hold unplayed.
    ///
    /// Default: 8192 bytes (~46ms of CD-quality stereo).
    #[serde(default = "default_player_buffer_bytes")]
    pub player_buffer_bytes: usize,

    #[serde(default)]
    pub backend: Backend,
}

fn default_player_buffer_bytes() -> usize {
    8192
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            format: PcmFormat::default(),
            player_buffer_bytes: default_player_buffer_bytes(),
            backend: Backend::default(),
        }
    }
}

impl AudioConfig {
    /// Default format on the headless backend.
    pub fn headless() -> Self {
        AudioConfig {
            backend: Backend::Null,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{BitDepth, ChannelCount, SampleRate};

    #[test]
    fn missing_fields_use_defaults() {
        let config: AudioConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AudioConfig::default());
    }

    #[test]
    fn parses_numeric_format() {
        let config: AudioConfig = serde_json::from_str(
            r#"{
                "format": { "sample_rate": 48000, "channels": 1, "bit_depth": 1 },
                "player_buffer_bytes": 1024,
                "backend": "null"
            }"#,
        )
        .unwrap();

        assert_eq!(config.format.sample_rate, SampleRate::Hz48000);
        assert_eq!(config.format.channels, ChannelCount::Mono);
        assert_eq!(config.format.bit_depth, BitDepth::OneByte);
        assert_eq!(config.player_buffer_bytes, 1024);
        assert_eq!(config.backend, Backend::Null);
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let result = serde_json::from_str::<AudioConfig>(
            r#"{ "format": { "sample_rate": 22050, "channels": 2, "bit_depth": 2 } }"#,
        );
        assert!(result.is_err());
    }
}
