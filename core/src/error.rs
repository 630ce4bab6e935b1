use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by sound loading, seeking and output devices.
#[derive(Error, Debug)]
pub enum Error {
    /// The file extension does not map to a known sound type.
    #[error(
        "unknown sound type for '{0}': extension must be one of .mp3, .wav, .wave, .ogg"
    )]
    UnsupportedFormat(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A load entry point failed; `path` is the file being loaded.
    #[error("failed to load '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Malformed container or codec data.
    #[error("decoder error: {0}")]
    Decoder(String),

    /// A seek resolved to a position before byte zero.
    #[error("negative seek position")]
    NegativeSeekPosition,

    #[error("decoder does not support direct seeking")]
    SeekUnsupported,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("sound is closed")]
    Closed,

    /// Both the stream and the device player failed to close.
    #[error("closing stream: {stream}; closing player: {player}")]
    Close {
        stream: Box<Error>,
        player: Box<Error>,
    },
}

impl Error {
    pub(crate) fn load(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Load {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Error::Io(e),
            other => Error::Decoder(other.to_string()),
        }
    }
}

impl From<symphonia::core::errors::Error> for Error {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::IoError(e) => Error::Io(e),
            other => Error::Decoder(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
