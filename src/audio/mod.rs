// Audio engine
// Symphonia decodes, rubato resamples, a mix bus sums looping voices and
// cpal plays the bus.

pub mod bus;
pub mod decoder;
pub mod output;
pub mod resample;

use thiserror::Error;

use crate::sound::SoundSource;

pub use bus::{LoadState, MixBus, OutputFormat};
pub use output::AudioOutput;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output device available")]
    NoDevice,
    #[error("audio device error: {0}")]
    Device(String),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("failed to resample: {0}")]
    Resample(String),
    #[error("sound source {0} does not name a local file")]
    Unresolvable(String),
    #[error("audio engine has shut down")]
    Closed,
}

/// Control side of one looping playback
pub trait LoopHandle: Send {
    /// Linear gain, already multiplied by the master volume
    fn set_gain(&mut self, gain: f32);
    fn set_muted(&mut self, muted: bool);
    fn stop(&mut self);
}

/// Anything that can start looping playbacks
pub trait AudioBackend: Send {
    fn start_loop(
        &mut self,
        id: &str,
        source: &SoundSource,
        gain: f32,
    ) -> Result<Box<dyn LoopHandle>, AudioError>;
}
