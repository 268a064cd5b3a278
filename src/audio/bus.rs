// Mix bus
// Holds every looping voice and sums them into the output buffer. The bus
// knows nothing about devices, so it can be driven by cpal or by a test.

use log::{debug, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use super::decoder::decode_file;
use super::resample::conform;
use super::{AudioBackend, AudioError, LoopHandle};
use crate::sound::SoundSource;

/// Sample layout the bus renders in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Progress of a voice's decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    /// Source missing or undecodable; the voice mixes silence
    Failed,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoadState::Ready,
            2 => LoadState::Failed,
            _ => LoadState::Loading,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoadState::Loading => 0,
            LoadState::Ready => 1,
            LoadState::Failed => 2,
        }
    }
}

struct VoiceBuffer {
    samples: Arc<[f32]>,
    /// Next sample index, wraps to 0 at the end
    position: usize,
}

struct Voice {
    id: String,
    gain: AtomicU32,
    muted: AtomicBool,
    stopped: AtomicBool,
    load_state: AtomicU8,
    buffer: Mutex<VoiceBuffer>,
}

impl Voice {
    fn new(id: &str, gain: f32) -> Self {
        Self {
            id: id.to_string(),
            gain: AtomicU32::new(gain.to_bits()),
            muted: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            load_state: AtomicU8::new(LoadState::Loading.as_u8()),
            buffer: Mutex::new(VoiceBuffer {
                samples: Arc::from(Vec::new()),
                position: 0,
            }),
        }
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    fn load_state(&self) -> LoadState {
        LoadState::from_u8(self.load_state.load(Ordering::Acquire))
    }

    fn set_load_state(&self, state: LoadState) {
        self.load_state.store(state.as_u8(), Ordering::Release);
    }

    /// Decode `path` and publish the samples
    fn load(&self, path: Option<PathBuf>, format: OutputFormat) {
        let result = path
            .ok_or_else(|| AudioError::Unresolvable(self.id.clone()))
            .and_then(|path| decode_file(&path))
            .and_then(|audio| conform(&audio, format));

        match result {
            Ok(samples) => {
                debug!("[Mixer] Loaded {} ({} samples)", self.id, samples.len());
                *self.buffer.lock() = VoiceBuffer {
                    samples: Arc::from(samples),
                    position: 0,
                };
                self.set_load_state(LoadState::Ready);
            }
            Err(e) => {
                warn!("[Mixer] Sound {} will play silence: {}", self.id, e);
                self.set_load_state(LoadState::Failed);
            }
        }
    }
}

struct BusInner {
    format: OutputFormat,
    resource_dir: PathBuf,
    background_loading: bool,
    voices: Mutex<Vec<Arc<Voice>>>,
}

/// Shared set of looping voices
#[derive(Clone)]
pub struct MixBus {
    inner: Arc<BusInner>,
}

impl MixBus {
    /// Bus whose voices decode on loader threads
    pub fn new(format: OutputFormat, resource_dir: PathBuf) -> Self {
        Self::build(format, resource_dir, true)
    }

    /// Bus whose voices decode inside `start_loop`, before it returns
    pub fn with_blocking_loads(format: OutputFormat, resource_dir: PathBuf) -> Self {
        Self::build(format, resource_dir, false)
    }

    fn build(format: OutputFormat, resource_dir: PathBuf, background_loading: bool) -> Self {
        Self {
            inner: Arc::new(BusInner {
                format,
                resource_dir,
                background_loading,
                voices: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of voices that have not been stopped
    pub fn voice_count(&self) -> usize {
        self.inner
            .voices
            .lock()
            .iter()
            .filter(|v| !v.stopped.load(Ordering::Acquire))
            .count()
    }

    /// Load state of the live voice for `id`
    pub fn voice_state(&self, id: &str) -> Option<LoadState> {
        self.inner
            .voices
            .lock()
            .iter()
            .find(|v| v.id == id && !v.stopped.load(Ordering::Acquire))
            .map(|v| v.load_state())
    }

    /// Fill `out` (interleaved, in the bus format) with the sum of every
    /// audible voice. Muted voices hold their position.
    pub fn mix_into(&self, out: &mut [f32]) {
        out.fill(0.0);

        let mut voices = self.inner.voices.lock();
        voices.retain(|v| !v.stopped.load(Ordering::Acquire));

        for voice in voices.iter() {
            if voice.muted.load(Ordering::Relaxed) || voice.load_state() != LoadState::Ready {
                continue;
            }
            let gain = voice.gain();
            let mut buffer = voice.buffer.lock();
            let VoiceBuffer { samples, position } = &mut *buffer;
            if samples.is_empty() {
                continue;
            }
            for sample in out.iter_mut() {
                *sample += samples[*position] * gain;
                *position += 1;
                if *position == samples.len() {
                    *position = 0;
                }
            }
        }
    }
}

impl AudioBackend for MixBus {
    fn start_loop(
        &mut self,
        id: &str,
        source: &SoundSource,
        gain: f32,
    ) -> Result<Box<dyn LoopHandle>, AudioError> {
        let voice = Arc::new(Voice::new(id, gain));
        let path = source.resolve(&self.inner.resource_dir);
        let format = self.inner.format;

        if self.inner.background_loading {
            let loader = Arc::clone(&voice);
            thread::Builder::new()
                .name(format!("load-{}", id))
                .spawn(move || loader.load(path, format))
                .map_err(|e| AudioError::Device(format!("failed to spawn loader: {}", e)))?;
        } else {
            voice.load(path, format);
        }

        self.inner.voices.lock().push(Arc::clone(&voice));
        Ok(Box::new(VoiceHandle { voice }))
    }
}

/// Control handle of one voice. Dropping it stops the voice.
pub struct VoiceHandle {
    voice: Arc<Voice>,
}

impl LoopHandle for VoiceHandle {
    fn set_gain(&mut self, gain: f32) {
        self.voice.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn set_muted(&mut self, muted: bool) {
        self.voice.muted.store(muted, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.voice.stopped.store(true, Ordering::Release);
    }
}

impl Drop for VoiceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
