// Audio output using cpal
// The stream lives on its own thread (cpal streams are not Send on every
// platform); the callback pulls mixed samples from the shared bus.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use log::{error, info};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use super::bus::{MixBus, OutputFormat};
use super::AudioError;

/// Running output stream on the default device
pub struct AudioOutput {
    bus: MixBus,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutput {
    /// Open the default output device and start playing an empty bus.
    /// `resource_dir` resolves bundled sounds.
    pub fn start(resource_dir: PathBuf) -> Result<Self, AudioError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<MixBus, AudioError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                // The stream must be created and dropped on this thread
                let stream = match Self::open(resource_dir) {
                    Ok((stream, bus)) => {
                        let _ = ready_tx.send(Ok(bus));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the output is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("[Audio] Output stream closed");
            })
            .map_err(|e| AudioError::Device(format!("failed to spawn output thread: {}", e)))?;

        let bus = ready_rx.recv().map_err(|_| AudioError::Closed)??;

        Ok(Self {
            bus,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    fn open(resource_dir: PathBuf) -> Result<(Stream, MixBus), AudioError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| {
                AudioError::Device(format!("failed to get default output config: {}", e))
            })?;

        let format = OutputFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        let bus = MixBus::new(format, resource_dir);

        let sample_format = config.sample_format();
        let config: StreamConfig = config.into();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, bus.clone())?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, bus.clone())?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, bus.clone())?,
            format => return Err(AudioError::UnsupportedFormat(format!("{:?}", format))),
        };

        stream
            .play()
            .map_err(|e| AudioError::Device(format!("failed to start stream: {}", e)))?;

        info!(
            "[Audio] Output started: {} Hz, {} channels",
            format.sample_rate, format.channels
        );
        Ok((stream, bus))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        bus: MixBus,
    ) -> Result<Stream, AudioError> {
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    bus.mix_into(&mut scratch);
                    for (out, &value) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(value.clamp(-1.0, 1.0));
                    }
                },
                move |err| {
                    error!("[Audio] Output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Device(format!("failed to build output stream: {}", e)))
    }

    /// The bus this output plays
    pub fn bus(&self) -> MixBus {
        self.bus.clone()
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Closing the channel wakes the output thread
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
