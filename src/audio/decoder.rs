// Audio decoder using Symphonia
// Decodes a whole file to interleaved f32 PCM; ambient loops are short enough
// to keep in memory.

use log::warn;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

use super::AudioError;

/// Fully decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    path: String,
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| AudioError::Open {
            path: display.clone(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Decode {
                path: display.clone(),
                message: format!("failed to probe format: {}", e),
            })?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode {
                path: display.clone(),
                message: "no audio track found".to_string(),
            })?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode {
                path: display.clone(),
                message: format!("failed to create decoder: {}", e),
            })?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            path: display,
        })
    }

    /// Decode next packet, returns interleaved f32 samples.
    /// Returns None when end of stream is reached
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::Decode {
                        path: self.path.clone(),
                        message: format!("failed to read packet: {}", e),
                    })
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => return Ok(Some(audio_buf_to_f32(&decoded))),
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("[Decoder] Skipping bad packet in {}: {}", self.path, e);
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::Decode {
                        path: self.path.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    /// Decode the remainder of the stream
    pub fn decode_all(mut self) -> Result<DecodedAudio, AudioError> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            samples.extend_from_slice(&chunk);
        }
        if samples.is_empty() {
            return Err(AudioError::Decode {
                path: self.path,
                message: "stream contains no samples".to_string(),
            });
        }
        Ok(DecodedAudio {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

/// Open and fully decode `path`
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    AudioDecoder::open(path)?.decode_all()
}

/// Convert any AudioBufferRef to interleaved f32 samples
fn audio_buf_to_f32(buf: &AudioBufferRef) -> Vec<f32> {
    match buf {
        AudioBufferRef::F32(b) => interleave(b.planes(), b.frames(), |s: f32| s),
        AudioBufferRef::F64(b) => interleave(b.planes(), b.frames(), |s: f64| s as f32),
        AudioBufferRef::S8(b) => interleave(b.planes(), b.frames(), |s: i8| s as f32 / 128.0),
        AudioBufferRef::S16(b) => {
            interleave(b.planes(), b.frames(), |s: i16| s as f32 / 32768.0)
        }
        AudioBufferRef::S24(b) => {
            interleave(b.planes(), b.frames(), |s| s.inner() as f32 / 8388608.0)
        }
        AudioBufferRef::S32(b) => {
            interleave(b.planes(), b.frames(), |s: i32| s as f32 / 2147483648.0)
        }
        AudioBufferRef::U8(b) => {
            interleave(b.planes(), b.frames(), |s: u8| (s as f32 - 128.0) / 128.0)
        }
        AudioBufferRef::U16(b) => {
            interleave(b.planes(), b.frames(), |s: u16| (s as f32 - 32768.0) / 32768.0)
        }
        AudioBufferRef::U24(b) => interleave(b.planes(), b.frames(), |s| {
            (s.inner() as f32 - 8388608.0) / 8388608.0
        }),
        AudioBufferRef::U32(b) => interleave(b.planes(), b.frames(), |s: u32| {
            ((s as f64 - 2147483648.0) / 2147483648.0) as f32
        }),
    }
}

fn interleave<T: Sample + Copy, F: Fn(T) -> f32>(
    planes: AudioPlanes<T>,
    frames: usize,
    convert: F,
) -> Vec<f32> {
    let planes = planes.planes();
    if planes.is_empty() || frames == 0 {
        return vec![];
    }

    let mut interleaved = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        for plane in planes {
            interleaved.push(convert(plane[frame]));
        }
    }
    interleaved
}

/// Minimal 16-bit PCM WAV writer for fixtures
#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    bytes.extend_from_slice(&(channels * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}
