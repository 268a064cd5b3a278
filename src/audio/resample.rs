// Fit decoded audio to the output device: channel layout first, then
// sample rate.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::bus::OutputFormat;
use super::decoder::DecodedAudio;
use super::AudioError;

const CHUNK_FRAMES: usize = 1024;

/// Interleaved samples of `audio` in the channel count and sample rate of
/// `format`
pub fn conform(audio: &DecodedAudio, format: OutputFormat) -> Result<Vec<f32>, AudioError> {
    let target_channels = format.channels.max(1) as usize;
    let planes = remap_channels(audio, target_channels);

    let planes = if audio.sample_rate == format.sample_rate || audio.sample_rate == 0 {
        planes
    } else {
        resample(planes, audio.sample_rate, format.sample_rate)?
    };

    Ok(interleave(&planes))
}

/// Split interleaved input into `target` planes. Mono is duplicated, a
/// mono target gets the average, anything else wraps around the source
/// channels.
fn remap_channels(audio: &DecodedAudio, target: usize) -> Vec<Vec<f32>> {
    let source = audio.channels.max(1);
    let frames = audio.samples.len() / source;
    let mut planes = vec![Vec::with_capacity(frames); target];

    for frame in audio.samples.chunks_exact(source) {
        if target == 1 {
            planes[0].push(frame.iter().sum::<f32>() / source as f32);
            continue;
        }
        for (ch, plane) in planes.iter_mut().enumerate() {
            plane.push(frame[ch % source]);
        }
    }
    planes
}

fn resample(planes: Vec<Vec<f32>>, from: u32, to: u32) -> Result<Vec<Vec<f32>>, AudioError> {
    let channels = planes.len();
    let frames = planes.first().map(Vec::len).unwrap_or(0);
    if frames == 0 {
        return Ok(planes);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to as f64 / from as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.1, params, CHUNK_FRAMES, channels)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (frames as f64 * ratio).round() as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected); channels];
    let mut position = 0;

    while position < frames {
        let needed = resampler.input_frames_next();
        let end = (position + needed).min(frames);
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[position..end]).collect();

        let resampled = if end - position == needed {
            resampler.process(&chunk, None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(|e| AudioError::Resample(e.to_string()))?;

        for (out, block) in output.iter_mut().zip(resampled) {
            out.extend_from_slice(&block);
        }
        position = end;
    }

    // Drain the filter tail so the loop keeps its full length
    while output[0].len() < expected {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if tail[0].is_empty() {
            break;
        }
        for (out, block) in output.iter_mut().zip(tail) {
            out.extend_from_slice(&block);
        }
    }
    for out in output.iter_mut() {
        out.truncate(expected);
    }
    Ok(output)
}

fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let frames = planes.first().map(Vec::len).unwrap_or(0);
    let mut samples = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        for plane in planes {
            samples.push(plane[frame]);
        }
    }
    samples
}
