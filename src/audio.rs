/*!
 * In-memory audio tracks.
 *
 * Narration WAVs are decoded with `hound`, forced to interleaved stereo
 * `f32`, and resampled to the job's sample rate so every clip on the
 * timeline can be mixed sample-for-sample.
 */

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::errors::ComposeError;

pub const CHANNELS: usize = 2;

/// Interleaved stereo `f32` samples at a fixed rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioTrack {
    /// Wrap interleaved stereo samples
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Silent track of the given length
    pub fn silence(seconds: f64, sample_rate: u32) -> Self {
        let frames = seconds_to_frames(seconds, sample_rate);
        Self {
            samples: vec![0.0; frames * CHANNELS],
            sample_rate,
        }
    }

    /// Decode a WAV file, duplicate mono to stereo and resample to `target_rate`
    pub fn load_wav<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Self, ComposeError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ComposeError::AssetMissing { path: path.to_path_buf() });
        }

        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let raw: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let stereo = to_stereo(&raw, channels);
        let samples = resample(&stereo, spec.sample_rate, target_rate);
        debug!(
            "Loaded {:?}: {} Hz, {} ch, {:.3}s",
            path.file_name().unwrap_or_default(),
            spec.sample_rate,
            channels,
            samples.len() as f64 / CHANNELS as f64 / target_rate as f64
        );

        Ok(Self {
            samples,
            sample_rate: target_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Surround the track with `lead` and `trail` seconds of silence
    pub fn padded(&self, lead: f64, trail: f64) -> Self {
        let lead = seconds_to_frames(lead, self.sample_rate) * CHANNELS;
        let trail = seconds_to_frames(trail, self.sample_rate) * CHANNELS;
        let mut samples = Vec::with_capacity(lead + self.samples.len() + trail);
        samples.resize(lead, 0.0);
        samples.extend_from_slice(&self.samples);
        samples.resize(samples.len() + trail, 0.0);
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Add this track into `dest` starting at stereo frame `offset`.
    /// Samples falling past the end of `dest` are dropped.
    pub fn mix_into(&self, dest: &mut [f32], offset: usize) {
        let start = offset * CHANNELS;
        if start >= dest.len() {
            return;
        }
        for (out, sample) in dest[start..].iter_mut().zip(&self.samples) {
            *out += *sample;
        }
    }

    /// Clamp every sample into [-1, 1]
    pub fn clamp(&mut self) {
        for sample in &mut self.samples {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Raw little-endian `f32` bytes, as fed to an encoder's stdin
    pub fn to_f32le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 4);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Write a 16-bit PCM stereo WAV
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), ComposeError> {
        let spec = WavSpec {
            channels: CHANNELS as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Round a duration to a whole number of frames
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

fn to_stereo(raw: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        1 => raw.iter().flat_map(|&s| [s, s]).collect(),
        2 => raw.to_vec(),
        // keep the first two channels of surround input
        n => raw.chunks_exact(n).flat_map(|frame| [frame[0], frame[1]]).collect(),
    }
}

/// Linear-interpolation resample of interleaved stereo
fn resample(stereo: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || stereo.is_empty() {
        return stereo.to_vec();
    }
    let in_frames = stereo.len() / CHANNELS;
    let out_frames = ((in_frames as f64) * to as f64 / from as f64).round() as usize;
    let ratio = from as f64 / to as f64;

    let mut out = Vec::with_capacity(out_frames * CHANNELS);
    for i in 0..out_frames {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let next = (idx + 1).min(in_frames - 1);
        let idx = idx.min(in_frames - 1);
        for ch in 0..CHANNELS {
            let a = stereo[idx * CHANNELS + ch];
            let b = stereo[next * CHANNELS + ch];
            out.push(a + (b - a) * frac);
        }
    }
    out
}
