//! Colored-noise synthesis.
//!
//! Each channel is an independent leaky integrator over uniform noise, shaped
//! by a half-sine amplitude envelope so the clip fades in from and out to
//! silence.

use crate::foundation::error::{DriftError, DriftResult};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Leaky-integrator decay factor.
const LEAK: f32 = 0.98;
/// Fixed source gain applied after the envelope.
const SOURCE_GAIN: f32 = 0.35;

/// A fixed-length multi-channel sample buffer, written once during synthesis.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn len_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Borrow one channel's samples.
    pub fn channel(&self, idx: usize) -> &[f32] {
        &self.channels[idx]
    }
}

/// Synthesize `duration_secs` of stereo colored noise.
///
/// Per channel, independently seeded: `v[i] = v[i-1] * 0.98 + uniform(-1, 1) * 0.02`,
/// then scaled by the half-sine envelope `sin(pi * i / n)` and the fixed source
/// gain. Every output sample lies in `[-1, 1]`.
pub fn synth_colored_noise(
    duration_secs: f64,
    sample_rate: u32,
    channel_count: u16,
    seed: u64,
) -> DriftResult<AudioBuffer> {
    if sample_rate == 0 {
        return Err(DriftError::validation("sample_rate must be non-zero"));
    }
    if channel_count == 0 {
        return Err(DriftError::validation("channel_count must be non-zero"));
    }
    if !(duration_secs > 0.0) {
        return Err(DriftError::validation("duration must be positive"));
    }

    let n = (f64::from(sample_rate) * duration_secs).round() as usize;
    let mut channels = Vec::with_capacity(usize::from(channel_count));

    for ch in 0..u64::from(channel_count) {
        let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(ch));
        let mut data = Vec::with_capacity(n);
        let mut value = 0.0f32;
        for i in 0..n {
            let uniform = rng.r#gen::<f32>() * 2.0 - 1.0;
            value = value * LEAK + uniform * (1.0 - LEAK);
            let envelope = (std::f64::consts::PI * i as f64 / n as f64).sin() as f32;
            data.push(value * SOURCE_GAIN * envelope);
        }
        channels.push(data);
    }

    Ok(AudioBuffer {
        sample_rate,
        channels,
    })
}
