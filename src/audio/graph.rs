//! The signal processing graph for one generation run.
//!
//! An ordered chain of stereo stages (low-pass, high-pass, gain) followed by
//! a split into two stereo-pan stages: one feeding the monitoring output and
//! one feeding the capturable output. A periodic oscillator drives both pan
//! stages synchronously, producing a slow side-to-side drift.

use crate::audio::noise::AudioBuffer;
use std::f32::consts::PI;

/// Low-pass cutoff in Hz.
pub const LOW_PASS_HZ: f32 = 850.0;
/// High-pass cutoff in Hz.
pub const HIGH_PASS_HZ: f32 = 120.0;
/// Graph gain stage value.
pub const GRAPH_GAIN: f32 = 0.45;
/// Pan flip period in seconds.
pub const PAN_PERIOD_SECS: f64 = 2.4;
/// Pan magnitude; the oscillator alternates between `-PAN_MAGNITUDE` and `+PAN_MAGNITUDE`.
pub const PAN_MAGNITUDE: f32 = 0.6;

/// A stereo signal-processing stage.
pub trait Stage {
    /// Process one stereo frame.
    fn process(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Reset internal state.
    fn reset(&mut self);
}

/// One-pole low-pass filter, independent state per channel.
///
/// `y[n] = alpha * x[n] + (1 - alpha) * y[n-1]`
#[derive(Debug)]
pub struct LowPass {
    alpha: f32,
    prev: [f32; 2],
}

impl LowPass {
    /// Create from a cutoff frequency.
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let rc = (2.0 * PI * cutoff_hz).recip();
        let dt = sample_rate.recip();
        Self {
            alpha: dt / (rc + dt),
            prev: [0.0; 2],
        }
    }
}

impl Stage for LowPass {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.prev[0] = self.alpha * left + (1.0 - self.alpha) * self.prev[0];
        self.prev[1] = self.alpha * right + (1.0 - self.alpha) * self.prev[1];
        (self.prev[0], self.prev[1])
    }

    fn reset(&mut self) {
        self.prev = [0.0; 2];
    }
}

/// One-pole high-pass filter, independent state per channel.
///
/// `y[n] = alpha * (y[n-1] + x[n] - x[n-1])`
#[derive(Debug)]
pub struct HighPass {
    alpha: f32,
    prev_in: [f32; 2],
    prev_out: [f32; 2],
}

impl HighPass {
    /// Create from a cutoff frequency.
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let rc = (2.0 * PI * cutoff_hz).recip();
        let dt = sample_rate.recip();
        Self {
            alpha: rc / (rc + dt),
            prev_in: [0.0; 2],
            prev_out: [0.0; 2],
        }
    }

    fn step(&mut self, ch: usize, x: f32) -> f32 {
        let y = self.alpha * (self.prev_out[ch] + x - self.prev_in[ch]);
        self.prev_in[ch] = x;
        self.prev_out[ch] = y;
        y
    }
}

impl Stage for HighPass {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.step(0, left), self.step(1, right))
    }

    fn reset(&mut self) {
        self.prev_in = [0.0; 2];
        self.prev_out = [0.0; 2];
    }
}

/// Fixed gain stage.
#[derive(Debug)]
pub struct Gain(pub f32);

impl Stage for Gain {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (left * self.0, right * self.0)
    }

    fn reset(&mut self) {}
}

/// Equal-power stereo pan stage.
#[derive(Debug)]
pub struct StereoPan {
    pan: f32,
}

impl StereoPan {
    /// Create a centered pan stage.
    pub fn new() -> Self {
        Self { pan: 0.0 }
    }

    /// Set the pan position in `[-1, 1]`.
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    /// Current pan position.
    pub fn pan(&self) -> f32 {
        self.pan
    }
}

impl Default for StereoPan {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for StereoPan {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.pan <= 0.0 {
            let x = (self.pan + 1.0) * PI / 2.0;
            (left + right * x.cos(), right * x.sin())
        } else {
            let x = self.pan * PI / 2.0;
            (left * x.cos(), right + left * x.sin())
        }
    }

    fn reset(&mut self) {}
}

/// Periodic pan-direction oscillator.
///
/// Starts at `-magnitude` and negates at every period boundary measured from
/// synthesis start.
#[derive(Clone, Copy, Debug)]
pub struct PanOscillator {
    period_secs: f64,
    magnitude: f32,
}

impl PanOscillator {
    /// Create an oscillator with the given flip period and magnitude.
    pub fn new(period_secs: f64, magnitude: f32) -> Self {
        Self {
            period_secs,
            magnitude,
        }
    }

    /// Pan value at `t_secs` from synthesis start.
    pub fn value_at(&self, t_secs: f64) -> f32 {
        let segment = (t_secs / self.period_secs).floor() as i64;
        if segment % 2 == 0 {
            -self.magnitude
        } else {
            self.magnitude
        }
    }
}

/// Rendered graph outputs, interleaved stereo.
#[derive(Clone, Debug)]
pub struct GraphOutputs {
    /// Output routed to the monitoring destination.
    pub monitor: Vec<f32>,
    /// Output routed to the capturable destination.
    pub capture: Vec<f32>,
}

/// The full processing chain: low-pass -> high-pass -> gain -> pan split.
pub struct ProcessingGraph {
    low: LowPass,
    high: HighPass,
    gain: Gain,
    monitor_pan: StereoPan,
    capture_pan: StereoPan,
    oscillator: PanOscillator,
    sample_rate: u32,
}

impl ProcessingGraph {
    /// Build the graph for `sample_rate` with the fixed stage parameters.
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        Self {
            low: LowPass::new(LOW_PASS_HZ, sr),
            high: HighPass::new(HIGH_PASS_HZ, sr),
            gain: Gain(GRAPH_GAIN),
            monitor_pan: StereoPan::new(),
            capture_pan: StereoPan::new(),
            oscillator: PanOscillator::new(PAN_PERIOD_SECS, PAN_MAGNITUDE),
            sample_rate,
        }
    }

    /// The oscillator driving both pan stages.
    pub fn oscillator(&self) -> PanOscillator {
        self.oscillator
    }

    /// Route a synthesized buffer through the chain, producing both outputs.
    ///
    /// The two pan stages are driven from the same oscillator value at every
    /// sample, so the monitor and capture outputs always agree on the pan
    /// position.
    pub fn render(&mut self, buffer: &AudioBuffer) -> GraphOutputs {
        let n = buffer.len_samples();
        let mut monitor = Vec::with_capacity(n * 2);
        let mut capture = Vec::with_capacity(n * 2);

        let left = buffer.channel(0);
        let right = if buffer.channel_count() > 1 {
            buffer.channel(1)
        } else {
            buffer.channel(0)
        };

        for i in 0..n {
            let t = i as f64 / f64::from(self.sample_rate);
            let pan = self.oscillator.value_at(t);
            self.monitor_pan.set_pan(pan);
            self.capture_pan.set_pan(pan);

            let (l, r) = self.low.process(left[i], right[i]);
            let (l, r) = self.high.process(l, r);
            let (l, r) = self.gain.process(l, r);

            let (ml, mr) = self.monitor_pan.process(l, r);
            let (cl, cr) = self.capture_pan.process(l, r);

            monitor.push(ml.clamp(-1.0, 1.0));
            monitor.push(mr.clamp(-1.0, 1.0));
            capture.push(cl.clamp(-1.0, 1.0));
            capture.push(cr.clamp(-1.0, 1.0));
        }

        GraphOutputs { monitor, capture }
    }
}
