//! The ambient audio source: one engine context, one synthesized buffer, one
//! processing graph, alive for exactly one generation run.

use crate::audio::graph::ProcessingGraph;
use crate::audio::noise::{AudioBuffer, synth_colored_noise};
use crate::foundation::core::CHANNELS;
use crate::foundation::error::{DriftError, DriftResult};
use std::rc::Rc;

/// Handle to an acquired audio engine context.
///
/// Closing is idempotent; every exit path of a generation run must end with the
/// engine closed.
#[derive(Debug)]
pub struct AudioEngine {
    sample_rate: u32,
    closed: bool,
}

impl AudioEngine {
    /// Acquire an engine context at `sample_rate`.
    pub fn acquire(sample_rate: u32) -> DriftResult<Self> {
        if sample_rate == 0 {
            return Err(DriftError::resource_unavailable(
                "audio engine rejected zero sample rate",
            ));
        }
        Ok(Self {
            sample_rate,
            closed: false,
        })
    }

    /// Engine sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Close the engine context. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether the context has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A playing ambient source with a monitoring output and a capturable output.
///
/// Playback starts immediately on build. Reaching the natural end triggers the
/// source's own teardown exactly once, guarded against re-entry when external
/// code has already requested an early stop.
pub struct AmbientSource {
    engine: AudioEngine,
    buffer: AudioBuffer,
    monitor: Rc<Vec<f32>>,
    capture: Rc<Vec<f32>>,
    duration_ms: u64,
    started_at_ms: u64,
    stopped: bool,
    ended_fired: bool,
}

impl AmbientSource {
    /// Acquire an engine, synthesize the buffer, route it through the
    /// processing graph, and start playback at `now_ms`.
    #[tracing::instrument(skip_all, fields(duration_secs, sample_rate))]
    pub fn build(
        duration_secs: f64,
        sample_rate: u32,
        seed: u64,
        now_ms: u64,
    ) -> DriftResult<Self> {
        let engine = AudioEngine::acquire(sample_rate)?;
        let buffer = synth_colored_noise(duration_secs, engine.sample_rate(), CHANNELS, seed)?;

        let mut graph = ProcessingGraph::new(engine.sample_rate());
        let out = graph.render(&buffer);
        tracing::debug!(
            samples = buffer.len_samples(),
            "ambient source built, playback starting"
        );

        Ok(Self {
            engine,
            buffer,
            monitor: Rc::new(out.monitor),
            capture: Rc::new(out.capture),
            duration_ms: (duration_secs * 1000.0).round() as u64,
            started_at_ms: now_ms,
            stopped: false,
            ended_fired: false,
        })
    }

    /// The synthesized source buffer.
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// Interleaved PCM routed to the monitoring destination.
    pub fn monitor_pcm(&self) -> Rc<Vec<f32>> {
        Rc::clone(&self.monitor)
    }

    /// Interleaved PCM routed to the capturable destination.
    pub fn capture_pcm(&self) -> Rc<Vec<f32>> {
        Rc::clone(&self.capture)
    }

    /// Advance the playback clock; on natural end, run self-teardown once.
    ///
    /// Returns `true` the single time the end-of-playback notification fires.
    pub fn on_tick(&mut self, now_ms: u64) -> bool {
        if self.ended_fired {
            return false;
        }
        if now_ms.saturating_sub(self.started_at_ms) < self.duration_ms {
            return false;
        }
        self.ended_fired = true;
        self.stop();
        self.close();
        true
    }

    /// Stop playback. Idempotent: stopping an already-stopped source has no
    /// effect and never errors.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
    }

    /// Close the engine context. Idempotent.
    pub fn close(&mut self) {
        self.engine.close();
    }

    /// Whether playback has been stopped (manually or by natural end).
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether the engine context has been closed.
    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_short() -> AmbientSource {
        AmbientSource::build(0.25, 8_000, 1, 1_000).unwrap()
    }

    #[test]
    fn build_starts_playback_with_both_outputs() {
        let src = build_short();
        assert!(!src.is_stopped());
        assert!(!src.is_closed());
        assert_eq!(src.capture_pcm().len(), src.buffer().len_samples() * 2);
        assert_eq!(src.monitor_pcm().len(), src.capture_pcm().len());
    }

    #[test]
    fn natural_end_tears_down_exactly_once() {
        let mut src = build_short();
        assert!(!src.on_tick(1_100));
        assert!(src.on_tick(1_250), "end notification fires at the duration");
        assert!(src.is_stopped());
        assert!(src.is_closed());
        assert!(!src.on_tick(1_300), "end notification never re-fires");
    }

    #[test]
    fn early_stop_guards_end_teardown_against_reentry() {
        let mut src = build_short();
        src.stop();
        src.stop();
        assert!(src.is_stopped());
        // The natural end still closes the engine, but fires only once.
        assert!(src.on_tick(5_000));
        assert!(src.is_closed());
        assert!(!src.on_tick(6_000));
    }

    #[test]
    fn stop_and_close_are_idempotent() {
        let mut src = build_short();
        src.close();
        src.close();
        src.stop();
        src.stop();
        assert!(src.is_closed());
        assert!(src.is_stopped());
    }

    #[test]
    fn engine_acquisition_can_fail() {
        assert!(matches!(
            AmbientSource::build(1.0, 0, 0, 0),
            Err(DriftError::ResourceUnavailable(_))
        ));
    }
}
