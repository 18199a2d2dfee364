//! The capture controller: one five-state session at a time, a one-shot
//! duration timer, and exactly-once resource teardown on every exit path.
//!
//! Scheduling is single-threaded cooperative: frame callbacks, the duration
//! timer, and drained encoder events all execute inside [`CaptureController::tick`]
//! in tick order. Any of the three termination triggers (timer, manual stop,
//! encoder error) may arrive first; they all funnel into one idempotent stop
//! routine.

use crate::audio::source::AmbientSource;
use crate::capture::encoder::{ClipEncoder, EncoderConfig, EncoderEvent, EncoderEvents};
use crate::capture::stream::{AudioTrack, CombinedStream, VideoTrack};
use crate::foundation::core::{
    CAPTURE_FPS, CAPTURE_HEIGHT, CAPTURE_WIDTH, CHANNELS, CLIP_DURATION_MS, Fps, SAMPLE_RATE,
    VIDEO_BITRATE,
};
use crate::foundation::error::DriftResult;
use crate::gallery::{ClipArtifact, GalleryItem, SessionGallery};
use crate::render::animator::{Animator, TickScheduler};
use crate::render::frame::SurfaceProvider;
use crate::scene::SceneState;

/// Observable session state.
///
/// `Finalized` and `Failed` are terminal and collapse back into `Idle`
/// immediately; their outcome is reported through
/// [`CaptureController::last_outcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No active session.
    Idle,
    /// Resources are being acquired; the only suspension point of the pipeline.
    Priming,
    /// The encoder is consuming the combined stream.
    Recording,
    /// A termination trigger fired; waiting for the encoder's stop acknowledgment.
    Stopping,
}

/// Which termination trigger ended the recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The fixed-duration timer fired.
    Timer,
    /// An external manual stop.
    Manual,
    /// The encoder reported an internal error.
    EncoderError,
}

/// Terminal outcome of the most recent session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// One artifact was emitted into the gallery.
    Finalized,
    /// Teardown ran, no artifact was emitted.
    Failed,
}

/// Fixed generation parameters.
///
/// Defaults are the production values; tests shrink the surface and duration.
#[derive(Clone, Copy, Debug)]
pub struct ControllerOpts {
    /// Capture surface width in pixels.
    pub width: u32,
    /// Capture surface height in pixels.
    pub height: u32,
    /// Capture frame rate.
    pub fps: Fps,
    /// Total clip duration in milliseconds.
    pub duration_ms: u64,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    /// Base noise seed; each run derives its own.
    pub seed: u64,
}

impl Default for ControllerOpts {
    fn default() -> Self {
        Self {
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            fps: CAPTURE_FPS,
            duration_ms: CLIP_DURATION_MS,
            sample_rate: SAMPLE_RATE,
            video_bitrate: VIDEO_BITRATE,
            seed: 0x00d7_1f7c_11b0_057e,
        }
    }
}

/// The owned unit of work for one generation run.
///
/// Owning the animation handle, the media tracks, and the audio graph in one
/// record (instead of mutable shared handles scattered across callbacks) makes
/// the teardown path explicit and exactly-once.
struct CaptureSession {
    state: SessionState,
    animator: Animator,
    stream: CombinedStream,
    source: AmbientSource,
    chunks: Vec<Vec<u8>>,
    /// One-shot duration deadline; disarmed on entering `Stopping`.
    deadline_ms: Option<u64>,
    stop_reason: Option<StopReason>,
    stop_acked: bool,
    error: Option<String>,
    torn_down: bool,
}

impl CaptureSession {
    /// Release the animator loop, the stream's tracks, and the audio graph.
    ///
    /// Runs exactly once regardless of which termination trigger got here;
    /// every underlying stop/close is itself idempotent.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.animator.stop();
        self.stream.stop_tracks();
        self.source.stop();
        self.source.close();
        tracing::debug!("capture session resources released");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Hosting-view teardown path: releasing the session mid-run must not
        // leak the animator, tracks, or engine.
        self.teardown();
    }
}

/// Drives one capture session at a time and collects finalized clips.
pub struct CaptureController {
    opts: ControllerOpts,
    encoder: Box<dyn ClipEncoder>,
    surfaces: Box<dyn SurfaceProvider>,
    session: Option<CaptureSession>,
    gallery: SessionGallery,
    last_outcome: Option<SessionOutcome>,
    last_stop_reason: Option<StopReason>,
    last_error: Option<String>,
    runs: u64,
}

impl CaptureController {
    /// Create a controller over an encoder and a surface provider.
    pub fn new(
        opts: ControllerOpts,
        encoder: Box<dyn ClipEncoder>,
        surfaces: Box<dyn SurfaceProvider>,
    ) -> Self {
        Self {
            opts,
            encoder,
            surfaces,
            session: None,
            gallery: SessionGallery::new(),
            last_outcome: None,
            last_stop_reason: None,
            last_error: None,
            runs: 0,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.as_ref().map_or(SessionState::Idle, |s| s.state)
    }

    /// Whether a session is active (non-terminal).
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The session gallery, newest first.
    pub fn gallery(&self) -> &SessionGallery {
        &self.gallery
    }

    /// Outcome of the most recent completed session.
    pub fn last_outcome(&self) -> Option<SessionOutcome> {
        self.last_outcome
    }

    /// Trigger that ended the most recent recording, if it reached `Recording`.
    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.last_stop_reason
    }

    /// User-visible message for the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Request a new generation run at `now_ms`.
    ///
    /// A request while a session is active is a silent no-op (returns `false`,
    /// no state changes). A failure during priming recovers at this boundary:
    /// everything acquired up to the failure point is released, the error is
    /// recorded, and the controller returns to `Idle`.
    #[tracing::instrument(skip(self))]
    pub fn request_generate(&mut self, now_ms: u64) -> bool {
        if self.session.is_some() {
            tracing::debug!("generation already active; request ignored");
            return false;
        }
        self.last_outcome = None;
        self.last_stop_reason = None;
        self.last_error = None;
        self.runs += 1;

        match self.prime(now_ms) {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(e) => {
                let msg = e.to_string();
                tracing::warn!(%msg, "generation request failed during priming");
                self.last_error = Some(msg);
                self.last_outcome = Some(SessionOutcome::Failed);
                false
            }
        }
    }

    /// Acquire every resource and start the encoder.
    ///
    /// `Idle -> Priming -> Recording`. On failure, resources acquired before
    /// the failure point are released before the error propagates.
    fn prime(&mut self, now_ms: u64) -> DriftResult<CaptureSession> {
        // Surface acquisition is first: failing here leaves nothing behind.
        let surface = self.surfaces.acquire(self.opts.width, self.opts.height)?;

        let mut animator = Animator::new(
            surface,
            SceneState::generate(),
            Box::new(TickScheduler::new(self.opts.fps)),
            self.opts.fps,
        );
        animator.start(now_ms);
        let video = VideoTrack::new(self.opts.fps);

        let duration_secs = self.opts.duration_ms as f64 / 1000.0;
        let seed = self.opts.seed.wrapping_add(self.runs);
        let source =
            match AmbientSource::build(duration_secs, self.opts.sample_rate, seed, now_ms) {
                Ok(source) => source,
                Err(e) => {
                    animator.stop();
                    return Err(e);
                }
            };

        let audio = AudioTrack::new(source.capture_pcm(), self.opts.sample_rate, CHANNELS);
        let stream = CombinedStream::merge(video, audio);

        let mut session = CaptureSession {
            state: SessionState::Priming,
            animator,
            stream,
            source,
            chunks: Vec::new(),
            deadline_ms: None,
            stop_reason: None,
            stop_acked: false,
            error: None,
            torn_down: false,
        };

        let cfg = EncoderConfig {
            width: self.opts.width,
            height: self.opts.height,
            fps: self.opts.fps,
            video_bitrate: self.opts.video_bitrate,
            sample_rate: self.opts.sample_rate,
            channels: CHANNELS,
        };
        if let Err(e) = self.encoder.start(cfg, session.stream.audio().pcm()) {
            session.teardown();
            return Err(e);
        }

        session.state = SessionState::Recording;
        session.deadline_ms = Some(now_ms.saturating_add(self.opts.duration_ms));
        tracing::debug!(deadline_ms = ?session.deadline_ms, "recording started");
        Ok(session)
    }

    /// Request an early manual stop. No-op when nothing is recording.
    pub fn stop(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        Self::enter_stopping(session, self.encoder.as_mut(), StopReason::Manual);
    }

    /// Process one cooperative tick at `now_ms`: paint due frames, advance the
    /// audio clock, drain encoder callbacks, and check the duration timer.
    pub fn tick(&mut self, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if session.state == SessionState::Recording {
            if session.animator.on_tick(now_ms).is_some() {
                self.encoder.push_frame(session.animator.surface());
            }
            session.source.on_tick(now_ms);
        }

        // Encoder callbacks re-enter the cooperative queue here.
        let errored = Self::apply_events(session, self.encoder.drain_events());

        let timer_fired = session.state == SessionState::Recording
            && session.deadline_ms.is_some_and(|d| now_ms >= d);

        if errored {
            Self::enter_stopping(session, self.encoder.as_mut(), StopReason::EncoderError);
        } else if timer_fired {
            Self::enter_stopping(session, self.encoder.as_mut(), StopReason::Timer);
        }

        // The stop request may acknowledge synchronously.
        Self::apply_events(session, self.encoder.drain_events());

        if session.state == SessionState::Stopping && session.stop_acked {
            self.finalize(now_ms);
        }
    }

    /// The single stop routine shared by all three termination triggers.
    ///
    /// No-op unless the session is recording, so racing triggers (e.g. the
    /// duration timer firing after a manual stop) have no effect.
    fn enter_stopping(
        session: &mut CaptureSession,
        encoder: &mut dyn ClipEncoder,
        reason: StopReason,
    ) {
        if session.state != SessionState::Recording {
            return;
        }
        session.state = SessionState::Stopping;
        session.deadline_ms = None; // disarm the duration timer
        session.stop_reason = Some(reason);
        tracing::debug!(?reason, "recording entering Stopping");
        encoder.request_stop();
        session.source.stop();
    }

    /// Fold drained encoder events into the session. Returns `true` when an
    /// error event was seen.
    fn apply_events(session: &mut CaptureSession, events: EncoderEvents) -> bool {
        let mut errored = false;
        for event in events {
            match event {
                EncoderEvent::Data(chunk) => {
                    if !chunk.is_empty() {
                        session.chunks.push(chunk);
                    }
                }
                EncoderEvent::Stopped => {
                    session.stop_acked = true;
                }
                EncoderEvent::Error(msg) => {
                    tracing::warn!(%msg, "encoder reported an error");
                    session.error.get_or_insert(msg);
                    errored = true;
                }
            }
        }
        errored
    }

    /// `Stopping -> Finalized | Failed`: teardown, then either emit exactly one
    /// gallery item or surface the recorded error.
    fn finalize(&mut self, now_ms: u64) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.teardown();
        self.last_stop_reason = session.stop_reason;

        if let Some(msg) = session.error.clone() {
            tracing::warn!(%msg, "capture session failed; no artifact emitted");
            self.last_error = Some(msg);
            self.last_outcome = Some(SessionOutcome::Failed);
            return;
        }

        let mut bytes = Vec::new();
        for chunk in &session.chunks {
            bytes.extend_from_slice(chunk);
        }
        let item = GalleryItem::new(
            ClipArtifact {
                bytes,
                mime: "video/mp4",
            },
            now_ms,
        );
        tracing::info!(id = %item.id, chunks = session.chunks.len(), "capture finalized");
        self.gallery.push_front(item);
        self.last_outcome = Some(SessionOutcome::Finalized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::encoder::InMemoryEncoder;
    use crate::render::frame::CpuSurfaceProvider;

    fn test_opts() -> ControllerOpts {
        ControllerOpts {
            width: 32,
            height: 18,
            fps: Fps { num: 60, den: 1 },
            duration_ms: 500,
            sample_rate: 8_000,
            video_bitrate: 3_000_000,
            seed: 1,
        }
    }

    fn controller(encoder: InMemoryEncoder) -> CaptureController {
        CaptureController::new(
            test_opts(),
            Box::new(encoder),
            Box::new(CpuSurfaceProvider),
        )
    }

    #[test]
    fn request_while_active_is_a_noop() {
        let mut c = controller(InMemoryEncoder::new());
        assert!(c.request_generate(0));
        assert_eq!(c.state(), SessionState::Recording);
        assert!(!c.request_generate(10), "second request must be rejected");
        assert_eq!(c.state(), SessionState::Recording);
        assert!(c.last_error().is_none(), "rejection is silent, not an error");
    }

    #[test]
    fn timer_and_manual_stop_race_is_single_stop() {
        let enc = InMemoryEncoder::new();
        let probe = enc.probe();
        let mut c = controller(enc);
        c.request_generate(0);
        c.stop();
        c.stop(); // second manual stop: no-op
        // Tick past the (already disarmed) deadline.
        c.tick(10_000);
        assert_eq!(probe.borrow().stop_requests, 1);
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.last_stop_reason(), Some(StopReason::Manual));
        assert_eq!(c.last_outcome(), Some(SessionOutcome::Finalized));
    }

    #[test]
    fn stop_with_no_session_is_a_noop() {
        let mut c = controller(InMemoryEncoder::new());
        c.stop();
        c.tick(100);
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.gallery().is_empty());
    }

    #[test]
    fn empty_chunks_are_filtered_from_the_artifact() {
        let enc = InMemoryEncoder::new().empty_chunk_every(2);
        let mut c = controller(enc);
        c.request_generate(0);
        for now in (0..=500).step_by(16) {
            c.tick(now);
        }
        c.tick(600);
        let item = c.gallery().front().expect("artifact emitted");
        assert!(!item.artifact.bytes.is_empty());
        assert!(
            item.artifact
                .bytes
                .len()
                .is_multiple_of(crate::capture::encoder::IN_MEMORY_CHUNK_LEN)
        );
    }
}
