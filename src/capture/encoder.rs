//! Clip encoders.
//!
//! The encoder is event-driven: data, stop-acknowledgment, and error callbacks
//! from the original asynchronous interface are modeled as polled
//! [`EncoderEvent`]s on the cooperative queue. Every encoder must acknowledge
//! [`ClipEncoder::request_stop`] with a terminal [`EncoderEvent::Stopped`],
//! after any trailing data or error events.

use crate::foundation::core::Fps;
use crate::foundation::error::{DriftError, DriftResult};
use crate::render::frame::FrameRgba;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::rc::Rc;

/// Fixed encoding configuration for one capture session.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EncoderConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Capture frame rate.
    pub fps: Fps,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u16,
}

/// Events emitted by an encoder, drained on the cooperative queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncoderEvent {
    /// An encoded data chunk became available.
    Data(Vec<u8>),
    /// The encoder acknowledged its stop and will emit nothing further.
    Stopped,
    /// The encoder failed internally.
    Error(String),
}

/// Batch of drained encoder events.
pub type EncoderEvents = SmallVec<[EncoderEvent; 4]>;

/// Contract for encoding a combined stream into chunks.
pub trait ClipEncoder {
    /// Begin encoding. `capture_pcm` is the capture track's interleaved PCM,
    /// declared up front; video frames stream in through
    /// [`ClipEncoder::push_frame`].
    fn start(&mut self, cfg: EncoderConfig, capture_pcm: &[f32]) -> DriftResult<()>;

    /// Push one painted frame in timeline order. Failures surface as
    /// [`EncoderEvent::Error`], never as panics.
    fn push_frame(&mut self, frame: &FrameRgba);

    /// Ask the encoder to stop. Idempotent: a second request is a no-op.
    fn request_stop(&mut self);

    /// Drain pending events in emission order.
    fn drain_events(&mut self) -> EncoderEvents;
}

fn validate_config(cfg: &EncoderConfig) -> DriftResult<()> {
    if cfg.width == 0 || cfg.height == 0 {
        return Err(DriftError::validation("encoder width/height must be non-zero"));
    }
    if cfg.fps.num == 0 || cfg.fps.den == 0 {
        return Err(DriftError::validation("encoder fps must be non-zero"));
    }
    if cfg.video_bitrate == 0 {
        return Err(DriftError::validation("encoder bitrate must be non-zero"));
    }
    if cfg.sample_rate == 0 || cfg.channels == 0 {
        return Err(DriftError::validation(
            "encoder audio sample_rate/channels must be non-zero",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory encoder (tests and offline debugging)
// ---------------------------------------------------------------------------

/// Byte length of one in-memory data chunk.
pub const IN_MEMORY_CHUNK_LEN: usize = 16;

/// Counters observable from outside a running pipeline.
#[derive(Debug, Default)]
pub struct ProbeState {
    /// Number of successful `start` calls.
    pub started: usize,
    /// Frames pushed since the last start.
    pub frames_pushed: usize,
    /// Total stop requests received since the last start.
    pub stop_requests: usize,
    /// Interleaved PCM samples received at the last start.
    pub audio_samples: usize,
}

/// Shared handle onto an [`InMemoryEncoder`]'s counters.
pub type EncoderProbe = Rc<RefCell<ProbeState>>;

/// In-memory encoder emitting one 16-byte chunk per pushed frame.
#[derive(Debug, Default)]
pub struct InMemoryEncoder {
    probe: EncoderProbe,
    events: Vec<EncoderEvent>,
    started: bool,
    stop_requested: bool,
    errored: bool,
    fail_after_frames: Option<usize>,
    empty_chunk_every: Option<usize>,
}

impl InMemoryEncoder {
    /// Create an in-memory encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an [`EncoderEvent::Error`] after `n` frames (mid-recording failure).
    pub fn fail_after_frames(mut self, n: usize) -> Self {
        self.fail_after_frames = Some(n);
        self
    }

    /// Emit an empty data chunk every `n`-th frame (must be filtered out by
    /// the accumulator).
    pub fn empty_chunk_every(mut self, n: usize) -> Self {
        self.empty_chunk_every = Some(n);
        self
    }

    /// Shared counter handle, valid after the encoder moves into a pipeline.
    pub fn probe(&self) -> EncoderProbe {
        Rc::clone(&self.probe)
    }
}

impl ClipEncoder for InMemoryEncoder {
    fn start(&mut self, cfg: EncoderConfig, capture_pcm: &[f32]) -> DriftResult<()> {
        validate_config(&cfg)?;
        let mut probe = self.probe.borrow_mut();
        probe.started += 1;
        probe.frames_pushed = 0;
        probe.stop_requests = 0;
        probe.audio_samples = capture_pcm.len();
        self.events.clear();
        self.started = true;
        self.stop_requested = false;
        self.errored = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRgba) {
        if !self.started || self.stop_requested || self.errored {
            return;
        }
        let count = {
            let mut probe = self.probe.borrow_mut();
            probe.frames_pushed += 1;
            probe.frames_pushed
        };

        if let Some(n) = self.fail_after_frames
            && count > n
        {
            self.errored = true;
            self.events
                .push(EncoderEvent::Error("synthetic encoder failure".to_owned()));
            return;
        }

        if let Some(n) = self.empty_chunk_every
            && count.is_multiple_of(n)
        {
            self.events.push(EncoderEvent::Data(Vec::new()));
            return;
        }

        let mut chunk = Vec::with_capacity(IN_MEMORY_CHUNK_LEN);
        chunk.extend_from_slice(&(count as u64).to_le_bytes());
        chunk.extend_from_slice(&xxhash_rust::xxh3::xxh3_64(&frame.data).to_le_bytes());
        self.events.push(EncoderEvent::Data(chunk));
    }

    fn request_stop(&mut self) {
        if !self.started || self.stop_requested {
            return;
        }
        self.stop_requested = true;
        self.probe.borrow_mut().stop_requests += 1;
        self.events.push(EncoderEvent::Stopped);
    }

    fn drain_events(&mut self) -> EncoderEvents {
        self.events.drain(..).collect()
    }
}

// ---------------------------------------------------------------------------
// ffmpeg encoder
// ---------------------------------------------------------------------------

/// Encoder that spawns the system `ffmpeg`, streams raw RGBA8 frames to its
/// stdin and the capture PCM through an `f32le` temp file, and emits the
/// finished MP4 as a single data chunk on stop acknowledgment.
pub struct FfmpegEncoder {
    out_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    cfg: Option<EncoderConfig>,
    stop_requested: bool,
    events: Vec<EncoderEvent>,
}

impl FfmpegEncoder {
    /// Create a new `ffmpeg`-backed encoder.
    pub fn new() -> Self {
        Self {
            out_path: None,
            audio_path: None,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            stop_requested: false,
            events: Vec::new(),
        }
    }

    fn temp_path(suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "driftclip_{}_{}.{suffix}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ))
    }

    fn cleanup_temp_files(&mut self) {
        if let Some(path) = self.audio_path.take() {
            let _ = std::fs::remove_file(path);
        }
        if let Some(path) = self.out_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.cleanup_temp_files();
    }
}

impl ClipEncoder for FfmpegEncoder {
    fn start(&mut self, cfg: EncoderConfig, capture_pcm: &[f32]) -> DriftResult<()> {
        validate_config(&cfg)?;
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(DriftError::validation(
                "ffmpeg encoder width/height must be even (required for yuv420p output)",
            ));
        }
        if !is_ffmpeg_on_path() {
            return Err(DriftError::encoder(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        self.cleanup_temp_files();
        let out_path = Self::temp_path("mp4");
        let audio_path = Self::temp_path("f32le");
        write_f32le_file(capture_pcm, &audio_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-f",
            "f32le",
            "-ar",
            &cfg.sample_rate.to_string(),
            "-ac",
            &cfg.channels.to_string(),
            "-i",
        ])
        .arg(&audio_path)
        .args([
            "-c:v",
            "libx264",
            "-b:v",
            &cfg.video_bitrate.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-shortest",
            "-movflags",
            "+faststart",
        ])
        .arg(&out_path);

        let mut child = cmd.spawn().map_err(|e| {
            DriftError::encoder(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriftError::encoder("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DriftError::encoder("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.out_path = Some(out_path);
        self.audio_path = Some(audio_path);
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.stop_requested = false;
        self.events.clear();
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRgba) {
        if self.stop_requested {
            return;
        }
        let Some(cfg) = self.cfg.as_ref() else {
            return;
        };
        if frame.width != cfg.width
            || frame.height != cfg.height
            || frame.data.len() != self.scratch.len()
        {
            self.events.push(EncoderEvent::Error(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
            return;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };

        // ffmpeg does not understand premultiplied alpha; flatten over black.
        flatten_premul_over_black(&mut self.scratch, &frame.data);

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(&self.scratch) {
            self.events.push(EncoderEvent::Error(format!(
                "failed to write frame to ffmpeg stdin: {e}"
            )));
        }
    }

    fn request_stop(&mut self) {
        if self.stop_requested || self.cfg.is_none() {
            return;
        }
        self.stop_requested = true;

        drop(self.stdin.take());
        let mut finish = || -> DriftResult<Vec<u8>> {
            let mut child = self
                .child
                .take()
                .ok_or_else(|| DriftError::encoder("ffmpeg encoder not started"))?;
            let status = child
                .wait()
                .map_err(|e| DriftError::encoder(format!("failed to wait for ffmpeg: {e}")))?;
            let stderr_bytes = match self.stderr_drain.take() {
                Some(handle) => handle
                    .join()
                    .map_err(|_| DriftError::encoder("ffmpeg stderr drain thread panicked"))?
                    .map_err(|e| DriftError::encoder(format!("ffmpeg stderr read failed: {e}")))?,
                None => Vec::new(),
            };
            if !status.success() {
                let stderr = String::from_utf8_lossy(&stderr_bytes);
                return Err(DriftError::encoder(format!(
                    "ffmpeg exited with status {status}: {}",
                    stderr.trim()
                )));
            }
            let out_path = self
                .out_path
                .as_ref()
                .ok_or_else(|| DriftError::encoder("ffmpeg output path missing"))?;
            std::fs::read(out_path)
                .map_err(|e| DriftError::encoder(format!("failed to read encoded output: {e}")))
        };

        match finish() {
            Ok(bytes) => self.events.push(EncoderEvent::Data(bytes)),
            Err(e) => self.events.push(EncoderEvent::Error(e.to_string())),
        }
        self.events.push(EncoderEvent::Stopped);
        self.cleanup_temp_files();
    }

    fn drain_events(&mut self) -> EncoderEvents {
        self.events.drain(..).collect()
    }
}

fn flatten_premul_over_black(dst: &mut [u8], src_premul: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 255;
    }
}

fn write_f32le_file(samples: &[f32], path: &Path) -> DriftResult<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    std::fs::write(path, bytes).map_err(|e| {
        DriftError::encoder(format!(
            "failed to write capture audio file '{}': {e}",
            path.display()
        ))
    })
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EncoderConfig {
        EncoderConfig {
            width: 8,
            height: 8,
            fps: Fps { num: 60, den: 1 },
            video_bitrate: 3_000_000,
            sample_rate: 48_000,
            channels: 2,
        }
    }

    fn frame() -> FrameRgba {
        FrameRgba::new(8, 8)
    }

    #[test]
    fn in_memory_emits_one_chunk_per_frame() {
        let mut enc = InMemoryEncoder::new();
        enc.start(cfg(), &[0.0; 8]).unwrap();
        enc.push_frame(&frame());
        enc.push_frame(&frame());
        let events = enc.drain_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(
            e,
            EncoderEvent::Data(c) if c.len() == IN_MEMORY_CHUNK_LEN
        )));
    }

    #[test]
    fn in_memory_stop_acks_once() {
        let mut enc = InMemoryEncoder::new();
        let probe = enc.probe();
        enc.start(cfg(), &[]).unwrap();
        enc.request_stop();
        enc.request_stop();
        let events = enc.drain_events();
        assert_eq!(events.as_slice(), [EncoderEvent::Stopped]);
        assert_eq!(probe.borrow().stop_requests, 1);
    }

    #[test]
    fn in_memory_fails_after_configured_frames() {
        let mut enc = InMemoryEncoder::new().fail_after_frames(1);
        enc.start(cfg(), &[]).unwrap();
        enc.push_frame(&frame());
        enc.push_frame(&frame());
        enc.push_frame(&frame());
        let events = enc.drain_events();
        assert_eq!(events.len(), 2, "no data after the error");
        assert!(matches!(events[0], EncoderEvent::Data(_)));
        assert!(matches!(events[1], EncoderEvent::Error(_)));
    }

    #[test]
    fn in_memory_ignores_frames_before_start_and_after_stop() {
        let mut enc = InMemoryEncoder::new();
        enc.push_frame(&frame());
        assert!(enc.drain_events().is_empty());
        enc.start(cfg(), &[]).unwrap();
        enc.request_stop();
        enc.push_frame(&frame());
        let events = enc.drain_events();
        assert_eq!(events.as_slice(), [EncoderEvent::Stopped]);
    }

    #[test]
    fn config_validation_rejects_zeroes() {
        let mut enc = InMemoryEncoder::new();
        let mut bad = cfg();
        bad.width = 0;
        assert!(enc.start(bad, &[]).is_err());
        let mut bad = cfg();
        bad.sample_rate = 0;
        assert!(enc.start(bad, &[]).is_err());
    }

    #[test]
    fn ffmpeg_encodes_frames_into_one_mp4_chunk() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let mut enc = FfmpegEncoder::new();
        enc.start(cfg(), &[0.0f32; 1_600]).unwrap();
        for _ in 0..6 {
            enc.push_frame(&frame());
        }
        enc.request_stop();
        enc.request_stop();
        let events = enc.drain_events();
        assert_eq!(events.len(), 2, "one data chunk plus the stop ack");
        let EncoderEvent::Data(bytes) = &events[0] else {
            panic!("expected a data chunk, got {:?}", events[0]);
        };
        assert!(!bytes.is_empty());
        assert_eq!(events[1], EncoderEvent::Stopped);
    }

    #[test]
    fn flatten_discards_alpha_only() {
        let src = [10u8, 20, 30, 128, 0, 0, 0, 0];
        let mut dst = [0u8; 8];
        flatten_premul_over_black(&mut dst, &src);
        assert_eq!(dst, [10, 20, 30, 255, 0, 0, 0, 255]);
    }
}
