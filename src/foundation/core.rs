use crate::foundation::error::{DriftError, DriftResult};

pub use kurbo::{Point, Vec2};

/// Fixed clip duration in milliseconds.
pub const CLIP_DURATION_MS: u64 = 10_000;
/// Fixed capture surface width in pixels.
pub const CAPTURE_WIDTH: u32 = 1280;
/// Fixed capture surface height in pixels.
pub const CAPTURE_HEIGHT: u32 = 720;
/// Fixed capture frame rate.
pub const CAPTURE_FPS: Fps = Fps { num: 60, den: 1 };
/// Fixed target video bitrate in bits per second.
pub const VIDEO_BITRATE: u32 = 3_000_000;
/// Fixed audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;
/// Fixed audio channel count (stereo).
pub const CHANNELS: u16 = 2;

/// Absolute 0-based frame index in capture timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> DriftResult<Self> {
        if num == 0 {
            return Err(DriftError::validation("Fps num must be > 0"));
        }
        if den == 0 {
            return Err(DriftError::validation("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in milliseconds.
    pub fn frame_duration_ms(self) -> f64 {
        1000.0 * f64::from(self.den) / f64::from(self.num)
    }

    /// Absolute timestamp in milliseconds of frame `idx` counted from the origin.
    pub fn frame_time_ms(self, idx: FrameIndex) -> f64 {
        (idx.0 as f64) * self.frame_duration_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_parts() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(60, 0).is_err());
        assert!(Fps::new(60, 1).is_ok());
    }

    #[test]
    fn frame_times_are_exact_multiples() {
        let fps = Fps { num: 60, den: 1 };
        assert!((fps.frame_duration_ms() - 16.666_666).abs() < 1e-3);
        assert_eq!(fps.frame_time_ms(FrameIndex(0)), 0.0);
        assert!((fps.frame_time_ms(FrameIndex(60)) - 1000.0).abs() < 1e-9);
    }
}
