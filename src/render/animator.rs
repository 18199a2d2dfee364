//! Procedural scene painter and the frame-callback loop that drives it.
//!
//! Painting is a pure function of the immutable [`SceneState`] and elapsed time.
//! There is no accumulated per-frame state, so skipped frames never
//! desynchronize later frames and the loop is fully restartable.

use crate::foundation::core::{Fps, FrameIndex, Point, Vec2};
use crate::render::frame::{FrameRgba, premul};
use crate::scene::SceneState;

/// Backdrop gradient stops, straight RGBA (alpha in `0..=1`).
const BACKDROP_STOPS: [([f64; 3], f64); 3] = [
    ([35.0, 17.0, 64.0], 0.90),
    ([76.0, 29.0, 149.0], 0.85),
    ([168.0, 85.0, 247.0], 0.82),
];

/// Glow gradient colors: pink core, indigo mid, blue falloff.
const GLOW_CORE: [f64; 3] = [244.0, 114.0, 182.0];
const GLOW_MID: [f64; 3] = [129.0, 140.0, 248.0];
const GLOW_EDGE: [f64; 3] = [59.0, 130.0, 246.0];

/// Vignette band: white at low alpha over the lower third of the surface.
const VIGNETTE_ALPHA: f64 = 0.07;
const VIGNETTE_TOP: f64 = 0.65;

/// Paint one frame of the ambient scene at `elapsed_secs`.
pub fn paint_frame(frame: &mut FrameRgba, scene: &SceneState, elapsed_secs: f64) {
    frame.clear();
    paint_backdrop(frame);

    let w = f64::from(frame.width);
    let h = f64::from(frame.height);
    let mid = Point::new(w / 2.0, h / 2.0);

    for particle in scene.particles() {
        let seed = f64::from(particle.seed);

        // Two independent oscillatory phases, both normalized to [0, 1].
        let float = (elapsed_secs * 0.5 + seed).sin() * 0.5 + 0.5;
        let pulse = (elapsed_secs * 1.4 + seed * 0.3).sin() * 0.5 + 0.5;

        let orbit = Vec2::new(
            (elapsed_secs * 0.2 + seed).cos() * 40.0,
            (elapsed_secs * 0.18 + seed * 0.5).sin() * 60.0,
        );
        let center = mid + orbit;
        let radius = particle.base_radius * (0.7 + pulse * 0.3);

        paint_glow(frame, center, radius, float);
    }

    paint_vignette(frame);
}

/// Full-surface linear gradient from the top-left to the bottom-right corner.
fn paint_backdrop(frame: &mut FrameRgba) {
    let w = f64::from(frame.width);
    let h = f64::from(frame.height);
    // Projection of (x, y) onto the (w, h) diagonal, normalized to [0, 1].
    let inv_len_sq = 1.0 / (w * w + h * h);

    for y in 0..frame.height {
        for x in 0..frame.width {
            let t = (f64::from(x) * w + f64::from(y) * h) * inv_len_sq;
            let (rgb, alpha) = gradient_stop3(
                BACKDROP_STOPS[0],
                BACKDROP_STOPS[1],
                BACKDROP_STOPS[2],
                t,
            );
            frame.blend_px(
                i64::from(x),
                i64::from(y),
                premul(rgb[0], rgb[1], rgb[2], alpha),
            );
        }
    }
}

/// Soft radial glow centered at `center`, inner radius `0.2 * radius`.
fn paint_glow(frame: &mut FrameRgba, center: Point, radius: f64, float: f64) {
    if radius <= 0.0 {
        return;
    }
    let core = (GLOW_CORE, 0.35 + float * 0.25);
    let mid = (GLOW_MID, 0.20 + float * 0.35);
    let edge = (GLOW_EDGE, 0.0);

    let x0 = (center.x - radius).floor() as i64;
    let x1 = (center.x + radius).ceil() as i64;
    let y0 = (center.y - radius).floor() as i64;
    let y1 = (center.y + radius).ceil() as i64;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let d = center.distance(Point::new(x as f64 + 0.5, y as f64 + 0.5));
            if d > radius {
                continue;
            }
            // Gradient parameter between the inner (0.2r) and outer (r) radii.
            let t = ((d / radius - 0.2) / 0.8).clamp(0.0, 1.0);
            let (rgb, alpha) = gradient_stop3(core, mid, edge, t);
            frame.blend_px(x, y, premul(rgb[0], rgb[1], rgb[2], alpha));
        }
    }
}

fn paint_vignette(frame: &mut FrameRgba) {
    let band_top = (f64::from(frame.height) * VIGNETTE_TOP) as u32;
    let px = premul(255.0, 255.0, 255.0, VIGNETTE_ALPHA);
    for y in band_top..frame.height {
        for x in 0..frame.width {
            frame.blend_px(i64::from(x), i64::from(y), px);
        }
    }
}

/// Interpolate a three-stop gradient (stops at 0, 0.5, 1) at parameter `t`.
fn gradient_stop3(
    a: ([f64; 3], f64),
    b: ([f64; 3], f64),
    c: ([f64; 3], f64),
    t: f64,
) -> ([f64; 3], f64) {
    let t = t.clamp(0.0, 1.0);
    let (from, to, s) = if t <= 0.5 {
        (a, b, t * 2.0)
    } else {
        (b, c, (t - 0.5) * 2.0)
    };
    let lerp = |x: f64, y: f64| x + (y - x) * s;
    (
        [
            lerp(from.0[0], to.0[0]),
            lerp(from.0[1], to.0[1]),
            lerp(from.0[2], to.0[2]),
        ],
        lerp(from.1, to.1),
    )
}

/// Per-frame scheduling capability.
///
/// The painter is independent of the scheduling mechanism; any implementation
/// satisfying this contract works: frames are a deterministic function of
/// elapsed time, and scheduling is cancelable between any two frames.
pub trait FrameScheduler {
    /// Arm the scheduler with `now_ms` as the time origin.
    fn start(&mut self, now_ms: u64);
    /// Cancel the next scheduled callback. Idempotent.
    fn cancel(&mut self);
    /// Return the latest frame due at `now_ms`, if any, and advance past it.
    ///
    /// Frames missed between two polls are dropped, never replayed.
    fn poll(&mut self, now_ms: u64) -> Option<FrameIndex>;
}

/// Fixed-rate scheduler driven by the cooperative tick queue.
#[derive(Debug)]
pub struct TickScheduler {
    fps: Fps,
    origin_ms: Option<u64>,
    next_frame: u64,
}

impl TickScheduler {
    /// Create a scheduler emitting frame deadlines at `fps`.
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            origin_ms: None,
            next_frame: 0,
        }
    }
}

impl FrameScheduler for TickScheduler {
    fn start(&mut self, now_ms: u64) {
        self.origin_ms = Some(now_ms);
        self.next_frame = 0;
    }

    fn cancel(&mut self) {
        self.origin_ms = None;
    }

    fn poll(&mut self, now_ms: u64) -> Option<FrameIndex> {
        let origin = self.origin_ms?;
        if now_ms < origin {
            return None;
        }
        // Integer rational math; exact frame boundaries must not depend on
        // float rounding.
        let elapsed_ms = now_ms - origin;
        let due = elapsed_ms * u64::from(self.fps.num) / (1000 * u64::from(self.fps.den));
        if due < self.next_frame {
            return None;
        }
        self.next_frame = due + 1;
        Some(FrameIndex(due))
    }
}

/// The visual animator: owns the drawable surface and repaints it on every
/// scheduled frame callback.
pub struct Animator {
    scene: SceneState,
    surface: FrameRgba,
    scheduler: Box<dyn FrameScheduler>,
    fps: Fps,
    running: bool,
}

impl Animator {
    /// Create an animator over an acquired surface.
    pub fn new(
        surface: FrameRgba,
        scene: SceneState,
        scheduler: Box<dyn FrameScheduler>,
        fps: Fps,
    ) -> Self {
        Self {
            scene,
            surface,
            scheduler,
            fps,
            running: false,
        }
    }

    /// Begin the frame-callback sequence with `now_ms` as the time origin.
    pub fn start(&mut self, now_ms: u64) {
        self.scheduler.start(now_ms);
        self.running = true;
    }

    /// Cancel the next scheduled callback. Idempotent: stopping an animator
    /// that is not running has no effect.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.scheduler.cancel();
        self.running = false;
    }

    /// Whether the frame loop is armed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Process one cooperative tick: repaint the surface if a frame is due.
    ///
    /// Returns the painted frame index, if any.
    pub fn on_tick(&mut self, now_ms: u64) -> Option<FrameIndex> {
        if !self.running {
            return None;
        }
        let idx = self.scheduler.poll(now_ms)?;
        let elapsed_secs = self.fps.frame_time_ms(idx) / 1000.0;
        paint_frame(&mut self.surface, &self.scene, elapsed_secs);
        Some(idx)
    }

    /// Borrow the most recently painted surface.
    pub fn surface(&self) -> &FrameRgba {
        &self.surface
    }
}
