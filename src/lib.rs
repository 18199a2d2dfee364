//! driftclip: ambient audio-visual clip generation.
//!
//! A procedural particle scene is painted onto a CPU surface at a fixed frame
//! rate, a colored-noise bed is synthesized and routed through a small
//! processing graph with oscillating stereo pan, and both are composed into a
//! combined stream that a session-scoped capture controller records into
//! fixed-duration clips. Finalized clips accumulate in an in-memory gallery.
//!
//! Everything runs on a single-threaded cooperative tick queue: the embedding
//! binary (or test) calls [`capture::controller::CaptureController::tick`]
//! with a monotonic clock and the controller drives the animator, the audio
//! clock, and the encoder event queue in tick order.

#![forbid(unsafe_code)]

pub mod audio;
pub mod capture;
pub mod foundation;
pub mod gallery;
pub mod render;
pub mod scene;

pub use capture::controller::{
    CaptureController, ControllerOpts, SessionOutcome, SessionState, StopReason,
};
pub use foundation::error::{DriftError, DriftResult};
pub use gallery::{ClipArtifact, GalleryItem, SessionGallery};
