//! Ambient audio synthesis: colored-noise generation, the signal processing
//! graph, and the playback source lifecycle.

pub mod graph;
pub mod noise;
pub mod source;
