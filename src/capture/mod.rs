//! The capture pipeline: stream composition, encoding, and the session state
//! machine that bounds a recording to the fixed clip duration.

pub mod controller;
pub mod encoder;
pub mod stream;
