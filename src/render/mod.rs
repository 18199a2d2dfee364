//! CPU rendering: drawable surfaces and the procedural frame painter.

pub mod animator;
pub mod frame;
