//! Brush-based sculpting of the manual height layer

pub mod brush;
pub mod engine;

pub use brush::{brush_region, falloff, influence, jitter, BrushShape, SculptOperation, SculptParams};
pub use engine::{sculpt, sculpt_with};
