//! Terrastream - streamed, sculptable height-field terrain chunks
//!
//! A logical height grid is split into chunks that are built, pooled and
//! evicted around a moving viewpoint under a per-tick budget, with shared
//! edge normals stitched so lighting stays continuous across chunks.

pub mod core;
pub mod math;
pub mod terrain;
pub mod chunk;
pub mod streaming;
pub mod sculpt;
pub mod runtime;
pub mod export;

pub use crate::core::error::Error;
pub use crate::core::types::Result;
pub use chunk::{ChunkEvent, ChunkKey, GridRegion, MaterialId};
pub use runtime::{RuntimeSync, TerrainRuntime};
pub use sculpt::{BrushShape, SculptOperation, SculptParams};
pub use streaming::{StreamingConfig, UpdateBudget, UpdateOptions, UpdateReport};
pub use terrain::{TerrainDefinition, TerrainParams};
