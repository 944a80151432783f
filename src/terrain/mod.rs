//! Terrain definition and height resolution

pub mod generator;
pub use generator::{TerrainGenerator, TerrainParams};

pub mod definition;
pub use definition::{HeightOverrides, OverrideLayer, TerrainDefinition, VertexKey};

pub mod height;
pub use height::{
    HeightField, base_height, effective_height, round_height,
    set_height_override, clear_height_override,
};
