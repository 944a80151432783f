//! Chunk partitioning, mesh geometry, pooling and seam stitching

pub mod geometry;
pub mod partition;
pub mod pool;
pub mod registry;
pub mod seam;

pub use geometry::{
    build_chunk_geometry, refit_chunk_geometry, update_chunk_region, ChunkGeometry,
    GeometryUpdate, MeshReuse,
};
pub use partition::{
    compute_chunk_spec, resolve_chunk_cells, ChunkKey, ChunkLayout, ChunkRange, ChunkShapeKey,
    ChunkSpec, GridRegion, CHUNK_TARGET_WORLD_SIZE,
};
pub use pool::{MeshPool, PoolRelease, DEFAULT_POOL_MAX_PER_SIZE};
pub use registry::{ChunkCreation, ChunkEvent, ChunkMesh, ChunkRuntime, MaterialId, RuntimeRegistry};
pub use seam::stitch_seams;
