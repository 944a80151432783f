//! Mesh pool - recycles chunk meshes by shape
//!
//! Evicted meshes are parked per [`ChunkShapeKey`] up to a fixed bound and
//! handed back out when a chunk of the same shape is created. Anything over
//! the bound is disposed immediately, so sustained churn can't grow the pool.

use std::collections::HashMap;

use crate::chunk::partition::ChunkShapeKey;
use crate::chunk::registry::{ChunkMesh, MaterialId};

/// Default number of parked meshes per shape
pub const DEFAULT_POOL_MAX_PER_SIZE: usize = 8;

/// What happened to a released mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolRelease {
    Pooled,
    Disposed,
}

/// Shape-keyed free list of inactive meshes
#[derive(Debug)]
pub struct MeshPool {
    buckets: HashMap<ChunkShapeKey, Vec<ChunkMesh>>,
    max_per_size: usize,
    /// Meshes dropped because their bucket was full
    disposed: u64,
}

impl MeshPool {
    pub fn new(max_per_size: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            max_per_size,
            disposed: 0,
        }
    }

    pub fn max_per_size(&self) -> usize {
        self.max_per_size
    }

    /// Park a detached mesh, or dispose it if its bucket is full
    pub fn release(&mut self, mut mesh: ChunkMesh) -> PoolRelease {
        let shape = mesh.geometry.shape();
        let bucket = self.buckets.entry(shape).or_default();
        if bucket.len() < self.max_per_size {
            mesh.visible = false;
            mesh.attached = false;
            bucket.push(mesh);
            PoolRelease::Pooled
        } else {
            log::trace!("Pool bucket {} full, disposing mesh", shape);
            self.disposed += 1;
            PoolRelease::Disposed
        }
    }

    /// Take a parked mesh of the given shape
    pub fn take(&mut self, shape: ChunkShapeKey) -> Option<ChunkMesh> {
        self.buckets.get_mut(&shape).and_then(Vec::pop)
    }

    /// Number of parked meshes for one shape
    pub fn len_for(&self, shape: ChunkShapeKey) -> usize {
        self.buckets.get(&shape).map_or(0, Vec::len)
    }

    /// Total parked meshes
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn disposed_count(&self) -> u64 {
        self.disposed
    }

    pub fn shapes(&self) -> impl Iterator<Item = ChunkShapeKey> + '_ {
        self.buckets.iter().filter(|(_, b)| !b.is_empty()).map(|(s, _)| *s)
    }

    pub fn set_material(&mut self, material: MaterialId) {
        for mesh in self.buckets.values_mut().flatten() {
            mesh.material = material;
        }
    }

    /// Drop every parked mesh
    pub fn clear(&mut self) {
        let count = self.len();
        self.buckets.clear();
        if count > 0 {
            log::trace!("Cleared {} pooled meshes", count);
        }
    }
}

impl Default for MeshPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_MAX_PER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::geometry::build_chunk_geometry;
    use crate::chunk::partition::{ChunkKey, ChunkLayout};
    use crate::terrain::{HeightField, TerrainDefinition, TerrainGenerator};

    fn make_mesh(def: &TerrainDefinition, key: ChunkKey) -> ChunkMesh {
        let generator = TerrainGenerator::new(def.generation.clone());
        let field = HeightField::new(def, &generator);
        let spec = ChunkLayout::new(def, 8).spec(key);
        ChunkMesh::new(build_chunk_geometry(&field, &spec), MaterialId::DEFAULT)
    }

    #[test]
    fn test_pool_new() {
        let pool = MeshPool::default();
        assert!(pool.is_empty());
        assert_eq!(pool.max_per_size(), DEFAULT_POOL_MAX_PER_SIZE);
    }

    #[test]
    fn test_release_and_take() {
        let def = TerrainDefinition::new(16, 16, 1.0);
        let mut pool = MeshPool::new(4);
        let mesh = make_mesh(&def, ChunkKey::new(0, 0));
        let shape = mesh.geometry.shape();

        assert_eq!(pool.release(mesh), PoolRelease::Pooled);
        assert_eq!(pool.len_for(shape), 1);

        let taken = pool.take(shape).unwrap();
        assert!(!taken.visible);
        assert!(!taken.attached);
        assert!(pool.take(shape).is_none());
    }

    #[test]
    fn test_pool_bound() {
        let def = TerrainDefinition::new(16, 16, 1.0);
        let mut pool = MeshPool::new(2);
        let shape = make_mesh(&def, ChunkKey::new(0, 0)).geometry.shape();

        let results: Vec<_> = (0..5)
            .map(|_| pool.release(make_mesh(&def, ChunkKey::new(0, 0))))
            .collect();
        assert_eq!(results.iter().filter(|r| **r == PoolRelease::Pooled).count(), 2);
        assert_eq!(pool.len_for(shape), 2);
        assert_eq!(pool.disposed_count(), 3);
    }

    #[test]
    fn test_buckets_are_per_shape() {
        let def = TerrainDefinition::new(12, 12, 1.0);
        let mut pool = MeshPool::new(1);
        // 8x8 and 8x4 chunks
        let full = make_mesh(&def, ChunkKey::new(0, 0));
        let narrow = make_mesh(&def, ChunkKey::new(0, 1));
        assert_ne!(full.geometry.shape(), narrow.geometry.shape());

        assert_eq!(pool.release(full), PoolRelease::Pooled);
        assert_eq!(pool.release(narrow), PoolRelease::Pooled);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.shapes().count(), 2);
    }

    #[test]
    fn test_zero_capacity_disposes_everything() {
        let def = TerrainDefinition::new(8, 8, 1.0);
        let mut pool = MeshPool::new(0);
        assert_eq!(pool.release(make_mesh(&def, ChunkKey::new(0, 0))), PoolRelease::Disposed);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_set_material_and_clear() {
        let def = TerrainDefinition::new(8, 8, 1.0);
        let mut pool = MeshPool::new(2);
        pool.release(make_mesh(&def, ChunkKey::new(0, 0)));
        pool.set_material(MaterialId(7));
        let shape = pool.shapes().next().unwrap();
        assert_eq!(pool.take(shape).unwrap().material, MaterialId(7));

        pool.release(make_mesh(&def, ChunkKey::new(0, 0)));
        pool.clear();
        assert!(pool.is_empty());
    }
}
