//! Runtime registry - live chunks, mesh pool and streaming bookkeeping
//!
//! One registry exists per terrain runtime. It exclusively owns every chunk
//! mesh (live or pooled) and the pending work queues. A chunk key is never
//! both live and pending creation, and only live keys are pending destruction.

use std::collections::BTreeMap;

use crate::chunk::geometry::{build_chunk_geometry, refit_chunk_geometry, ChunkGeometry, MeshReuse};
use crate::chunk::partition::{ChunkKey, ChunkLayout, ChunkSpec};
use crate::chunk::pool::{MeshPool, PoolRelease};
use crate::core::types::Vec3;
use crate::streaming::priority::{CreateQueue, DestroyQueue};
use crate::streaming::window::WindowSignature;
use crate::terrain::definition::TerrainDefinition;
use crate::terrain::height::HeightField;

/// Opaque handle to a caller-side material
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Shared fallback used until the caller supplies a material
    pub const DEFAULT: MaterialId = MaterialId(0);
}

impl Default for MaterialId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Renderable mesh object for one chunk
#[derive(Clone, Debug)]
pub struct ChunkMesh {
    pub geometry: ChunkGeometry,
    pub material: MaterialId,
    pub visible: bool,
    /// Whether the mesh is part of the caller's scene
    pub attached: bool,
}

impl ChunkMesh {
    pub fn new(geometry: ChunkGeometry, material: MaterialId) -> Self {
        Self {
            geometry,
            material,
            visible: true,
            attached: true,
        }
    }
}

/// A live chunk
#[derive(Clone, Debug)]
pub struct ChunkRuntime {
    pub key: ChunkKey,
    pub spec: ChunkSpec,
    pub mesh: ChunkMesh,
}

/// Scene-graph changes for the caller to mirror
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    /// Mesh became live and should be added to the scene
    Attached(ChunkKey),
    /// Mesh left the scene (pooled or disposed)
    Detached(ChunkKey),
    /// Live mesh buffers changed and need re-upload
    Updated(ChunkKey),
}

/// How a chunk came to be live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkCreation {
    /// Already live, nothing done
    Existing,
    /// Built from scratch
    Fresh,
    /// Taken from the pool; the tag says whether its buffers could be reused
    Pooled(MeshReuse),
}

/// Per-terrain chunk state
#[derive(Debug)]
pub struct RuntimeRegistry {
    definition_signature: u64,
    layout: ChunkLayout,
    chunks: BTreeMap<ChunkKey, ChunkRuntime>,
    pool: MeshPool,
    pub(crate) pending_create: CreateQueue,
    pub(crate) pending_destroy: DestroyQueue,
    pub(crate) last_update_ms: Option<f64>,
    pub(crate) last_viewpoint: Option<Vec3>,
    pub(crate) window_signature: Option<WindowSignature>,
    events: Vec<ChunkEvent>,
}

impl RuntimeRegistry {
    pub fn new(def: &TerrainDefinition, chunk_cells: u32, pool_max_per_size: usize) -> Self {
        Self {
            definition_signature: def.structural_signature(),
            layout: ChunkLayout::new(def, chunk_cells),
            chunks: BTreeMap::new(),
            pool: MeshPool::new(pool_max_per_size),
            pending_create: CreateQueue::new(),
            pending_destroy: DestroyQueue::new(),
            last_update_ms: None,
            last_viewpoint: None,
            window_signature: None,
            events: Vec::new(),
        }
    }

    /// Whether this registry was built for the same structure and chunk size
    pub fn is_valid_for(&self, def: &TerrainDefinition, chunk_cells: u32) -> bool {
        self.definition_signature == def.structural_signature()
            && self.layout.chunk_cells == chunk_cells.max(1)
    }

    pub fn definition_signature(&self) -> u64 {
        self.definition_signature
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn chunk_cells(&self) -> u32 {
        self.layout.chunk_cells
    }

    pub fn pool(&self) -> &MeshPool {
        &self.pool
    }

    pub fn get(&self, key: ChunkKey) -> Option<&ChunkRuntime> {
        self.chunks.get(&key)
    }

    pub fn get_mut(&mut self, key: ChunkKey) -> Option<&mut ChunkRuntime> {
        self.chunks.get_mut(&key)
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Live chunk keys in row-major order
    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.keys().copied()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &ChunkRuntime> {
        self.chunks.values()
    }

    pub(crate) fn chunks_mut(&mut self) -> impl Iterator<Item = &mut ChunkRuntime> {
        self.chunks.values_mut()
    }

    pub fn pending_create_len(&self) -> usize {
        self.pending_create.len()
    }

    pub fn pending_destroy_len(&self) -> usize {
        self.pending_destroy.len()
    }

    pub fn is_pending_create(&self, key: ChunkKey) -> bool {
        self.pending_create.contains(key)
    }

    pub fn is_pending_destroy(&self, key: ChunkKey) -> bool {
        self.pending_destroy.contains(key)
    }

    /// Make a chunk live, reusing a pooled mesh of the same shape when possible
    pub fn ensure_chunk_mesh(
        &mut self,
        field: &HeightField<'_>,
        key: ChunkKey,
        material: Option<MaterialId>,
    ) -> ChunkCreation {
        let key = self.layout.clamp_key(key);
        if self.chunks.contains_key(&key) {
            return ChunkCreation::Existing;
        }
        self.pending_create.remove(key);

        let spec = self.layout.spec(key);
        let material = material.unwrap_or_default();

        let (mesh, creation) = match self.pool.take(spec.shape()) {
            Some(mut mesh) => {
                let reuse = refit_chunk_geometry(&mut mesh.geometry, field, &spec);
                log::trace!("Chunk {} from pool ({:?})", key, reuse);
                mesh.material = material;
                mesh.visible = true;
                mesh.attached = true;
                (mesh, ChunkCreation::Pooled(reuse))
            }
            None => {
                let geometry = build_chunk_geometry(field, &spec);
                (ChunkMesh::new(geometry, material), ChunkCreation::Fresh)
            }
        };

        self.chunks.insert(key, ChunkRuntime { key, spec, mesh });
        self.events.push(ChunkEvent::Attached(key));
        creation
    }

    /// Insert geometry built elsewhere (e.g. on a worker thread)
    ///
    /// Returns false, dropping the geometry, if the key is already live or
    /// the geometry does not fit the chunk.
    pub fn insert_built(
        &mut self,
        key: ChunkKey,
        geometry: ChunkGeometry,
        material: Option<MaterialId>,
    ) -> bool {
        let key = self.layout.clamp_key(key);
        let spec = self.layout.spec(key);
        if self.chunks.contains_key(&key) || !geometry.matches(&spec) {
            return false;
        }
        self.pending_create.remove(key);
        let mesh = ChunkMesh::new(geometry, material.unwrap_or_default());
        self.chunks.insert(key, ChunkRuntime { key, spec, mesh });
        self.events.push(ChunkEvent::Attached(key));
        true
    }

    /// Evict a live chunk, parking its mesh in the pool or disposing it
    pub fn release_chunk_to_pool(&mut self, key: ChunkKey) -> Option<PoolRelease> {
        let chunk = self.chunks.remove(&key)?;
        self.pending_destroy.remove(key);
        self.events.push(ChunkEvent::Detached(key));
        Some(self.pool.release(chunk.mesh))
    }

    /// Point every live and pooled mesh at one material
    pub fn set_material(&mut self, material: MaterialId) {
        for chunk in self.chunks.values_mut() {
            chunk.mesh.material = material;
        }
        self.pool.set_material(material);
    }

    pub(crate) fn push_event(&mut self, event: ChunkEvent) {
        self.events.push(event);
    }

    /// Take the pending scene-graph events
    pub fn drain_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop every chunk, pooled mesh and queued job
    pub fn teardown(&mut self) {
        let keys: Vec<_> = self.chunks.keys().copied().collect();
        for key in keys {
            self.events.push(ChunkEvent::Detached(key));
        }
        self.chunks.clear();
        self.pool.clear();
        self.pending_create.clear();
        self.pending_destroy.clear();
        self.window_signature = None;
        self.last_update_ms = None;
        self.last_viewpoint = None;
    }
}
