//! `TerrainRuntime` - the handle a caller keeps for one streamed terrain
//!
//! The runtime owns the chunk registry and a generator matching the
//! definition it was last driven with. Every entry point first checks the
//! definition still fits; a structural change tears everything down and a
//! generation-only change refits the live chunks in place.

use std::path::Path;

use rayon::prelude::*;

use crate::chunk::geometry::{build_chunk_geometry, refit_chunk_geometry, update_chunk_region, GeometryUpdate};
use crate::chunk::partition::{resolve_chunk_cells, ChunkKey, ChunkRange, GridRegion};
use crate::chunk::registry::{ChunkEvent, ChunkRuntime, MaterialId, RuntimeRegistry};
use crate::chunk::seam::stitch_seams;
use crate::core::types::{Result, Vec3};
use crate::sculpt::brush::{brush_region, SculptParams};
use crate::sculpt::engine::sculpt_with;
use crate::streaming::budget::{StreamingConfig, UpdateOptions};
use crate::streaming::scheduler::{self, UpdateReport};
use crate::streaming::window::compute_window;
use crate::terrain::definition::TerrainDefinition;
use crate::terrain::generator::TerrainGenerator;
use crate::terrain::height::HeightField;

/// How `ensure_runtime_state` reconciled the runtime with a definition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeSync {
    Unchanged,
    /// Generation parameters changed; live chunks were refitted
    Refitted,
    /// Structure changed; the registry was rebuilt empty
    Reset,
}

/// Streamed chunk set for one terrain definition
pub struct TerrainRuntime {
    config: StreamingConfig,
    registry: RuntimeRegistry,
    generator: TerrainGenerator,
    material: Option<MaterialId>,
}

impl TerrainRuntime {
    /// Create a runtime with default configuration and seed the origin neighbourhood
    pub fn create_terrain_chunks(def: &TerrainDefinition) -> Self {
        Self::with_config(def, StreamingConfig::default())
    }

    /// Create a runtime and seed the chunks around the world origin
    pub fn with_config(def: &TerrainDefinition, config: StreamingConfig) -> Self {
        let chunk_cells = resolve_chunk_cells(def, config.chunk_target_size);
        let registry = RuntimeRegistry::new(def, chunk_cells, config.pool_max_per_size);
        let generator = TerrainGenerator::new(def.generation.clone());
        let mut runtime = Self { config, registry, generator, material: None };
        runtime.seed(def);
        log::info!(
            "Terrain runtime: {}x{} cells, {} cells per chunk, {} chunks ({} seeded)",
            def.total_rows(),
            def.total_columns(),
            chunk_cells,
            runtime.registry.layout().chunk_count(),
            runtime.registry.len(),
        );
        runtime
    }

    fn seed(&mut self, def: &TerrainDefinition) {
        let layout = *self.registry.layout();
        let window = compute_window(def, &layout, None, 0.0, self.config.seed_radius_chunks);
        let field = HeightField::new(def, &self.generator);
        for key in window.load.keys() {
            self.registry.ensure_chunk_mesh(&field, key, self.material);
        }
        stitch_seams(&mut self.registry, Some(window.load));
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// Material applied to every chunk, or the shared default
    pub fn material(&self) -> MaterialId {
        self.material.unwrap_or_default()
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&ChunkRuntime> {
        self.registry.get(key)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &ChunkRuntime> {
        self.registry.chunks()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Take the scene-graph events recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<ChunkEvent> {
        self.registry.drain_events()
    }

    /// Reconcile the runtime with `def`
    ///
    /// A new structural signature or chunk size tears down the registry
    /// (live chunks, pool and queues); changed generation parameters only
    /// refit live chunks.
    pub fn ensure_runtime_state(&mut self, def: &TerrainDefinition) -> RuntimeSync {
        let chunk_cells = resolve_chunk_cells(def, self.config.chunk_target_size);
        if !self.registry.is_valid_for(def, chunk_cells) {
            log::info!(
                "Terrain structure changed ({} -> {} cells per chunk), resetting {} chunks",
                self.registry.chunk_cells(),
                chunk_cells,
                self.registry.len(),
            );
            self.registry.teardown();
            let events = self.registry.drain_events();
            self.registry = RuntimeRegistry::new(def, chunk_cells, self.config.pool_max_per_size);
            for event in events {
                self.registry.push_event(event);
            }
            self.generator = TerrainGenerator::new(def.generation.clone());
            return RuntimeSync::Reset;
        }

        if *self.generator.params() != def.generation {
            self.generator = TerrainGenerator::new(def.generation.clone());
            let field = HeightField::new(def, &self.generator);
            let mut keys = Vec::new();
            for chunk in self.registry.chunks_mut() {
                refit_chunk_geometry(&mut chunk.mesh.geometry, &field, &chunk.spec);
                keys.push(chunk.key);
            }
            stitch_seams(&mut self.registry, None);
            for key in &keys {
                self.registry.push_event(ChunkEvent::Updated(*key));
            }
            log::info!("Generation parameters changed, refitted {} chunks", keys.len());
            return RuntimeSync::Refitted;
        }

        RuntimeSync::Unchanged
    }

    /// Per-tick streaming entry point
    ///
    /// `now_ms` is the caller's monotonic clock in milliseconds.
    pub fn update_chunks(
        &mut self,
        def: &TerrainDefinition,
        viewpoint: Option<Vec3>,
        options: &UpdateOptions,
        now_ms: f64,
    ) -> UpdateReport {
        self.ensure_runtime_state(def);
        let resolved = self.config.resolve(options);
        let field = HeightField::new(def, &self.generator);
        scheduler::update_chunks(
            &mut self.registry,
            &field,
            viewpoint,
            options.load_radius,
            &resolved,
            now_ms,
            self.material,
        )
    }

    /// Materialise every chunk without any budget
    ///
    /// Missing geometry is built on the rayon pool and inserted on this
    /// thread. Pending queues are dropped; the next update re-plans.
    pub fn ensure_all_chunks(&mut self, def: &TerrainDefinition) -> usize {
        self.ensure_runtime_state(def);
        let layout = *self.registry.layout();
        let missing: Vec<ChunkKey> = layout
            .full_range()
            .keys()
            .filter(|key| !self.registry.contains(*key))
            .collect();

        let field = HeightField::new(def, &self.generator);
        let built: Vec<_> = missing
            .par_iter()
            .map(|&key| (key, build_chunk_geometry(&field, &layout.spec(key))))
            .collect();

        let mut inserted = 0;
        for (key, geometry) in built {
            if self.registry.insert_built(key, geometry, self.material) {
                inserted += 1;
            }
        }

        self.registry.pending_create.clear();
        self.registry.pending_destroy.clear();
        self.registry.window_signature = None;
        if inserted > 0 {
            stitch_seams(&mut self.registry, None);
        }
        log::debug!("Materialised {} chunks ({} total)", inserted, self.registry.len());
        inserted
    }

    /// Repaint the live chunks overlapping a vertex region
    ///
    /// Positions in the region are rewritten, normals recomputed and seams
    /// re-stitched around the touched chunks. Returns whether any live chunk
    /// overlapped.
    pub fn update_region(&mut self, def: &TerrainDefinition, region: GridRegion) -> bool {
        self.ensure_runtime_state(def);
        let region = region.clamped(def);
        let field = HeightField::new(def, &self.generator);

        let mut touched = Vec::new();
        for chunk in self.registry.chunks_mut() {
            if chunk.spec.region().intersection(&region).is_none() {
                continue;
            }
            match update_chunk_region(&mut chunk.mesh.geometry, &field, &chunk.spec, &region, true) {
                GeometryUpdate::Untouched => {}
                _ => touched.push(chunk.key),
            }
        }

        let Some(range) = ChunkRange::bounding(&touched) else {
            return false;
        };
        let layout = *self.registry.layout();
        stitch_seams(&mut self.registry, Some(range.expanded(1, &layout)));
        for key in touched {
            self.registry.push_event(ChunkEvent::Updated(key));
        }
        true
    }

    /// Sculpt `def` and repaint the affected chunks
    ///
    /// Returns whether the height overrides changed.
    pub fn sculpt(&mut self, def: &mut TerrainDefinition, params: &SculptParams) -> bool {
        self.ensure_runtime_state(def);
        if !sculpt_with(def, &self.generator, params) {
            return false;
        }
        if let Some(region) = brush_region(def, params) {
            self.update_region(def, region);
        }
        true
    }

    /// Use one material for every current and future chunk
    pub fn set_material(&mut self, material: MaterialId) {
        self.material = Some(material);
        self.registry.set_material(material);
    }

    /// Materialise every chunk and write the terrain as a binary glTF file
    pub fn export_glb(&mut self, def: &TerrainDefinition, path: &Path) -> Result<()> {
        self.ensure_all_chunks(def);
        let bytes = crate::export::glb::encode(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        log::info!("Exported {} chunks ({} bytes) to {}", self.len(), bytes.len(), path.display());
        Ok(())
    }
}
