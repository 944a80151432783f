//! Load/unload windows around a viewpoint
//!
//! The unload window is the load window grown by one chunk, so a viewpoint
//! wobbling across a chunk boundary never evicts what it just created.

use crate::chunk::partition::{ChunkKey, ChunkLayout, ChunkRange, ChunkSpec};
use crate::core::types::Vec3;
use crate::terrain::definition::TerrainDefinition;

/// Lower bound of the derived default load radius (world units)
pub const MIN_DEFAULT_LOAD_RADIUS: f32 = 50.0;

/// Upper bound of the derived default load radius (world units)
pub const MAX_DEFAULT_LOAD_RADIUS: f32 = 1500.0;

/// Fraction of the larger terrain extent used as default load radius
pub const DEFAULT_LOAD_RADIUS_FRACTION: f32 = 0.25;

/// Default chunks seeded on each side of the centre chunk without a viewpoint
pub const SEED_RADIUS_CHUNKS: u32 = 1;

/// Identity of a computed window; equal signatures need no re-plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowSignature {
    pub load: ChunkRange,
    pub unload: ChunkRange,
}

/// Resolved streaming window for one tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamWindow {
    /// Chunk under the viewpoint (or the origin)
    pub center: ChunkKey,
    /// World XZ the window is centred on
    pub focus: (f32, f32),
    pub load: ChunkRange,
    pub unload: ChunkRange,
}

impl StreamWindow {
    pub fn signature(&self) -> WindowSignature {
        WindowSignature { load: self.load, unload: self.unload }
    }

    /// Centre chunk plus its direct neighbours
    pub fn core(&self, layout: &ChunkLayout) -> ChunkRange {
        ChunkRange::bounding(&[self.center])
            .map(|range| range.expanded(1, layout))
            .unwrap_or_else(|| layout.full_range())
    }

    /// Squared XZ distance from the focus to a chunk centre
    pub fn distance_sq(&self, def: &TerrainDefinition, spec: &ChunkSpec) -> f32 {
        let (cx, cz) = chunk_center(def, spec);
        let dx = cx - self.focus.0;
        let dz = cz - self.focus.1;
        dx * dx + dz * dz
    }
}

/// Load radius derived from the terrain extent
pub fn default_load_radius(def: &TerrainDefinition) -> f32 {
    (def.safe_width().max(def.safe_depth()) * DEFAULT_LOAD_RADIUS_FRACTION)
        .clamp(MIN_DEFAULT_LOAD_RADIUS, MAX_DEFAULT_LOAD_RADIUS)
}

/// Clamp a requested radius to `[0, terrain diagonal]`; non-finite falls back to the default
pub fn clamp_load_radius(def: &TerrainDefinition, radius: Option<f32>) -> f32 {
    let diagonal = def.safe_width().hypot(def.safe_depth());
    match radius {
        Some(r) if r.is_finite() => r.clamp(0.0, diagonal),
        _ => default_load_radius(def).min(diagonal),
    }
}

/// World XZ centre of a chunk
pub fn chunk_center(def: &TerrainDefinition, spec: &ChunkSpec) -> (f32, f32) {
    let (x0, z0) = def.vertex_xz(spec.start_row, spec.start_column);
    let (x1, z1) = def.vertex_xz(spec.end_row(), spec.end_column());
    ((x0 + x1) * 0.5, (z0 + z1) * 0.5)
}

/// World footprint of a full-size chunk along X and Z
pub fn chunk_world_size(def: &TerrainDefinition, layout: &ChunkLayout) -> (f32, f32) {
    let cells = layout.chunk_cells as f32;
    (cells * def.spacing_x(), cells * def.spacing_z())
}

/// Compute load and unload windows
///
/// Without a viewpoint the window is the chunk containing the world origin
/// grown by `seed_radius` chunks, with the unload window one chunk wider.
pub fn compute_window(
    def: &TerrainDefinition,
    layout: &ChunkLayout,
    viewpoint: Option<Vec3>,
    radius: f32,
    seed_radius: u32,
) -> StreamWindow {
    let Some(viewpoint) = viewpoint.filter(|v| v.x.is_finite() && v.z.is_finite()) else {
        let (row, col) = def.world_to_grid(Vec3::ZERO);
        let center = layout.chunk_at_grid(row, col);
        let seed = ChunkRange {
            min_row: center.row,
            max_row: center.row,
            min_column: center.column,
            max_column: center.column,
        };
        return StreamWindow {
            center,
            focus: (0.0, 0.0),
            load: seed.expanded(seed_radius, layout),
            unload: seed.expanded(seed_radius.saturating_add(1), layout),
        };
    };

    let (row, col) = def.world_to_grid(viewpoint);
    let center = layout.chunk_at_grid(row, col);
    let radius = radius.max(0.0);
    let (chunk_x, chunk_z) = chunk_world_size(def, layout);
    let unload_radius = radius + chunk_x.max(chunk_z);

    let grid_window = |r: f32| {
        let dr = r / def.spacing_z();
        let dc = r / def.spacing_x();
        layout.range_for_grid(row - dr, row + dr, col - dc, col + dc)
    };

    StreamWindow {
        center,
        focus: (viewpoint.x, viewpoint.z),
        load: grid_window(radius),
        unload: grid_window(unload_radius),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::partition::resolve_chunk_cells;

    fn setup() -> (TerrainDefinition, ChunkLayout) {
        // 400x400 cells of 1m, 25-cell chunks -> 16x16 chunks
        let def = TerrainDefinition::new(400, 400, 1.0);
        let layout = ChunkLayout::new(&def, resolve_chunk_cells(&def, 25.0));
        (def, layout)
    }

    #[test]
    fn test_default_load_radius() {
        let (def, _) = setup();
        assert_eq!(default_load_radius(&def), 100.0);
        let small = TerrainDefinition::new(10, 10, 1.0);
        assert_eq!(default_load_radius(&small), MIN_DEFAULT_LOAD_RADIUS);
        let huge = TerrainDefinition::new(20_000, 20_000, 1.0);
        assert_eq!(default_load_radius(&huge), MAX_DEFAULT_LOAD_RADIUS);
    }

    #[test]
    fn test_clamp_load_radius() {
        let (def, _) = setup();
        assert_eq!(clamp_load_radius(&def, Some(-10.0)), 0.0);
        assert_eq!(clamp_load_radius(&def, Some(30.0)), 30.0);
        assert!((clamp_load_radius(&def, Some(1e9)) - 400.0 * 2f32.sqrt()).abs() < 1e-2);
        assert_eq!(clamp_load_radius(&def, Some(f32::NAN)), 100.0);
        assert_eq!(clamp_load_radius(&def, None), 100.0);
    }

    #[test]
    fn test_no_viewpoint_seeds_origin_neighbourhood() {
        let (def, layout) = setup();
        let window = compute_window(&def, &layout, None, 100.0, SEED_RADIUS_CHUNKS);
        assert_eq!(window.center, ChunkKey::new(8, 8));
        assert_eq!(window.load.len(), 9);
        assert!(window.load.contains(ChunkKey::new(7, 7)));
        assert!(window.load.contains(ChunkKey::new(9, 9)));
        assert_eq!(window.unload.len(), 25);
    }

    #[test]
    fn test_zero_radius_is_single_chunk() {
        let (def, layout) = setup();
        let window = compute_window(&def, &layout, Some(Vec3::new(12.0, 0.0, 12.0)), 0.0, SEED_RADIUS_CHUNKS);
        assert_eq!(window.load.len(), 1);
        assert_eq!(window.load.min_row, window.center.row);
        assert_eq!(window.load.min_column, window.center.column);
    }

    #[test]
    fn test_unload_contains_load() {
        let (def, layout) = setup();
        for &(x, z, r) in &[(0.0, 0.0, 60.0), (-190.0, 150.0, 30.0), (80.0, -20.0, 10.0)] {
            let window = compute_window(&def, &layout, Some(Vec3::new(x, 5.0, z)), r, SEED_RADIUS_CHUNKS);
            for key in window.load.keys() {
                assert!(window.unload.contains(key), "{} missing from unload", key);
            }
            assert!(window.load.contains(window.center));
        }
    }

    #[test]
    fn test_huge_radius_clamps_to_grid() {
        let (def, layout) = setup();
        let radius = clamp_load_radius(&def, Some(1e9));
        let window = compute_window(&def, &layout, Some(Vec3::ZERO), radius, SEED_RADIUS_CHUNKS);
        assert_eq!(window.load, layout.full_range());
        assert_eq!(window.unload, layout.full_range());
    }

    #[test]
    fn test_viewpoint_off_terrain_clamps() {
        let (def, layout) = setup();
        let window = compute_window(&def, &layout, Some(Vec3::new(-5000.0, 0.0, 5000.0)), 10.0, SEED_RADIUS_CHUNKS);
        assert_eq!(window.center, ChunkKey::new(layout.max_chunk_row(), 0));
    }

    #[test]
    fn test_chunk_center_and_distance() {
        let (def, layout) = setup();
        let spec = layout.spec(ChunkKey::new(8, 8));
        assert_eq!(chunk_center(&def, &spec), (12.5, 12.5));
        let window = compute_window(&def, &layout, Some(Vec3::new(12.5, 0.0, 12.5)), 10.0, SEED_RADIUS_CHUNKS);
        assert_eq!(window.distance_sq(&def, &spec), 0.0);
        let far = layout.spec(ChunkKey::new(8, 10));
        assert_eq!(window.distance_sq(&def, &far), 50.0 * 50.0);
    }

    #[test]
    fn test_core_range() {
        let (def, layout) = setup();
        let window = compute_window(&def, &layout, Some(Vec3::new(-199.0, 0.0, -199.0)), 10.0, SEED_RADIUS_CHUNKS);
        let core = window.core(&layout);
        assert_eq!(core.len(), 4);
        assert!(core.contains(ChunkKey::new(0, 0)));
        assert!(core.contains(ChunkKey::new(1, 1)));
    }
}
