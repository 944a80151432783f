//! Chunk geometry: vertex/index buffers for one chunk of the height grid

use crate::chunk::partition::{ChunkShapeKey, ChunkSpec, GridRegion};
use crate::core::types::{Vec2, Vec3};
use crate::math::Aabb;
use crate::terrain::height::HeightField;

/// CPU-side mesh buffers for one chunk
///
/// Positions are world-space, so meshes are drawn with an identity transform
/// and vertices on shared chunk edges coincide exactly. `normals` holds what
/// is drawn (edge vertices stitched with neighbours); the chunk's own face
/// normals are kept alongside so stitching never feeds on its own output.
#[derive(Clone, Debug)]
pub struct ChunkGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    raw_normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
    shape: ChunkShapeKey,
    positions_dirty: bool,
    normals_dirty: bool,
}

/// Outcome of an in-place region update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryUpdate {
    /// Region did not overlap the chunk
    Untouched,
    /// Vertices rewritten in place
    Patched { vertices: usize },
    /// Buffers did not fit the chunk shape and were rebuilt from scratch
    Rebuilt,
}

/// Outcome of refitting recycled geometry to a new chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshReuse {
    Reused,
    Rebuilt,
}

impl ChunkGeometry {
    pub fn shape(&self) -> ChunkShapeKey {
        self.shape
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Normals from this chunk's triangles only, before seam stitching
    pub fn raw_normals(&self) -> &[Vec3] {
        &self.raw_normals
    }

    /// Whether the buffers have exactly the layout `spec` needs
    pub fn matches(&self, spec: &ChunkSpec) -> bool {
        self.positions.len() == spec.vertex_count()
            && self.normals.len() == spec.vertex_count()
            && self.raw_normals.len() == spec.vertex_count()
            && self.uvs.len() == spec.vertex_count()
            && self.indices.len() == spec.index_count()
    }

    /// Whether positions changed since the last upload
    pub fn positions_dirty(&self) -> bool {
        self.positions_dirty
    }

    pub fn normals_dirty(&self) -> bool {
        self.normals_dirty
    }

    /// Clear both dirty flags, returning whether anything was dirty
    pub fn take_dirty(&mut self) -> bool {
        let dirty = self.positions_dirty || self.normals_dirty;
        self.positions_dirty = false;
        self.normals_dirty = false;
        dirty
    }

    pub(crate) fn mark_normals_dirty(&mut self) {
        self.normals_dirty = true;
    }

    /// Smooth per-vertex normals averaged over adjacent faces
    pub fn compute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (pa, pb, pc) = (self.positions[a], self.positions[b], self.positions[c]);
            // Unnormalised cross product weights faces by area
            let face = (pb - pa).cross(pc - pa);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }
        self.raw_normals = accum.into_iter().map(normalize_or_up).collect();
        self.normals.clone_from(&self.raw_normals);
        self.normals_dirty = true;
    }

    pub fn recompute_bounds(&mut self) {
        self.bounds = Aabb::from_points(&self.positions).unwrap_or_default();
    }
}

/// Normalise, falling back to +Y for degenerate vectors
pub fn normalize_or_up(v: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n == Vec3::ZERO { Vec3::Y } else { n }
}

/// Build a chunk's geometry from scratch
pub fn build_chunk_geometry(field: &HeightField<'_>, spec: &ChunkSpec) -> ChunkGeometry {
    let count = spec.vertex_count();
    let mut geometry = ChunkGeometry {
        positions: Vec::with_capacity(count),
        normals: Vec::new(),
        raw_normals: Vec::new(),
        uvs: Vec::with_capacity(count),
        indices: build_indices(spec.shape()),
        bounds: Aabb::default(),
        shape: spec.shape(),
        positions_dirty: true,
        normals_dirty: true,
    };

    for row in spec.start_row..=spec.end_row() {
        for col in spec.start_column..=spec.end_column() {
            geometry.positions.push(vertex_position(field, row, col));
            geometry.uvs.push(vertex_uv(field, row, col));
        }
    }

    geometry.compute_normals();
    geometry.recompute_bounds();
    geometry
}

/// Rewrite the vertices of `region` in place
///
/// The region is clamped to the chunk. If the buffers don't fit the chunk
/// (e.g. recycled from a differently shaped chunk) the whole chunk is rebuilt.
pub fn update_chunk_region(
    geometry: &mut ChunkGeometry,
    field: &HeightField<'_>,
    spec: &ChunkSpec,
    region: &GridRegion,
    recompute_normals: bool,
) -> GeometryUpdate {
    if !geometry.matches(spec) {
        log::debug!(
            "Geometry shape {} does not fit chunk {}x{}, rebuilding",
            geometry.shape, spec.rows, spec.columns
        );
        *geometry = build_chunk_geometry(field, spec);
        return GeometryUpdate::Rebuilt;
    }

    let Some(local) = region.intersection(&spec.region()) else {
        return GeometryUpdate::Untouched;
    };

    let mut written = 0;
    for row in local.min_row..=local.max_row {
        for col in local.min_col..=local.max_col {
            if let Some(index) = spec.local_index(row, col) {
                geometry.positions[index] = vertex_position(field, row, col);
                geometry.uvs[index] = vertex_uv(field, row, col);
                written += 1;
            }
        }
    }
    geometry.positions_dirty = true;

    if recompute_normals {
        geometry.compute_normals();
    }
    geometry.recompute_bounds();
    GeometryUpdate::Patched { vertices: written }
}

/// Refit recycled geometry to a (possibly different) chunk of the same shape
pub fn refit_chunk_geometry(
    geometry: &mut ChunkGeometry,
    field: &HeightField<'_>,
    spec: &ChunkSpec,
) -> MeshReuse {
    match update_chunk_region(geometry, field, spec, &spec.region(), true) {
        GeometryUpdate::Rebuilt => MeshReuse::Rebuilt,
        _ => MeshReuse::Reused,
    }
}

fn vertex_position(field: &HeightField<'_>, row: u32, col: u32) -> Vec3 {
    let (x, z) = field.definition().vertex_xz(row, col);
    Vec3::new(x, field.effective_height(row, col), z)
}

fn vertex_uv(field: &HeightField<'_>, row: u32, col: u32) -> Vec2 {
    let def = field.definition();
    Vec2::new(
        col as f32 / def.total_columns() as f32,
        row as f32 / def.total_rows() as f32,
    )
}

/// Two triangles per cell, wound so faces point +Y
fn build_indices(shape: ChunkShapeKey) -> Vec<u32> {
    let stride = shape.columns + 1;
    let mut indices = Vec::with_capacity(shape.index_count());
    for r in 0..shape.rows {
        for c in 0..shape.columns {
            let a = r * stride + c;
            let b = a + 1;
            let d = a + stride;
            let e = d + 1;
            indices.extend_from_slice(&[a, d, b, b, d, e]);
        }
    }
    indices
}
