//! Seam stitching - reconciles normals along shared chunk edges
//!
//! Every chunk computes normals from its own triangles only, so an edge
//! vertex gets a slightly different normal in each chunk that owns it. For
//! each such vertex the unstitched normals of all live owners are summed,
//! normalised and written back to every owner, so lighting is continuous.
//! The result depends only on the live chunks, never on earlier stitches.

use std::collections::{BTreeSet, HashSet};

use crate::chunk::geometry::normalize_or_up;
use crate::chunk::partition::{ChunkKey, ChunkRange};
use crate::chunk::registry::{ChunkEvent, RuntimeRegistry};
use crate::core::types::Vec3;

/// Stitch edge vertices of the live chunks inside `range` (all chunks if `None`)
///
/// Owners outside the range still contribute and receive the result, so a
/// seam is never left half-stitched. Returns the number of vertices stitched.
pub fn stitch_seams(registry: &mut RuntimeRegistry, range: Option<ChunkRange>) -> usize {
    let layout = *registry.layout();
    let range = range.unwrap_or_else(|| layout.full_range());

    let mut vertices: BTreeSet<(u32, u32)> = BTreeSet::new();
    for key in range.keys() {
        let Some(chunk) = registry.get(key) else { continue };
        let spec = chunk.spec;
        for row in [spec.start_row, spec.end_row()] {
            for col in spec.start_column..=spec.end_column() {
                vertices.insert((row, col));
            }
        }
        for col in [spec.start_column, spec.end_column()] {
            for row in spec.start_row..=spec.end_row() {
                vertices.insert((row, col));
            }
        }
    }

    let mut stitched = 0;
    let mut changed: HashSet<ChunkKey> = HashSet::new();
    let mut owners: Vec<(ChunkKey, usize)> = Vec::with_capacity(4);

    for (row, col) in vertices {
        owners.clear();
        let mut candidates = layout.chunks_containing_vertex(row, col);
        candidates.sort();
        for key in candidates {
            if let Some(index) = registry.get(key).and_then(|c| c.spec.local_index(row, col)) {
                owners.push((key, index));
            }
        }
        // A lone owner drops back to its own normal once its neighbours leave
        let sum = owners.iter().fold(Vec3::ZERO, |acc, &(key, index)| {
            acc + registry.get(key).map_or(Vec3::ZERO, |c| c.mesh.geometry.raw_normals()[index])
        });
        let normal = if owners.len() < 2 { sum } else { normalize_or_up(sum) };

        for &(key, index) in &owners {
            if let Some(chunk) = registry.get_mut(key) {
                let slot = &mut chunk.mesh.geometry.normals[index];
                if *slot != normal {
                    *slot = normal;
                    chunk.mesh.geometry.mark_normals_dirty();
                    changed.insert(key);
                }
            }
        }
        if owners.len() >= 2 {
            stitched += 1;
        }
    }

    let mut changed: Vec<_> = changed.into_iter().collect();
    changed.sort();
    for key in changed {
        registry.push_event(ChunkEvent::Updated(key));
    }

    if stitched > 0 {
        log::trace!("Stitched {} seam vertices", stitched);
    }
    stitched
}
