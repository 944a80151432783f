//! Sculpt operations over the manual override layer
//!
//! Every operation reads a snapshot of the effective heights first, so
//! results never depend on the order vertices are visited in.

use crate::chunk::partition::GridRegion;
use crate::sculpt::brush::{brush_region, influence, SculptOperation, SculptParams};
use crate::terrain::definition::{OverrideLayer, TerrainDefinition};
use crate::terrain::generator::TerrainGenerator;
use crate::terrain::height::{set_height_override, HeightField};

/// Vertical offset per unit strength and influence for raise/depress
pub const RAISE_RATE: f32 = 0.3;

/// Blend rate per unit strength for smoothing
pub const SMOOTH_RATE: f32 = 0.25;

/// Blend rate per unit strength for flattening
pub const FLATTEN_RATE: f32 = 0.4;

/// Base and per-strength blend rates for flatten-to-zero
pub const FLATTEN_ZERO_BASE: f32 = 0.2;
pub const FLATTEN_ZERO_RATE: f32 = 0.3;

/// Rim band of flatten-to-zero, in cells and as a fraction of the radius
pub const RIM_BAND_CELLS: f32 = 1.5;
pub const RIM_BAND_FRACTION: f32 = 0.35;

/// Smoothing blend at the inner edge of the rim band
pub const RIM_SMOOTH_RATE: f32 = 0.5;

/// Dense copy of effective heights over a region plus a one-vertex border
struct HeightSnapshot {
    region: GridRegion,
    columns: usize,
    heights: Vec<f32>,
}

impl HeightSnapshot {
    fn capture(field: &HeightField<'_>, inner: &GridRegion) -> Self {
        let def = field.definition();
        let region = GridRegion {
            min_row: inner.min_row.saturating_sub(1),
            max_row: (inner.max_row + 1).min(def.total_rows()),
            min_col: inner.min_col.saturating_sub(1),
            max_col: (inner.max_col + 1).min(def.total_columns()),
        };
        let columns = (region.max_col - region.min_col + 1) as usize;
        let mut heights = Vec::with_capacity(region.vertex_count());
        for row in region.min_row..=region.max_row {
            for col in region.min_col..=region.max_col {
                heights.push(field.effective_height(row, col));
            }
        }
        Self { region, columns, heights }
    }

    fn get(&self, row: u32, col: u32) -> f32 {
        let r = (row - self.region.min_row) as usize;
        let c = (col - self.region.min_col) as usize;
        self.heights[r * self.columns + c]
    }

    /// Mean of the 3x3 neighbourhood, skipping vertices off the grid
    fn neighbourhood_mean(&self, row: u32, col: u32) -> f32 {
        let mut sum = 0.0;
        let mut count = 0;
        for r in row.saturating_sub(1)..=row + 1 {
            for c in col.saturating_sub(1)..=col + 1 {
                if self.region.contains(r, c) {
                    sum += self.get(r, c);
                    count += 1;
                }
            }
        }
        if count == 0 { self.get(row, col) } else { sum / count as f32 }
    }
}

/// Apply one brush stroke to `def`, building a generator for the call
///
/// Returns whether any override changed.
pub fn sculpt(def: &mut TerrainDefinition, params: &SculptParams) -> bool {
    let generator = TerrainGenerator::new(def.generation.clone());
    sculpt_with(def, &generator, params)
}

/// Apply one brush stroke using an existing generator for `def`
pub fn sculpt_with(def: &mut TerrainDefinition, generator: &TerrainGenerator, params: &SculptParams) -> bool {
    let Some(region) = brush_region(def, params) else {
        return false;
    };

    let edits = plan_operation(HeightField::new(def, generator), &region, params);
    let mut changed = write_heights(def, generator, &edits);

    if params.operation == SculptOperation::FlattenZero {
        let rim = plan_rim_smoothing(HeightField::new(def, generator), &region, params);
        changed |= write_heights(def, generator, &rim);
    }

    if changed {
        log::trace!(
            "Sculpt {:?} r={:.2} at ({:.2}, {:.2}) touched {} vertices",
            params.operation, params.radius, params.point.x, params.point.y, edits.len()
        );
    }
    changed
}

/// New effective heights for the main pass
fn plan_operation(field: HeightField<'_>, region: &GridRegion, params: &SculptParams) -> Vec<(u32, u32, f32)> {
    let def = field.definition();
    let strength = params.safe_strength();
    let snapshot = HeightSnapshot::capture(&field, region);
    let mut edits = Vec::new();

    for row in region.min_row..=region.max_row {
        for col in region.min_col..=region.max_col {
            let weight = influence(params, def, row, col);
            if weight <= 0.0 {
                continue;
            }
            let current = snapshot.get(row, col);
            let next = match params.operation {
                SculptOperation::Raise => current + strength * weight * RAISE_RATE,
                SculptOperation::Depress => current - strength * weight * RAISE_RATE,
                SculptOperation::Smooth => {
                    let mean = snapshot.neighbourhood_mean(row, col);
                    lerp(current, mean, (strength * SMOOTH_RATE).min(1.0) * weight)
                }
                SculptOperation::Flatten => {
                    let target = params.target_height.filter(|t| t.is_finite()).unwrap_or(current);
                    lerp(current, target, (strength * FLATTEN_RATE).min(1.0) * weight)
                }
                SculptOperation::FlattenZero => {
                    let target = params.target_height.filter(|t| t.is_finite()).unwrap_or(0.0);
                    let rate = (FLATTEN_ZERO_BASE + strength * FLATTEN_ZERO_RATE).min(1.0);
                    lerp(current, target, rate * weight)
                }
            };
            edits.push((row, col, next));
        }
    }
    edits
}

/// Smoothing of the inner rim band after flatten-to-zero
///
/// The weight ramps from 1 at the inner edge of the band to 0 at the brush
/// radius, blending the flattened interior into the untouched surroundings.
fn plan_rim_smoothing(field: HeightField<'_>, region: &GridRegion, params: &SculptParams) -> Vec<(u32, u32, f32)> {
    let def = field.definition();
    let radius = params.safe_radius(def);
    let center = params.safe_point();
    let band = (RIM_BAND_CELLS * def.safe_cell_size())
        .max(RIM_BAND_FRACTION * radius)
        .min(radius);
    let snapshot = HeightSnapshot::capture(&field, region);
    let mut edits = Vec::new();

    for row in region.min_row..=region.max_row {
        for col in region.min_col..=region.max_col {
            let (x, z) = def.vertex_xz(row, col);
            let Some(norm) = params.shape.footprint(x - center.x, z - center.y, radius) else {
                continue;
            };
            let distance = norm * radius;
            if distance < radius - band {
                continue;
            }
            let weight = ((radius - distance) / band).clamp(0.0, 1.0);
            if weight <= 0.0 {
                continue;
            }
            let current = snapshot.get(row, col);
            let mean = snapshot.neighbourhood_mean(row, col);
            edits.push((row, col, lerp(current, mean, RIM_SMOOTH_RATE * weight)));
        }
    }
    edits
}

/// Write effective heights back as manual overrides
///
/// `manual = desired - (planning - base)` keeps any planning layer intact.
fn write_heights(def: &mut TerrainDefinition, generator: &TerrainGenerator, edits: &[(u32, u32, f32)]) -> bool {
    let mut changed = false;
    for &(row, col, desired) in edits {
        let field = HeightField::new(def, generator);
        let base = field.base_height(row, col);
        let planning = field.planning_height(row, col);
        let manual = desired - (planning - base);
        changed |= set_height_override(def, generator, OverrideLayer::Manual, row, col, manual);
    }
    changed
}

/// Blend toward `b`; jittered weights may push `t` past 1, which must not overshoot
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}
