//! Height resolution: base surface composited with sparse overrides
//!
//! `effective = planning + (manual - base)`, where a missing override falls
//! back to the base height. Planning and manual layers therefore compose
//! additively instead of clobbering each other.

use crate::terrain::definition::{OverrideLayer, TerrainDefinition, VertexKey};
use crate::terrain::generator::TerrainGenerator;

/// Round to two decimal places, the precision overrides are stored at
pub fn round_height(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Read-only view resolving heights for one definition
#[derive(Clone, Copy)]
pub struct HeightField<'a> {
    def: &'a TerrainDefinition,
    generator: &'a TerrainGenerator,
}

impl<'a> HeightField<'a> {
    pub fn new(def: &'a TerrainDefinition, generator: &'a TerrainGenerator) -> Self {
        Self { def, generator }
    }

    pub fn definition(&self) -> &'a TerrainDefinition {
        self.def
    }

    /// Procedural height ignoring all overrides
    pub fn base_height(&self, row: u32, col: u32) -> f32 {
        let (x, z) = self.def.vertex_xz(row, col);
        self.generator.height_at(x, z)
    }

    pub fn manual_height(&self, row: u32, col: u32) -> f32 {
        self.layer_height(OverrideLayer::Manual, row, col)
    }

    pub fn planning_height(&self, row: u32, col: u32) -> f32 {
        self.layer_height(OverrideLayer::Planning, row, col)
    }

    /// Authoritative elevation of a grid vertex
    pub fn effective_height(&self, row: u32, col: u32) -> f32 {
        let key = VertexKey::new(row, col);
        let manual = self.def.manual_heights.get(key);
        let planning = self.def.planning_heights.get(key);
        if manual.is_none() && planning.is_none() {
            return self.base_height(row, col);
        }
        let base = self.base_height(row, col);
        planning.unwrap_or(base) + (manual.unwrap_or(base) - base)
    }

    fn layer_height(&self, layer: OverrideLayer, row: u32, col: u32) -> f32 {
        self.def
            .overrides(layer)
            .get(VertexKey::new(row, col))
            .unwrap_or_else(|| self.base_height(row, col))
    }
}

/// Procedural height of a vertex, building a generator for the call
pub fn base_height(def: &TerrainDefinition, row: u32, col: u32) -> f32 {
    let generator = TerrainGenerator::new(def.generation.clone());
    HeightField::new(def, &generator).base_height(row, col)
}

/// Effective height of a vertex, building a generator for the call
pub fn effective_height(def: &TerrainDefinition, row: u32, col: u32) -> f32 {
    let generator = TerrainGenerator::new(def.generation.clone());
    HeightField::new(def, &generator).effective_height(row, col)
}

/// Write an override, keeping the layer sparse
///
/// The value is rounded to two decimals; if it then equals the rounded base
/// height the entry is removed instead. Returns whether the map changed.
pub fn set_height_override(
    def: &mut TerrainDefinition,
    generator: &TerrainGenerator,
    layer: OverrideLayer,
    row: u32,
    col: u32,
    value: f32,
) -> bool {
    if !value.is_finite() {
        return false;
    }
    let key = def.clamp_vertex(row as i64, col as i64);
    let base = HeightField::new(def, generator).base_height(key.row, key.col);
    let rounded = round_height(value);
    let overrides = def.overrides_mut(layer);

    if rounded == round_height(base) {
        overrides.remove(key).is_some()
    } else {
        match overrides.insert(key, rounded) {
            Some(previous) => previous != rounded,
            None => true,
        }
    }
}

/// Drop an override outright, returning whether one existed
pub fn clear_height_override(
    def: &mut TerrainDefinition,
    layer: OverrideLayer,
    row: u32,
    col: u32,
) -> bool {
    let key = def.clamp_vertex(row as i64, col as i64);
    def.overrides_mut(layer).remove(key).is_some()
}
