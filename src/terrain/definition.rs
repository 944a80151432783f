//! Terrain definition: grid structure plus sparse height overrides
//!
//! The definition is owned by the caller and is the only persisted state;
//! every mesh is derived from it and can be regenerated at any time.

use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::terrain::generator::TerrainParams;

/// Smallest accepted cell size / extent in world units
pub const MIN_CELL_SIZE: f32 = 1e-3;

/// Grid vertex coordinate, serialised as `"row:col"`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexKey {
    pub row: u32,
    pub col: u32,
}

impl VertexKey {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

impl FromStr for VertexKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(':')
            .ok_or_else(|| format!("vertex key '{}' is not of the form row:col", s))?;
        let row = row.trim().parse().map_err(|e| format!("bad row in '{}': {}", s, e))?;
        let col = col.trim().parse().map_err(|e| format!("bad column in '{}': {}", s, e))?;
        Ok(Self { row, col })
    }
}

impl Serialize for VertexKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VertexKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Sparse map of vertices whose height deviates from the base surface
///
/// Absence of a key means "use the base height".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeightOverrides {
    heights: HashMap<VertexKey, f32>,
}

impl HeightOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: VertexKey) -> Option<f32> {
        self.heights.get(&key).copied()
    }

    pub fn contains(&self, key: VertexKey) -> bool {
        self.heights.contains_key(&key)
    }

    /// Raw insert, bypassing the rounding/sparsity rules of the height setter
    pub fn insert(&mut self, key: VertexKey, height: f32) -> Option<f32> {
        self.heights.insert(key, height)
    }

    pub fn remove(&mut self, key: VertexKey) -> Option<f32> {
        self.heights.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn clear(&mut self) {
        self.heights.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (VertexKey, f32)> + '_ {
        self.heights.iter().map(|(k, v)| (*k, *v))
    }
}

/// Which sparse override layer a write targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideLayer {
    /// User sculpt edits
    Manual,
    /// Design/reference elevations composited additively
    Planning,
}

/// Logical height-field definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainDefinition {
    /// World extent along X
    pub width: f32,
    /// World extent along Z
    pub depth: f32,
    /// Grid cells along Z
    pub rows: u32,
    /// Grid cells along X
    pub columns: u32,
    /// Nominal cell size, drives chunk sizing and brush bands
    pub cell_size: f32,
    /// Procedural base surface
    #[serde(default)]
    pub generation: TerrainParams,
    #[serde(default)]
    pub manual_heights: HeightOverrides,
    #[serde(default)]
    pub planning_heights: HeightOverrides,
}

impl Default for TerrainDefinition {
    fn default() -> Self {
        Self::new(256, 256, 1.0)
    }
}

impl TerrainDefinition {
    /// Create a definition whose extent follows from `cells * cell_size`
    pub fn new(rows: u32, columns: u32, cell_size: f32) -> Self {
        Self {
            width: columns as f32 * cell_size,
            depth: rows as f32 * cell_size,
            rows,
            columns,
            cell_size,
            generation: TerrainParams::default(),
            manual_heights: HeightOverrides::new(),
            planning_heights: HeightOverrides::new(),
        }
    }

    pub fn with_generation(mut self, generation: TerrainParams) -> Self {
        self.generation = generation;
        self
    }

    /// Grid cells along Z, clamped to at least 1
    pub fn total_rows(&self) -> u32 {
        self.rows.max(1)
    }

    /// Grid cells along X, clamped to at least 1
    pub fn total_columns(&self) -> u32 {
        self.columns.max(1)
    }

    /// Cell size sanitised to a finite positive value
    pub fn safe_cell_size(&self) -> f32 {
        sanitize_extent(self.cell_size, 1.0)
    }

    /// World extent along X, falling back to `columns * cell_size`
    pub fn safe_width(&self) -> f32 {
        sanitize_extent(self.width, self.total_columns() as f32 * self.safe_cell_size())
    }

    /// World extent along Z, falling back to `rows * cell_size`
    pub fn safe_depth(&self) -> f32 {
        sanitize_extent(self.depth, self.total_rows() as f32 * self.safe_cell_size())
    }

    /// World distance between adjacent columns
    pub fn spacing_x(&self) -> f32 {
        self.safe_width() / self.total_columns() as f32
    }

    /// World distance between adjacent rows
    pub fn spacing_z(&self) -> f32 {
        self.safe_depth() / self.total_rows() as f32
    }

    /// World-space XZ of a grid vertex; the terrain is centred on the origin
    pub fn vertex_xz(&self, row: u32, col: u32) -> (f32, f32) {
        let x = -self.safe_width() * 0.5 + col as f32 * self.spacing_x();
        let z = -self.safe_depth() * 0.5 + row as f32 * self.spacing_z();
        (x, z)
    }

    /// Fractional grid coordinate (row, col) of a world position, unclamped
    pub fn world_to_grid(&self, position: Vec3) -> (f32, f32) {
        let x = if position.x.is_finite() { position.x } else { 0.0 };
        let z = if position.z.is_finite() { position.z } else { 0.0 };
        let col = (x + self.safe_width() * 0.5) / self.spacing_x();
        let row = (z + self.safe_depth() * 0.5) / self.spacing_z();
        (row, col)
    }

    /// Clamp a vertex coordinate into `[0, rows] x [0, columns]`
    pub fn clamp_vertex(&self, row: i64, col: i64) -> VertexKey {
        VertexKey::new(
            row.clamp(0, self.total_rows() as i64) as u32,
            col.clamp(0, self.total_columns() as i64) as u32,
        )
    }

    pub fn overrides(&self, layer: OverrideLayer) -> &HeightOverrides {
        match layer {
            OverrideLayer::Manual => &self.manual_heights,
            OverrideLayer::Planning => &self.planning_heights,
        }
    }

    pub fn overrides_mut(&mut self, layer: OverrideLayer) -> &mut HeightOverrides {
        match layer {
            OverrideLayer::Manual => &mut self.manual_heights,
            OverrideLayer::Planning => &mut self.planning_heights,
        }
    }

    /// Hash of the fields that determine chunk shapes
    ///
    /// Any change here invalidates every cached chunk.
    pub fn structural_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.total_rows().hash(&mut hasher);
        self.total_columns().hash(&mut hasher);
        self.safe_cell_size().to_bits().hash(&mut hasher);
        self.safe_width().to_bits().hash(&mut hasher);
        self.safe_depth().to_bits().hash(&mut hasher);
        hasher.finish()
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let definition: Self = serde_json::from_str(&json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check every override addresses a vertex of the grid
    pub fn validate(&self) -> Result<()> {
        for (layer, overrides) in [("manual", &self.manual_heights), ("planning", &self.planning_heights)] {
            for (key, height) in overrides.iter() {
                if key.row > self.total_rows() || key.col > self.total_columns() {
                    return Err(Error::Definition(format!(
                        "{} override {} lies outside the {}x{} grid",
                        layer, key, self.total_rows(), self.total_columns()
                    )));
                }
                if !height.is_finite() {
                    return Err(Error::Definition(format!("{} override {} is not finite", layer, key)));
                }
            }
        }
        Ok(())
    }
}

fn sanitize_extent(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value >= MIN_CELL_SIZE {
        value
    } else if fallback.is_finite() && fallback >= MIN_CELL_SIZE {
        fallback
    } else {
        1.0
    }
}
