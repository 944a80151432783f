//! Chunk partitioning of the vertex grid
//!
//! Chunks own `(rows + 1) x (columns + 1)` vertices; neighbouring chunks share
//! their edge rows/columns. The last chunk along each axis may be smaller.

use std::fmt;

use crate::terrain::definition::TerrainDefinition;

/// World size a chunk aims to cover along each axis
pub const CHUNK_TARGET_WORLD_SIZE: f32 = 100.0;

/// Smallest chunk edge in grid cells
pub const MIN_CHUNK_CELLS: u32 = 4;

/// Largest chunk edge in grid cells
pub const MAX_CHUNK_CELLS: u32 = 512;

/// Position of a chunk in chunk-space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub row: u32,
    pub column: u32,
}

impl ChunkKey {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Chunk shape signature, the mesh pool index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkShapeKey {
    pub rows: u32,
    pub columns: u32,
}

impl ChunkShapeKey {
    pub fn vertex_count(&self) -> usize {
        (self.rows as usize + 1) * (self.columns as usize + 1)
    }

    pub fn index_count(&self) -> usize {
        self.rows as usize * self.columns as usize * 6
    }
}

impl fmt::Display for ChunkShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

/// Inclusive rectangle of grid vertices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridRegion {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl GridRegion {
    /// Build a region from two corners in any order
    pub fn new(row_a: u32, col_a: u32, row_b: u32, col_b: u32) -> Self {
        Self {
            min_row: row_a.min(row_b),
            max_row: row_a.max(row_b),
            min_col: col_a.min(col_b),
            max_col: col_a.max(col_b),
        }
    }

    /// The whole vertex grid of a definition
    pub fn full(def: &TerrainDefinition) -> Self {
        Self::new(0, 0, def.total_rows(), def.total_columns())
    }

    /// Clamp into the definition's vertex range
    pub fn clamped(&self, def: &TerrainDefinition) -> Self {
        Self {
            min_row: self.min_row.min(def.total_rows()),
            max_row: self.max_row.min(def.total_rows()),
            min_col: self.min_col.min(def.total_columns()),
            max_col: self.max_col.min(def.total_columns()),
        }
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.min_row && row <= self.max_row && col >= self.min_col && col <= self.max_col
    }

    pub fn intersection(&self, other: &GridRegion) -> Option<GridRegion> {
        let min_row = self.min_row.max(other.min_row);
        let max_row = self.max_row.min(other.max_row);
        let min_col = self.min_col.max(other.min_col);
        let max_col = self.max_col.min(other.max_col);
        (min_row <= max_row && min_col <= max_col).then_some(GridRegion {
            min_row,
            max_row,
            min_col,
            max_col,
        })
    }

    pub fn vertex_count(&self) -> usize {
        (self.max_row - self.min_row + 1) as usize * (self.max_col - self.min_col + 1) as usize
    }
}

/// Sub-grid owned by one chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkSpec {
    pub start_row: u32,
    pub start_column: u32,
    /// Cells along Z (vertices = rows + 1)
    pub rows: u32,
    /// Cells along X (vertices = columns + 1)
    pub columns: u32,
}

impl ChunkSpec {
    pub fn end_row(&self) -> u32 {
        self.start_row + self.rows
    }

    pub fn end_column(&self) -> u32 {
        self.start_column + self.columns
    }

    pub fn shape(&self) -> ChunkShapeKey {
        ChunkShapeKey { rows: self.rows, columns: self.columns }
    }

    pub fn vertex_count(&self) -> usize {
        self.shape().vertex_count()
    }

    pub fn index_count(&self) -> usize {
        self.shape().index_count()
    }

    /// Vertex rectangle covered by this chunk, edges included
    pub fn region(&self) -> GridRegion {
        GridRegion {
            min_row: self.start_row,
            max_row: self.end_row(),
            min_col: self.start_column,
            max_col: self.end_column(),
        }
    }

    pub fn contains_vertex(&self, row: u32, col: u32) -> bool {
        self.region().contains(row, col)
    }

    /// Buffer index of a global vertex, if this chunk owns it
    pub fn local_index(&self, row: u32, col: u32) -> Option<usize> {
        if !self.contains_vertex(row, col) {
            return None;
        }
        let local_row = (row - self.start_row) as usize;
        let local_col = (col - self.start_column) as usize;
        Some(local_row * (self.columns as usize + 1) + local_col)
    }
}

/// Inclusive rectangle of chunk indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    pub min_row: u32,
    pub max_row: u32,
    pub min_column: u32,
    pub max_column: u32,
}

impl ChunkRange {
    pub fn contains(&self, key: ChunkKey) -> bool {
        key.row >= self.min_row
            && key.row <= self.max_row
            && key.column >= self.min_column
            && key.column <= self.max_column
    }

    /// Keys in row-major order
    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + use<> {
        let (min_c, max_c) = (self.min_column, self.max_column);
        (self.min_row..=self.max_row)
            .flat_map(move |row| (min_c..=max_c).map(move |column| ChunkKey::new(row, column)))
    }

    pub fn len(&self) -> usize {
        (self.max_row - self.min_row + 1) as usize * (self.max_column - self.min_column + 1) as usize
    }

    /// Grow by `by` chunks on every side, clamped to the layout
    pub fn expanded(&self, by: u32, layout: &ChunkLayout) -> ChunkRange {
        ChunkRange {
            min_row: self.min_row.saturating_sub(by),
            max_row: self.max_row.saturating_add(by).min(layout.max_chunk_row()),
            min_column: self.min_column.saturating_sub(by),
            max_column: self.max_column.saturating_add(by).min(layout.max_chunk_column()),
        }
    }

    /// Bounding range of a set of keys
    pub fn bounding<'a>(keys: impl IntoIterator<Item = &'a ChunkKey>) -> Option<ChunkRange> {
        let mut iter = keys.into_iter();
        let first = *iter.next()?;
        let mut range = ChunkRange {
            min_row: first.row,
            max_row: first.row,
            min_column: first.column,
            max_column: first.column,
        };
        for key in iter {
            range.min_row = range.min_row.min(key.row);
            range.max_row = range.max_row.max(key.row);
            range.min_column = range.min_column.min(key.column);
            range.max_column = range.max_column.max(key.column);
        }
        Some(range)
    }
}

/// Pick a chunk edge (in cells) so a chunk spans roughly `target_world_size`
pub fn resolve_chunk_cells(def: &TerrainDefinition, target_world_size: f32) -> u32 {
    let target = if target_world_size.is_finite() && target_world_size > 0.0 {
        target_world_size
    } else {
        CHUNK_TARGET_WORLD_SIZE
    };
    let cells = (target / def.safe_cell_size()).round();
    if cells.is_finite() {
        (cells.max(0.0) as u32).clamp(MIN_CHUNK_CELLS, MAX_CHUNK_CELLS)
    } else {
        MAX_CHUNK_CELLS
    }
}

/// Highest valid chunk index along an axis of `total_cells` cells
pub fn max_chunk_index(total_cells: u32, chunk_cells: u32) -> u32 {
    (total_cells.max(1) - 1) / chunk_cells.max(1)
}

/// Sub-grid of chunk `(chunk_row, chunk_col)`; indices are clamped into range
pub fn compute_chunk_spec(
    def: &TerrainDefinition,
    chunk_row: u32,
    chunk_col: u32,
    chunk_cells: u32,
) -> ChunkSpec {
    ChunkLayout::new(def, chunk_cells).spec(ChunkKey::new(chunk_row, chunk_col))
}

/// Resolved chunk grid of one definition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    pub chunk_cells: u32,
    pub total_rows: u32,
    pub total_columns: u32,
}

impl ChunkLayout {
    pub fn new(def: &TerrainDefinition, chunk_cells: u32) -> Self {
        Self {
            chunk_cells: chunk_cells.max(1),
            total_rows: def.total_rows(),
            total_columns: def.total_columns(),
        }
    }

    pub fn max_chunk_row(&self) -> u32 {
        max_chunk_index(self.total_rows, self.chunk_cells)
    }

    pub fn max_chunk_column(&self) -> u32 {
        max_chunk_index(self.total_columns, self.chunk_cells)
    }

    pub fn chunk_count(&self) -> usize {
        self.full_range().len()
    }

    pub fn full_range(&self) -> ChunkRange {
        ChunkRange {
            min_row: 0,
            max_row: self.max_chunk_row(),
            min_column: 0,
            max_column: self.max_chunk_column(),
        }
    }

    pub fn clamp_key(&self, key: ChunkKey) -> ChunkKey {
        ChunkKey::new(key.row.min(self.max_chunk_row()), key.column.min(self.max_chunk_column()))
    }

    pub fn spec(&self, key: ChunkKey) -> ChunkSpec {
        let key = self.clamp_key(key);
        let start_row = key.row * self.chunk_cells;
        let start_column = key.column * self.chunk_cells;
        ChunkSpec {
            start_row,
            start_column,
            rows: self.chunk_cells.min(self.total_rows.saturating_sub(start_row)).max(1),
            columns: self.chunk_cells.min(self.total_columns.saturating_sub(start_column)).max(1),
        }
    }

    /// Chunk whose cell contains a fractional grid position
    pub fn chunk_at_grid(&self, row: f32, col: f32) -> ChunkKey {
        ChunkKey::new(
            self.axis_index(row, self.max_chunk_row()),
            self.axis_index(col, self.max_chunk_column()),
        )
    }

    /// Chunk index range covering fractional grid coordinates `[lo, hi]` per axis
    pub fn range_for_grid(&self, row_lo: f32, row_hi: f32, col_lo: f32, col_hi: f32) -> ChunkRange {
        ChunkRange {
            min_row: self.axis_index(row_lo, self.max_chunk_row()),
            max_row: self.axis_index(row_hi, self.max_chunk_row()),
            min_column: self.axis_index(col_lo, self.max_chunk_column()),
            max_column: self.axis_index(col_hi, self.max_chunk_column()),
        }
    }

    /// Every chunk that owns a vertex (up to four at a corner)
    pub fn chunks_containing_vertex(&self, row: u32, col: u32) -> Vec<ChunkKey> {
        let rows = self.axis_owners(row, self.max_chunk_row());
        let cols = self.axis_owners(col, self.max_chunk_column());
        rows.iter()
            .flatten()
            .flat_map(|&r| cols.iter().flatten().map(move |&c| ChunkKey::new(r, c)))
            .collect()
    }

    fn axis_index(&self, grid: f32, max_index: u32) -> u32 {
        if !grid.is_finite() || grid <= 0.0 {
            return 0;
        }
        ((grid / self.chunk_cells as f32).floor() as u32).min(max_index)
    }

    fn axis_owners(&self, vertex: u32, max_index: u32) -> [Option<u32>; 2] {
        let index = vertex / self.chunk_cells;
        let primary = (index <= max_index).then_some(index);
        let previous = (vertex % self.chunk_cells == 0 && index >= 1 && index - 1 <= max_index)
            .then(|| index - 1);
        [primary, previous]
    }
}
