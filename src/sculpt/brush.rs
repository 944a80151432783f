//! Brush footprints, falloff and jitter

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::chunk::partition::GridRegion;
use crate::core::types::{Vec2, Vec3};
use crate::terrain::definition::TerrainDefinition;

/// Points of the star brush
pub const STAR_POINTS: u32 = 5;

/// Inscribed / circumscribed radius ratio of the star brush
pub const STAR_INNER_RATIO: f32 = 0.5;

/// Amplitude of the per-vertex influence jitter
pub const JITTER_AMPLITUDE: f32 = 0.1;

/// Footprint of a brush on the XZ plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrushShape {
    #[default]
    Circle,
    Square,
    Star,
}

/// What a brush does to the vertices it covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SculptOperation {
    #[default]
    Raise,
    Depress,
    Smooth,
    Flatten,
    /// Flatten toward the target (default 0) and soften the brush rim
    FlattenZero,
}

/// One sculpt application
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SculptParams {
    /// Brush centre in world XZ (`y` holds Z)
    pub point: Vec2,
    pub radius: f32,
    pub strength: f32,
    pub shape: BrushShape,
    pub operation: SculptOperation,
    pub target_height: Option<f32>,
}

impl Default for SculptParams {
    fn default() -> Self {
        Self {
            point: Vec2::ZERO,
            radius: 5.0,
            strength: 1.0,
            shape: BrushShape::Circle,
            operation: SculptOperation::Raise,
            target_height: None,
        }
    }
}

impl SculptParams {
    pub fn new(operation: SculptOperation, point: Vec2, radius: f32, strength: f32) -> Self {
        Self { point, radius, strength, operation, ..Default::default() }
    }

    /// Brush centred on a world position, ignoring its height
    pub fn at(operation: SculptOperation, position: Vec3, radius: f32, strength: f32) -> Self {
        Self::new(operation, Vec2::new(position.x, position.z), radius, strength)
    }

    pub fn with_shape(mut self, shape: BrushShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_target(mut self, height: f32) -> Self {
        self.target_height = Some(height);
        self
    }

    /// Radius clamped to at least half a grid spacing
    pub fn safe_radius(&self, def: &TerrainDefinition) -> f32 {
        let min = 0.5 * def.spacing_x().min(def.spacing_z());
        if self.radius.is_finite() { self.radius.max(min) } else { min }
    }

    /// Strength clamped to a finite, non-negative value
    pub fn safe_strength(&self) -> f32 {
        if self.strength.is_finite() { self.strength.max(0.0) } else { 0.0 }
    }

    /// Brush centre with non-finite components replaced by 0
    pub fn safe_point(&self) -> Vec2 {
        Vec2::new(
            if self.point.x.is_finite() { self.point.x } else { 0.0 },
            if self.point.y.is_finite() { self.point.y } else { 0.0 },
        )
    }
}

impl BrushShape {
    /// Normalised distance in `[0, 1]` of an offset inside the footprint
    ///
    /// Returns `None` outside. Distance is measured against the brush radius,
    /// so a star's falloff follows the circle and its valleys cut it short.
    pub fn footprint(&self, dx: f32, dz: f32, radius: f32) -> Option<f32> {
        if radius <= 0.0 {
            return None;
        }
        match self {
            BrushShape::Circle => {
                let d2 = dx * dx + dz * dz;
                (d2 < radius * radius).then(|| d2.sqrt() / radius)
            }
            BrushShape::Square => {
                let d = dx.abs().max(dz.abs());
                (d <= radius).then(|| d / radius)
            }
            BrushShape::Star => {
                let d = dx.hypot(dz);
                if d >= radius {
                    return None;
                }
                (d < star_boundary(dz.atan2(dx), radius)).then(|| d / radius)
            }
        }
    }
}

/// Star boundary radius along `angle`; tips point along +Z
fn star_boundary(angle: f32, radius: f32) -> f32 {
    let sector = TAU / STAR_POINTS as f32;
    let half = sector * 0.5;
    // Fold into one sector: 0 at a tip, `half` between two tips
    let folded = (angle - FRAC_PI_2).rem_euclid(sector);
    let off_tip = (folded - half).abs() / half;
    radius * (STAR_INNER_RATIO + (1.0 - STAR_INNER_RATIO) * off_tip)
}

/// Cosine falloff from 1 at the centre to 0 at the boundary
pub fn falloff(normalized_distance: f32) -> f32 {
    (normalized_distance.clamp(0.0, 1.0) * PI * 0.5).cos().max(0.0)
}

/// Deterministic 2D hash
fn hash_2d(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h ^= x;
    h = h.wrapping_mul(0x45d9f3b);
    h ^= h >> 16;
    h ^= y;
    h = h.wrapping_mul(0x45d9f3b);
    h ^= h >> 16;
    h
}

/// Per-vertex influence perturbation in `[-JITTER_AMPLITUDE, JITTER_AMPLITUDE]`
pub fn jitter(row: u32, col: u32, seed: u32) -> f32 {
    let h = hash_2d(row, col, seed ^ 0x9e37_79b9);
    let unit = (h & 0xFFFF) as f32 / 65535.0;
    (unit * 2.0 - 1.0) * JITTER_AMPLITUDE
}

/// Brush influence at a vertex, jittered; 0 outside the footprint
pub fn influence(params: &SculptParams, def: &TerrainDefinition, row: u32, col: u32) -> f32 {
    let radius = params.safe_radius(def);
    let center = params.safe_point();
    let (x, z) = def.vertex_xz(row, col);
    match params.shape.footprint(x - center.x, z - center.y, radius) {
        Some(norm) => falloff(norm) * (1.0 + jitter(row, col, def.generation.seed)),
        None => 0.0,
    }
}

/// Vertex rectangle a brush can touch, or `None` if it misses the terrain
pub fn brush_region(def: &TerrainDefinition, params: &SculptParams) -> Option<GridRegion> {
    let radius = params.safe_radius(def);
    let center = params.safe_point();
    let (row, col) = def.world_to_grid(Vec3::new(center.x, 0.0, center.y));
    let dr = radius / def.spacing_z();
    let dc = radius / def.spacing_x();

    let row_lo = (row - dr).floor();
    let row_hi = (row + dr).ceil();
    let col_lo = (col - dc).floor();
    let col_hi = (col + dc).ceil();
    let max_row = def.total_rows() as f32;
    let max_col = def.total_columns() as f32;
    if row_hi < 0.0 || col_hi < 0.0 || row_lo > max_row || col_lo > max_col {
        return None;
    }

    Some(GridRegion::new(
        row_lo.clamp(0.0, max_row) as u32,
        col_lo.clamp(0.0, max_col) as u32,
        row_hi.clamp(0.0, max_row) as u32,
        col_hi.clamp(0.0, max_col) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_footprint() {
        let shape = BrushShape::Circle;
        assert_eq!(shape.footprint(0.0, 0.0, 5.0), Some(0.0));
        assert_eq!(shape.footprint(3.0, 4.0, 5.0), None);
        let inside = shape.footprint(3.0, 0.0, 5.0).unwrap();
        assert!((inside - 0.6).abs() < 1e-6);
        assert_eq!(shape.footprint(1.0, 0.0, 0.0), None);
    }

    #[test]
    fn test_square_footprint() {
        let shape = BrushShape::Square;
        assert_eq!(shape.footprint(5.0, 5.0, 5.0), Some(1.0));
        assert_eq!(shape.footprint(5.1, 0.0, 5.0), None);
        // Corner is inside the square but outside the circle
        assert!(BrushShape::Circle.footprint(4.0, 4.0, 5.0).is_none());
        assert!(shape.footprint(4.0, 4.0, 5.0).is_some());
    }

    #[test]
    fn test_star_footprint() {
        let shape = BrushShape::Star;
        // Tip along +Z reaches almost the full radius
        assert!(shape.footprint(0.0, 9.5, 10.0).is_some());
        // Valley between tips stops at half the radius
        let valley = FRAC_PI_2 + TAU / 10.0;
        let (s, c) = valley.sin_cos();
        assert!(shape.footprint(c * 4.9, s * 4.9, 10.0).is_some());
        assert!(shape.footprint(c * 5.1, s * 5.1, 10.0).is_none());
        assert_eq!(shape.footprint(0.0, 0.0, 10.0), Some(0.0));
    }

    #[test]
    fn test_star_falloff_uses_brush_radius() {
        let star = BrushShape::Star;
        let circle = BrushShape::Circle;
        let valley = FRAC_PI_2 + TAU / 10.0;
        let (s, c) = valley.sin_cos();
        let inside_valley = star.footprint(c * 4.0, s * 4.0, 10.0).unwrap();
        assert!((inside_valley - 0.4).abs() < 1e-5);
        assert_eq!(star.footprint(0.0, 6.0, 10.0), circle.footprint(0.0, 6.0, 10.0));
    }

    #[test]
    fn test_star_boundary_symmetry() {
        let sector = TAU / STAR_POINTS as f32;
        for i in 0..STAR_POINTS {
            let tip = FRAC_PI_2 + sector * i as f32;
            assert!((star_boundary(tip, 1.0) - 1.0).abs() < 1e-4);
            assert!((star_boundary(tip + sector * 0.5, 1.0) - STAR_INNER_RATIO).abs() < 1e-4);
        }
    }

    #[test]
    fn test_falloff() {
        assert_eq!(falloff(0.0), 1.0);
        assert!(falloff(1.0) < 1e-6);
        assert!((falloff(0.5) - (PI * 0.25).cos()).abs() < 1e-6);
        assert!(falloff(0.25) > falloff(0.75));
    }

    #[test]
    fn test_jitter_deterministic_and_bounded() {
        let mut distinct = std::collections::HashSet::new();
        for row in 0..32 {
            for col in 0..32 {
                let j = jitter(row, col, 7);
                assert_eq!(j, jitter(row, col, 7));
                assert!(j.abs() <= JITTER_AMPLITUDE + 1e-6);
                distinct.insert(j.to_bits());
            }
        }
        assert!(distinct.len() > 100);
    }

    #[test]
    fn test_brush_region() {
        let def = TerrainDefinition::new(100, 100, 1.0);
        let params = SculptParams::new(SculptOperation::Raise, Vec2::ZERO, 5.0, 1.0);
        assert_eq!(brush_region(&def, &params), Some(GridRegion::new(45, 45, 55, 55)));

        let edge = SculptParams::new(SculptOperation::Raise, Vec2::new(-50.0, -50.0), 5.0, 1.0);
        assert_eq!(brush_region(&def, &edge), Some(GridRegion::new(0, 0, 5, 5)));

        let off = SculptParams::new(SculptOperation::Raise, Vec2::new(500.0, 0.0), 5.0, 1.0);
        assert_eq!(brush_region(&def, &off), None);
    }

    #[test]
    fn test_safe_radius() {
        let def = TerrainDefinition::new(100, 100, 2.0);
        let mut params = SculptParams::default();
        params.radius = -3.0;
        assert_eq!(params.safe_radius(&def), 1.0);
        params.radius = f32::NAN;
        assert_eq!(params.safe_radius(&def), 1.0);
        params.radius = 8.0;
        assert_eq!(params.safe_radius(&def), 8.0);
    }

    #[test]
    fn test_params_json() {
        let json = r#"{"point":[1.0,2.0],"radius":3.0,"operation":"flatten-zero","shape":"star"}"#;
        let params: SculptParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.operation, SculptOperation::FlattenZero);
        assert_eq!(params.shape, BrushShape::Star);
        assert_eq!(params.point, Vec2::new(1.0, 2.0));
        assert_eq!(params.strength, 1.0);
    }
}
