//! Noise-based procedural base surface

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Parameters controlling terrain generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,          // Horizontal scale (larger = smoother)
    pub height_scale: f32,   // Vertical scale (peak-to-trough)
    pub octaves: u32,        // FBM octaves (detail levels)
    pub persistence: f32,    // FBM persistence (0.5 typical)
    pub lacunarity: f32,     // FBM lacunarity (2.0 typical)
    pub base_elevation: f32, // Height added to every sample
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 16.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            base_elevation: 0.0,
        }
    }
}

/// Procedural terrain generator using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let octaves = params.octaves.clamp(1, 16) as usize;
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(octaves)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Get base height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let scale = if self.params.scale.is_finite() && self.params.scale > 0.0 {
            self.params.scale
        } else {
            1.0
        };
        let nx = (x / scale) as f64;
        let nz = (z / scale) as f64;

        // Noise value in range [-1, 1]
        let noise_value = self.noise.get([nx, nz]).clamp(-1.0, 1.0);

        // Map to [base_elevation, base_elevation + height_scale]
        let normalized = (noise_value + 1.0) / 2.0;
        self.params.base_elevation + (normalized * self.params.height_scale as f64) as f32
    }
}
