//! Per-tick work budgets and streaming configuration
//!
//! A single update call never does more than its budget allows; whatever is
//! left over stays queued for the next tick.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chunk::partition::CHUNK_TARGET_WORLD_SIZE;
use crate::chunk::pool::DEFAULT_POOL_MAX_PER_SIZE;
use crate::core::types::Result;
use crate::streaming::window::SEED_RADIUS_CHUNKS;

/// Caps on the work one update may perform
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateBudget {
    pub max_create_per_update: usize,
    pub max_destroy_per_update: usize,
    /// Wall-clock cap in milliseconds
    pub max_ms: f64,
}

impl Default for UpdateBudget {
    fn default() -> Self {
        Self {
            max_create_per_update: 4,
            max_destroy_per_update: 8,
            max_ms: 4.0,
        }
    }
}

impl UpdateBudget {
    /// No limits at all; for tests and offline tools
    pub fn unbounded() -> Self {
        Self {
            max_create_per_update: usize::MAX,
            max_destroy_per_update: usize::MAX,
            max_ms: f64::INFINITY,
        }
    }
}

/// Tracks budget consumption during one update
#[derive(Debug)]
pub struct BudgetTracker {
    budget: UpdateBudget,
    started: Instant,
    created: usize,
    destroyed: usize,
}

impl BudgetTracker {
    pub fn start(budget: UpdateBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            created: 0,
            destroyed: 0,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn time_exhausted(&self) -> bool {
        let max_ms = if self.budget.max_ms.is_nan() { 0.0 } else { self.budget.max_ms };
        self.elapsed_ms() >= max_ms
    }

    /// Whether another creation fits
    ///
    /// The first creation of a tick ignores the clock so streaming always
    /// makes progress, but never the count.
    pub fn can_create(&self) -> bool {
        self.created < self.budget.max_create_per_update
            && (self.created == 0 || !self.time_exhausted())
    }

    /// Whether another destruction fits, same rules as creation
    pub fn can_destroy(&self) -> bool {
        self.destroyed < self.budget.max_destroy_per_update
            && (self.destroyed == 0 || !self.time_exhausted())
    }

    pub fn record_create(&mut self) {
        self.created += 1;
    }

    pub fn record_destroy(&mut self) {
        self.destroyed += 1;
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed
    }
}

/// Per-call options for a streaming update
///
/// Unset fields fall back to [`StreamingConfig`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateOptions {
    /// Load radius in world units; defaults from the terrain extent
    pub load_radius: Option<f32>,
    pub budget: Option<UpdateBudget>,
    /// Bypass throttling when the chunk under the viewpoint is missing
    pub force: bool,
    pub min_interval_ms: Option<f64>,
    /// Minimum viewpoint travel before an unchanged window is re-examined
    pub min_camera_move: Option<f32>,
}

impl UpdateOptions {
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.load_radius = Some(radius);
        self
    }

    pub fn with_budget(mut self, budget: UpdateBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_min_interval_ms(mut self, ms: f64) -> Self {
        self.min_interval_ms = Some(ms);
        self
    }

    pub fn with_min_camera_move(mut self, meters: f32) -> Self {
        self.min_camera_move = Some(meters);
        self
    }
}

/// Runtime-wide streaming configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamingConfig {
    /// World size a chunk aims to cover
    pub chunk_target_size: f32,
    /// Parked meshes kept per chunk shape
    pub pool_max_per_size: usize,
    /// Chunks seeded around the origin chunk on creation (1 = 3x3)
    pub seed_radius_chunks: u32,
    pub budget: UpdateBudget,
    pub min_interval_ms: f64,
    pub min_camera_move: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_target_size: CHUNK_TARGET_WORLD_SIZE,
            pool_max_per_size: DEFAULT_POOL_MAX_PER_SIZE,
            seed_radius_chunks: SEED_RADIUS_CHUNKS,
            budget: UpdateBudget::default(),
            min_interval_ms: 100.0,
            min_camera_move: 2.0,
        }
    }
}

impl StreamingConfig {
    /// Resolve per-call options against these defaults
    pub fn resolve(&self, options: &UpdateOptions) -> ResolvedOptions {
        ResolvedOptions {
            budget: options.budget.unwrap_or(self.budget),
            min_interval_ms: options
                .min_interval_ms
                .filter(|v| v.is_finite())
                .unwrap_or(self.min_interval_ms)
                .max(0.0),
            min_camera_move: options
                .min_camera_move
                .filter(|v| v.is_finite())
                .unwrap_or(self.min_camera_move)
                .max(0.0),
            force: options.force,
            seed_radius_chunks: self.seed_radius_chunks,
        }
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

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Options with every default filled in
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedOptions {
    pub budget: UpdateBudget,
    pub min_interval_ms: f64,
    pub min_camera_move: f32,
    pub force: bool,
    pub seed_radius_chunks: u32,
}
