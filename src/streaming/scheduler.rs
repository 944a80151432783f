//! Viewpoint-driven streaming tick
//!
//! Each call throttles, recomputes the load/unload windows, re-plans the
//! work queues when anything changed and then drains the queues within the
//! update budget. Creations always run before destructions so a moving
//! viewpoint never sees a hole.

use crate::chunk::partition::{ChunkKey, ChunkRange};
use crate::chunk::pool::PoolRelease;
use crate::chunk::registry::{ChunkCreation, MaterialId, RuntimeRegistry};
use crate::chunk::seam::stitch_seams;
use crate::core::types::Vec3;
use crate::streaming::budget::{BudgetTracker, ResolvedOptions};
use crate::streaming::priority::{CreatePriority, DestroyPriority, TIER_CORE, TIER_NORMAL};
use crate::streaming::window::{clamp_load_radius, compute_window, StreamWindow};
use crate::terrain::height::HeightField;

/// Why an update did nothing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Called again before the minimum interval elapsed
    Throttled,
    /// Window unchanged, queues empty and the viewpoint barely moved
    Idle,
}

/// Outcome of one streaming tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateReport {
    /// Chunks made live this tick
    pub created: usize,
    /// Of `created`, how many came out of the pool
    pub reused: usize,
    /// Chunks evicted this tick
    pub destroyed: usize,
    /// Of `destroyed`, how many meshes were parked
    pub pooled: usize,
    /// Of `destroyed`, how many meshes were dropped because the bucket was full
    pub disposed: usize,
    pub pending_create: usize,
    pub pending_destroy: usize,
    /// Whether the queues were rebuilt
    pub replanned: bool,
    /// Seam vertices rewritten after creation
    pub stitched: usize,
    pub elapsed_ms: f64,
    pub skipped: Option<SkipReason>,
}

impl UpdateReport {
    fn skipped(registry: &RuntimeRegistry, reason: SkipReason) -> Self {
        Self {
            pending_create: registry.pending_create_len(),
            pending_destroy: registry.pending_destroy_len(),
            skipped: Some(reason),
            ..Default::default()
        }
    }

    /// Whether any work is still queued
    pub fn has_pending(&self) -> bool {
        self.pending_create > 0 || self.pending_destroy > 0
    }
}

/// Run one streaming tick against `registry`
///
/// `now_ms` is a caller-supplied monotonic clock used for throttling; the
/// wall-clock budget is measured internally.
pub fn update_chunks(
    registry: &mut RuntimeRegistry,
    field: &HeightField<'_>,
    viewpoint: Option<Vec3>,
    load_radius: Option<f32>,
    options: &ResolvedOptions,
    now_ms: f64,
    material: Option<MaterialId>,
) -> UpdateReport {
    let def = field.definition();
    let layout = *registry.layout();
    let radius = clamp_load_radius(def, load_radius);
    let window = compute_window(def, &layout, viewpoint, radius, options.seed_radius_chunks);
    let core_missing = !registry.contains(window.center);
    let bypass = options.force && core_missing;

    if let Some(last) = registry.last_update_ms {
        let elapsed = now_ms - last;
        if !bypass && elapsed >= 0.0 && elapsed < options.min_interval_ms {
            log::trace!("Streaming throttled ({:.1}ms since last update)", elapsed);
            return UpdateReport::skipped(registry, SkipReason::Throttled);
        }
    }
    registry.last_update_ms = Some(now_ms);

    let signature = window.signature();
    let queues_empty = registry.pending_create_len() == 0 && registry.pending_destroy_len() == 0;
    let needs_replan = registry.window_signature != Some(signature) || !queues_empty || bypass;
    if !needs_replan && !moved_beyond(registry.last_viewpoint, viewpoint, options.min_camera_move) {
        return UpdateReport::skipped(registry, SkipReason::Idle);
    }
    registry.last_viewpoint = viewpoint;

    let mut report = UpdateReport::default();
    if needs_replan {
        replan(registry, field, &window, options.force);
        registry.window_signature = Some(signature);
        report.replanned = true;
    }

    let mut tracker = BudgetTracker::start(options.budget);
    let mut created_keys: Vec<ChunkKey> = Vec::new();

    while tracker.can_create() {
        let Some(job) = registry.pending_create.pop() else {
            break;
        };
        match registry.ensure_chunk_mesh(field, job.key, material) {
            ChunkCreation::Existing => continue,
            ChunkCreation::Fresh => {}
            ChunkCreation::Pooled(_) => report.reused += 1,
        }
        tracker.record_create();
        created_keys.push(job.key);
    }

    while tracker.can_destroy() {
        let Some(job) = registry.pending_destroy.pop() else {
            break;
        };
        // Re-check: the window may have moved back over a queued key
        if window.unload.contains(job.key) {
            continue;
        }
        match registry.release_chunk_to_pool(job.key) {
            Some(PoolRelease::Pooled) => report.pooled += 1,
            Some(PoolRelease::Disposed) => report.disposed += 1,
            None => continue,
        }
        tracker.record_destroy();
    }

    if let Some(range) = ChunkRange::bounding(&created_keys) {
        report.stitched = stitch_seams(registry, Some(range.expanded(1, &layout)));
    }

    report.created = tracker.created();
    report.destroyed = tracker.destroyed();
    report.pending_create = registry.pending_create_len();
    report.pending_destroy = registry.pending_destroy_len();
    report.elapsed_ms = tracker.elapsed_ms();

    log::debug!(
        "Streaming tick: +{} -{} (pending +{} -{}, live {}, pooled {}) in {:.2}ms",
        report.created,
        report.destroyed,
        report.pending_create,
        report.pending_destroy,
        registry.len(),
        registry.pool().len(),
        report.elapsed_ms,
    );
    report
}

/// Rebuild both queues from the current window
fn replan(registry: &mut RuntimeRegistry, field: &HeightField<'_>, window: &StreamWindow, core_first: bool) {
    let def = field.definition();
    let layout = *registry.layout();
    let core = window.core(&layout);

    registry.pending_create.clear();
    for key in window.load.keys() {
        if registry.contains(key) {
            continue;
        }
        let tier = if core_first && core.contains(key) { TIER_CORE } else { TIER_NORMAL };
        let distance_sq = window.distance_sq(def, &layout.spec(key));
        registry.pending_create.push(CreatePriority { key, tier, distance_sq });
    }

    registry.pending_destroy.clear();
    let stale: Vec<DestroyPriority> = registry
        .chunks()
        .filter(|chunk| !window.unload.contains(chunk.key))
        .map(|chunk| DestroyPriority {
            key: chunk.key,
            distance_sq: window.distance_sq(def, &chunk.spec),
        })
        .collect();
    for job in stale {
        registry.pending_destroy.push(job);
    }
}

fn moved_beyond(previous: Option<Vec3>, current: Option<Vec3>, threshold: f32) -> bool {
    match (previous, current) {
        (Some(a), Some(b)) => a.distance(b) > threshold,
        (None, None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::geometry::build_chunk_geometry;
    use crate::chunk::registry::ChunkEvent;
    use crate::streaming::budget::UpdateBudget;
    use crate::terrain::{TerrainDefinition, TerrainGenerator};
    use std::collections::HashSet;

    fn setup() -> (TerrainDefinition, TerrainGenerator) {
        // 16x16 chunks of 25 cells
        let def = TerrainDefinition::new(400, 400, 1.0);
        let generator = TerrainGenerator::new(def.generation.clone());
        (def, generator)
    }

    fn options(budget: UpdateBudget, min_interval_ms: f64) -> ResolvedOptions {
        ResolvedOptions {
            budget,
            min_interval_ms,
            min_camera_move: 2.0,
            force: false,
            seed_radius_chunks: 1,
        }
    }

    #[test]
    fn test_budget_caps_creations() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let budget = UpdateBudget {
            max_create_per_update: 2,
            max_destroy_per_update: 8,
            max_ms: f64::INFINITY,
        };
        let opts = options(budget, 0.0);

        let report = update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(60.0), &opts, 0.0, None);
        assert_eq!(report.created, 2);
        assert!(report.pending_create > 0);
        assert_eq!(registry.len(), 2);

        let mut now = 1.0;
        while registry.pending_create_len() > 0 {
            let report = update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(60.0), &opts, now, None);
            assert!(report.created <= 2);
            now += 1.0;
        }
        // 60m around the origin covers chunks 5..=10 on each axis
        assert_eq!(registry.len(), 36);
    }

    #[test]
    fn test_nearest_created_first() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let budget = UpdateBudget { max_create_per_update: 1, ..UpdateBudget::default() };
        let viewpoint = Vec3::new(12.5, 0.0, 12.5);
        update_chunks(&mut registry, &field, Some(viewpoint), Some(80.0), &options(budget, 0.0), 0.0, None);
        assert!(registry.contains(ChunkKey::new(8, 8)));
    }

    #[test]
    fn test_throttle_and_force() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = options(UpdateBudget::unbounded(), 100.0);

        let first = update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(30.0), &opts, 0.0, None);
        assert!(first.skipped.is_none());
        assert!(first.created > 0);

        let far = Vec3::new(-180.0, 0.0, -180.0);
        let throttled = update_chunks(&mut registry, &field, Some(far), Some(30.0), &opts, 50.0, None);
        assert_eq!(throttled.skipped, Some(SkipReason::Throttled));

        // Force only bypasses when the chunk under the viewpoint is missing
        let forced = ResolvedOptions { force: true, ..opts };
        let near = update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(30.0), &forced, 60.0, None);
        assert_eq!(near.skipped, Some(SkipReason::Throttled));

        let teleport = update_chunks(&mut registry, &field, Some(far), Some(30.0), &forced, 70.0, None);
        assert!(teleport.skipped.is_none());
        assert!(registry.contains(ChunkKey::new(0, 0)));
    }

    #[test]
    fn test_force_prioritizes_core() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = ResolvedOptions {
            force: true,
            ..options(UpdateBudget { max_create_per_update: 9, ..UpdateBudget::unbounded() }, 0.0)
        };
        let viewpoint = Vec3::new(12.5, 0.0, 12.5);
        update_chunks(&mut registry, &field, Some(viewpoint), Some(150.0), &opts, 0.0, None);
        for row in 7..=9 {
            for col in 7..=9 {
                assert!(registry.contains(ChunkKey::new(row, col)));
            }
        }
    }

    #[test]
    fn test_force_prioritizes_core_when_centre_present() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        registry.ensure_chunk_mesh(&field, ChunkKey::new(8, 8), None);

        // Near the corner of (8, 8), several chunks outside the core are nearer than (9, 9)
        let viewpoint = Vec3::new(0.5, 0.0, 0.5);
        let budget = UpdateBudget { max_create_per_update: 8, ..UpdateBudget::unbounded() };
        let forced = ResolvedOptions { force: true, ..options(budget, 0.0) };
        let report = update_chunks(&mut registry, &field, Some(viewpoint), Some(150.0), &forced, 0.0, None);
        assert_eq!(report.created, 8);
        for row in 7..=9 {
            for col in 7..=9 {
                assert!(registry.contains(ChunkKey::new(row, col)), "core chunk {}:{}", row, col);
            }
        }
    }

    #[test]
    fn test_idle_when_nothing_changes() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = options(UpdateBudget::unbounded(), 0.0);

        update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(30.0), &opts, 0.0, None);
        let again = update_chunks(&mut registry, &field, Some(Vec3::new(0.5, 0.0, 0.0)), Some(30.0), &opts, 1.0, None);
        assert_eq!(again.skipped, Some(SkipReason::Idle));
    }

    #[test]
    fn test_hysteresis_prevents_churn() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = options(UpdateBudget::unbounded(), 0.0);
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(20.0, 0.0, 0.0);

        update_chunks(&mut registry, &field, Some(a), Some(60.0), &opts, 0.0, None);
        update_chunks(&mut registry, &field, Some(b), Some(60.0), &opts, 1.0, None);
        registry.drain_events();

        for tick in 0..10 {
            let viewpoint = if tick % 2 == 0 { a } else { b };
            let report = update_chunks(&mut registry, &field, Some(viewpoint), Some(60.0), &opts, 2.0 + tick as f64, None);
            assert_eq!(report.created, 0, "tick {}", tick);
            assert_eq!(report.destroyed, 0, "tick {}", tick);
        }
        assert!(registry.drain_events().is_empty());
    }

    #[test]
    fn test_moving_away_unloads_far_chunks() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 4);
        let opts = options(UpdateBudget::unbounded(), 0.0);

        update_chunks(&mut registry, &field, Some(Vec3::new(-150.0, 0.0, -150.0)), Some(40.0), &opts, 0.0, None);
        assert!(registry.contains(ChunkKey::new(2, 2)));
        let report = update_chunks(&mut registry, &field, Some(Vec3::new(150.0, 0.0, 150.0)), Some(40.0), &opts, 1.0, None);
        assert!(report.destroyed > 0);
        assert_eq!(report.pooled + report.disposed, report.destroyed);
        assert!(!registry.contains(ChunkKey::new(2, 2)));
        assert!(registry.contains(ChunkKey::new(14, 14)));
        // Creations run before destructions, so the pool only pays off on the way back
        assert_eq!(report.reused, 0);
        assert_eq!(report.pooled, 4);

        let back = update_chunks(&mut registry, &field, Some(Vec3::new(-150.0, 0.0, -150.0)), Some(40.0), &opts, 2.0, None);
        assert_eq!(back.reused, 4);
    }

    #[test]
    fn test_pool_bounded_under_churn() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 3);
        let opts = options(UpdateBudget::unbounded(), 0.0);

        for step in 0..40 {
            let t = step as f32 * 0.3;
            let viewpoint = Vec3::new(170.0 * t.cos(), 0.0, 170.0 * t.sin());
            update_chunks(&mut registry, &field, Some(viewpoint), Some(50.0), &opts, step as f64, None);
            for shape in registry.pool().shapes().collect::<Vec<_>>() {
                assert!(registry.pool().len_for(shape) <= 3);
            }
        }
    }

    #[test]
    fn test_zero_and_huge_radius() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let opts = options(UpdateBudget::unbounded(), 0.0);

        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        update_chunks(&mut registry, &field, Some(Vec3::new(12.0, 0.0, 12.0)), Some(0.0), &opts, 0.0, None);
        assert_eq!(registry.len(), 1);

        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(1e9), &opts, 0.0, None);
        assert_eq!(registry.len(), registry.layout().chunk_count());
    }

    #[test]
    fn test_no_viewpoint_loads_origin_neighbourhood() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = options(UpdateBudget::unbounded(), 0.0);
        update_chunks(&mut registry, &field, None, None, &opts, 0.0, None);
        let keys: HashSet<_> = registry.keys().collect();
        assert_eq!(keys.len(), 9);
        assert!(keys.contains(&ChunkKey::new(8, 8)));
    }

    #[test]
    fn test_created_chunks_are_stitched() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = options(UpdateBudget::unbounded(), 0.0);
        let report = update_chunks(&mut registry, &field, Some(Vec3::ZERO), Some(30.0), &opts, 0.0, None);
        assert!(report.stitched > 0);

        let left = registry.get(ChunkKey::new(8, 7)).unwrap();
        let right = registry.get(ChunkKey::new(8, 8)).unwrap();
        for row in 200..=225 {
            let a = left.mesh.geometry.normals[left.spec.local_index(row, 200).unwrap()];
            let b = right.mesh.geometry.normals[right.spec.local_index(row, 200).unwrap()];
            assert_eq!(a, b);
        }
        let events = registry.drain_events();
        assert!(events.contains(&ChunkEvent::Attached(ChunkKey::new(8, 8))));
    }

    #[test]
    fn test_seams_match_fresh_geometry_after_round_trip() {
        let (def, generator) = setup();
        let field = HeightField::new(&def, &generator);
        let mut registry = RuntimeRegistry::new(&def, 25, 8);
        let opts = options(UpdateBudget::unbounded(), 0.0);

        let (mut now, mut reused) = (0.0, 0);
        for x in [0.0, -60.0, -120.0, -60.0, 0.0, 60.0, 0.0] {
            let report = update_chunks(&mut registry, &field, Some(Vec3::new(x, 0.0, 0.0)), Some(30.0), &opts, now, None);
            reused += report.reused;
            now += 10.0;
        }
        assert!(reused > 0);

        let layout = *registry.layout();
        let (left_key, right_key) = (ChunkKey::new(8, 7), ChunkKey::new(8, 8));
        let fresh_left = build_chunk_geometry(&field, &layout.spec(left_key));
        let fresh_right = build_chunk_geometry(&field, &layout.spec(right_key));
        let left = registry.get(left_key).unwrap();
        let right = registry.get(right_key).unwrap();
        for row in 201..225 {
            let li = left.spec.local_index(row, 200).unwrap();
            let ri = right.spec.local_index(row, 200).unwrap();
            let expected = (fresh_left.normals[li] + fresh_right.normals[ri]).normalize();
            assert!((left.mesh.geometry.normals[li] - expected).length() < 1e-5, "row {}", row);
            assert_eq!(left.mesh.geometry.normals[li], right.mesh.geometry.normals[ri]);
        }
    }
}
