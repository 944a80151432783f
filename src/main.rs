//! Terrain streaming demo - flies a viewpoint across a generated terrain,
//! sculpts along the way and optionally exports the result.
//!
//! Usage: cargo run --release -- [OPTIONS]
//!
//! Options:
//!   --rows <N>            Grid rows (default: 512)
//!   --cols <N>            Grid columns (default: 512)
//!   --cell <METERS>       Cell size (default: 2.0)
//!   --seed <SEED>         Noise seed (default: 12345)
//!   --ticks <N>           Streaming ticks to simulate (default: 240)
//!   --radius <METERS>     Load radius (default: derived from extent)
//!   --definition <PATH>   Load the terrain definition from JSON instead
//!   --config <PATH>       Load a streaming config from JSON
//!   --save <PATH>         Save the sculpted definition as JSON
//!   --export <PATH>       Export every chunk as a GLB file
//!   --log <FILTER>        Log filter when RUST_LOG is unset (default: info)

use std::path::PathBuf;
use std::time::Instant;

use glam::{Vec2, Vec3};

use terrastream::core::logging;
use terrastream::{
    BrushShape, Result, SculptOperation, SculptParams, StreamingConfig, TerrainDefinition,
    TerrainParams, TerrainRuntime, UpdateOptions,
};

/// Simulated frame time
const TICK_MS: f64 = 16.0;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    match parse_str_arg(&args, "--log") {
        Some(filter) => logging::init_with_filter(&filter),
        None => logging::init(),
    }
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let rows = parse_u32_arg(&args, "--rows").unwrap_or(512);
    let cols = parse_u32_arg(&args, "--cols").unwrap_or(512);
    let cell = parse_f32_arg(&args, "--cell").unwrap_or(2.0);
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let ticks = parse_usize_arg(&args, "--ticks").unwrap_or(240);
    let radius = parse_f32_arg(&args, "--radius");

    let mut def = match parse_path_arg(&args, "--definition") {
        Some(path) => TerrainDefinition::load(&path)?,
        None => TerrainDefinition::new(rows, cols, cell).with_generation(TerrainParams {
            seed,
            scale: 150.0,
            height_scale: 40.0,
            ..Default::default()
        }),
    };
    let config = match parse_path_arg(&args, "--config") {
        Some(path) => StreamingConfig::load(&path)?,
        None => StreamingConfig::default(),
    };

    println!("=== Terrastream Demo ===");
    println!("Grid:   {} x {} cells, {}m cells", def.total_rows(), def.total_columns(), def.safe_cell_size());
    println!("Extent: {}m x {}m", def.safe_width(), def.safe_depth());
    println!("Ticks:  {}", ticks);
    println!();

    let start = Instant::now();
    let mut runtime = TerrainRuntime::with_config(&def, config);
    let mut options = UpdateOptions::default();
    options.load_radius = radius;

    let (mut created, mut destroyed, mut reused, mut sculpts) = (0, 0, 0, 0);
    let mut peak_live = runtime.len();
    let half_w = def.safe_width() * 0.4;
    let half_d = def.safe_depth() * 0.4;

    for tick in 0..ticks {
        let t = tick as f32 / ticks.max(1) as f32;
        let angle = t * std::f32::consts::TAU;
        let viewpoint = Vec3::new(half_w * angle.cos(), 30.0, half_d * (2.0 * angle).sin());
        // Teleport halfway through to exercise forced loading
        let opts = if tick == ticks / 2 { options.forced() } else { options };

        let report = runtime.update_chunks(&def, Some(viewpoint), &opts, tick as f64 * TICK_MS);
        created += report.created;
        destroyed += report.destroyed;
        reused += report.reused;
        peak_live = peak_live.max(runtime.len());

        if tick % 30 == 0 {
            let operation = match (tick / 30) % 4 {
                0 => SculptOperation::Raise,
                1 => SculptOperation::Smooth,
                2 => SculptOperation::Depress,
                _ => SculptOperation::FlattenZero,
            };
            let shape = match (tick / 30) % 3 {
                0 => BrushShape::Circle,
                1 => BrushShape::Square,
                _ => BrushShape::Star,
            };
            let params = SculptParams::new(operation, Vec2::new(viewpoint.x, viewpoint.z), 12.0, 2.0)
                .with_shape(shape);
            if runtime.sculpt(&mut def, &params) {
                sculpts += 1;
            }
        }
        runtime.drain_events();
    }

    let elapsed = start.elapsed();
    println!("Streamed: {} created ({} from pool), {} destroyed", created, reused, destroyed);
    println!("Live:     {} chunks now, {} peak, {} pooled", runtime.len(), peak_live, runtime.registry().pool().len());
    println!("Sculpts:  {} applied, {} manual overrides", sculpts, def.manual_heights.len());
    println!("Time:     {:.1}ms ({:.2}ms/tick)", elapsed.as_secs_f64() * 1000.0, elapsed.as_secs_f64() * 1000.0 / ticks.max(1) as f64);

    if let Some(path) = parse_path_arg(&args, "--save") {
        def.save(&path)?;
        println!("Saved definition to {}", path.display());
    }
    if let Some(path) = parse_path_arg(&args, "--export") {
        runtime.export_glb(&def, &path)?;
        println!("Exported {} chunks to {}", runtime.len(), path.display());
    }
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}
