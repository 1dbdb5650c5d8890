//! Headless fly-over driving the streamer with placeholder chunks.
//!
//! Usage: cargo run --release -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Streaming config JSON (default: built-in defaults)
//!   --frames <N>        Number of updates to run (default: 240)
//!   --extent <METERS>   Side of the square map (default: 4096)
//!   --budget <N>        Override max_resident_chunks
//!   --depth <N>         Override max_depth
//!   --latency-ms <MS>   Artificial delay per chunk load (default: 0)
//!   --parallel          Run chunk loads on the rayon pool

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tilestream::core::{logging, Camera, Result};
use tilestream::core::types::{DVec2, Vec3};
use tilestream::streaming::{
    ChunkAddress, ChunkedStreamer, DebugChunkLoaderFactory, DebugScene, StreamingConfig, TilingScheme,
};

/// Simulated time between updates
const FRAME_TIME: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => StreamingConfig::load_json(&PathBuf::from(path))?,
        None => StreamingConfig::default(),
    };
    if let Some(budget) = parse_arg(&args, "--budget") {
        config.max_resident_chunks = budget;
    }
    if let Some(depth) = parse_arg(&args, "--depth") {
        config.max_depth = depth;
    }
    if args.iter().any(|a| a == "--parallel") {
        config.parallel_loads = true;
    }
    let frames: u32 = parse_arg(&args, "--frames").unwrap_or(240);
    let extent: f64 = parse_arg(&args, "--extent").unwrap_or(4096.0);
    let latency = Duration::from_millis(parse_arg(&args, "--latency-ms").unwrap_or(0));

    let tiling = TilingScheme::new(DVec2::ZERO, DVec2::splat(extent));
    let root_bbox = tiling.tile_bbox(ChunkAddress::ROOT, 0.0, 200.0);
    // Root error of one pixel per 64 map units
    let root_error = (extent / 64.0) as f32;

    let mut streamer = ChunkedStreamer::new(
        config,
        root_bbox,
        root_error,
        DebugChunkLoaderFactory::with_latency(latency),
        DebugScene::new(),
    )?;

    let size = root_bbox.size();
    let start = Instant::now();
    let mut now = start;
    for frame in 0..frames {
        let t = frame as f32 / frames.max(1) as f32;
        // Dive from high above one corner down to low altitude over the far corner
        let position = Vec3::new(
            root_bbox.min.x + size.x * (0.1 + 0.8 * t),
            size.x * (1.5 - 1.45 * t),
            root_bbox.min.z + size.z * (0.1 + 0.8 * t),
        );
        let target = position + Vec3::new(size.x * 0.2, -position.y, size.z * 0.2);
        let camera = Camera::look_at(position, target, 60.0, 1080, 16.0 / 9.0, 1.0, size.x * 10.0);

        streamer.update_at(&camera, now);
        now += FRAME_TIME;

        if frame % 30 == 0 || frame + 1 == frames {
            let stats = streamer.last_stats();
            log::info!(
                "frame {:4}: altitude {:7.1} | active {:4} visible {:4} | resident {:4} loaded {:3} evicted {:3} thrashed {}",
                stats.frame,
                position.y,
                stats.active,
                streamer.context().visible_chunks(),
                stats.resident,
                stats.loads_completed,
                stats.evicted,
                stats.thrashed
            );
        }
    }

    let scene = streamer.context();
    log::info!(
        "Done in {:.2?}: {} tree nodes, {} chunks materialized, {} live",
        start.elapsed(),
        streamer.tree().len(),
        scene.materialized(),
        scene.live_chunks()
    );

    streamer.shutdown();
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
