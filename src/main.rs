//! Wavebake - simulate an FFT ocean tile, preview it, or bake it to disk.

use std::ops::ControlFlow;
use std::time::Instant;

use clap::Parser;
use image::{GrayImage, Luma};

use wavebake::cache::FrameCache;
use wavebake::cli::{Args, BakeArgs, Command, PreviewArgs, ProbeArgs};
use wavebake::ocean::{EvalResult, Ocean, StepParams};
use wavebake::params::BakeSettings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Bake(bake) => run_bake(&bake),
        Command::Preview(preview) => run_preview(&preview),
        Command::Probe(probe) => run_probe(&probe),
    }
}

fn run_bake(args: &BakeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.sim.to_config();
    let settings = args.to_settings();

    println!("Ocean Bake");
    println!(
        "  Grid: {}x{} over {}m x {}m",
        config.resolution_x, config.resolution_z, config.size_x_m, config.size_z_m
    );
    println!("  Spectrum: {} (seed {})", config.spectrum, config.seed);
    println!(
        "  Frames: {}..={} -> {}",
        settings.start_frame,
        settings.end_frame,
        settings.output_dir.display()
    );

    let start = Instant::now();
    let ocean = Ocean::new(config)?;
    let mut cache = FrameCache::new(ocean.config(), settings)?;
    let summary = cache.bake(&ocean, |progress| {
        println!(
            "  frame {} ({}/{})",
            progress.frame, progress.completed, progress.total
        );
        ControlFlow::Continue(())
    })?;

    println!(
        "  Done: {} written, {} reused in {:.2}s",
        summary.written,
        summary.reused,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_preview(args: &PreviewArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.sim.to_config();
    let start = Instant::now();
    let ocean = Ocean::with_step(
        config,
        StepParams {
            wave_scale: args.wave_scale,
            ..StepParams::at(args.time)
        },
    )?;
    let snapshot = ocean.snapshot();
    let surface = snapshot.surface();

    let (rows, cols) = (surface.rows(), surface.cols());
    let heights: Vec<f64> = (0..rows)
        .flat_map(|i| (0..cols).map(move |j| (i, j)))
        .map(|(i, j)| surface.eval_grid(i as i64, j as i64).disp.y)
        .collect();
    let low = heights.iter().cloned().fold(f64::INFINITY, f64::min);
    let high = heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = (high - low).max(f64::EPSILON);

    // Image x runs along Z, image y along X
    let mut img = GrayImage::new(u32::try_from(cols)?, u32::try_from(rows)?);
    for (n, height) in heights.iter().enumerate() {
        let gray = ((height - low) / range * 255.0).clamp(0.0, 255.0) as u8;
        img.put_pixel((n % cols) as u32, (n / cols) as u32, Luma([gray]));
    }
    img.save(&args.output)?;

    println!("Ocean Preview");
    println!("  Time: {}s", args.time);
    println!("  Height range: {:.3}m .. {:.3}m", low, high);
    println!("  Output: {}", args.output.display());
    println!("  Elapsed: {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn run_probe(args: &ProbeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.sim.to_config();

    let result = match &args.cache {
        Some(dir) => {
            let settings = BakeSettings {
                foam: args.step.foam(),
                ..BakeSettings::new(dir, args.frame, args.frame)
            };
            let cache = FrameCache::open(config, settings)?;
            println!("Probe (cache frame {}, {:?})", args.frame, cache.state());
            cache.eval_uv(args.frame, args.u, args.v)?
        }
        None => {
            let ocean = Ocean::with_step(config, args.step.at(args.time))?;
            println!("Probe (live, t = {}s)", args.time);
            ocean.eval_uv(args.u, args.v)?
        }
    };
    print_result(args.u, args.v, &result);
    Ok(())
}

fn print_result(u: f64, v: f64, result: &EvalResult) {
    println!("  uv: ({u}, {v})");
    println!(
        "  disp: ({:.6}, {:.6}, {:.6})",
        result.disp.x, result.disp.y, result.disp.z
    );
    println!(
        "  normal: ({:.6}, {:.6}, {:.6})",
        result.normal.x, result.normal.y, result.normal.z
    );
    println!("  foam: {:.6}", result.foam);
    println!("  jacobian eigenvalues: {:.6} / {:.6}", result.jminus, result.jplus);
    if result.eminus != glam::DVec3::ZERO {
        println!("  eminus: {:?}", result.eminus);
        println!("  eplus: {:?}", result.eplus);
    }
}
