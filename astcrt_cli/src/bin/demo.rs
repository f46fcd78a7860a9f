//! ASTC round-trip demo
//!
//! Synthesizes a test card and a small volume, then runs the full
//! compress → decompress → compare pipeline over a sweep of block
//! footprints and prints size and fidelity for each.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use astcrt_codecs::VoidExtentCodec;
use astcrt_core::{Operation, Pipeline, PipelineArgs, PipelineOptions, RunSummary, ThreadCount};

// ── constants ──────────────────────────────────────────────────────────────

const CARD_SIZE: u32 = 256;
const VOLUME_SIZE: u32 = 64;
const VOLUME_SLICES: u32 = 6;

const FOOTPRINTS_2D: &[&str] = &["4x4", "5x5", "6x6", "8x8", "10x10", "12x12"];
const FOOTPRINTS_3D: &[&str] = &["3x3x3", "4x4x4", "6x6x6"];

// ── image generators ───────────────────────────────────────────────────────

/// Smooth colour ramps in the top half, a checkerboard of flat tiles below.
fn test_card(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if y < size / 2 {
            let r = (x * 255 / size) as u8;
            let g = (y * 2 * 255 / size) as u8;
            Rgba([r, g, 255 - r, 255])
        } else {
            let tile = ((x / 16) + (y / 16)) % 2 == 0;
            if tile {
                Rgba([230, 230, 230, 255])
            } else {
                Rgba([30, 60, 90, 255])
            }
        }
    })
}

/// One slice of a radial falloff volume; each slice is a little darker.
fn volume_slice(size: u32, z: u32) -> RgbaImage {
    let c = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt() / c;
        let v = ((1.0 - d.min(1.0)) * (255 - z * 30) as f32) as u8;
        Rgba([v, v / 2, 255 - v, 255])
    })
}

// ── helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const U: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut u = 0;
    while v >= 1024.0 && u < U.len() - 1 { v /= 1024.0; u += 1; }
    if u == 0 { format!("{n} B") } else { format!("{v:.2} {}", U[u]) }
}

fn fmt_duration(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.2} ms", d.as_secs_f64() * 1000.0),
        None => "-".into(),
    }
}

fn print_row(footprint: &str, summary: &RunSummary) {
    let texels = summary.dims.volume() as f64;
    let psnr = summary
        .metrics
        .map(|m| format!("{:.2} dB", m.psnr))
        .unwrap_or_else(|| "-".into());
    println!(
        "  {:<8} {:>10}  {:>6.2}  {:>10}  {:>10}  {:>10}",
        footprint,
        human_bytes(summary.compressed_bytes as u64),
        summary.compressed_bytes as f64 * 8.0 / texels,
        fmt_duration(summary.compress_time),
        fmt_duration(summary.decompress_time),
        psnr,
    );
}

fn print_header() {
    println!(
        "  {:<8} {:>10}  {:>6}  {:>10}  {:>10}  {:>10}",
        "block", "size", "bpp", "compress", "decompress", "PSNR"
    );
    println!("  {}", "─".repeat(64));
}

fn sweep(
    pipeline: &Pipeline,
    input: &Path,
    out_dir: &Path,
    footprints: &[&str],
) -> Result<()> {
    print_header();
    for footprint in footprints {
        let args = PipelineArgs {
            profile: "l".into(),
            input: input.to_path_buf(),
            compressed: out_dir.join(format!("out_{footprint}.astc")),
            decompressed: out_dir.join(format!("out_{footprint}.png")),
            block: footprint.to_string(),
            quality: "medium".into(),
        };
        let summary = pipeline
            .run(&args)
            .with_context(|| format!("running footprint {footprint}"))?;
        print_row(footprint, &summary);
    }
    Ok(())
}

// ── main ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let out_dir = std::env::temp_dir().join("astcrt_demo");
    std::fs::create_dir_all(&out_dir)?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║          astcrt — ASTC round-trip pipeline  ·  Demo              ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let card_path = out_dir.join("card.png");
    test_card(CARD_SIZE)
        .save(&card_path)
        .with_context(|| format!("writing {:?}", card_path))?;

    let volume_path = out_dir.join("volume.png");
    for z in 0..VOLUME_SLICES {
        let slice_path = out_dir.join(format!("volume_{z}.png"));
        volume_slice(VOLUME_SIZE, z)
            .save(&slice_path)
            .with_context(|| format!("writing {:?}", slice_path))?;
    }

    let threads = ThreadCount::Auto;
    println!("  Test card   : {CARD_SIZE}x{CARD_SIZE}, {} threads", threads.resolve());
    println!("  Volume      : {VOLUME_SIZE}x{VOLUME_SIZE}x{VOLUME_SLICES} from {VOLUME_SLICES} slice files");
    println!("  Output dir  : {}", out_dir.display());
    println!();

    // Test mode keeps the compressed payload in memory and reports PSNR;
    // a round trip also writes the .astc files.
    let card = Pipeline::new(Arc::new(VoidExtentCodec)).with_options(PipelineOptions {
        operation: Operation::Test,
        threads,
        ..PipelineOptions::default()
    });
    println!("  2D footprints (test mode)");
    sweep(&card, &card_path, &out_dir, FOOTPRINTS_2D)?;
    println!();

    let volume = Pipeline::new(Arc::new(VoidExtentCodec)).with_options(PipelineOptions {
        operation: Operation::RoundTrip,
        threads,
        array_size: VOLUME_SLICES,
        ..PipelineOptions::default()
    });
    println!("  3D footprints (round trip of a {VOLUME_SLICES}-slice array)");
    sweep(&volume, &volume_path, &out_dir, FOOTPRINTS_3D)?;
    println!();

    Ok(())
}
