use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use astcrt_codecs::{codec_by_name, is_void_extent};
use astcrt_core::container::ContainerKind;
use astcrt_core::{
    load_compressed, Operation, Pipeline, PipelineArgs, PipelineOptions, RunSummary, Swizzle,
    ThreadCount, BLOCK_BYTES,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "astcrt",
    about = "ASTC round-trip pipeline: compress, decompress, and measure images",
    version
)]
struct Cli {
    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every pipeline subcommand.
#[derive(Args)]
struct RunFlags {
    /// Worker threads (default: one per logical CPU)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
    /// Load N per-slice files `<name>_<i>.<ext>` as one 3D image
    #[arg(long, default_value_t = 1)]
    array: u32,
    /// Flip images vertically on load and store
    #[arg(long)]
    yflip: bool,
    /// Channel remap applied before encoding (four of r g b a 0 1)
    #[arg(long, default_value = "rgba")]
    swizzle: Swizzle,
    /// Channel remap applied after decoding
    #[arg(long, default_value = "rgba")]
    decode_swizzle: Swizzle,
    /// Codec to use
    #[arg(long, default_value = "void-extent")]
    codec: String,
}

impl RunFlags {
    fn options(&self, operation: Operation) -> PipelineOptions {
        PipelineOptions {
            operation,
            threads: self.threads.map_or(ThreadCount::Auto, ThreadCount::Fixed),
            array_size: self.array,
            y_flip: self.yflip,
            encode_swizzle: self.swizzle,
            decode_swizzle: self.decode_swizzle,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image into an .astc or .ktx file
    Compress {
        /// Color profile: l (LDR), s (LDR sRGB), h (HDR RGB, LDR A), H (HDR)
        #[arg(value_parser = ["l", "s", "h", "H"])]
        profile: String,
        /// Source image (or array pattern with --array)
        input: PathBuf,
        /// Destination .astc or .ktx file
        output: PathBuf,
        /// Block footprint, WxH or WxHxD
        block: String,
        /// Quality preset (fastest, fast, medium, thorough, exhaustive) or 0–100
        #[arg(default_value = "medium")]
        quality: String,
        #[command(flatten)]
        run: RunFlags,
    },
    /// Decompress an .astc or .ktx file into an image
    Decompress {
        /// Color profile: l (LDR), s (LDR sRGB), h (HDR RGB, LDR A), H (HDR)
        #[arg(value_parser = ["l", "s", "h", "H"])]
        profile: String,
        /// Source .astc or .ktx file
        input: PathBuf,
        /// Destination image; the suffix picks the format
        output: PathBuf,
        #[command(flatten)]
        run: RunFlags,
    },
    /// Compress, decompress, and keep both results
    Roundtrip {
        /// Color profile: l (LDR), s (LDR sRGB), h (HDR RGB, LDR A), H (HDR)
        #[arg(value_parser = ["l", "s", "h", "H"])]
        profile: String,
        /// Source image (or array pattern with --array)
        input: PathBuf,
        /// Destination .astc or .ktx file
        compressed: PathBuf,
        /// Destination image for the decoded result
        decompressed: PathBuf,
        /// Block footprint, WxH or WxHxD
        block: String,
        /// Quality preset or 0–100
        #[arg(default_value = "medium")]
        quality: String,
        #[command(flatten)]
        run: RunFlags,
    },
    /// Compress, decompress, and report error metrics against the source
    Test {
        /// Color profile: l (LDR), s (LDR sRGB), h (HDR RGB, LDR A), H (HDR)
        #[arg(value_parser = ["l", "s", "h", "H"])]
        profile: String,
        /// Source image (or array pattern with --array)
        input: PathBuf,
        /// Destination image for the decoded result
        decompressed: PathBuf,
        /// Block footprint, WxH or WxHxD
        block: String,
        /// Quality preset or 0–100
        #[arg(default_value = "medium")]
        quality: String,
        #[command(flatten)]
        run: RunFlags,
    },
    /// Print header metadata and payload statistics of a compressed file
    Inspect {
        /// .astc or .ktx file to inspect
        file: PathBuf,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn fmt_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        format!("{ms:.3} ms")
    } else {
        format!("{:.3} s", d.as_secs_f64())
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn report(summary: &RunSummary, codec: &str) {
    let texels = summary.dims.volume().max(1) as f64;
    eprintln!("  codec       : {}", codec);
    eprintln!("  operation   : {:?}", summary.operation);
    eprintln!("  block       : {}", summary.block);
    eprintln!("  image       : {}", summary.dims);
    eprintln!("  threads     : {}", summary.threads);
    eprintln!(
        "  compressed  : {} ({:.2} bpp)",
        human_bytes(summary.compressed_bytes as u64),
        summary.compressed_bytes as f64 * 8.0 / texels
    );
    if let Some(t) = summary.compress_time {
        eprintln!("  compress    : {}", fmt_duration(t));
    }
    if let Some(t) = summary.decompress_time {
        eprintln!("  decompress  : {}", fmt_duration(t));
    }
    if let Some(m) = &summary.metrics {
        eprintln!("  PSNR        : {:.4} dB", m.psnr);
        eprintln!("  RMSE        : {:.6}", m.rmse);
    }
}

/// Run one pipeline operation. Returns the process status (0 or 1).
fn run_pipeline(operation: Operation, args: PipelineArgs, flags: &RunFlags) -> anyhow::Result<i32> {
    let codec = codec_by_name(&flags.codec)?;
    let codec_name = codec.name();
    let pipeline = Pipeline::new(codec).with_options(flags.options(operation));

    Ok(pipeline.run_reported(&args, |summary| report(summary, codec_name)))
}

fn run_inspect(file: PathBuf) -> anyhow::Result<i32> {
    let kind = ContainerKind::from_path(&file)
        .ok_or_else(|| anyhow::anyhow!("{:?} is not an .astc or .ktx file", file))?;
    let (image, srgb) = load_compressed(&file)?;
    let file_size = std::fs::metadata(&file)?.len();

    let blocks = image.block_count();
    let constant = image
        .data
        .chunks_exact(BLOCK_BYTES)
        .filter(|b| is_void_extent(b))
        .count();
    let texels = image.dims.volume().max(1) as f64;

    println!("=== {} file: {:?} ===", kind.name(), file);
    println!();
    println!("  block          : {}", image.block);
    println!("  dimensions     : {}", image.dims);
    println!("  block grid     : {}", image.block.grid(image.dims));
    println!("  block count    : {}", blocks);
    println!("  constant blocks: {}", constant);
    println!("  payload        : {}", human_bytes(image.data.len() as u64));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  bits per texel : {:.2}", image.data.len() as f64 * 8.0 / texels);
    if let Some(srgb) = srgb {
        println!("  sRGB           : {}", srgb);
    }
    Ok(0)
}

fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Compress {
            profile,
            input,
            output,
            block,
            quality,
            run,
        } => run_pipeline(
            Operation::Compress,
            PipelineArgs {
                profile,
                input,
                compressed: output,
                decompressed: PathBuf::new(),
                block,
                quality,
            },
            &run,
        ),
        Commands::Decompress {
            profile,
            input,
            output,
            run,
        } => run_pipeline(
            Operation::Decompress,
            PipelineArgs {
                profile,
                input,
                compressed: PathBuf::new(),
                decompressed: output,
                block: String::new(),
                quality: String::new(),
            },
            &run,
        ),
        Commands::Roundtrip {
            profile,
            input,
            compressed,
            decompressed,
            block,
            quality,
            run,
        } => run_pipeline(
            Operation::RoundTrip,
            PipelineArgs {
                profile,
                input,
                compressed,
                decompressed,
                block,
                quality,
            },
            &run,
        ),
        Commands::Test {
            profile,
            input,
            decompressed,
            block,
            quality,
            run,
        } => run_pipeline(
            Operation::Test,
            PipelineArgs {
                profile,
                input,
                compressed: PathBuf::new(),
                decompressed,
                block,
                quality,
            },
            &run,
        ),
        Commands::Inspect { file } => run_inspect(file),
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    match dispatch(cli) {
        Ok(status) => ExitCode::from(status as u8),
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
