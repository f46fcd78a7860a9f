//! Sequences one run: load, configure, allocate, compress, decompress,
//! compare, store.
//!
//! Stages only ever move forward. Any failure ends the run; everything
//! acquired so far (images, payload, codec context, worker pool) is owned by
//! locals and is released when the run returns.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::assemble::{load_uncompressed, LoadError};
use crate::codec::{BlockSize, Codec, Profile, Swizzle};
use crate::config::{build_config, ConfigError, Operation};
use crate::container::CompressedImage;
use crate::image::{Dims, Image};
use crate::metrics::ErrorMetrics;
use crate::pixels::{ImageFileIo, LoadedImage, PixelIo};
use crate::store::{load_compressed, output_data_type, store_compressed, store_decompressed, StoreError};
use crate::workload::{ThreadCount, WorkloadDispatcher, WorkloadError};

/// The six per-run parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineArgs {
    /// Color profile token: `l`, `s`, `h` or `H`.
    pub profile: String,
    /// Source image, array pattern, or compressed container for decompression.
    pub input: PathBuf,
    pub compressed: PathBuf,
    pub decompressed: PathBuf,
    /// `WxH` or `WxHxD`.
    pub block: String,
    /// Preset name or number in 0..=100.
    pub quality: String,
}

/// Run-wide settings that are not per-file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub operation: Operation,
    pub threads: ThreadCount,
    /// Number of per-slice files to stack into one 3D image.
    pub array_size: u32,
    pub y_flip: bool,
    pub encode_swizzle: Swizzle,
    pub decode_swizzle: Swizzle,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            operation: Operation::RoundTrip,
            threads: ThreadCount::Auto,
            array_size: 1,
            y_flip: false,
            encode_swizzle: Swizzle::IDENTITY,
            decode_swizzle: Swizzle::IDENTITY,
        }
    }
}

/// Pipeline states, in the only order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    Loaded,
    Configured,
    ContextReady,
    Compressed,
    Decompressed,
    Compared,
    Stored,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0} file not specified")]
    MissingArgument(&'static str),
    #[error("failed to load input: {0}")]
    Load(#[from] LoadError),
    #[error("failed to load input: {0}")]
    LoadCompressed(#[source] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("codec context alloc failed: {0}")]
    ContextAlloc(#[source] WorkloadError),
    #[error("codec compress failed: {0}")]
    Compress(#[source] WorkloadError),
    #[error("codec decompress failed: {0}")]
    Decompress(#[source] WorkloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub operation: Operation,
    /// Every stage visited, ending in [`Stage::Done`].
    pub stages: Vec<Stage>,
    pub threads: usize,
    pub block: BlockSize,
    pub dims: Dims,
    pub compressed_bytes: usize,
    pub metrics: Option<ErrorMetrics>,
    pub compress_time: Option<Duration>,
    pub decompress_time: Option<Duration>,
}

/// What the load stage produced.
enum Input {
    Pixels(LoadedImage),
    Payload(CompressedImage),
}

/// Drives one codec through the stages an [`Operation`] selects.
pub struct Pipeline {
    codec: Arc<dyn Codec>,
    io: Arc<dyn PixelIo>,
    options: PipelineOptions,
}

impl Pipeline {
    /// A pipeline with default options reading and writing pixel files
    /// through the `image` crate.
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            io: Arc::new(ImageFileIo),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_io(mut self, io: Arc<dyn PixelIo>) -> Self {
        self.io = io;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run and map the outcome to a process status: 0 on success, 1 on
    /// failure. The failure is logged as one line.
    pub fn run_status(&self, args: &PipelineArgs) -> i32 {
        self.run_reported(args, |_| {})
    }

    /// Like [`Pipeline::run_status`], handing the summary of a successful
    /// run to `report` first.
    pub fn run_reported(&self, args: &PipelineArgs, report: impl FnOnce(&RunSummary)) -> i32 {
        match self.run(args) {
            Ok(summary) => {
                report(&summary);
                0
            }
            Err(err) => {
                error!("{err}");
                1
            }
        }
    }

    pub fn run(&self, args: &PipelineArgs) -> Result<RunSummary, PipelineError> {
        let operation = self.options.operation;
        let mut stages = vec![Stage::Start];
        let mut enter = |stage: Stage| {
            debug!(%stage, "pipeline stage");
            stages.push(stage);
        };

        let profile = Profile::from_token(&args.profile)
            .ok_or_else(|| ConfigError::InvalidProfile(args.profile.clone()))?;
        check_args(operation, args)?;

        // Load
        let input = if operation.loads_compressed() {
            let (image, srgb) = load_compressed(&args.input).map_err(PipelineError::LoadCompressed)?;
            if srgb.is_some_and(|srgb| srgb != profile.is_srgb()) {
                warn!(
                    profile = profile.token(),
                    "container sRGB flag does not match the requested profile"
                );
            }
            Input::Payload(image)
        } else {
            Input::Pixels(load_uncompressed(
                self.io.as_ref(),
                &args.input,
                self.options.array_size,
                self.options.y_flip,
            )?)
        };
        enter(Stage::Loaded);

        // Configure
        let header_block = match &input {
            Input::Payload(image) => Some(image.block),
            Input::Pixels(_) => None,
        };
        let config = build_config(
            self.codec.as_ref(),
            operation,
            profile,
            &args.block,
            &args.quality,
            header_block,
        )?;
        enter(Stage::Configured);

        // Allocate
        let threads = self.options.threads.resolve();
        let context = self
            .codec
            .context_alloc(&config, threads)
            .map_err(|err| PipelineError::ContextAlloc(err.into()))?;
        let dispatcher = WorkloadDispatcher::new(threads).map_err(PipelineError::ContextAlloc)?;
        enter(Stage::ContextReady);

        // Compress
        let mut compress_time = None;
        let (source, compressed) = match input {
            Input::Payload(image) => (None, image),
            Input::Pixels(loaded) => {
                let mut out = CompressedImage::alloc(config.block, loaded.image.dims());
                let started = Instant::now();
                dispatcher
                    .compress(
                        context.as_ref(),
                        &loaded.image,
                        &self.options.encode_swizzle,
                        &mut out.data,
                    )
                    .map_err(PipelineError::Compress)?;
                compress_time = Some(started.elapsed());
                enter(Stage::Compressed);
                (Some(loaded), out)
            }
        };

        // Decompress
        let mut decompress_time = None;
        let decoded = if operation.decompresses() {
            let data_type = output_data_type(&args.decompressed, profile);
            let mut image = Image::alloc(data_type, compressed.dims);
            let started = Instant::now();
            dispatcher
                .decompress(
                    context.as_ref(),
                    &compressed.data,
                    &self.options.decode_swizzle,
                    &mut image,
                )
                .map_err(PipelineError::Decompress)?;
            decompress_time = Some(started.elapsed());
            enter(Stage::Decompressed);
            Some(image)
        } else {
            None
        };

        // Compare
        let mut metrics = None;
        if operation.compares() {
            if let (Some(src), Some(decoded)) = (&source, &decoded) {
                metrics = ErrorMetrics::compute(&src.image, decoded, src.is_hdr, src.channel_count);
                match &metrics {
                    Some(m) => info!(psnr = m.psnr, rmse = m.rmse, "{m}"),
                    None => warn!("decoded image does not match the source extent; no metrics"),
                }
            }
            enter(Stage::Compared);
        }

        // Store. Both outputs are attempted; the first failure is returned.
        let mut failures: Vec<StoreError> = Vec::new();
        if operation.stores_compressed() {
            if let Err(err) = store_compressed(&compressed, &args.compressed, profile) {
                failures.push(err);
            }
        }
        if operation.stores_decompressed() {
            if let Some(image) = &decoded {
                if let Err(err) = store_decompressed(self.io.as_ref(), image, &args.decompressed, self.options.y_flip) {
                    failures.push(err);
                }
            }
        }
        let mut failures = failures.into_iter();
        if let Some(first) = failures.next() {
            for later in failures {
                error!("{later}");
            }
            return Err(first.into());
        }
        enter(Stage::Stored);

        drop(dispatcher);
        drop(context);
        enter(Stage::Done);

        info!(
            operation = ?operation,
            block = %config.block,
            dims = %compressed.dims,
            threads,
            compressed_bytes = compressed.data.len(),
            "pipeline complete"
        );

        Ok(RunSummary {
            operation,
            stages,
            threads,
            block: config.block,
            dims: compressed.dims,
            compressed_bytes: compressed.data.len(),
            metrics,
            compress_time,
            decompress_time,
        })
    }
}

/// Every file name the operation touches must be given.
fn check_args(operation: Operation, args: &PipelineArgs) -> Result<(), PipelineError> {
    if args.input.as_os_str().is_empty() {
        return Err(PipelineError::MissingArgument("input"));
    }
    if operation.stores_compressed() && args.compressed.as_os_str().is_empty() {
        return Err(PipelineError::MissingArgument("compressed"));
    }
    if operation.stores_decompressed() && args.decompressed.as_os_str().is_empty() {
        return Err(PipelineError::MissingArgument("decompressed"));
    }
    Ok(())
}
