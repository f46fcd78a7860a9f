//! Runs compression and decompression passes across a fixed-size worker pool.
//!
//! Work is split into rows of blocks (one row = every block along x at a given
//! block y and z). Rows map to disjoint byte ranges of the compressed payload
//! and to disjoint texel bands of the decoded image, so each worker owns its
//! output outright. Worker `i` of `T` receives the `i`-th contiguous run of
//! rows and is called with thread index `i`.
//!
//! Every worker reports into its own result slot; after the pool joins, the
//! first failing slot becomes the dispatch result. Which failure wins when
//! several workers fail is not meaningful, only that one is reported.

use std::num::NonZeroUsize;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

use crate::codec::{
    BlockSize, CodecContext, CodecError, DecodeRow, EncodeRow, Swizzle, BLOCK_BYTES,
};
use crate::image::{Dims, Image};

/// Worker count for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadCount {
    /// One worker per logical CPU.
    #[default]
    Auto,
    /// Exactly this many workers (0 is treated as 1).
    Fixed(usize),
}

impl ThreadCount {
    pub fn resolve(self) -> usize {
        match self {
            ThreadCount::Auto => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            ThreadCount::Fixed(n) => n.max(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("worker pool could not be started: {0}")]
    Pool(#[from] ThreadPoolBuildError),
    #[error("buffer holds {actual} bytes but {expected} are required")]
    BufferSize { expected: usize, actual: usize },
    #[error("image dimensions {0} have a zero extent")]
    EmptyImage(Dims),
}

fn check_extent(dims: Dims) -> Result<(), WorkloadError> {
    if dims.x == 0 || dims.y == 0 || dims.z == 0 {
        return Err(WorkloadError::EmptyImage(dims));
    }
    Ok(())
}

/// Runs workloads on `threads` workers. Built once per pipeline run.
///
/// A single-thread dispatcher runs everything on the calling thread and never
/// starts a pool.
pub struct WorkloadDispatcher {
    threads: usize,
    pool: Option<ThreadPool>,
}

impl WorkloadDispatcher {
    pub fn new(threads: usize) -> Result<Self, WorkloadError> {
        let threads = threads.max(1);
        let pool = if threads > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("astcrt-worker-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self { threads, pool })
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Compress `image` into `out`, which must be exactly the payload size of
    /// the context's footprint.
    pub fn compress(
        &self,
        context: &dyn CodecContext,
        image: &Image,
        swizzle: &Swizzle,
        out: &mut [u8],
    ) -> Result<(), WorkloadError> {
        let block = context.config().block;
        check_extent(image.dims())?;
        let expected = block.payload_len(image.dims());
        if out.len() != expected {
            return Err(WorkloadError::BufferSize {
                expected,
                actual: out.len(),
            });
        }

        let rows = encode_rows(out, block, image);
        debug!(rows = rows.len(), threads = self.threads, "dispatching compression");
        self.run(rows, |index, mut part| {
            context.compress(image, swizzle, &mut part, index)
        })
    }

    /// Decompress payload `data` into `image_out`, whose dimensions select the
    /// decoded extent.
    pub fn decompress(
        &self,
        context: &dyn CodecContext,
        data: &[u8],
        swizzle: &Swizzle,
        image_out: &mut Image,
    ) -> Result<(), WorkloadError> {
        let block = context.config().block;
        let layout = image_out.layout();
        check_extent(layout.dims)?;
        let expected = block.payload_len(layout.dims);
        if data.len() != expected {
            return Err(WorkloadError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let rows = decode_rows(image_out, block);
        debug!(rows = rows.len(), threads = self.threads, "dispatching decompression");
        self.run(rows, |index, mut part| {
            context.decompress(data, &layout, swizzle, &mut part, index)
        })
    }

    /// Hand `rows` to exactly `threads` workers and reduce their results.
    fn run<R, F>(&self, rows: Vec<R>, work: F) -> Result<(), WorkloadError>
    where
        R: Send,
        F: Fn(usize, Vec<R>) -> Result<(), CodecError> + Sync,
    {
        let pool = match &self.pool {
            Some(pool) => pool,
            None => return work(0, rows).map_err(WorkloadError::from),
        };

        let parts = partition(rows, self.threads);
        let mut slots: Vec<Result<(), CodecError>> = (0..self.threads).map(|_| Ok(())).collect();
        let work = &work;

        pool.scope(|scope| {
            for ((index, part), slot) in parts.into_iter().enumerate().zip(slots.iter_mut()) {
                scope.spawn(move |_| {
                    *slot = work(index, part);
                });
            }
        });

        slots
            .into_iter()
            .find(Result::is_err)
            .unwrap_or(Ok(()))
            .map_err(WorkloadError::from)
    }
}

/// Split `items` into `parts` contiguous runs of near-equal length.
///
/// Always returns exactly `parts` runs; some may be empty.
fn partition<T>(mut items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let total = items.len();
    let mut runs: Vec<Vec<T>> = (0..parts)
        .rev()
        .map(|i| items.split_off(total * i / parts))
        .collect();
    runs.reverse();
    runs
}

fn encode_rows<'a>(out: &'a mut [u8], block: BlockSize, image: &Image) -> Vec<EncodeRow<'a>> {
    let grid = block.grid(image.dims());
    let row_len = grid.x as usize * BLOCK_BYTES;
    out.chunks_mut(row_len)
        .enumerate()
        .map(|(i, out)| EncodeRow {
            block_y: i as u32 % grid.y,
            block_z: i as u32 / grid.y,
            out,
        })
        .collect()
}

fn decode_rows(image: &mut Image, block: BlockSize) -> Vec<DecodeRow<'_>> {
    let layout = image.layout();
    let grid = block.grid(layout.dims);
    let band_len = layout.row_bytes() * block.y as usize;

    let mut rows = Vec::with_capacity(grid.y as usize * grid.z as usize);
    let mut planes = image.planes_mut();
    for block_z in 0..grid.z {
        let mut bands: Vec<_> = planes
            .by_ref()
            .take(block.z as usize)
            .map(|plane| plane.chunks_mut(band_len))
            .collect();
        for block_y in 0..grid.y {
            rows.push(DecodeRow {
                block_y,
                block_z,
                planes: bands.iter_mut().filter_map(Iterator::next).collect(),
            });
        }
    }
    rows
}
