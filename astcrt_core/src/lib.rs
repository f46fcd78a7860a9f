pub mod assemble;
pub mod codec;
pub mod config;
pub mod container;
pub mod image;
pub mod metrics;
pub mod pipeline;
pub mod pixels;
pub mod store;
pub mod workload;

pub use assemble::{load_uncompressed, slice_filename, LoadError};
pub use codec::{
    BlockSize, Codec, CodecConfig, CodecContext, CodecError, CodecFlags, DecodeRow, EncodeRow,
    Profile, Selector, Swizzle, BLOCK_BYTES,
};
pub use config::{build_config, parse_block_size, parse_quality, ConfigError, Operation};
pub use container::{CompressedImage, ContainerError, ContainerKind};
pub use crate::image::{DataType, Dims, Image, ImageLayout};
pub use metrics::ErrorMetrics;
pub use pipeline::{Pipeline, PipelineArgs, PipelineError, PipelineOptions, RunSummary, Stage};
pub use pixels::{ImageFileIo, LoadedImage, PixelIo, PixelIoError};
pub use store::{load_compressed, store_compressed, store_decompressed, StoreError};
pub use workload::{ThreadCount, WorkloadDispatcher, WorkloadError};
