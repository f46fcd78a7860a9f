//! Compressed-image containers: the native `.astc` file and KTX 1.1.

pub mod astc;
pub mod ktx;

use std::path::Path;

use crate::codec::BlockSize;
use crate::image::Dims;

/// Block-compressed payload plus the footprint and extent it decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub block: BlockSize,
    pub dims: Dims,
    pub data: Vec<u8>,
}

impl CompressedImage {
    /// Allocate a zeroed payload sized for `dims` at `block`.
    pub fn alloc(block: BlockSize, dims: Dims) -> Self {
        Self {
            block,
            dims,
            data: vec![0u8; block.payload_len(dims)],
        }
    }

    /// Number of blocks in the payload.
    pub fn block_count(&self) -> usize {
        self.block.grid(self.dims).volume()
    }
}

/// Container formats a compressed image can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Astc,
    Ktx,
}

impl ContainerKind {
    /// Pick a container from the file name suffix (`.astc` or `.ktx`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.to_str()?;
        if name.ends_with(".astc") {
            Some(ContainerKind::Astc)
        } else if name.ends_with(".ktx") {
            Some(ContainerKind::Ktx)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::Astc => "ASTC",
            ContainerKind::Ktx => "KTX 1.1",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a {0} file (bad magic)")]
    BadMagic(&'static str),
    #[error("file is truncated: need {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("payload is {actual} bytes but the header implies {expected}")]
    PayloadLength { expected: usize, actual: usize },
    #[error("unsupported format: {0}")]
    Unsupported(String),
    #[error("image dimensions {0} do not fit the container")]
    DimsOutOfRange(Dims),
    #[error("image dimensions {0} have a zero extent")]
    EmptyImage(Dims),
}

/// Reject images with no texels along any axis.
pub(crate) fn check_extent(dims: Dims) -> Result<(), ContainerError> {
    if dims.x == 0 || dims.y == 0 || dims.z == 0 {
        return Err(ContainerError::EmptyImage(dims));
    }
    Ok(())
}

/// Check that a decoded header's payload length matches its footprint.
pub(crate) fn check_payload(image: &CompressedImage) -> Result<(), ContainerError> {
    check_extent(image.dims)?;
    let expected = image.block.payload_len(image.dims);
    if image.data.len() != expected {
        return Err(ContainerError::PayloadLength {
            expected,
            actual: image.data.len(),
        });
    }
    Ok(())
}
