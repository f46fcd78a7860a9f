use std::fs;
use std::path::Path;

use super::{check_extent, check_payload, CompressedImage, ContainerError};
use crate::codec::BlockSize;
use crate::image::Dims;

/// Magic bytes of a `.astc` file: `0x5CA1AB13` little-endian.
pub const MAGIC: [u8; 4] = [0x13, 0xAB, 0xA1, 0x5C];

/// Fixed size of the `.astc` header in bytes.
///   magic[4] + block_x:u8 + block_y:u8 + block_z:u8
///   + dim_x:u24 + dim_y:u24 + dim_z:u24
///   = 4 + 3 + 9 = 16
pub const HEADER_SIZE: usize = 16;

const DIM_MAX: u32 = (1 << 24) - 1;

/// Decoded `.astc` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstcHeader {
    pub block: BlockSize,
    pub dims: Dims,
}

impl AstcHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE], ContainerError> {
        if [self.dims.x, self.dims.y, self.dims.z].iter().any(|d| *d > DIM_MAX) {
            return Err(ContainerError::DimsOutOfRange(self.dims));
        }
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4] = self.block.x;
        buf[5] = self.block.y;
        buf[6] = self.block.z;
        buf[7..10].copy_from_slice(&self.dims.x.to_le_bytes()[..3]);
        buf[10..13].copy_from_slice(&self.dims.y.to_le_bytes()[..3]);
        buf[13..16].copy_from_slice(&self.dims.z.to_le_bytes()[..3]);
        Ok(buf)
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, ContainerError> {
        if buf[..4] != MAGIC {
            return Err(ContainerError::BadMagic("ASTC"));
        }
        let u24 = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], 0]);
        let header = Self {
            block: BlockSize::new(buf[4], buf[5], buf[6]),
            dims: Dims::new(u24(&buf[7..10]), u24(&buf[10..13]), u24(&buf[13..16])),
        };
        if header.block.x == 0 || header.block.y == 0 || header.block.z == 0 {
            return Err(ContainerError::Unsupported(format!(
                "zero block dimension {}x{}x{}",
                header.block.x, header.block.y, header.block.z
            )));
        }
        check_extent(header.dims)?;
        Ok(header)
    }
}

/// Serialize header and payload into one buffer.
pub fn encode(image: &CompressedImage) -> Result<Vec<u8>, ContainerError> {
    check_payload(image)?;
    let header = AstcHeader {
        block: image.block,
        dims: image.dims,
    };
    let mut out = Vec::with_capacity(HEADER_SIZE + image.data.len());
    out.extend_from_slice(&header.to_bytes()?);
    out.extend_from_slice(&image.data);
    Ok(out)
}

/// Parse a complete `.astc` file image.
pub fn decode(bytes: &[u8]) -> Result<CompressedImage, ContainerError> {
    let head: &[u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(ContainerError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;
    let header = AstcHeader::from_bytes(head)?;
    let image = CompressedImage {
        block: header.block,
        dims: header.dims,
        data: bytes[HEADER_SIZE..].to_vec(),
    };
    check_payload(&image)?;
    Ok(image)
}

/// Write `image` to `path` as a `.astc` file.
pub fn store(image: &CompressedImage, path: &Path) -> Result<(), ContainerError> {
    fs::write(path, encode(image)?)?;
    Ok(())
}

/// Read a `.astc` file from `path`.
pub fn load(path: &Path) -> Result<CompressedImage, ContainerError> {
    decode(&fs::read(path)?)
}
