use std::fs;
use std::path::Path;

use super::{check_payload, CompressedImage, ContainerError};
use crate::codec::BlockSize;
use crate::image::Dims;

/// KTX 1.1 file identifier: `«KTX 11»\r\n\x1A\n`.
pub const IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// Fixed size of the KTX header in bytes.
///   identifier[12] + 13 × u32 fields = 12 + 52 = 64
pub const HEADER_SIZE: usize = 64;

const ENDIANNESS: u32 = 0x0403_0201;
const GL_RGBA: u32 = 0x1908;

/// 2D footprints in KHR enum order; RGBA starts at `0x93B0`, sRGB at `0x93D0`.
const FOOTPRINTS_2D: [(u8, u8); 14] = [
    (4, 4),
    (5, 4),
    (5, 5),
    (6, 5),
    (6, 6),
    (8, 5),
    (8, 6),
    (8, 8),
    (10, 5),
    (10, 6),
    (10, 8),
    (10, 10),
    (12, 10),
    (12, 12),
];
const GL_RGBA_ASTC_2D: u32 = 0x93B0;
const GL_SRGB8_ALPHA8_ASTC_2D: u32 = 0x93D0;

/// 3D footprints in OES enum order; RGBA starts at `0x93C0`, sRGB at `0x93E0`.
const FOOTPRINTS_3D: [(u8, u8, u8); 10] = [
    (3, 3, 3),
    (4, 3, 3),
    (4, 4, 3),
    (4, 4, 4),
    (5, 4, 4),
    (5, 5, 4),
    (5, 5, 5),
    (6, 5, 5),
    (6, 6, 5),
    (6, 6, 6),
];
const GL_RGBA_ASTC_3D: u32 = 0x93C0;
const GL_SRGB8_ALPHA8_ASTC_3D: u32 = 0x93E0;

/// GL internal format for a footprint, or `None` if KTX has no enum for it.
pub fn internal_format(block: BlockSize, srgb: bool) -> Option<u32> {
    if block.z == 1 {
        let index = FOOTPRINTS_2D
            .iter()
            .position(|f| *f == (block.x, block.y))?;
        let base = if srgb { GL_SRGB8_ALPHA8_ASTC_2D } else { GL_RGBA_ASTC_2D };
        Some(base + index as u32)
    } else {
        let index = FOOTPRINTS_3D
            .iter()
            .position(|f| *f == (block.x, block.y, block.z))?;
        let base = if srgb { GL_SRGB8_ALPHA8_ASTC_3D } else { GL_RGBA_ASTC_3D };
        Some(base + index as u32)
    }
}

/// Inverse of [`internal_format`]: footprint and sRGB flag.
pub fn footprint_of(format: u32) -> Option<(BlockSize, bool)> {
    let lookup_2d = |base: u32| {
        let index = format.checked_sub(base)? as usize;
        FOOTPRINTS_2D.get(index).map(|(x, y)| BlockSize::new(*x, *y, 1))
    };
    let lookup_3d = |base: u32| {
        let index = format.checked_sub(base)? as usize;
        FOOTPRINTS_3D.get(index).map(|(x, y, z)| BlockSize::new(*x, *y, *z))
    };
    match format {
        0x93B0..=0x93BD => lookup_2d(GL_RGBA_ASTC_2D).map(|b| (b, false)),
        0x93D0..=0x93DD => lookup_2d(GL_SRGB8_ALPHA8_ASTC_2D).map(|b| (b, true)),
        0x93C0..=0x93C9 => lookup_3d(GL_RGBA_ASTC_3D).map(|b| (b, false)),
        0x93E0..=0x93E9 => lookup_3d(GL_SRGB8_ALPHA8_ASTC_3D).map(|b| (b, true)),
        _ => None,
    }
}

/// Decoded KTX header fields relevant to a single-level compressed texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KtxHeader {
    pub gl_internal_format: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Zero for 2D textures.
    pub pixel_depth: u32,
    pub array_elements: u32,
    pub faces: u32,
    pub mip_levels: u32,
    pub key_value_bytes: u32,
}

impl KtxHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let fields = [
            ENDIANNESS,
            0, // glType
            1, // glTypeSize
            0, // glFormat
            self.gl_internal_format,
            GL_RGBA,
            self.pixel_width,
            self.pixel_height,
            self.pixel_depth,
            self.array_elements,
            self.faces,
            self.mip_levels,
            self.key_value_bytes,
        ];
        let mut buf = [0u8; HEADER_SIZE];
        buf[..12].copy_from_slice(&IDENTIFIER);
        for (slot, field) in buf[12..].chunks_exact_mut(4).zip(fields) {
            slot.copy_from_slice(&field.to_le_bytes());
        }
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking identifier and endianness.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, ContainerError> {
        if buf[..12] != IDENTIFIER {
            return Err(ContainerError::BadMagic("KTX 1.1"));
        }
        let field = |i: usize| {
            let at = 12 + i * 4;
            u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
        };
        if field(0) != ENDIANNESS {
            return Err(ContainerError::Unsupported(
                "big-endian KTX files are not supported".into(),
            ));
        }
        Ok(Self {
            gl_internal_format: field(4),
            pixel_width: field(6),
            pixel_height: field(7),
            pixel_depth: field(8),
            array_elements: field(9),
            faces: field(10),
            mip_levels: field(11),
            key_value_bytes: field(12),
        })
    }
}

/// Serialize header, image size, and payload into one buffer.
pub fn encode(image: &CompressedImage, srgb: bool) -> Result<Vec<u8>, ContainerError> {
    check_payload(image)?;
    let gl_internal_format = internal_format(image.block, srgb).ok_or_else(|| {
        ContainerError::Unsupported(format!("KTX has no ASTC format for block {}", image.block))
    })?;
    let header = KtxHeader {
        gl_internal_format,
        pixel_width: image.dims.x,
        pixel_height: image.dims.y,
        pixel_depth: if image.dims.z == 1 { 0 } else { image.dims.z },
        array_elements: 0,
        faces: 1,
        mip_levels: 1,
        key_value_bytes: 0,
    };
    let image_size = u32::try_from(image.data.len())
        .map_err(|_| ContainerError::DimsOutOfRange(image.dims))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + 4 + image.data.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&image_size.to_le_bytes());
    out.extend_from_slice(&image.data);
    Ok(out)
}

/// Parse a single-level, single-face KTX file. Returns the image and its sRGB flag.
pub fn decode(bytes: &[u8]) -> Result<(CompressedImage, bool), ContainerError> {
    let head: &[u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(ContainerError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;
    let header = KtxHeader::from_bytes(head)?;

    let (block, srgb) = footprint_of(header.gl_internal_format).ok_or_else(|| {
        ContainerError::Unsupported(format!(
            "glInternalFormat 0x{:04x} is not an ASTC format",
            header.gl_internal_format
        ))
    })?;
    if header.faces != 1 || header.mip_levels > 1 || header.array_elements > 1 {
        return Err(ContainerError::Unsupported(
            "only single-face, single-level textures are supported".into(),
        ));
    }
    if header.pixel_width == 0 {
        return Err(ContainerError::EmptyImage(Dims::new(
            0,
            header.pixel_height,
            header.pixel_depth,
        )));
    }

    let size_at = HEADER_SIZE + header.key_value_bytes as usize;
    let data_at = size_at + 4;
    let size_bytes = bytes.get(size_at..data_at).ok_or(ContainerError::Truncated {
        expected: data_at,
        actual: bytes.len(),
    })?;
    let image_size = u32::from_le_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]) as usize;
    let data = bytes
        .get(data_at..data_at + image_size)
        .ok_or(ContainerError::Truncated {
            expected: data_at + image_size,
            actual: bytes.len(),
        })?;

    let image = CompressedImage {
        block,
        dims: Dims::new(
            header.pixel_width,
            header.pixel_height.max(1),
            header.pixel_depth.max(1),
        ),
        data: data.to_vec(),
    };
    check_payload(&image)?;
    Ok((image, srgb))
}

/// Write `image` to `path` as a KTX file.
pub fn store(image: &CompressedImage, path: &Path, srgb: bool) -> Result<(), ContainerError> {
    fs::write(path, encode(image, srgb)?)?;
    Ok(())
}

/// Read a KTX file from `path`. Returns the image and its sRGB flag.
pub fn load(path: &Path) -> Result<(CompressedImage, bool), ContainerError> {
    decode(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_format_table() {
        assert_eq!(internal_format(BlockSize::new(4, 4, 1), false), Some(0x93B0));
        assert_eq!(internal_format(BlockSize::new(6, 6, 1), false), Some(0x93B4));
        assert_eq!(internal_format(BlockSize::new(6, 6, 1), true), Some(0x93D4));
        assert_eq!(internal_format(BlockSize::new(12, 12, 1), true), Some(0x93DD));
        assert_eq!(internal_format(BlockSize::new(3, 3, 3), false), Some(0x93C0));
        assert_eq!(internal_format(BlockSize::new(6, 6, 6), true), Some(0x93E9));
        assert_eq!(internal_format(BlockSize::new(7, 7, 1), false), None);
    }

    #[test]
    fn test_footprint_of_inverts_internal_format() {
        for srgb in [false, true] {
            for (x, y) in FOOTPRINTS_2D {
                let block = BlockSize::new(x, y, 1);
                let format = internal_format(block, srgb).unwrap();
                assert_eq!(footprint_of(format), Some((block, srgb)));
            }
            for (x, y, z) in FOOTPRINTS_3D {
                let block = BlockSize::new(x, y, z);
                let format = internal_format(block, srgb).unwrap();
                assert_eq!(footprint_of(format), Some((block, srgb)));
            }
        }
        assert_eq!(footprint_of(0x93BE), None);
        assert_eq!(footprint_of(0x1908), None);
    }

    #[test]
    fn test_encode_layout() {
        let image = CompressedImage::alloc(BlockSize::new(6, 6, 1), Dims::new(12, 6, 1));
        let bytes = encode(&image, true).unwrap();
        assert_eq!(&bytes[..12], &IDENTIFIER);
        assert_eq!(&bytes[12..16], &0x0403_0201u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &0x93D4u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &GL_RGBA.to_le_bytes());
        assert_eq!(&bytes[36..40], &12u32.to_le_bytes());
        assert_eq!(&bytes[40..44], &6u32.to_le_bytes());
        assert_eq!(&bytes[44..48], &0u32.to_le_bytes(), "2D depth is written as 0");
        assert_eq!(&bytes[64..68], &32u32.to_le_bytes());
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 32);
    }

    #[test]
    fn test_decode_restores_image_and_srgb() {
        let mut image = CompressedImage::alloc(BlockSize::new(4, 4, 4), Dims::new(8, 8, 5));
        image.data.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        for srgb in [false, true] {
            let (back, back_srgb) = decode(&encode(&image, srgb).unwrap()).unwrap();
            assert_eq!(back, image);
            assert_eq!(back_srgb, srgb);
        }
    }

    #[test]
    fn test_encode_rejects_footprint_without_enum() {
        let image = CompressedImage::alloc(BlockSize::new(7, 7, 1), Dims::new(7, 7, 1));
        assert!(matches!(encode(&image, false), Err(ContainerError::Unsupported(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let image = CompressedImage::alloc(BlockSize::new(4, 4, 1), Dims::new(8, 8, 1));
        let bytes = encode(&image, false).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 5]),
            Err(ContainerError::Truncated { .. })
        ));
        assert!(matches!(decode(&bytes[..20]), Err(ContainerError::Truncated { .. })));
    }

    #[test]
    fn test_decode_rejects_zero_width() {
        let image = CompressedImage::alloc(BlockSize::new(4, 4, 1), Dims::new(8, 8, 1));
        let mut bytes = encode(&image, false).unwrap();
        bytes[36..40].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(ContainerError::EmptyImage(_))));
    }
}
