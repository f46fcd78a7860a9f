use astcrt_core::codec::{
    BlockSize, Codec, CodecConfig, CodecContext, CodecError, CodecFlags, DecodeRow, EncodeRow,
    Profile, Swizzle, BLOCK_BYTES,
};
use astcrt_core::image::{write_texel, Image, ImageLayout};
use half::f16;

/// Low 64 bits of an LDR void-extent block with no extent coordinates.
const VOID_EXTENT_LDR: u64 = 0xFFFF_FFFF_FFFF_FDFC;
/// Same, with the HDR bit (bit 9) set.
const VOID_EXTENT_HDR: u64 = 0xFFFF_FFFF_FFFF_FFFC;
/// Block mode bits that mark a void-extent block.
const VOID_EXTENT_MODE: u64 = 0x1FC;
const VOID_EXTENT_MODE_MASK: u64 = 0x1FF;
const HDR_BIT: u64 = 1 << 9;

/// Colour decoders emit for blocks they cannot decode.
pub const ERROR_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

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

/// Whether `block` is one of the footprints ASTC defines.
pub fn is_valid_footprint(block: BlockSize) -> bool {
    if block.z == 1 {
        FOOTPRINTS_2D.contains(&(block.x, block.y))
    } else {
        FOOTPRINTS_3D.contains(&(block.x, block.y, block.z))
    }
}

/// Detects builds where float arithmetic has been reassociated: with strict
/// IEEE rounding the magic constant forces 2.51 to round to 3.
fn float_rounding_is_strict() -> bool {
    let x = std::hint::black_box(2.51f32);
    let magic = std::hint::black_box(12_582_912.0f32);
    (x + magic) - magic == 3.0
}

/// Constant-colour ASTC codec.
///
/// Every block is written as a void-extent block holding the mean colour of
/// the texels it covers (UNORM16 for LDR profiles, FP16 for HDR profiles).
/// The output is valid ASTC that any conforming decoder reads back; detail
/// inside a block is lost.
pub struct VoidExtentCodec;

impl Codec for VoidExtentCodec {
    fn name(&self) -> &'static str {
        "void-extent"
    }

    fn config_init(
        &self,
        profile: Profile,
        block: BlockSize,
        quality: f32,
        flags: CodecFlags,
    ) -> Result<CodecConfig, CodecError> {
        if !float_rounding_is_strict() {
            return Err(CodecError::BadCpuFloat);
        }
        if !quality.is_finite() || !(0.0..=100.0).contains(&quality) {
            return Err(CodecError::BadQuality(quality.to_string()));
        }
        if !is_valid_footprint(block) {
            return Err(CodecError::BadBlockSize(block));
        }
        Ok(CodecConfig {
            profile,
            block,
            quality,
            flags,
        })
    }

    fn context_alloc(
        &self,
        config: &CodecConfig,
        thread_count: usize,
    ) -> Result<Box<dyn CodecContext>, CodecError> {
        if thread_count == 0 {
            return Err(CodecError::BadParam("thread count must be at least 1".into()));
        }
        Ok(Box::new(VoidExtentContext {
            config: config.clone(),
            thread_count,
        }))
    }
}

struct VoidExtentContext {
    config: CodecConfig,
    thread_count: usize,
}

impl VoidExtentContext {
    fn check_thread(&self, thread_index: usize) -> Result<(), CodecError> {
        if thread_index >= self.thread_count {
            return Err(CodecError::BadParam(format!(
                "thread index {thread_index} out of range for {} threads",
                self.thread_count
            )));
        }
        Ok(())
    }
}

/// Texel range a block covers along one axis, clipped to `extent`.
fn span(block_index: u32, block_dim: u8, extent: u32) -> std::ops::Range<u32> {
    let start = block_index * block_dim as u32;
    start..(start + block_dim as u32).min(extent)
}

impl CodecContext for VoidExtentContext {
    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn compress(
        &self,
        image: &Image,
        swizzle: &Swizzle,
        rows: &mut [EncodeRow<'_>],
        thread_index: usize,
    ) -> Result<(), CodecError> {
        self.check_thread(thread_index)?;
        if self.config.flags == CodecFlags::DecompressOnly {
            return Err(CodecError::BadContext(
                "context was allocated for decompression only".into(),
            ));
        }

        let block = self.config.block;
        let dims = image.dims();
        let hdr = self.config.profile.is_hdr();

        for row in rows.iter_mut() {
            let ys = span(row.block_y, block.y, dims.y);
            let zs = span(row.block_z, block.z, dims.z);
            for (bx, out) in row.out.chunks_exact_mut(BLOCK_BYTES).enumerate() {
                let xs = span(bx as u32, block.x, dims.x);
                let mut sum = [0f64; 4];
                let mut count = 0u32;
                for z in zs.clone() {
                    for y in ys.clone() {
                        for x in xs.clone() {
                            let texel = swizzle.apply(image.texel(x, y, z));
                            for (s, v) in sum.iter_mut().zip(texel) {
                                *s += f64::from(v);
                            }
                            count += 1;
                        }
                    }
                }
                let mean = sum.map(|s| (s / f64::from(count.max(1))) as f32);
                out.copy_from_slice(&encode_block(mean, hdr));
            }
        }
        Ok(())
    }

    fn decompress(
        &self,
        data: &[u8],
        layout: &ImageLayout,
        swizzle: &Swizzle,
        rows: &mut [DecodeRow<'_>],
        thread_index: usize,
    ) -> Result<(), CodecError> {
        self.check_thread(thread_index)?;

        let block = self.config.block;
        let grid = block.grid(layout.dims);
        let row_bytes = layout.row_bytes();
        let texel_bytes = layout.data_type.bytes_per_texel();
        let hdr = self.config.profile.is_hdr();

        for row in rows.iter_mut() {
            let first_block = (row.block_z as usize * grid.y as usize + row.block_y as usize) * grid.x as usize;
            for bx in 0..grid.x {
                let at = (first_block + bx as usize) * BLOCK_BYTES;
                let bytes = data
                    .get(at..at + BLOCK_BYTES)
                    .ok_or_else(|| CodecError::BadParam(format!("payload too short for block at byte {at}")))?;
                let color = swizzle.apply(decode_block(bytes, hdr));
                let xs = span(bx, block.x, layout.dims.x);
                for plane in row.planes.iter_mut() {
                    for line in plane.chunks_exact_mut(row_bytes) {
                        let texels = &mut line[xs.start as usize * texel_bytes..xs.end as usize * texel_bytes];
                        for out in texels.chunks_exact_mut(texel_bytes) {
                            write_texel(layout.data_type, color, out);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Pack `color` into a void-extent block.
pub fn encode_block(color: [f32; 4], hdr: bool) -> [u8; BLOCK_BYTES] {
    let mut out = [0u8; BLOCK_BYTES];
    let header = if hdr { VOID_EXTENT_HDR } else { VOID_EXTENT_LDR };
    out[..8].copy_from_slice(&header.to_le_bytes());
    for (slot, v) in out[8..].chunks_exact_mut(2).zip(color) {
        let bits = if hdr {
            let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 65504.0) };
            f16::from_f32(v).to_bits()
        } else {
            (v.clamp(0.0, 1.0) * 65535.0).round() as u16
        };
        slot.copy_from_slice(&bits.to_le_bytes());
    }
    out
}

/// Whether a 16-byte block is a void-extent (constant colour) block.
pub fn is_void_extent(bytes: &[u8]) -> bool {
    let mode = u16::from_le_bytes([bytes[0], bytes[1]]) as u64;
    mode & VOID_EXTENT_MODE_MASK == VOID_EXTENT_MODE
}

/// Unpack a block. Anything other than a void-extent block, and HDR blocks
/// under an LDR profile, decode to [`ERROR_COLOR`].
pub fn decode_block(bytes: &[u8], hdr_profile: bool) -> [f32; 4] {
    if !is_void_extent(bytes) {
        return ERROR_COLOR;
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[..8]);
    let header = u64::from_le_bytes(low);
    let hdr_block = header & HDR_BIT != 0;
    if hdr_block && !hdr_profile {
        return ERROR_COLOR;
    }

    let mut color = [0f32; 4];
    for (c, raw) in color.iter_mut().zip(bytes[8..16].chunks_exact(2)) {
        let bits = u16::from_le_bytes([raw[0], raw[1]]);
        *c = if hdr_block {
            f16::from_bits(bits).to_f32()
        } else {
            f32::from(bits) / 65535.0
        };
    }
    color
}
