use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::image::{Dims, Image, ImageLayout};

/// Bytes per compressed block, independent of the footprint.
pub const BLOCK_BYTES: usize = 16;

// ── Profiles ────────────────────────────────────────────────────────────────

/// Color profile the codec encodes and decodes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// LDR, linear.
    Ldr,
    /// LDR, sRGB-encoded color channels.
    LdrSrgb,
    /// HDR color channels with LDR alpha.
    HdrRgbLdrAlpha,
    /// HDR on every channel.
    Hdr,
}

const PROFILE_TOKENS: [(&str, Profile); 4] = [
    ("l", Profile::Ldr),
    ("s", Profile::LdrSrgb),
    ("h", Profile::HdrRgbLdrAlpha),
    ("H", Profile::Hdr),
];

impl Profile {
    /// Resolve a command-line token (`l`, `s`, `h`, `H`).
    pub fn from_token(token: &str) -> Option<Self> {
        PROFILE_TOKENS
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, p)| *p)
    }

    pub fn token(self) -> &'static str {
        PROFILE_TOKENS
            .iter()
            .find(|(_, p)| *p == self)
            .map(|(t, _)| *t)
            .unwrap_or("l")
    }

    pub fn is_hdr(self) -> bool {
        matches!(self, Profile::HdrRgbLdrAlpha | Profile::Hdr)
    }

    pub fn is_srgb(self) -> bool {
        self == Profile::LdrSrgb
    }
}

// ── Footprint ───────────────────────────────────────────────────────────────

/// Block footprint in texels. `z == 1` for 2D footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSize {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl BlockSize {
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn is_3d(&self) -> bool {
        self.z > 1
    }

    /// Number of blocks along each axis needed to cover `dims`.
    pub fn grid(&self, dims: Dims) -> Dims {
        Dims::new(
            dims.x.div_ceil(self.x as u32),
            dims.y.div_ceil(self.y as u32),
            dims.z.div_ceil(self.z as u32),
        )
    }

    /// Compressed payload size for an image of `dims`.
    pub fn payload_len(&self, dims: Dims) -> usize {
        self.grid(dims).volume() * BLOCK_BYTES
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_3d() {
            write!(f, "{}x{}x{}", self.x, self.y, self.z)
        } else {
            write!(f, "{}x{}", self.x, self.y)
        }
    }
}

// ── Swizzle ─────────────────────────────────────────────────────────────────

/// Source of one output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    R,
    G,
    B,
    A,
    Zero,
    One,
}

/// Per-channel remap applied when feeding texels to, or reading them from, a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swizzle(pub [Selector; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([Selector::R, Selector::G, Selector::B, Selector::A]);

    pub fn apply(&self, texel: [f32; 4]) -> [f32; 4] {
        self.0.map(|sel| match sel {
            Selector::R => texel[0],
            Selector::G => texel[1],
            Selector::B => texel[2],
            Selector::A => texel[3],
            Selector::Zero => 0.0,
            Selector::One => 1.0,
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FromStr for Swizzle {
    type Err = ConfigError;

    /// Parse four selectors from `rgba01`, e.g. `"bgra"` or `"rrr1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 4 {
            return Err(ConfigError::InvalidSwizzle(s.to_string()));
        }
        let mut selectors = [Selector::Zero; 4];
        for (slot, c) in selectors.iter_mut().zip(chars) {
            *slot = match c {
                'r' => Selector::R,
                'g' => Selector::G,
                'b' => Selector::B,
                'a' => Selector::A,
                '0' => Selector::Zero,
                '1' => Selector::One,
                _ => return Err(ConfigError::InvalidSwizzle(s.to_string())),
            };
        }
        Ok(Swizzle(selectors))
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sel in self.0 {
            let c = match sel {
                Selector::R => 'r',
                Selector::G => 'g',
                Selector::B => 'b',
                Selector::A => 'a',
                Selector::Zero => '0',
                Selector::One => '1',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Which decode tables a context must build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFlags {
    /// Decode only; encode-side tables are skipped.
    DecompressOnly,
    /// Full encoder, plus decode tables limited to what this encoder emits.
    SelfDecompressOnly,
}

/// Validated codec configuration. One per pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    pub profile: Profile,
    pub block: BlockSize,
    pub quality: f32,
    pub flags: CodecFlags,
}

/// Status codes a codec may report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("block size {0} is not supported by the codec")]
    BadBlockSize(BlockSize),
    #[error("quality {0} is out of range")]
    BadQuality(String),
    #[error("required SIMD instruction set is missing on this CPU")]
    BadCpuIsa,
    #[error("codec was built with unsafe floating-point optimizations")]
    BadCpuFloat,
    #[error("invalid parameter: {0}")]
    BadParam(String),
    #[error("context cannot run this operation: {0}")]
    BadContext(String),
    #[error("out of memory")]
    OutOfMemory,
    #[error("{0}")]
    Failed(String),
}

// ── Work units ──────────────────────────────────────────────────────────────

/// One row of blocks along x at grid position (`block_y`, `block_z`).
///
/// `out` holds exactly `grid.x * BLOCK_BYTES` bytes.
#[derive(Debug)]
pub struct EncodeRow<'a> {
    pub block_y: u32,
    pub block_z: u32,
    pub out: &'a mut [u8],
}

/// Destination texels covered by one row of blocks.
///
/// `planes[i]` is the band of texel rows `block_y * block.y ..` of depth slice
/// `block_z * block.z + i`; bands at the image edge are shorter.
#[derive(Debug)]
pub struct DecodeRow<'a> {
    pub block_y: u32,
    pub block_z: u32,
    pub planes: Vec<&'a mut [u8]>,
}

// ── Traits ──────────────────────────────────────────────────────────────────

/// A block-compression codec.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Validate settings and build a configuration.
    fn config_init(
        &self,
        profile: Profile,
        block: BlockSize,
        quality: f32,
        flags: CodecFlags,
    ) -> Result<CodecConfig, CodecError>;

    /// Allocate a context able to serve `thread_count` concurrent workers.
    ///
    /// Dropping the context releases it.
    fn context_alloc(
        &self,
        config: &CodecConfig,
        thread_count: usize,
    ) -> Result<Box<dyn CodecContext>, CodecError>;
}

/// A codec context shared by the workers of one workload.
///
/// Each worker receives a disjoint set of rows; `thread_index` is unique per
/// worker within a workload.
pub trait CodecContext: Send + Sync {
    fn config(&self) -> &CodecConfig;

    /// Encode `image` into the given rows of blocks.
    fn compress(
        &self,
        image: &Image,
        swizzle: &Swizzle,
        rows: &mut [EncodeRow<'_>],
        thread_index: usize,
    ) -> Result<(), CodecError>;

    /// Decode the whole payload `data` into the given destination rows.
    fn decompress(
        &self,
        data: &[u8],
        layout: &ImageLayout,
        swizzle: &Swizzle,
        rows: &mut [DecodeRow<'_>],
        thread_index: usize,
    ) -> Result<(), CodecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_tokens() {
        assert_eq!(Profile::from_token("l"), Some(Profile::Ldr));
        assert_eq!(Profile::from_token("s"), Some(Profile::LdrSrgb));
        assert_eq!(Profile::from_token("h"), Some(Profile::HdrRgbLdrAlpha));
        assert_eq!(Profile::from_token("H"), Some(Profile::Hdr));
        assert_eq!(Profile::from_token("x"), None);
        assert_eq!(Profile::Hdr.token(), "H");
        assert!(Profile::HdrRgbLdrAlpha.is_hdr());
        assert!(!Profile::LdrSrgb.is_hdr());
    }

    #[test]
    fn test_grid_rounds_up() {
        let block = BlockSize::new(6, 6, 1);
        let grid = block.grid(Dims::new(100, 37, 1));
        assert_eq!(grid, Dims::new(17, 7, 1));
        assert_eq!(block.payload_len(Dims::new(100, 37, 1)), 17 * 7 * 16);
    }

    #[test]
    fn test_block_size_display() {
        assert_eq!(BlockSize::new(6, 6, 1).to_string(), "6x6");
        assert_eq!(BlockSize::new(4, 4, 4).to_string(), "4x4x4");
    }

    #[test]
    fn test_swizzle_parse_and_apply() {
        let swz: Swizzle = "bgr1".parse().unwrap();
        assert_eq!(swz.apply([0.1, 0.2, 0.3, 0.4]), [0.3, 0.2, 0.1, 1.0]);
        assert_eq!(swz.to_string(), "bgr1");
        assert!("rgba".parse::<Swizzle>().unwrap().is_identity());
    }

    #[test]
    fn test_swizzle_rejects_bad_input() {
        assert!(matches!(
            "rgb".parse::<Swizzle>(),
            Err(ConfigError::InvalidSwizzle(_))
        ));
        assert!(matches!(
            "rgbx".parse::<Swizzle>(),
            Err(ConfigError::InvalidSwizzle(_))
        ));
    }
}
