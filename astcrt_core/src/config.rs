//! Translates human-readable block-size and quality strings into a validated
//! [`CodecConfig`].

use tracing::debug;

use crate::codec::{BlockSize, Codec, CodecConfig, CodecError, CodecFlags, Profile};

// ── Quality presets ─────────────────────────────────────────────────────────

pub const PRESET_FASTEST: f32 = 0.0;
pub const PRESET_FAST: f32 = 10.0;
pub const PRESET_MEDIUM: f32 = 60.0;
pub const PRESET_THOROUGH: f32 = 98.0;
pub const PRESET_EXHAUSTIVE: f32 = 100.0;

const PRESETS: [(&str, f32); 5] = [
    ("fastest", PRESET_FASTEST),
    ("fast", PRESET_FAST),
    ("medium", PRESET_MEDIUM),
    ("thorough", PRESET_THOROUGH),
    ("exhaustive", PRESET_EXHAUSTIVE),
];

// ── Operation ───────────────────────────────────────────────────────────────

/// What a pipeline run does. Each mode is a fixed set of stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// Load an image, compress it, store the compressed container.
    Compress,
    /// Load a compressed container, decompress it, store the image.
    Decompress,
    /// Compress, decompress, and store both results.
    #[default]
    RoundTrip,
    /// Compress, decompress, compare against the source, store the image.
    Test,
}

impl Operation {
    pub fn loads_compressed(self) -> bool {
        self == Operation::Decompress
    }

    pub fn compresses(self) -> bool {
        self != Operation::Decompress
    }

    pub fn decompresses(self) -> bool {
        self != Operation::Compress
    }

    pub fn compares(self) -> bool {
        self == Operation::Test
    }

    pub fn stores_compressed(self) -> bool {
        matches!(self, Operation::Compress | Operation::RoundTrip)
    }

    pub fn stores_decompressed(self) -> bool {
        self != Operation::Compress
    }

    /// Decode tables the context must build for this mode.
    ///
    /// Anything that compresses only ever decodes its own output.
    pub fn codec_flags(self) -> CodecFlags {
        if self == Operation::Decompress {
            CodecFlags::DecompressOnly
        } else {
            CodecFlags::SelfDecompressOnly
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("color profile '{0}' is invalid (expected one of l, s, h, H)")]
    InvalidProfile(String),
    #[error("block size '{spec}' is invalid: {detail}")]
    InvalidBlockSize { spec: String, detail: String },
    #[error("search quality/preset '{0}' is invalid")]
    InvalidQuality(String),
    #[error("swizzle '{0}' is invalid (expected four of r, g, b, a, 0, 1)")]
    InvalidSwizzle(String),
    #[error("required SIMD ISA support missing on this CPU: {0}")]
    UnsupportedCpuInstructionSet(String),
    #[error("codec must not be built with fast-math floating point: {0}")]
    UnsafeFloatingPointBuild(String),
    #[error("codec configuration failed: {0}")]
    ConfigInitFailure(String),
}

// ── Parsers ─────────────────────────────────────────────────────────────────

/// Parse `WxH` or `WxHxD` into a footprint. Depth defaults to 1.
///
/// Every component must be a non-empty run of ASCII digits and nothing may
/// follow the last component.
pub fn parse_block_size(spec: &str) -> Result<BlockSize, ConfigError> {
    let invalid = |detail: &str| ConfigError::InvalidBlockSize {
        spec: spec.to_string(),
        detail: detail.to_string(),
    };

    let parts: Vec<&str> = spec.split('x').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid("expected WxH or WxHxD"));
    }

    let mut dims = [1u8; 3];
    for (dim, part) in dims.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected WxH or WxHxD"));
        }
        *dim = part
            .parse::<u8>()
            .map_err(|_| invalid("dimension out of range"))?;
    }

    Ok(BlockSize::new(dims[0], dims[1], dims[2]))
}

/// Resolve a preset name or a decimal number into a quality level.
pub fn parse_quality(token: &str) -> Result<f32, ConfigError> {
    if let Some((_, level)) = PRESETS.iter().find(|(name, _)| *name == token) {
        return Ok(*level);
    }
    match token.parse::<f32>() {
        Ok(q) if q.is_finite() => Ok(q),
        _ => Err(ConfigError::InvalidQuality(token.to_string())),
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Build the codec configuration for one run.
///
/// For [`Operation::Decompress`] the footprint comes from `header_block` (the
/// loaded container) and neither string is consulted. Every other mode parses
/// `dimensions` and `quality`.
pub fn build_config(
    codec: &dyn Codec,
    operation: Operation,
    profile: Profile,
    dimensions: &str,
    quality: &str,
    header_block: Option<BlockSize>,
) -> Result<CodecConfig, ConfigError> {
    let (block, quality_level) = if operation.compresses() {
        (parse_block_size(dimensions)?, parse_quality(quality)?)
    } else {
        let block = header_block.ok_or_else(|| {
            ConfigError::ConfigInitFailure("no compressed header to take the block size from".into())
        })?;
        (block, 0.0)
    };

    let flags = operation.codec_flags();
    debug!(
        codec = codec.name(),
        block = %block,
        quality = quality_level,
        ?flags,
        "initializing codec config"
    );

    codec
        .config_init(profile, block, quality_level, flags)
        .map_err(|err| match err {
            CodecError::BadBlockSize(_) => ConfigError::InvalidBlockSize {
                spec: block.to_string(),
                detail: err.to_string(),
            },
            CodecError::BadCpuIsa => ConfigError::UnsupportedCpuInstructionSet(err.to_string()),
            CodecError::BadCpuFloat => ConfigError::UnsafeFloatingPointBuild(err.to_string()),
            other => ConfigError::ConfigInitFailure(other.to_string()),
        })
}
