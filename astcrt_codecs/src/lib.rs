mod void_extent;

pub use void_extent::{
    decode_block, encode_block, is_valid_footprint, is_void_extent, VoidExtentCodec, ERROR_COLOR,
};

use astcrt_core::Codec;
use std::sync::Arc;

/// Names accepted by [`codec_by_name`].
pub const CODEC_NAMES: [&str; 1] = ["void-extent"];

/// Resolve a bundled codec from its CLI name.
pub fn codec_by_name(name: &str) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "void-extent" => Ok(Arc::new(VoidExtentCodec)),
        _ => anyhow::bail!("unknown codec '{}'; available: {}", name, CODEC_NAMES.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_by_name() {
        assert_eq!(codec_by_name("void-extent").unwrap().name(), "void-extent");
        assert!(codec_by_name("bc7").is_err());
    }
}
