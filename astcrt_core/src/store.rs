//! Picks the output container from the file name and writes the result.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::Profile;
use crate::container::{astc, ktx, CompressedImage, ContainerError, ContainerKind};
use crate::image::{DataType, Image};
use crate::pixels::{forced_bitness, PixelIo};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown compressed container for '{}' (expected .astc or .ktx)", .0.display())]
    UnknownCompressedContainer(PathBuf),
    #[error("{} file '{}': {source}", kind.name(), path.display())]
    Container {
        kind: ContainerKind,
        path: PathBuf,
        #[source]
        source: ContainerError,
    },
    #[error("failed to write '{}': {detail}", path.display())]
    WriteFailure { path: PathBuf, detail: String },
}

fn container_kind(path: &Path) -> Result<ContainerKind, StoreError> {
    ContainerKind::from_path(path).ok_or_else(|| StoreError::UnknownCompressedContainer(path.to_path_buf()))
}

/// Write `image` to `path` as `.astc` or `.ktx`.
///
/// KTX output is tagged sRGB exactly when `profile` is the sRGB LDR profile.
pub fn store_compressed(
    image: &CompressedImage,
    path: &Path,
    profile: Profile,
) -> Result<ContainerKind, StoreError> {
    let kind = container_kind(path)?;
    let result = match kind {
        ContainerKind::Astc => astc::store(image, path),
        ContainerKind::Ktx => ktx::store(image, path, profile.is_srgb()),
    };
    result.map_err(|source| StoreError::Container {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), container = kind.name(), bytes = image.data.len(), "stored compressed image");
    Ok(kind)
}

/// Read a compressed image from `.astc` or `.ktx`.
///
/// The sRGB flag is `Some` only for KTX files, which record it.
pub fn load_compressed(path: &Path) -> Result<(CompressedImage, Option<bool>), StoreError> {
    let kind = container_kind(path)?;
    let result = match kind {
        ContainerKind::Astc => astc::load(path).map(|image| (image, None)),
        ContainerKind::Ktx => ktx::load(path).map(|(image, srgb)| (image, Some(srgb))),
    };
    result.map_err(|source| StoreError::Container {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

/// Write a decompressed image through the pixel writer.
pub fn store_decompressed(
    io: &dyn PixelIo,
    image: &Image,
    path: &Path,
    y_flip: bool,
) -> Result<(), StoreError> {
    io.store(image, path, y_flip).map_err(|err| StoreError::WriteFailure {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    debug!(path = %path.display(), "stored decompressed image");
    Ok(())
}

/// Sample type for the decompression destination.
///
/// A depth forced by the output suffix wins; otherwise HDR profiles decode to
/// 16-bit float and LDR profiles to 8-bit.
pub fn output_data_type(path: &Path, profile: Profile) -> DataType {
    forced_bitness(path).unwrap_or(if profile.is_hdr() {
        DataType::F16
    } else {
        DataType::U8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BlockSize;
    use crate::image::Dims;

    fn sample() -> CompressedImage {
        let mut image = CompressedImage::alloc(BlockSize::new(6, 6, 1), Dims::new(20, 9, 1));
        image.data.iter_mut().enumerate().for_each(|(i, b)| *b = (i % 97) as u8);
        image
    }

    #[test]
    fn test_astc_suffix_uses_native_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.astc");
        let kind = store_compressed(&sample(), &path, Profile::LdrSrgb).unwrap();
        assert_eq!(kind, ContainerKind::Astc);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], &astc::MAGIC);

        let (back, srgb) = load_compressed(&path).unwrap();
        assert_eq!(back, sample());
        assert_eq!(srgb, None);
    }

    #[test]
    fn test_ktx_srgb_only_for_srgb_profile() {
        let dir = tempfile::tempdir().unwrap();
        for (profile, expect_srgb) in [
            (Profile::Ldr, false),
            (Profile::LdrSrgb, true),
            (Profile::HdrRgbLdrAlpha, false),
            (Profile::Hdr, false),
        ] {
            let path = dir.path().join(format!("out_{}.ktx", profile.token()));
            let kind = store_compressed(&sample(), &path, profile).unwrap();
            assert_eq!(kind, ContainerKind::Ktx);
            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(&bytes[..12], &ktx::IDENTIFIER);
            let (back, srgb) = load_compressed(&path).unwrap();
            assert_eq!(back, sample());
            assert_eq!(srgb, Some(expect_srgb), "profile {}", profile.token());
        }
    }

    #[test]
    fn test_unknown_suffix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        assert!(matches!(
            store_compressed(&sample(), &path, Profile::Ldr),
            Err(StoreError::UnknownCompressedContainer(_))
        ));
        assert!(!path.exists());
        assert!(matches!(
            load_compressed(&path),
            Err(StoreError::UnknownCompressedContainer(_))
        ));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.astc");
        assert!(matches!(
            store_compressed(&sample(), &path, Profile::Ldr),
            Err(StoreError::Container { kind: ContainerKind::Astc, .. })
        ));
    }

    #[test]
    fn test_output_data_type() {
        assert_eq!(output_data_type(Path::new("a.png"), Profile::Hdr), DataType::U8);
        assert_eq!(output_data_type(Path::new("a.exr"), Profile::Ldr), DataType::F16);
        assert_eq!(output_data_type(Path::new("a.hdr"), Profile::Ldr), DataType::F32);
        assert_eq!(output_data_type(Path::new("a.ktx"), Profile::HdrRgbLdrAlpha), DataType::F16);
        assert_eq!(output_data_type(Path::new("a.ktx"), Profile::LdrSrgb), DataType::U8);
    }
}
