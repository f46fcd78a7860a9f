//! Uncompressed pixel files, read and written through the `image` crate.

use std::path::{Path, PathBuf};

use half::f16;
use image::{DynamicImage, ImageBuffer, Rgba};
use tracing::debug;

use crate::assemble::slice_filename;
use crate::image::{DataType, Dims, Image};

/// A single-file load result.
#[derive(Debug)]
pub struct LoadedImage {
    pub image: Image,
    /// True when the source held more than 8 bits per channel.
    pub is_hdr: bool,
    /// Channels present in the source file (1 to 4).
    pub channel_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PixelIoError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("pixel buffer does not match image dimensions {0}")]
    Layout(Dims),
    #[error("image dimensions {0} have a zero extent, nothing to write")]
    Empty(Dims),
    #[error("'{}' has no file extension", .0.display())]
    NoExtension(PathBuf),
}

/// Reads and writes uncompressed images. The file suffix picks the format.
pub trait PixelIo: Send + Sync {
    fn load(&self, path: &Path, y_flip: bool) -> Result<LoadedImage, PixelIoError>;

    fn store(&self, image: &Image, path: &Path, y_flip: bool) -> Result<(), PixelIoError>;
}

/// Output bit depth a file suffix demands, if any.
///
/// `png`, `tga`, `bmp` → 8 bit; `exr` → 16 bit; `hdr` → 32 bit.
pub fn forced_bitness(path: &Path) -> Option<DataType> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" | "tga" | "bmp" => Some(DataType::U8),
        "exr" => Some(DataType::F16),
        "hdr" => Some(DataType::F32),
        _ => None,
    }
}

/// [`PixelIo`] backed by the `image` crate's codecs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileIo;

impl PixelIo for ImageFileIo {
    fn load(&self, path: &Path, y_flip: bool) -> Result<LoadedImage, PixelIoError> {
        let mut source = image::open(path)?;
        if y_flip {
            source = source.flipv();
        }
        let channel_count = u32::from(source.color().channel_count());
        let dims = Dims::new(source.width(), source.height(), 1);

        let is_hdr = !matches!(
            source,
            DynamicImage::ImageLuma8(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageRgb8(_)
                | DynamicImage::ImageRgba8(_)
        );

        let image = if is_hdr {
            let texels = source.to_rgba32f().into_raw();
            let mut image = Image::alloc(DataType::F16, dims);
            for (out, v) in image.slice_mut(0).chunks_exact_mut(2).zip(texels) {
                out.copy_from_slice(&f16::from_f32(v).to_ne_bytes());
            }
            image
        } else {
            let texels = source.to_rgba8().into_raw();
            let mut image = Image::alloc(DataType::U8, dims);
            image.slice_mut(0).copy_from_slice(&texels);
            image
        };

        debug!(path = %path.display(), %dims, is_hdr, channel_count, "loaded image");
        Ok(LoadedImage {
            image,
            is_hdr,
            channel_count,
        })
    }

    fn store(&self, image: &Image, path: &Path, y_flip: bool) -> Result<(), PixelIoError> {
        let dims = image.dims();
        if dims.x == 0 || dims.y == 0 || dims.z == 0 {
            return Err(PixelIoError::Empty(dims));
        }
        let depth = dims.z;
        if depth == 1 {
            return store_slice(image, 0, path, y_flip);
        }
        for z in 0..depth {
            let slice_path =
                slice_filename(path, z).ok_or_else(|| PixelIoError::NoExtension(path.to_path_buf()))?;
            store_slice(image, z, &slice_path, y_flip)?;
        }
        Ok(())
    }
}

fn store_slice(image: &Image, z: u32, path: &Path, y_flip: bool) -> Result<(), PixelIoError> {
    let mut frame = slice_to_dynamic(image, z)?;
    if y_flip {
        frame = frame.flipv();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| PixelIoError::NoExtension(path.to_path_buf()))?;

    let encoded = match ext.as_str() {
        "hdr" => DynamicImage::ImageRgb32F(frame.to_rgb32f()),
        "exr" => DynamicImage::ImageRgba32F(frame.to_rgba32f()),
        "jpg" | "jpeg" => DynamicImage::ImageRgb8(frame.to_rgb8()),
        _ => DynamicImage::ImageRgba8(frame.to_rgba8()),
    };
    encoded.save(path)?;
    debug!(path = %path.display(), "stored image slice");
    Ok(())
}

/// Copy one depth slice into an `image` crate buffer.
fn slice_to_dynamic(image: &Image, z: u32) -> Result<DynamicImage, PixelIoError> {
    let dims = image.dims();
    let bytes = image.slice(z);
    match image.data_type() {
        DataType::U8 => ImageBuffer::<Rgba<u8>, _>::from_raw(dims.x, dims.y, bytes.to_vec())
            .map(DynamicImage::ImageRgba8),
        DataType::F16 => {
            let texels: Vec<f32> = bytes
                .chunks_exact(2)
                .map(|c| f16::from_ne_bytes([c[0], c[1]]).to_f32())
                .collect();
            ImageBuffer::<Rgba<f32>, _>::from_raw(dims.x, dims.y, texels).map(DynamicImage::ImageRgba32F)
        }
        DataType::F32 => {
            let texels: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            ImageBuffer::<Rgba<f32>, _>::from_raw(dims.x, dims.y, texels).map(DynamicImage::ImageRgba32F)
        }
    }
    .ok_or(PixelIoError::Layout(dims))
}
