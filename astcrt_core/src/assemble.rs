//! Builds one uniform 3D image from a single file or from a numbered run of
//! per-slice files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::image::{read_texel, write_texel, DataType, Image};
use crate::pixels::{LoadedImage, PixelIo, PixelIoError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("array size must be at least 1")]
    InvalidArraySize,
    #[error("'{}' has no file extension to insert a slice index before", .0.display())]
    MalformedFilePattern(PathBuf),
    #[error("failed to load '{}': {source}", path.display())]
    SliceLoadFailure {
        path: PathBuf,
        #[source]
        source: PixelIoError,
    },
    #[error("'{}' is already a 3D image; arrays of arrays are not supported", .0.display())]
    NestedArrayNotSupported(PathBuf),
    #[error("slice {index} differs in dynamic range or channel count from slice 0")]
    InconsistentArrayFormat { index: u32 },
    #[error("slice {index} differs in dimensions from slice 0")]
    InconsistentArrayDimensions { index: u32 },
}

/// File name of slice `index` in an array named by `pattern`.
///
/// `tex.png` with index 2 gives `tex_2.png`. Returns `None` if `pattern` has
/// no extension.
pub fn slice_filename(pattern: &Path, index: u32) -> Option<PathBuf> {
    let stem = pattern.file_stem()?.to_str()?;
    let ext = pattern.extension()?.to_str()?;
    Some(pattern.with_file_name(format!("{stem}_{index}.{ext}")))
}

/// Load `path` as one image, or as `slices` per-slice files stacked along z.
///
/// Every slice must match slice 0 in dynamic range, channel count, width and
/// height. HDR arrays are packed as 16-bit float, LDR arrays as 8-bit.
pub fn load_uncompressed(
    io: &dyn PixelIo,
    path: &Path,
    slices: u32,
    y_flip: bool,
) -> Result<LoadedImage, LoadError> {
    if slices == 0 {
        return Err(LoadError::InvalidArraySize);
    }
    if slices == 1 {
        return io.load(path, y_flip).map_err(|source| LoadError::SliceLoadFailure {
            path: path.to_path_buf(),
            source,
        });
    }

    // Slice images are dropped on every exit from this function, early
    // failures included.
    let mut loaded: Vec<LoadedImage> = Vec::with_capacity(slices as usize);
    for index in 0..slices {
        let slice_path =
            slice_filename(path, index).ok_or_else(|| LoadError::MalformedFilePattern(path.to_path_buf()))?;
        let slice = io
            .load(&slice_path, y_flip)
            .map_err(|source| LoadError::SliceLoadFailure {
                path: slice_path.clone(),
                source,
            })?;
        if slice.image.dims().z != 1 {
            return Err(LoadError::NestedArrayNotSupported(slice_path));
        }

        if let Some(first) = loaded.first() {
            if slice.is_hdr != first.is_hdr || slice.channel_count != first.channel_count {
                return Err(LoadError::InconsistentArrayFormat { index });
            }
            let (a, b) = (slice.image.dims(), first.image.dims());
            if a.x != b.x || a.y != b.y {
                return Err(LoadError::InconsistentArrayDimensions { index });
            }
        }
        debug!(path = %slice_path.display(), index, "loaded array slice");
        loaded.push(slice);
    }

    let first = &loaded[0];
    let is_hdr = first.is_hdr;
    let channel_count = first.channel_count;
    let mut dims = first.image.dims();
    dims.z = slices;
    let data_type = if is_hdr { DataType::F16 } else { DataType::U8 };

    let mut image = Image::alloc(data_type, dims);
    for (plane, slice) in image.planes_mut().zip(&loaded) {
        repack_plane(&slice.image, data_type, plane);
    }

    Ok(LoadedImage {
        image,
        is_hdr,
        channel_count,
    })
}

/// Copy depth plane 0 of `src` into `dst`, converting the sample type only if
/// the loader produced a different one than the array uses.
fn repack_plane(src: &Image, data_type: DataType, dst: &mut [u8]) {
    if src.data_type() == data_type {
        dst.copy_from_slice(src.slice(0));
        return;
    }
    let src_width = src.data_type().bytes_per_texel();
    let dst_width = data_type.bytes_per_texel();
    for (from, to) in src.slice(0).chunks_exact(src_width).zip(dst.chunks_exact_mut(dst_width)) {
        let texel = read_texel(src.data_type(), from);
        write_texel(data_type, texel, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Dims;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Entry {
        data_type: DataType,
        dims: Dims,
        is_hdr: bool,
        channels: u32,
        fill: u8,
    }

    /// Serves canned images by file name and counts live loads.
    #[derive(Default)]
    struct FakeIo {
        files: HashMap<PathBuf, Entry>,
        requested: Mutex<Vec<PathBuf>>,
    }

    impl FakeIo {
        fn with(mut self, name: &str, entry: Entry) -> Self {
            self.files.insert(PathBuf::from(name), entry);
            self
        }
    }

    impl PixelIo for FakeIo {
        fn load(&self, path: &Path, _y_flip: bool) -> Result<LoadedImage, PixelIoError> {
            self.requested.lock().unwrap().push(path.to_path_buf());
            let entry = self.files.get(path).ok_or_else(|| {
                PixelIoError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
            })?;
            let mut image = Image::alloc(entry.data_type, entry.dims);
            for plane in image.planes_mut() {
                plane.fill(entry.fill);
            }
            Ok(LoadedImage {
                image,
                is_hdr: entry.is_hdr,
                channel_count: entry.channels,
            })
        }

        fn store(&self, _image: &Image, _path: &Path, _y_flip: bool) -> Result<(), PixelIoError> {
            Ok(())
        }
    }

    fn ldr(x: u32, y: u32, fill: u8) -> Entry {
        Entry {
            data_type: DataType::U8,
            dims: Dims::new(x, y, 1),
            is_hdr: false,
            channels: 4,
            fill,
        }
    }

    #[test]
    fn test_slice_filename_inserts_index() {
        assert_eq!(
            slice_filename(Path::new("dir/tex.png"), 2),
            Some(PathBuf::from("dir/tex_2.png"))
        );
        assert_eq!(slice_filename(Path::new("a.b.tga"), 0), Some(PathBuf::from("a.b_0.tga")));
        assert_eq!(slice_filename(Path::new("noext"), 0), None);
    }

    #[test]
    fn test_single_file_passes_through() {
        let io = FakeIo::default().with("one.png", ldr(5, 3, 9));
        let loaded = load_uncompressed(&io, Path::new("one.png"), 1, false).unwrap();
        assert_eq!(loaded.image.dims(), Dims::new(5, 3, 1));
        assert_eq!(*io.requested.lock().unwrap(), vec![PathBuf::from("one.png")]);
    }

    #[test]
    fn test_array_stacks_slices_in_order() {
        let io = FakeIo::default()
            .with("tex_0.png", ldr(4, 2, 10))
            .with("tex_1.png", ldr(4, 2, 20))
            .with("tex_2.png", ldr(4, 2, 30));
        let loaded = load_uncompressed(&io, Path::new("tex.png"), 3, false).unwrap();
        assert_eq!(loaded.image.dims(), Dims::new(4, 2, 3));
        assert_eq!(loaded.image.data_type(), DataType::U8);
        for (z, fill) in [10u8, 20, 30].into_iter().enumerate() {
            assert!(loaded.image.slice(z as u32).iter().all(|b| *b == fill));
        }
    }

    #[test]
    fn test_hdr_array_is_packed_as_f16() {
        let hdr = |fill| Entry {
            data_type: DataType::F16,
            dims: Dims::new(2, 2, 1),
            is_hdr: true,
            channels: 3,
            fill,
        };
        let io = FakeIo::default().with("h_0.exr", hdr(1)).with("h_1.exr", hdr(2));
        let loaded = load_uncompressed(&io, Path::new("h.exr"), 2, false).unwrap();
        assert_eq!(loaded.image.data_type(), DataType::F16);
        assert!(loaded.is_hdr);
        assert_eq!(loaded.channel_count, 3);
        assert!(loaded.image.slice(1).iter().all(|b| *b == 2));
    }

    #[test]
    fn test_array_rejects_mismatched_width() {
        let io = FakeIo::default()
            .with("tex_0.png", ldr(4, 2, 0))
            .with("tex_1.png", ldr(5, 2, 0))
            .with("tex_2.png", ldr(4, 2, 0));
        let err = load_uncompressed(&io, Path::new("tex.png"), 3, false).unwrap_err();
        assert!(matches!(err, LoadError::InconsistentArrayDimensions { index: 1 }));
        // Stops at the first bad slice.
        assert_eq!(io.requested.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_array_rejects_mismatched_format() {
        let mut two_channel = ldr(4, 2, 0);
        two_channel.channels = 2;
        let io = FakeIo::default()
            .with("tex_0.png", ldr(4, 2, 0))
            .with("tex_1.png", two_channel);
        let err = load_uncompressed(&io, Path::new("tex.png"), 2, false).unwrap_err();
        assert!(matches!(err, LoadError::InconsistentArrayFormat { index: 1 }));
    }

    #[test]
    fn test_array_rejects_nested_arrays() {
        let mut volume = ldr(4, 2, 0);
        volume.dims.z = 2;
        let io = FakeIo::default().with("tex_0.png", volume);
        let err = load_uncompressed(&io, Path::new("tex.png"), 2, false).unwrap_err();
        assert!(matches!(err, LoadError::NestedArrayNotSupported(_)));
    }

    #[test]
    fn test_array_reports_missing_slice() {
        let io = FakeIo::default().with("tex_0.png", ldr(4, 2, 0));
        let err = load_uncompressed(&io, Path::new("tex.png"), 2, false).unwrap_err();
        match err {
            LoadError::SliceLoadFailure { path, .. } => assert_eq!(path, PathBuf::from("tex_1.png")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_array_requires_extension() {
        let io = FakeIo::default();
        let err = load_uncompressed(&io, Path::new("tex"), 2, false).unwrap_err();
        assert!(matches!(err, LoadError::MalformedFilePattern(_)));
        assert!(io.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_slices_rejected() {
        let io = FakeIo::default();
        assert!(matches!(
            load_uncompressed(&io, Path::new("tex.png"), 0, false),
            Err(LoadError::InvalidArraySize)
        ));
    }
}
