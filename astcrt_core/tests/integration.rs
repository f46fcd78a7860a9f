use std::path::{Path, PathBuf};
use std::sync::Arc;

use astcrt_codecs::VoidExtentCodec;
use astcrt_core::container::{astc, ktx};
use astcrt_core::{
    load_compressed, load_uncompressed, BlockSize, ConfigError, Dims, ImageFileIo, LoadError,
    Operation, Pipeline, PipelineArgs, PipelineError, PipelineOptions, Stage, StoreError,
    ThreadCount,
};
use image::{Rgba, RgbaImage};

fn gradient(width: u32, height: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 4) as u8,
            (y * 4) as u8,
            seed.wrapping_add((x + y) as u8),
            255,
        ])
    })
}

fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

fn pipeline(operation: Operation, threads: usize) -> Pipeline {
    Pipeline::new(Arc::new(VoidExtentCodec)).with_options(PipelineOptions {
        operation,
        threads: ThreadCount::Fixed(threads),
        ..PipelineOptions::default()
    })
}

fn args(dir: &Path, input: &str, compressed: &str, decompressed: &str) -> PipelineArgs {
    PipelineArgs {
        profile: "l".into(),
        input: dir.join(input),
        compressed: dir.join(compressed),
        decompressed: dir.join(decompressed),
        block: "6x6".into(),
        quality: "medium".into(),
    }
}

#[test]
fn roundtrip_6x6_preserves_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    gradient(37, 23, 0).save(dir.path().join("in.png")).unwrap();

    let summary = pipeline(Operation::RoundTrip, 2)
        .run(&args(dir.path(), "in.png", "out.astc", "out.png"))
        .unwrap();

    assert_eq!(summary.dims, Dims::new(37, 23, 1));
    assert_eq!(summary.block, BlockSize::new(6, 6, 1));
    assert_eq!(*summary.stages.last().unwrap(), Stage::Done);

    let decoded = image::open(dir.path().join("out.png")).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (37, 23));

    let stored = astc::load(&dir.path().join("out.astc")).unwrap();
    assert_eq!(stored.dims, Dims::new(37, 23, 1));
    assert_eq!(stored.data.len(), 7 * 4 * 16);
}

#[test]
fn test_mode_reports_metrics() {
    let dir = tempfile::tempdir().unwrap();
    solid(16, 16, [40, 80, 120, 255]).save(dir.path().join("flat.png")).unwrap();
    gradient(64, 64, 7).save(dir.path().join("ramp.png")).unwrap();

    let flat = pipeline(Operation::Test, 1)
        .run(&args(dir.path(), "flat.png", "", "flat_out.png"))
        .unwrap();
    assert!(flat.metrics.unwrap().psnr.is_infinite());
    assert!(flat.stages.contains(&Stage::Compared));
    assert!(!dir.path().join("flat_out.astc").exists());

    let mut ramp_args = args(dir.path(), "ramp.png", "", "ramp_out.png");
    ramp_args.block = "4x4".into();
    let ramp = pipeline(Operation::Test, 4).run(&ramp_args).unwrap();
    let metrics = ramp.metrics.unwrap();
    assert!(metrics.psnr.is_finite());
    assert!(metrics.psnr > 20.0, "psnr {}", metrics.psnr);
}

#[test]
fn multi_slice_load_matches_source_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let slices: Vec<RgbaImage> = (0..3).map(|z| gradient(9, 5, z * 50)).collect();
    for (z, slice) in slices.iter().enumerate() {
        slice.save(dir.path().join(format!("tex_{z}.png"))).unwrap();
    }

    let loaded = load_uncompressed(&ImageFileIo, &dir.path().join("tex.png"), 3, false).unwrap();
    assert_eq!(loaded.image.dims(), Dims::new(9, 5, 3));
    for (z, slice) in slices.iter().enumerate() {
        assert_eq!(loaded.image.slice(z as u32), slice.as_raw().as_slice(), "slice {z}");
    }
}

#[test]
fn inconsistent_array_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    gradient(8, 8, 0).save(dir.path().join("tex_0.png")).unwrap();
    gradient(9, 8, 0).save(dir.path().join("tex_1.png")).unwrap();
    gradient(8, 8, 0).save(dir.path().join("tex_2.png")).unwrap();

    let err = load_uncompressed(&ImageFileIo, &dir.path().join("tex.png"), 3, false).unwrap_err();
    assert!(matches!(err, LoadError::InconsistentArrayDimensions { index: 1 }));
}

#[test]
fn array_roundtrip_with_3d_blocks() {
    let dir = tempfile::tempdir().unwrap();
    for z in 0..3 {
        solid(8, 8, [z * 60, 10, 20, 255]).save(dir.path().join(format!("vol_{z}.png"))).unwrap();
    }

    let mut run_args = args(dir.path(), "vol.png", "vol.ktx", "vol_out.png");
    run_args.block = "4x4x4".into();
    let summary = Pipeline::new(Arc::new(VoidExtentCodec))
        .with_options(PipelineOptions {
            operation: Operation::RoundTrip,
            threads: ThreadCount::Fixed(2),
            array_size: 3,
            ..PipelineOptions::default()
        })
        .run(&run_args)
        .unwrap();

    assert_eq!(summary.dims, Dims::new(8, 8, 3));
    for z in 0..3 {
        assert!(dir.path().join(format!("vol_out_{z}.png")).exists());
    }
    let (stored, srgb) = load_compressed(&dir.path().join("vol.ktx")).unwrap();
    assert_eq!(stored.block, BlockSize::new(4, 4, 4));
    assert_eq!(srgb, Some(false));
}

#[test]
fn compressed_container_follows_suffix_and_profile() {
    let dir = tempfile::tempdir().unwrap();
    gradient(12, 12, 3).save(dir.path().join("in.png")).unwrap();

    for (profile, name, expected_format) in [("s", "srgb.ktx", 0x93D4u32), ("l", "linear.ktx", 0x93B4)] {
        let mut run_args = args(dir.path(), "in.png", name, "out.png");
        run_args.profile = profile.into();
        pipeline(Operation::Compress, 1).run(&run_args).unwrap();

        let bytes = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(&bytes[..12], &ktx::IDENTIFIER);
        assert_eq!(&bytes[28..32], &expected_format.to_le_bytes(), "profile {profile}");
    }

    pipeline(Operation::Compress, 1)
        .run(&args(dir.path(), "in.png", "native.astc", "out.png"))
        .unwrap();
    let bytes = std::fs::read(dir.path().join("native.astc")).unwrap();
    assert_eq!(&bytes[..4], &astc::MAGIC);

    let err = pipeline(Operation::Compress, 1)
        .run(&args(dir.path(), "in.png", "out.bin", "out.png"))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Store(StoreError::UnknownCompressedContainer(_))
    ));
}

#[test]
fn decompress_reads_back_a_compressed_file() {
    let dir = tempfile::tempdir().unwrap();
    solid(10, 10, [200, 100, 50, 255]).save(dir.path().join("in.png")).unwrap();

    let mut compress_args = args(dir.path(), "in.png", "mid.astc", "");
    compress_args.block = "5x5".into();
    pipeline(Operation::Compress, 1).run(&compress_args).unwrap();

    let decompress_args = PipelineArgs {
        input: dir.path().join("mid.astc"),
        compressed: PathBuf::new(),
        ..args(dir.path(), "", "", "back.png")
    };
    let summary = pipeline(Operation::Decompress, 2).run(&decompress_args).unwrap();
    assert_eq!(summary.block, BlockSize::new(5, 5, 1));

    let back = image::open(dir.path().join("back.png")).unwrap().to_rgba8();
    assert!(back.pixels().all(|p| p.0 == [200, 100, 50, 255]));
}

#[test]
fn unsupported_footprint_reports_block_size() {
    let dir = tempfile::tempdir().unwrap();
    gradient(8, 8, 0).save(dir.path().join("in.png")).unwrap();
    let mut run_args = args(dir.path(), "in.png", "out.astc", "out.png");
    run_args.block = "7x7".into();

    let err = pipeline(Operation::RoundTrip, 1).run(&run_args).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::InvalidBlockSize { .. })
    ));
    assert!(!dir.path().join("out.astc").exists());
}
