use half::f16;

/// Channels stored per texel. Every image is RGBA regardless of the source.
pub const CHANNELS: usize = 4;

/// Per-channel sample type of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    F16,
    F32,
}

impl DataType {
    /// Map an output bit depth (8, 16, 32) to its sample type.
    pub fn from_bitness(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(DataType::U8),
            16 => Some(DataType::F16),
            32 => Some(DataType::F32),
            _ => None,
        }
    }

    pub fn bitness(self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }

    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::F16 => 2,
            DataType::F32 => 4,
        }
    }

    #[inline]
    pub fn bytes_per_texel(self) -> usize {
        self.bytes_per_sample() * CHANNELS
    }
}

/// Extent along x, y and z. Used both for texels and for block grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dims {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dims {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Product of the three axes.
    pub fn volume(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Shape of an image without its pixel storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub dims: Dims,
    pub data_type: DataType,
}

impl ImageLayout {
    /// Bytes in one texel row of one slice.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.dims.x as usize * self.data_type.bytes_per_texel()
    }

    /// Bytes in one full depth slice.
    #[inline]
    pub fn slice_bytes(&self) -> usize {
        self.row_bytes() * self.dims.y as usize
    }
}

/// A 3D RGBA pixel buffer: one contiguous memory block per depth slice.
///
/// Samples are stored in native byte order; `U8` samples are UNORM8, `F16`
/// and `F32` samples are IEEE floats. All slices share the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    layout: ImageLayout,
    slices: Vec<Vec<u8>>,
}

impl Image {
    /// Allocate a zero-filled image.
    pub fn alloc(data_type: DataType, dims: Dims) -> Self {
        let layout = ImageLayout { dims, data_type };
        let slices = (0..dims.z).map(|_| vec![0u8; layout.slice_bytes()]).collect();
        Self { layout, slices }
    }

    #[inline]
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.layout.dims
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.layout.data_type
    }

    /// Raw bytes of depth slice `z`.
    pub fn slice(&self, z: u32) -> &[u8] {
        &self.slices[z as usize]
    }

    pub fn slice_mut(&mut self, z: u32) -> &mut [u8] {
        &mut self.slices[z as usize]
    }

    /// Mutable views of every slice in depth order.
    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_ {
        self.slices.iter_mut().map(|s| s.as_mut_slice())
    }

    fn texel_offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.layout.dims.x as usize + x as usize) * self.layout.data_type.bytes_per_texel()
    }

    /// Read texel (x, y, z) as normalized RGBA.
    pub fn texel(&self, x: u32, y: u32, z: u32) -> [f32; 4] {
        let offset = self.texel_offset(x, y);
        let width = self.layout.data_type.bytes_per_texel();
        read_texel(self.layout.data_type, &self.slices[z as usize][offset..offset + width])
    }

    /// Write texel (x, y, z) from normalized RGBA.
    pub fn set_texel(&mut self, x: u32, y: u32, z: u32, value: [f32; 4]) {
        let offset = self.texel_offset(x, y);
        let width = self.layout.data_type.bytes_per_texel();
        let data_type = self.layout.data_type;
        write_texel(
            data_type,
            value,
            &mut self.slices[z as usize][offset..offset + width],
        );
    }
}

/// Decode one RGBA texel from `bytes` (exactly one texel wide).
pub fn read_texel(data_type: DataType, bytes: &[u8]) -> [f32; 4] {
    let mut out = [0f32; 4];
    match data_type {
        DataType::U8 => {
            for (o, b) in out.iter_mut().zip(bytes) {
                *o = *b as f32 / 255.0;
            }
        }
        DataType::F16 => {
            for (o, c) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *o = f16::from_ne_bytes([c[0], c[1]]).to_f32();
            }
        }
        DataType::F32 => {
            for (o, c) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *o = f32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
            }
        }
    }
    out
}

/// Encode one RGBA texel into `out` (exactly one texel wide).
///
/// `U8` targets clamp to [0, 1] and round to nearest.
pub fn write_texel(data_type: DataType, value: [f32; 4], out: &mut [u8]) {
    match data_type {
        DataType::U8 => {
            for (o, v) in out.iter_mut().zip(value) {
                *o = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        DataType::F16 => {
            for (o, v) in out.chunks_exact_mut(2).zip(value) {
                o.copy_from_slice(&f16::from_f32(v).to_ne_bytes());
            }
        }
        DataType::F32 => {
            for (o, v) in out.chunks_exact_mut(4).zip(value) {
                o.copy_from_slice(&v.to_ne_bytes());
            }
        }
    }
}
