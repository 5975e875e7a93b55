//! Images and their memory layout.

use glam::UVec3;

use crate::format::{format_info, Format, FormatInfo, FormatKind};
use crate::memory::DeviceMemory;
use crate::MAX_MIP_LEVELS;

/// Layout of one mip level within a layer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MipLevel {
    /// Byte offset of the level from the start of its layer.
    pub offset: u64,
    pub level_size: u64,
    pub plane_size: u64,
    pub stride: u64,
    /// Extent in pixels, or in blocks for compressed formats.
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Byte layout of a whole image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub total_size: u64,
    pub layer_size: u64,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub levels: [MipLevel; MAX_MIP_LEVELS],
    pub pixel_size: u64,
}

impl ImageSize {
    pub fn level(&self, level: u32) -> &MipLevel {
        &self.levels[level as usize]
    }

    /// Absolute byte offset of the pixel (or block) at
    /// `(x, y, z, level, layer)`.
    pub fn pixel_offset(&self, x: u32, y: u32, z: u32, level: u32, layer: u32) -> u64 {
        let level = &self.levels[level as usize];
        self.layer_size * u64::from(layer)
            + level.offset
            + u64::from(z) * level.plane_size
            + u64::from(y) * level.stride
            + u64::from(x) * self.pixel_size
    }
}

/// Length of the full mip chain for the given extent.
pub fn max_mip_levels(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    largest.ilog2() + 1
}

/// Computes the byte layout of an image.
///
/// Mip level `i + 1` halves each axis of level `i` (rounding down, to a
/// minimum of 1); layers are laid out contiguously after the mip chain.
pub fn image_size(
    format: Format,
    extent: UVec3,
    array_layers: u32,
    mip_levels: u32,
) -> ImageSize {
    assert!(extent.x > 0 && extent.y > 0 && extent.z > 0);
    assert!(array_layers > 0);
    assert!(mip_levels > 0);
    assert!(
        mip_levels <= max_mip_levels(extent.x, extent.y, extent.z),
        "mip_levels {} exceeds the chain length of a {}x{}x{} image",
        mip_levels,
        extent.x,
        extent.y,
        extent.z,
    );

    let info = format_info(format);
    match info.kind {
        FormatKind::Normal | FormatKind::Packed | FormatKind::DepthStencil => {
            uncompressed_size(info, extent, array_layers, mip_levels)
        }
        FormatKind::Compressed => compressed_size(info, extent, array_layers, mip_levels),
        FormatKind::Planar | FormatKind::PlanarSamplable => {
            panic!("unsupported format for image layout: {format:?} (planar)")
        }
    }
}

fn uncompressed_size(
    info: &FormatInfo,
    extent: UVec3,
    array_layers: u32,
    mip_levels: u32,
) -> ImageSize {
    let mut size = ImageSize {
        total_size: 0,
        layer_size: 0,
        array_layers,
        mip_levels,
        levels: [MipLevel::default(); MAX_MIP_LEVELS],
        pixel_size: u64::from(info.total_size),
    };

    let (mut width, mut height, mut depth) = (extent.x, extent.y, extent.z);
    for level in &mut size.levels[..mip_levels as usize] {
        level.offset = size.layer_size;
        level.width = width;
        level.height = height;
        level.depth = depth;
        level.stride = u64::from(info.total_size) * u64::from(width);
        level.plane_size = level.stride * u64::from(height);
        level.level_size = level.plane_size * u64::from(depth);
        size.layer_size += level.level_size;

        width = (width / 2).max(1);
        height = (height / 2).max(1);
        depth = (depth / 2).max(1);
    }

    size.total_size = size.layer_size * u64::from(array_layers);
    size
}

fn compressed_size(
    info: &FormatInfo,
    extent: UVec3,
    array_layers: u32,
    mip_levels: u32,
) -> ImageSize {
    let mut size = ImageSize {
        total_size: 0,
        layer_size: 0,
        array_layers,
        mip_levels,
        levels: [MipLevel::default(); MAX_MIP_LEVELS],
        pixel_size: u64::from(info.total_size),
    };

    let (mut width, mut height, mut depth) = (extent.x, extent.y, extent.z);
    for level in &mut size.levels[..mip_levels as usize] {
        level.offset = size.layer_size;
        level.width = width.div_ceil(info.block_width);
        level.height = height.div_ceil(info.block_height);
        level.depth = depth;
        // Block rows are 4-byte aligned.
        level.stride = (u64::from(info.total_size) * u64::from(level.width)).next_multiple_of(4);
        level.plane_size = level.stride * u64::from(level.height);
        level.level_size = level.plane_size * u64::from(depth);
        size.layer_size += level.level_size;

        width = (width / 2).max(1);
        height = (height / 2).max(1);
        depth = (depth / 2).max(1);
    }

    size.total_size = size.layer_size * u64::from(array_layers);
    size
}

/// An image resource.
///
/// Created unbound; [`Image::bind_memory`] attaches the backing storage.
/// All data access is relative to the bound region.
#[derive(Debug)]
pub struct Image {
    format: Format,
    extent: UVec3,
    size: ImageSize,
    memory: Option<(DeviceMemory, u64)>,
}

impl Image {
    pub fn new(format: Format, extent: UVec3, array_layers: u32, mip_levels: u32) -> Self {
        let size = image_size(format, extent, array_layers, mip_levels);
        Self {
            format,
            extent,
            size,
            memory: None,
        }
    }

    pub fn bind_memory(&mut self, memory: &DeviceMemory, offset: u64) {
        assert!(
            offset + self.size.total_size <= memory.size(),
            "image does not fit the bound memory region",
        );
        self.memory = Some((memory.clone(), offset));
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    pub fn array_layers(&self) -> u32 {
        self.size.array_layers
    }

    pub fn mip_levels(&self) -> u32 {
        self.size.mip_levels
    }

    pub fn image_size(&self) -> &ImageSize {
        &self.size
    }

    pub fn pixel_offset(&self, x: u32, y: u32, z: u32, level: u32, layer: u32) -> u64 {
        self.size.pixel_offset(x, y, z, level, layer)
    }

    fn bound(&self) -> (&DeviceMemory, u64) {
        let (memory, offset) = self
            .memory
            .as_ref()
            .expect("image is not bound to any memory");
        (memory, *offset)
    }

    /// Bytes at `[offset, offset + len)` within the image.
    pub fn data(&self, offset: u64, len: u64) -> &[u8] {
        assert!(offset + len <= self.size.total_size);
        let (memory, base) = self.bound();
        memory.slice(base + offset, len)
    }

    pub fn data_mut(&self, offset: u64, len: u64) -> &mut [u8] {
        assert!(offset + len <= self.size.total_size);
        let (memory, base) = self.bound();
        memory.slice_mut(base + offset, len)
    }
}

/// A view over one image, as referenced by framebuffers and descriptor
/// sets.
#[derive(Clone, Debug)]
pub struct ImageView {
    image: std::sync::Arc<Image>,
    base_mip_level: u32,
    base_array_layer: u32,
}

impl ImageView {
    pub fn new(image: std::sync::Arc<Image>) -> Self {
        Self {
            image,
            base_mip_level: 0,
            base_array_layer: 0,
        }
    }

    pub fn image(&self) -> &std::sync::Arc<Image> {
        &self.image
    }

    pub fn base_mip_level(&self) -> u32 {
        self.base_mip_level
    }

    pub fn base_array_layer(&self) -> u32 {
        self.base_array_layer
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec3;

    use super::{image_size, max_mip_levels, Image};
    use crate::format::{format_info, Format};
    use crate::memory::DeviceMemory;

    #[test]
    fn mip_chain_lengths() {
        assert_eq!(max_mip_levels(1, 1, 1), 1);
        assert_eq!(max_mip_levels(4, 4, 1), 3);
        assert_eq!(max_mip_levels(256, 16, 1), 9);
    }

    #[test]
    fn single_level_layout() {
        let size = image_size(Format::R8G8B8A8Unorm, UVec3::new(4, 4, 1), 1, 1);
        assert_eq!(size.pixel_size, 4);
        assert_eq!(size.level(0).stride, 16);
        assert_eq!(size.total_size, 64);
    }

    #[test]
    fn mip_levels_halve_and_accumulate() {
        let size = image_size(Format::R8Unorm, UVec3::new(8, 8, 1), 1, 4);
        assert_eq!(size.level(0).width, 8);
        assert_eq!(size.level(1).width, 4);
        assert_eq!(size.level(2).width, 2);
        assert_eq!(size.level(3).width, 1);
        assert_eq!(size.total_size, 64 + 16 + 4 + 1);
        assert_eq!(size.level(3).offset, 84);
    }

    #[test]
    fn layers_are_contiguous() {
        let size = image_size(Format::R8Unorm, UVec3::new(4, 4, 1), 3, 1);
        assert_eq!(size.layer_size, 16);
        assert_eq!(size.total_size, 48);
        assert_eq!(size.pixel_offset(0, 0, 0, 0, 2), 32);
    }

    #[test]
    fn total_size_matches_level_sum() {
        let size = image_size(Format::R16G16Sfloat, UVec3::new(16, 8, 2), 2, 3);
        let info = format_info(Format::R16G16Sfloat);

        let mut expected = 0;
        for layer in 0..2u64 {
            let _ = layer;
            let (mut w, mut h, mut d) = (16u64, 8u64, 2u64);
            for _ in 0..3 {
                expected += u64::from(info.total_size) * w * h * d;
                w = (w / 2).max(1);
                h = (h / 2).max(1);
                d = (d / 2).max(1);
            }
        }
        assert_eq!(size.total_size, expected);
    }

    #[test]
    fn compressed_dimensions_are_block_quantized() {
        let size = image_size(Format::Bc1RgbaUnormBlock, UVec3::new(10, 10, 1), 1, 1);
        assert_eq!(size.level(0).width, 3);
        assert_eq!(size.level(0).height, 3);
        // 3 blocks * 8 bytes, aligned to 4.
        assert_eq!(size.level(0).stride, 24);
    }

    #[test]
    #[should_panic(expected = "mip_levels")]
    fn too_many_mips() {
        image_size(Format::R8Unorm, UVec3::new(4, 4, 1), 1, 4);
    }

    #[test]
    #[should_panic(expected = "unsupported")]
    fn planar_layout_is_refused() {
        image_size(Format::G8B8R82Plane420Unorm, UVec3::new(4, 4, 1), 1, 1);
    }

    #[test]
    fn pixel_addressing() {
        let size = image_size(Format::R8G8B8A8Unorm, UVec3::new(4, 2, 1), 1, 1);
        assert_eq!(size.pixel_offset(1, 1, 0, 0, 0), 16 + 4);
    }

    #[test]
    fn bound_image_reads_through_memory() {
        let memory = DeviceMemory::alloc(64).unwrap();
        memory.slice_mut(0, 4).copy_from_slice(&[1, 2, 3, 4]);

        let mut image = Image::new(Format::R8G8B8A8Unorm, UVec3::new(4, 4, 1), 1, 1);
        image.bind_memory(&memory, 0);
        assert_eq!(image.data(0, 4), &[1, 2, 3, 4]);
    }
}
