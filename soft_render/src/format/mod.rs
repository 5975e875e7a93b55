//! Table-driven pixel format descriptions.

pub mod codec;
mod compressed;

use bitflags::bitflags;

pub use codec::{ClearColor, PixelCodec};

/// Marks a channel or aspect as absent from a format.
pub const INVALID_OFFSET: u32 = u32::MAX;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u32 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FormatFeatures: u32 {
        const SAMPLED_IMAGE = 1 << 0;
        const STORAGE_IMAGE = 1 << 1;
        const UNIFORM_TEXEL_BUFFER = 1 << 2;
        const STORAGE_TEXEL_BUFFER = 1 << 3;
        const VERTEX_BUFFER = 1 << 4;
        const COLOR_ATTACHMENT = 1 << 5;
        const COLOR_ATTACHMENT_BLEND = 1 << 6;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 7;
        const BLIT_SRC = 1 << 8;
        const BLIT_DST = 1 << 9;
        const TRANSFER_SRC = 1 << 10;
        const TRANSFER_DST = 1 << 11;
    }
}

/// Feature masks advertised for one format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FormatFeatureSet {
    pub linear: FormatFeatures,
    pub optimal: FormatFeatures,
    pub buffer: FormatFeatures,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Normal,
    Packed,
    DepthStencil,
    Compressed,
    Planar,
    PlanarSamplable,
}

/// The numeric interpretation of a format's channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NumericType {
    UNorm,
    SNorm,
    UScaled,
    SScaled,
    UInt,
    SInt,
    UFloat,
    SFloat,
    Srgb,
}

/// Immutable description of one format.
///
/// The layout fields form a union discriminated by `kind`; fields that do
/// not apply to a kind hold `INVALID_OFFSET` (offsets) or zero (sizes).
/// Keeping every field present keeps the whole table one contiguous
/// array.
#[derive(Copy, Clone, Debug)]
pub struct FormatInfo {
    pub format: Format,
    pub kind: FormatKind,
    pub numeric: NumericType,
    pub channels: ChannelMask,
    /// Bytes per pixel, or per block for compressed formats.
    pub total_size: u32,
    /// Bytes per channel. Zero for non-`Normal` kinds.
    pub element_size: u32,
    /// `Normal`: per-channel offsets in channel units (r, g, b, a).
    pub normal_offset: [u32; 4],
    /// `Packed`: per-channel bit offsets (r, g, b, a).
    pub packed_offset: [u32; 4],
    /// `Packed`: per-channel bit widths (r, g, b, a).
    pub packed_bits: [u32; 4],
    /// `DepthStencil`: byte offset of the depth aspect.
    pub depth_offset: u32,
    /// `DepthStencil`: byte offset of the stencil aspect.
    pub stencil_offset: u32,
    /// `Compressed`: block extent in texels.
    pub block_width: u32,
    pub block_height: u32,
}

impl FormatInfo {
    pub const fn is_compressed(&self) -> bool {
        matches!(self.kind, FormatKind::Compressed)
    }

    pub const fn has_depth(&self) -> bool {
        matches!(self.kind, FormatKind::DepthStencil) && self.depth_offset != INVALID_OFFSET
    }

    pub const fn has_stencil(&self) -> bool {
        matches!(self.kind, FormatKind::DepthStencil) && self.stencil_offset != INVALID_OFFSET
    }
}

const fn base(format: Format, kind: FormatKind, numeric: NumericType) -> FormatInfo {
    FormatInfo {
        format,
        kind,
        numeric,
        channels: ChannelMask::empty(),
        total_size: 0,
        element_size: 0,
        normal_offset: [INVALID_OFFSET; 4],
        packed_offset: [INVALID_OFFSET; 4],
        packed_bits: [0; 4],
        depth_offset: INVALID_OFFSET,
        stencil_offset: INVALID_OFFSET,
        block_width: 0,
        block_height: 0,
    }
}

const fn normal(
    format: Format,
    channels: ChannelMask,
    total_size: u32,
    element_size: u32,
    numeric: NumericType,
    offsets: [u32; 4],
) -> FormatInfo {
    let mut info = base(format, FormatKind::Normal, numeric);
    info.channels = channels;
    info.total_size = total_size;
    info.element_size = element_size;
    info.normal_offset = offsets;
    info
}

const fn packed(
    format: Format,
    channels: ChannelMask,
    total_size: u32,
    numeric: NumericType,
    offsets: [u32; 4],
    bits: [u32; 4],
) -> FormatInfo {
    let mut info = base(format, FormatKind::Packed, numeric);
    info.channels = channels;
    info.total_size = total_size;
    info.packed_offset = offsets;
    info.packed_bits = bits;
    info
}

const fn depth(
    format: Format,
    total_size: u32,
    element_size: u32,
    numeric: NumericType,
    depth_offset: u32,
    stencil_offset: u32,
) -> FormatInfo {
    let mut info = base(format, FormatKind::DepthStencil, numeric);
    info.channels = ChannelMask::R;
    info.total_size = total_size;
    info.element_size = element_size;
    info.depth_offset = depth_offset;
    info.stencil_offset = stencil_offset;
    info
}

const fn compressed(
    format: Format,
    channels: ChannelMask,
    total_size: u32,
    numeric: NumericType,
    block_width: u32,
    block_height: u32,
) -> FormatInfo {
    let mut info = base(format, FormatKind::Compressed, numeric);
    info.channels = channels;
    info.total_size = total_size;
    info.block_width = block_width;
    info.block_height = block_height;
    info
}

const fn planar(
    format: Format,
    kind: FormatKind,
    channels: ChannelMask,
    total_size: u32,
) -> FormatInfo {
    let mut info = base(format, kind, NumericType::UNorm);
    info.channels = channels;
    info.total_size = total_size;
    info
}

/// Every format known to the device.
///
/// Order matches [`FORMATS`]; the discriminant indexes the table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Format {
    Undefined,
    R4G4UnormPack8,
    R4G4B4A4UnormPack16,
    B4G4R4A4UnormPack16,
    R5G6B5UnormPack16,
    B5G6R5UnormPack16,
    R5G5B5A1UnormPack16,
    B5G5R5A1UnormPack16,
    A1R5G5B5UnormPack16,
    R8Unorm,
    R8Snorm,
    R8Uscaled,
    R8Sscaled,
    R8Uint,
    R8Sint,
    R8Srgb,
    R8G8Unorm,
    R8G8Snorm,
    R8G8Uscaled,
    R8G8Sscaled,
    R8G8Uint,
    R8G8Sint,
    R8G8Srgb,
    R8G8B8Unorm,
    R8G8B8Snorm,
    R8G8B8Uscaled,
    R8G8B8Sscaled,
    R8G8B8Uint,
    R8G8B8Sint,
    R8G8B8Srgb,
    B8G8R8Unorm,
    B8G8R8Snorm,
    B8G8R8Uscaled,
    B8G8R8Sscaled,
    B8G8R8Uint,
    B8G8R8Sint,
    B8G8R8Srgb,
    R8G8B8A8Unorm,
    R8G8B8A8Snorm,
    R8G8B8A8Uscaled,
    R8G8B8A8Sscaled,
    R8G8B8A8Uint,
    R8G8B8A8Sint,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Snorm,
    B8G8R8A8Uscaled,
    B8G8R8A8Sscaled,
    B8G8R8A8Uint,
    B8G8R8A8Sint,
    B8G8R8A8Srgb,
    A8B8G8R8UnormPack32,
    A8B8G8R8SnormPack32,
    A8B8G8R8UscaledPack32,
    A8B8G8R8SscaledPack32,
    A8B8G8R8UintPack32,
    A8B8G8R8SintPack32,
    A8B8G8R8SrgbPack32,
    A2R10G10B10UnormPack32,
    A2R10G10B10SnormPack32,
    A2R10G10B10UscaledPack32,
    A2R10G10B10SscaledPack32,
    A2R10G10B10UintPack32,
    A2R10G10B10SintPack32,
    A2B10G10R10UnormPack32,
    A2B10G10R10SnormPack32,
    A2B10G10R10UscaledPack32,
    A2B10G10R10SscaledPack32,
    A2B10G10R10UintPack32,
    A2B10G10R10SintPack32,
    R16Unorm,
    R16Snorm,
    R16Uscaled,
    R16Sscaled,
    R16Uint,
    R16Sint,
    R16Sfloat,
    R16G16Unorm,
    R16G16Snorm,
    R16G16Uscaled,
    R16G16Sscaled,
    R16G16Uint,
    R16G16Sint,
    R16G16Sfloat,
    R16G16B16Unorm,
    R16G16B16Snorm,
    R16G16B16Uscaled,
    R16G16B16Sscaled,
    R16G16B16Uint,
    R16G16B16Sint,
    R16G16B16Sfloat,
    R16G16B16A16Unorm,
    R16G16B16A16Snorm,
    R16G16B16A16Uscaled,
    R16G16B16A16Sscaled,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R16G16B16A16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    R32G32Uint,
    R32G32Sint,
    R32G32Sfloat,
    R32G32B32Uint,
    R32G32B32Sint,
    R32G32B32Sfloat,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32A32Sfloat,
    R64Uint,
    R64Sint,
    R64Sfloat,
    R64G64Uint,
    R64G64Sint,
    R64G64Sfloat,
    R64G64B64Uint,
    R64G64B64Sint,
    R64G64B64Sfloat,
    R64G64B64A64Uint,
    R64G64B64A64Sint,
    R64G64B64A64Sfloat,
    B10G11R11UfloatPack32,
    E5B9G9R9UfloatPack32,
    D16Unorm,
    X8D24UnormPack32,
    D32Sfloat,
    S8Uint,
    D16UnormS8Uint,
    D24UnormS8Uint,
    D32SfloatS8Uint,
    Bc1RgbUnormBlock,
    Bc1RgbSrgbBlock,
    Bc1RgbaUnormBlock,
    Bc1RgbaSrgbBlock,
    Bc2UnormBlock,
    Bc2SrgbBlock,
    Bc3UnormBlock,
    Bc3SrgbBlock,
    Bc4UnormBlock,
    Bc4SnormBlock,
    Bc5UnormBlock,
    Bc5SnormBlock,
    Bc6hUfloatBlock,
    Bc6hSfloatBlock,
    Bc7UnormBlock,
    Bc7SrgbBlock,
    Etc2R8G8B8UnormBlock,
    Etc2R8G8B8SrgbBlock,
    Etc2R8G8B8A1UnormBlock,
    Etc2R8G8B8A1SrgbBlock,
    Etc2R8G8B8A8UnormBlock,
    Etc2R8G8B8A8SrgbBlock,
    EacR11UnormBlock,
    EacR11SnormBlock,
    EacR11G11UnormBlock,
    EacR11G11SnormBlock,
    Astc4x4UnormBlock,
    Astc4x4SrgbBlock,
    Astc5x4UnormBlock,
    Astc5x4SrgbBlock,
    Astc5x5UnormBlock,
    Astc5x5SrgbBlock,
    Astc6x5UnormBlock,
    Astc6x5SrgbBlock,
    Astc6x6UnormBlock,
    Astc6x6SrgbBlock,
    Astc8x5UnormBlock,
    Astc8x5SrgbBlock,
    Astc8x6UnormBlock,
    Astc8x6SrgbBlock,
    Astc8x8UnormBlock,
    Astc8x8SrgbBlock,
    Astc10x5UnormBlock,
    Astc10x5SrgbBlock,
    Astc10x6UnormBlock,
    Astc10x6SrgbBlock,
    Astc10x8UnormBlock,
    Astc10x8SrgbBlock,
    Astc10x10UnormBlock,
    Astc10x10SrgbBlock,
    Astc12x10UnormBlock,
    Astc12x10SrgbBlock,
    Astc12x12UnormBlock,
    Astc12x12SrgbBlock,
    G8B8G8R8422Unorm,
    B8G8R8G8422Unorm,
    G8B8R83Plane420Unorm,
    G8B8R82Plane420Unorm,
}

impl Format {
    pub fn info(self) -> &'static FormatInfo {
        format_info(self)
    }

    pub fn is_depth_stencil(self) -> bool {
        matches!(self.info().kind, FormatKind::DepthStencil)
    }

    pub fn is_compressed(self) -> bool {
        self.info().is_compressed()
    }
}

const C_NONE: ChannelMask = ChannelMask::empty();
const C_R: ChannelMask = ChannelMask::R;
const C_RG: ChannelMask = ChannelMask::R.union(ChannelMask::G);
const C_RGB: ChannelMask = ChannelMask::R.union(ChannelMask::G).union(ChannelMask::B);
const C_RGBA: ChannelMask = C_RGB.union(ChannelMask::A);

const NONE: u32 = INVALID_OFFSET;

use FormatKind::{Planar, PlanarSamplable};
use NumericType::{SFloat, SInt, SNorm, SScaled, Srgb, UFloat, UInt, UNorm, UScaled};

/// One entry per [`Format`], in discriminant order.
static FORMATS: [FormatInfo; 189] = [
    base(Format::Undefined, FormatKind::Normal, UNorm),
    packed(Format::R4G4UnormPack8, C_RG, 1, UNorm, [4, 0, NONE, NONE], [4, 4, 0, 0]),
    packed(Format::R4G4B4A4UnormPack16, C_RGBA, 2, UNorm, [12, 8, 4, 0], [4, 4, 4, 4]),
    packed(Format::B4G4R4A4UnormPack16, C_RGBA, 2, UNorm, [4, 8, 12, 0], [4, 4, 4, 4]),
    packed(Format::R5G6B5UnormPack16, C_RGB, 2, UNorm, [11, 5, 0, NONE], [5, 6, 5, 0]),
    packed(Format::B5G6R5UnormPack16, C_RGB, 2, UNorm, [0, 5, 11, NONE], [5, 6, 5, 0]),
    packed(Format::R5G5B5A1UnormPack16, C_RGBA, 2, UNorm, [11, 6, 1, 0], [5, 5, 5, 1]),
    packed(Format::B5G5R5A1UnormPack16, C_RGBA, 2, UNorm, [1, 6, 11, 0], [5, 5, 5, 1]),
    packed(Format::A1R5G5B5UnormPack16, C_RGBA, 2, UNorm, [10, 5, 0, 15], [5, 5, 5, 1]),
    normal(Format::R8Unorm, C_R, 1, 1, UNorm, [0, NONE, NONE, NONE]),
    normal(Format::R8Snorm, C_R, 1, 1, SNorm, [0, NONE, NONE, NONE]),
    normal(Format::R8Uscaled, C_R, 1, 1, UScaled, [0, NONE, NONE, NONE]),
    normal(Format::R8Sscaled, C_R, 1, 1, SScaled, [0, NONE, NONE, NONE]),
    normal(Format::R8Uint, C_R, 1, 1, UInt, [0, NONE, NONE, NONE]),
    normal(Format::R8Sint, C_R, 1, 1, SInt, [0, NONE, NONE, NONE]),
    normal(Format::R8Srgb, C_R, 1, 1, Srgb, [0, NONE, NONE, NONE]),
    normal(Format::R8G8Unorm, C_RG, 2, 1, UNorm, [0, 1, NONE, NONE]),
    normal(Format::R8G8Snorm, C_RG, 2, 1, SNorm, [0, 1, NONE, NONE]),
    normal(Format::R8G8Uscaled, C_RG, 2, 1, UScaled, [0, 1, NONE, NONE]),
    normal(Format::R8G8Sscaled, C_RG, 2, 1, SScaled, [0, 1, NONE, NONE]),
    normal(Format::R8G8Uint, C_RG, 2, 1, UInt, [0, 1, NONE, NONE]),
    normal(Format::R8G8Sint, C_RG, 2, 1, SInt, [0, 1, NONE, NONE]),
    normal(Format::R8G8Srgb, C_RG, 2, 1, Srgb, [0, 1, NONE, NONE]),
    normal(Format::R8G8B8Unorm, C_RGB, 3, 1, UNorm, [0, 1, 2, NONE]),
    normal(Format::R8G8B8Snorm, C_RGB, 3, 1, SNorm, [0, 1, 2, NONE]),
    normal(Format::R8G8B8Uscaled, C_RGB, 3, 1, UScaled, [0, 1, 2, NONE]),
    normal(Format::R8G8B8Sscaled, C_RGB, 3, 1, SScaled, [0, 1, 2, NONE]),
    normal(Format::R8G8B8Uint, C_RGB, 3, 1, UInt, [0, 1, 2, NONE]),
    normal(Format::R8G8B8Sint, C_RGB, 3, 1, SInt, [0, 1, 2, NONE]),
    normal(Format::R8G8B8Srgb, C_RGB, 3, 1, Srgb, [0, 1, 2, NONE]),
    normal(Format::B8G8R8Unorm, C_RGB, 3, 1, UNorm, [2, 1, 0, NONE]),
    normal(Format::B8G8R8Snorm, C_RGB, 3, 1, SNorm, [2, 1, 0, NONE]),
    normal(Format::B8G8R8Uscaled, C_RGB, 3, 1, UScaled, [2, 1, 0, NONE]),
    normal(Format::B8G8R8Sscaled, C_RGB, 3, 1, SScaled, [2, 1, 0, NONE]),
    normal(Format::B8G8R8Uint, C_RGB, 3, 1, UInt, [2, 1, 0, NONE]),
    normal(Format::B8G8R8Sint, C_RGB, 3, 1, SInt, [2, 1, 0, NONE]),
    normal(Format::B8G8R8Srgb, C_RGB, 3, 1, Srgb, [2, 1, 0, NONE]),
    normal(Format::R8G8B8A8Unorm, C_RGBA, 4, 1, UNorm, [0, 1, 2, 3]),
    normal(Format::R8G8B8A8Snorm, C_RGBA, 4, 1, SNorm, [0, 1, 2, 3]),
    normal(Format::R8G8B8A8Uscaled, C_RGBA, 4, 1, UScaled, [0, 1, 2, 3]),
    normal(Format::R8G8B8A8Sscaled, C_RGBA, 4, 1, SScaled, [0, 1, 2, 3]),
    normal(Format::R8G8B8A8Uint, C_RGBA, 4, 1, UInt, [0, 1, 2, 3]),
    normal(Format::R8G8B8A8Sint, C_RGBA, 4, 1, SInt, [0, 1, 2, 3]),
    normal(Format::R8G8B8A8Srgb, C_RGBA, 4, 1, Srgb, [0, 1, 2, 3]),
    normal(Format::B8G8R8A8Unorm, C_RGBA, 4, 1, UNorm, [2, 1, 0, 3]),
    normal(Format::B8G8R8A8Snorm, C_RGBA, 4, 1, SNorm, [2, 1, 0, 3]),
    normal(Format::B8G8R8A8Uscaled, C_RGBA, 4, 1, UScaled, [2, 1, 0, 3]),
    normal(Format::B8G8R8A8Sscaled, C_RGBA, 4, 1, SScaled, [2, 1, 0, 3]),
    normal(Format::B8G8R8A8Uint, C_RGBA, 4, 1, UInt, [2, 1, 0, 3]),
    normal(Format::B8G8R8A8Sint, C_RGBA, 4, 1, SInt, [2, 1, 0, 3]),
    normal(Format::B8G8R8A8Srgb, C_RGBA, 4, 1, Srgb, [2, 1, 0, 3]),
    packed(Format::A8B8G8R8UnormPack32, C_RGBA, 4, UNorm, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A8B8G8R8SnormPack32, C_RGBA, 4, SNorm, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A8B8G8R8UscaledPack32, C_RGBA, 4, UScaled, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A8B8G8R8SscaledPack32, C_RGBA, 4, SScaled, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A8B8G8R8UintPack32, C_RGBA, 4, UInt, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A8B8G8R8SintPack32, C_RGBA, 4, SInt, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A8B8G8R8SrgbPack32, C_RGBA, 4, Srgb, [0, 8, 16, 24], [8, 8, 8, 8]),
    packed(Format::A2R10G10B10UnormPack32, C_RGBA, 4, UNorm, [20, 10, 0, 30], [10, 10, 10, 2]),
    packed(Format::A2R10G10B10SnormPack32, C_RGBA, 4, SNorm, [20, 10, 0, 30], [10, 10, 10, 2]),
    packed(Format::A2R10G10B10UscaledPack32, C_RGBA, 4, UScaled, [20, 10, 0, 30], [10, 10, 10, 2]),
    packed(Format::A2R10G10B10SscaledPack32, C_RGBA, 4, SScaled, [20, 10, 0, 30], [10, 10, 10, 2]),
    packed(Format::A2R10G10B10UintPack32, C_RGBA, 4, UInt, [20, 10, 0, 30], [10, 10, 10, 2]),
    packed(Format::A2R10G10B10SintPack32, C_RGBA, 4, SInt, [20, 10, 0, 30], [10, 10, 10, 2]),
    packed(Format::A2B10G10R10UnormPack32, C_RGBA, 4, UNorm, [0, 10, 20, 30], [10, 10, 10, 2]),
    packed(Format::A2B10G10R10SnormPack32, C_RGBA, 4, SNorm, [0, 10, 20, 30], [10, 10, 10, 2]),
    packed(Format::A2B10G10R10UscaledPack32, C_RGBA, 4, UScaled, [0, 10, 20, 30], [10, 10, 10, 2]),
    packed(Format::A2B10G10R10SscaledPack32, C_RGBA, 4, SScaled, [0, 10, 20, 30], [10, 10, 10, 2]),
    packed(Format::A2B10G10R10UintPack32, C_RGBA, 4, UInt, [0, 10, 20, 30], [10, 10, 10, 2]),
    packed(Format::A2B10G10R10SintPack32, C_RGBA, 4, SInt, [0, 10, 20, 30], [10, 10, 10, 2]),
    normal(Format::R16Unorm, C_R, 2, 2, UNorm, [0, NONE, NONE, NONE]),
    normal(Format::R16Snorm, C_R, 2, 2, SNorm, [0, NONE, NONE, NONE]),
    normal(Format::R16Uscaled, C_R, 2, 2, UScaled, [0, NONE, NONE, NONE]),
    normal(Format::R16Sscaled, C_R, 2, 2, SScaled, [0, NONE, NONE, NONE]),
    normal(Format::R16Uint, C_R, 2, 2, UInt, [0, NONE, NONE, NONE]),
    normal(Format::R16Sint, C_R, 2, 2, SInt, [0, NONE, NONE, NONE]),
    normal(Format::R16Sfloat, C_R, 2, 2, SFloat, [0, NONE, NONE, NONE]),
    normal(Format::R16G16Unorm, C_RG, 4, 2, UNorm, [0, 1, NONE, NONE]),
    normal(Format::R16G16Snorm, C_RG, 4, 2, SNorm, [0, 1, NONE, NONE]),
    normal(Format::R16G16Uscaled, C_RG, 4, 2, UScaled, [0, 1, NONE, NONE]),
    normal(Format::R16G16Sscaled, C_RG, 4, 2, SScaled, [0, 1, NONE, NONE]),
    normal(Format::R16G16Uint, C_RG, 4, 2, UInt, [0, 1, NONE, NONE]),
    normal(Format::R16G16Sint, C_RG, 4, 2, SInt, [0, 1, NONE, NONE]),
    normal(Format::R16G16Sfloat, C_RG, 4, 2, SFloat, [0, 1, NONE, NONE]),
    normal(Format::R16G16B16Unorm, C_RGB, 6, 2, UNorm, [0, 1, 2, NONE]),
    normal(Format::R16G16B16Snorm, C_RGB, 6, 2, SNorm, [0, 1, 2, NONE]),
    normal(Format::R16G16B16Uscaled, C_RGB, 6, 2, UScaled, [0, 1, 2, NONE]),
    normal(Format::R16G16B16Sscaled, C_RGB, 6, 2, SScaled, [0, 1, 2, NONE]),
    normal(Format::R16G16B16Uint, C_RGB, 6, 2, UInt, [0, 1, 2, NONE]),
    normal(Format::R16G16B16Sint, C_RGB, 6, 2, SInt, [0, 1, 2, NONE]),
    normal(Format::R16G16B16Sfloat, C_RGB, 6, 2, SFloat, [0, 1, 2, NONE]),
    normal(Format::R16G16B16A16Unorm, C_RGBA, 8, 2, UNorm, [0, 1, 2, 3]),
    normal(Format::R16G16B16A16Snorm, C_RGBA, 8, 2, SNorm, [0, 1, 2, 3]),
    normal(Format::R16G16B16A16Uscaled, C_RGBA, 8, 2, UScaled, [0, 1, 2, 3]),
    normal(Format::R16G16B16A16Sscaled, C_RGBA, 8, 2, SScaled, [0, 1, 2, 3]),
    normal(Format::R16G16B16A16Uint, C_RGBA, 8, 2, UInt, [0, 1, 2, 3]),
    normal(Format::R16G16B16A16Sint, C_RGBA, 8, 2, SInt, [0, 1, 2, 3]),
    normal(Format::R16G16B16A16Sfloat, C_RGBA, 8, 2, SFloat, [0, 1, 2, 3]),
    normal(Format::R32Uint, C_R, 4, 4, UInt, [0, NONE, NONE, NONE]),
    normal(Format::R32Sint, C_R, 4, 4, SInt, [0, NONE, NONE, NONE]),
    normal(Format::R32Sfloat, C_R, 4, 4, SFloat, [0, NONE, NONE, NONE]),
    normal(Format::R32G32Uint, C_RG, 8, 4, UInt, [0, 1, NONE, NONE]),
    normal(Format::R32G32Sint, C_RG, 8, 4, SInt, [0, 1, NONE, NONE]),
    normal(Format::R32G32Sfloat, C_RG, 8, 4, SFloat, [0, 1, NONE, NONE]),
    normal(Format::R32G32B32Uint, C_RGB, 12, 4, UInt, [0, 1, 2, NONE]),
    normal(Format::R32G32B32Sint, C_RGB, 12, 4, SInt, [0, 1, 2, NONE]),
    normal(Format::R32G32B32Sfloat, C_RGB, 12, 4, SFloat, [0, 1, 2, NONE]),
    normal(Format::R32G32B32A32Uint, C_RGBA, 16, 4, UInt, [0, 1, 2, 3]),
    normal(Format::R32G32B32A32Sint, C_RGBA, 16, 4, SInt, [0, 1, 2, 3]),
    normal(Format::R32G32B32A32Sfloat, C_RGBA, 16, 4, SFloat, [0, 1, 2, 3]),
    normal(Format::R64Uint, C_R, 8, 8, UInt, [0, NONE, NONE, NONE]),
    normal(Format::R64Sint, C_R, 8, 8, SInt, [0, NONE, NONE, NONE]),
    normal(Format::R64Sfloat, C_R, 8, 8, SFloat, [0, NONE, NONE, NONE]),
    normal(Format::R64G64Uint, C_RG, 16, 8, UInt, [0, 1, NONE, NONE]),
    normal(Format::R64G64Sint, C_RG, 16, 8, SInt, [0, 1, NONE, NONE]),
    normal(Format::R64G64Sfloat, C_RG, 16, 8, SFloat, [0, 1, NONE, NONE]),
    normal(Format::R64G64B64Uint, C_RGB, 24, 8, UInt, [0, 1, 2, NONE]),
    normal(Format::R64G64B64Sint, C_RGB, 24, 8, SInt, [0, 1, 2, NONE]),
    normal(Format::R64G64B64Sfloat, C_RGB, 24, 8, SFloat, [0, 1, 2, NONE]),
    normal(Format::R64G64B64A64Uint, C_RGBA, 32, 8, UInt, [0, 1, 2, 3]),
    normal(Format::R64G64B64A64Sint, C_RGBA, 32, 8, SInt, [0, 1, 2, 3]),
    normal(Format::R64G64B64A64Sfloat, C_RGBA, 32, 8, SFloat, [0, 1, 2, 3]),
    packed(Format::B10G11R11UfloatPack32, C_RGB, 4, UFloat, [0, 11, 22, NONE], [11, 11, 10, 0]),
    packed(Format::E5B9G9R9UfloatPack32, C_RGB, 4, UFloat, [0, 9, 18, 27], [9, 9, 9, 5]),
    depth(Format::D16Unorm, 2, 2, UNorm, 0, NONE),
    depth(Format::X8D24UnormPack32, 4, 4, UNorm, 0, NONE),
    depth(Format::D32Sfloat, 4, 4, SFloat, 0, NONE),
    depth(Format::S8Uint, 1, 1, UInt, NONE, 0),
    depth(Format::D16UnormS8Uint, 3, 2, UNorm, 0, 2),
    depth(Format::D24UnormS8Uint, 4, 3, UNorm, 0, 3),
    depth(Format::D32SfloatS8Uint, 8, 4, SFloat, 0, 4),
    compressed(Format::Bc1RgbUnormBlock, C_RGB, 8, UNorm, 4, 4),
    compressed(Format::Bc1RgbSrgbBlock, C_RGB, 8, Srgb, 4, 4),
    compressed(Format::Bc1RgbaUnormBlock, C_RGBA, 8, UNorm, 4, 4),
    compressed(Format::Bc1RgbaSrgbBlock, C_RGBA, 8, Srgb, 4, 4),
    compressed(Format::Bc2UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::Bc2SrgbBlock, C_RGBA, 16, Srgb, 4, 4),
    compressed(Format::Bc3UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::Bc3SrgbBlock, C_RGBA, 16, Srgb, 4, 4),
    compressed(Format::Bc4UnormBlock, C_RGBA, 8, UNorm, 4, 4),
    compressed(Format::Bc4SnormBlock, C_RGBA, 8, SNorm, 4, 4),
    compressed(Format::Bc5UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::Bc5SnormBlock, C_RGBA, 16, SNorm, 4, 4),
    compressed(Format::Bc6hUfloatBlock, C_RGBA, 16, UFloat, 4, 4),
    compressed(Format::Bc6hSfloatBlock, C_RGBA, 16, SFloat, 4, 4),
    compressed(Format::Bc7UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::Bc7SrgbBlock, C_RGBA, 16, Srgb, 4, 4),
    compressed(Format::Etc2R8G8B8UnormBlock, C_RGB, 8, UNorm, 4, 4),
    compressed(Format::Etc2R8G8B8SrgbBlock, C_RGB, 8, Srgb, 4, 4),
    compressed(Format::Etc2R8G8B8A1UnormBlock, C_RGBA, 8, UNorm, 4, 4),
    compressed(Format::Etc2R8G8B8A1SrgbBlock, C_RGBA, 8, Srgb, 4, 4),
    compressed(Format::Etc2R8G8B8A8UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::Etc2R8G8B8A8SrgbBlock, C_RGBA, 16, Srgb, 4, 4),
    compressed(Format::EacR11UnormBlock, C_RGBA, 8, UNorm, 4, 4),
    compressed(Format::EacR11SnormBlock, C_RGBA, 8, SNorm, 4, 4),
    compressed(Format::EacR11G11UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::EacR11G11SnormBlock, C_RGBA, 16, SNorm, 4, 4),
    compressed(Format::Astc4x4UnormBlock, C_RGBA, 16, UNorm, 4, 4),
    compressed(Format::Astc4x4SrgbBlock, C_RGBA, 16, Srgb, 4, 4),
    compressed(Format::Astc5x4UnormBlock, C_RGBA, 16, UNorm, 5, 4),
    compressed(Format::Astc5x4SrgbBlock, C_RGBA, 16, Srgb, 5, 4),
    compressed(Format::Astc5x5UnormBlock, C_RGBA, 16, UNorm, 5, 5),
    compressed(Format::Astc5x5SrgbBlock, C_RGBA, 16, Srgb, 5, 5),
    compressed(Format::Astc6x5UnormBlock, C_RGBA, 16, UNorm, 6, 5),
    compressed(Format::Astc6x5SrgbBlock, C_RGBA, 16, Srgb, 6, 5),
    compressed(Format::Astc6x6UnormBlock, C_RGBA, 16, UNorm, 6, 6),
    compressed(Format::Astc6x6SrgbBlock, C_RGBA, 16, Srgb, 6, 6),
    compressed(Format::Astc8x5UnormBlock, C_RGBA, 16, UNorm, 8, 5),
    compressed(Format::Astc8x5SrgbBlock, C_RGBA, 16, Srgb, 8, 5),
    compressed(Format::Astc8x6UnormBlock, C_RGBA, 16, UNorm, 8, 6),
    compressed(Format::Astc8x6SrgbBlock, C_RGBA, 16, Srgb, 8, 6),
    compressed(Format::Astc8x8UnormBlock, C_RGBA, 16, UNorm, 8, 8),
    compressed(Format::Astc8x8SrgbBlock, C_RGBA, 16, Srgb, 8, 8),
    compressed(Format::Astc10x5UnormBlock, C_RGBA, 16, UNorm, 10, 5),
    compressed(Format::Astc10x5SrgbBlock, C_RGBA, 16, Srgb, 10, 5),
    compressed(Format::Astc10x6UnormBlock, C_RGBA, 16, UNorm, 10, 6),
    compressed(Format::Astc10x6SrgbBlock, C_RGBA, 16, Srgb, 10, 6),
    compressed(Format::Astc10x8UnormBlock, C_RGBA, 16, UNorm, 10, 8),
    compressed(Format::Astc10x8SrgbBlock, C_RGBA, 16, Srgb, 10, 8),
    compressed(Format::Astc10x10UnormBlock, C_RGBA, 16, UNorm, 10, 10),
    compressed(Format::Astc10x10SrgbBlock, C_RGBA, 16, Srgb, 10, 10),
    compressed(Format::Astc12x10UnormBlock, C_RGBA, 16, UNorm, 12, 10),
    compressed(Format::Astc12x10SrgbBlock, C_RGBA, 16, Srgb, 12, 10),
    compressed(Format::Astc12x12UnormBlock, C_RGBA, 16, UNorm, 12, 12),
    compressed(Format::Astc12x12SrgbBlock, C_RGBA, 16, Srgb, 12, 12),
    planar(Format::G8B8G8R8422Unorm, Planar, C_RGBA, 4),
    planar(Format::B8G8R8G8422Unorm, Planar, C_RGBA, 4),
    planar(Format::G8B8R83Plane420Unorm, PlanarSamplable, C_RGB, 2),
    planar(Format::G8B8R82Plane420Unorm, PlanarSamplable, C_RGBA, 4),
];

/// Looks up the descriptor for `format`.
///
/// Total over the format set and `O(1)`.
pub fn format_info(format: Format) -> &'static FormatInfo {
    let info = &FORMATS[format as usize];
    debug_assert_eq!(info.format, format);
    info
}

/// Returns the feature masks advertised for `format`.
pub fn format_features(format: Format) -> FormatFeatureSet {
    let info = format_info(format);

    let full = FormatFeatures::all();
    match info.kind {
        FormatKind::Normal | FormatKind::Packed => FormatFeatureSet {
            linear: full,
            optimal: full,
            buffer: full,
        },
        FormatKind::DepthStencil => FormatFeatureSet {
            linear: full,
            optimal: full,
            buffer: full,
        },
        FormatKind::Compressed => FormatFeatureSet {
            linear: full,
            optimal: full,
            buffer: FormatFeatures::empty(),
        },
        FormatKind::Planar => FormatFeatureSet {
            linear: FormatFeatures::empty(),
            optimal: FormatFeatures::empty(),
            buffer: FormatFeatures::empty(),
        },
        FormatKind::PlanarSamplable => FormatFeatureSet {
            linear: FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::TRANSFER_SRC
                | FormatFeatures::TRANSFER_DST,
            optimal: FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::TRANSFER_SRC
                | FormatFeatures::TRANSFER_DST,
            buffer: FormatFeatures::empty(),
        },
    }
}
