//! Per-format pixel encode/decode routines.
//!
//! A [`PixelCodec`] bundles the routines for one format. Selection
//! happens once, when the codec is built; the per-pixel path is a call
//! through a plain `fn` pointer. Codecs for unsupported formats cannot be
//! built at all; requesting one is fatal.

use half::f16;

use super::compressed;
use super::{format_info, Format, FormatInfo, FormatKind, NumericType, INVALID_OFFSET};

/// Largest block pixel count among the advertised compressed families.
pub const MAX_BLOCK_PIXELS: usize = 16;

/// A clear colour in one of the canonical representations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClearColor {
    Float([f32; 4]),
    Int([i32; 4]),
    Uint([u32; 4]),
}

type GetF32 = fn(&FormatInfo, &[u8], &mut [f32; 4]);
type GetI32 = fn(&FormatInfo, &[u8], &mut [i32; 4]);
type GetU32 = fn(&FormatInfo, &[u8], &mut [u32; 4]);
type SetF32 = fn(&FormatInfo, &mut [u8], [f32; 4]);
type SetI32 = fn(&FormatInfo, &mut [u8], [i32; 4]);
type SetU32 = fn(&FormatInfo, &mut [u8], [u32; 4]);
type GetDepth = fn(&FormatInfo, &[u8]) -> f32;
type GetStencil = fn(&FormatInfo, &[u8]) -> u8;
type SetDepthStencil = fn(&FormatInfo, &mut [u8], f32, u8);
type DecodeBlock = fn(&FormatInfo, &[u8], &mut [[f32; 4]; MAX_BLOCK_PIXELS]);

/// The encode/decode routines for one format.
#[derive(Copy, Clone)]
pub struct PixelCodec {
    info: &'static FormatInfo,
    get_f32: GetF32,
    get_i32: GetI32,
    get_u32: GetU32,
    set_f32: SetF32,
    set_i32: SetI32,
    set_u32: SetU32,
    get_depth: GetDepth,
    get_stencil: GetStencil,
    set_depth_stencil: SetDepthStencil,
    decode_block: Option<DecodeBlock>,
}

impl PixelCodec {
    /// Builds the codec for `format`.
    ///
    /// Fatal for formats outside the advertised codec set (64-bit
    /// channels, planar formats, compressed families other than BC).
    pub fn new(format: Format) -> Self {
        let info = format_info(format);

        match info.kind {
            FormatKind::Normal | FormatKind::Packed => Self::new_color(info),
            FormatKind::DepthStencil => Self::new_depth_stencil(info),
            FormatKind::Compressed => Self::new_compressed(info),
            FormatKind::Planar | FormatKind::PlanarSamplable => {
                panic!("unsupported format for pixel codec: {format:?} (planar)")
            }
        }
    }

    fn new_color(info: &'static FormatInfo) -> Self {
        let (get_f32, set_f32): (GetF32, SetF32) = match (info.kind, info.numeric) {
            (FormatKind::Normal, NumericType::SFloat) => match info.element_size {
                2 => (get_f32_normal_f16, set_f32_normal_f16),
                4 => (get_f32_normal_f32, set_f32_normal_f32),
                _ => panic!(
                    "unsupported format for pixel codec: {:?} ({}-byte float channels)",
                    info.format, info.element_size
                ),
            },
            (FormatKind::Normal, NumericType::Srgb) => (get_f32_normal_srgb, set_f32_normal_srgb),
            (FormatKind::Normal, _) => {
                if info.element_size > 4 {
                    panic!(
                        "unsupported format for pixel codec: {:?} ({}-byte channels)",
                        info.format, info.element_size
                    );
                }
                (get_f32_normal_int, set_f32_normal_int)
            }
            (FormatKind::Packed, NumericType::UFloat) => match info.format {
                Format::B10G11R11UfloatPack32 => (get_f32_b10g11r11, set_f32_b10g11r11),
                Format::E5B9G9R9UfloatPack32 => (get_f32_e5b9g9r9, set_f32_e5b9g9r9),
                _ => panic!("unsupported format for pixel codec: {:?}", info.format),
            },
            (FormatKind::Packed, NumericType::Srgb) => (get_f32_packed_srgb, set_f32_packed_srgb),
            (FormatKind::Packed, _) => (get_f32_packed_int, set_f32_packed_int),
            _ => unreachable!(),
        };

        let (get_i32, get_u32, set_i32, set_u32): (GetI32, GetU32, SetI32, SetU32) =
            match info.kind {
                FormatKind::Normal => (
                    get_i32_normal,
                    get_u32_normal,
                    set_i32_normal,
                    set_u32_normal,
                ),
                FormatKind::Packed => (
                    get_i32_packed,
                    get_u32_packed,
                    set_i32_packed,
                    set_u32_packed,
                ),
                _ => unreachable!(),
            };

        Self {
            info,
            get_f32,
            get_i32,
            get_u32,
            set_f32,
            set_i32,
            set_u32,
            get_depth: no_depth,
            get_stencil: no_stencil,
            set_depth_stencil: no_set_depth_stencil,
            decode_block: None,
        }
    }

    fn new_depth_stencil(info: &'static FormatInfo) -> Self {
        let (get_depth, set_depth_stencil): (GetDepth, SetDepthStencil) = match info.format {
            Format::D16Unorm | Format::D16UnormS8Uint => (get_depth_d16, set_depth_stencil_d16),
            Format::X8D24UnormPack32 | Format::D24UnormS8Uint => {
                (get_depth_d24, set_depth_stencil_d24)
            }
            Format::D32Sfloat | Format::D32SfloatS8Uint => (get_depth_d32, set_depth_stencil_d32),
            Format::S8Uint => (no_depth, set_depth_stencil_s8),
            _ => unreachable!(),
        };

        let get_stencil: GetStencil = if info.has_stencil() {
            get_stencil_u8
        } else {
            no_stencil
        };

        Self {
            info,
            get_f32: get_f32_depth,
            get_i32: get_i32_unsupported,
            get_u32: get_u32_depth,
            set_f32: set_f32_depth,
            set_i32: set_i32_unsupported,
            set_u32: set_u32_depth,
            get_depth,
            get_stencil,
            set_depth_stencil,
            decode_block: None,
        }
    }

    fn new_compressed(info: &'static FormatInfo) -> Self {
        let decode: DecodeBlock = match info.format {
            Format::Bc1RgbUnormBlock | Format::Bc1RgbSrgbBlock => compressed::decode_bc1_rgb,
            Format::Bc1RgbaUnormBlock | Format::Bc1RgbaSrgbBlock => compressed::decode_bc1_rgba,
            Format::Bc2UnormBlock | Format::Bc2SrgbBlock => compressed::decode_bc2,
            Format::Bc3UnormBlock | Format::Bc3SrgbBlock => compressed::decode_bc3,
            Format::Bc4UnormBlock => compressed::decode_bc4_unorm,
            Format::Bc4SnormBlock => compressed::decode_bc4_snorm,
            Format::Bc5UnormBlock => compressed::decode_bc5_unorm,
            Format::Bc5SnormBlock => compressed::decode_bc5_snorm,
            _ => panic!(
                "unsupported format for pixel codec: {:?} (compressed family not advertised)",
                info.format
            ),
        };

        Self {
            info,
            get_f32: get_f32_unsupported,
            get_i32: get_i32_unsupported,
            get_u32: get_u32_unsupported,
            set_f32: set_f32_unsupported,
            set_i32: set_i32_unsupported,
            set_u32: set_u32_unsupported,
            get_depth: no_depth,
            get_stencil: no_stencil,
            set_depth_stencil: no_set_depth_stencil,
            decode_block: Some(decode),
        }
    }

    pub fn format(&self) -> Format {
        self.info.format
    }

    /// Reads one pixel as canonical floats.
    pub fn read_f32(&self, pixel: &[u8]) -> [f32; 4] {
        let mut out = [0.0; 4];
        (self.get_f32)(self.info, pixel, &mut out);
        out
    }

    /// Reads the texel at `(x, y)` inside a compressed block.
    pub fn read_f32_at(&self, block: &[u8], x: u32, y: u32) -> [f32; 4] {
        let decode = self
            .decode_block
            .unwrap_or_else(|| panic!("{:?} is not a compressed format", self.info.format));
        let mut texels = [[0.0; 4]; MAX_BLOCK_PIXELS];
        decode(self.info, block, &mut texels);

        let mut texel = texels[(y * self.info.block_width + x) as usize];
        if self.info.numeric == NumericType::Srgb {
            for value in texel.iter_mut().take(3) {
                *value = srgb_to_linear(*value);
            }
        }
        texel
    }

    /// Reads one pixel as raw signed channel values.
    pub fn read_i32(&self, pixel: &[u8]) -> [i32; 4] {
        let mut out = [0; 4];
        (self.get_i32)(self.info, pixel, &mut out);
        out
    }

    /// Reads one pixel as raw unsigned channel values.
    pub fn read_u32(&self, pixel: &[u8]) -> [u32; 4] {
        let mut out = [0; 4];
        (self.get_u32)(self.info, pixel, &mut out);
        out
    }

    pub fn read_depth(&self, pixel: &[u8]) -> f32 {
        (self.get_depth)(self.info, pixel)
    }

    pub fn read_stencil(&self, pixel: &[u8]) -> u8 {
        (self.get_stencil)(self.info, pixel)
    }

    /// Writes one pixel from canonical floats, clamping to the channel
    /// range and rounding to nearest.
    pub fn write_f32(&self, pixel: &mut [u8], values: [f32; 4]) {
        (self.set_f32)(self.info, pixel, values);
    }

    pub fn write_i32(&self, pixel: &mut [u8], values: [i32; 4]) {
        (self.set_i32)(self.info, pixel, values);
    }

    pub fn write_u32(&self, pixel: &mut [u8], values: [u32; 4]) {
        (self.set_u32)(self.info, pixel, values);
    }

    pub fn write_depth_stencil(&self, pixel: &mut [u8], depth: f32, stencil: u8) {
        (self.set_depth_stencil)(self.info, pixel, depth, stencil);
    }

    pub fn write_clear(&self, pixel: &mut [u8], color: ClearColor) {
        match color {
            ClearColor::Float(values) => self.write_f32(pixel, values),
            ClearColor::Int(values) => self.write_i32(pixel, values),
            ClearColor::Uint(values) => self.write_u32(pixel, values),
        }
    }
}

impl std::fmt::Debug for PixelCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelCodec")
            .field("format", &self.info.format)
            .finish_non_exhaustive()
    }
}

// ---- shared channel helpers ----

fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

fn unorm_decode(raw: u32, bits: u32) -> f32 {
    raw as f32 / (((1u64 << bits) - 1) as f32)
}

fn snorm_decode(raw: u32, bits: u32) -> f32 {
    let max = ((1u64 << (bits - 1)) - 1) as f32;
    (sign_extend(raw, bits) as f32 / max).max(-1.0)
}

fn unorm_encode(value: f32, bits: u32) -> u32 {
    let max = ((1u64 << bits) - 1) as f32;
    (value.clamp(0.0, 1.0) * max).round() as u32
}

fn snorm_encode(value: f32, bits: u32) -> u32 {
    let max = ((1u64 << (bits - 1)) - 1) as f32;
    let encoded = (value.clamp(-1.0, 1.0) * max).round() as i32;
    (encoded as u32) & (((1u64 << bits) - 1) as u32)
}

fn uint_encode(value: f32, bits: u32) -> u32 {
    let max = ((1u64 << bits) - 1) as f32;
    value.clamp(0.0, max).round() as u32
}

fn sint_encode(value: f32, bits: u32) -> u32 {
    let min = -((1i64 << (bits - 1)) as f32);
    let max = ((1i64 << (bits - 1)) - 1) as f32;
    let encoded = value.clamp(min, max).round() as i32;
    (encoded as u32) & (((1u64 << bits) - 1) as u32)
}

fn decode_channel(raw: u32, bits: u32, numeric: NumericType) -> f32 {
    match numeric {
        NumericType::UNorm => unorm_decode(raw, bits),
        NumericType::SNorm => snorm_decode(raw, bits),
        NumericType::UScaled | NumericType::UInt => raw as f32,
        NumericType::SScaled | NumericType::SInt => sign_extend(raw, bits) as f32,
        NumericType::Srgb | NumericType::UFloat | NumericType::SFloat => {
            unreachable!("handled by dedicated routines")
        }
    }
}

fn encode_channel(value: f32, bits: u32, numeric: NumericType) -> u32 {
    match numeric {
        NumericType::UNorm => unorm_encode(value, bits),
        NumericType::SNorm => snorm_encode(value, bits),
        NumericType::UScaled | NumericType::UInt => uint_encode(value, bits),
        NumericType::SScaled | NumericType::SInt => sint_encode(value, bits),
        NumericType::Srgb | NumericType::UFloat | NumericType::SFloat => {
            unreachable!("handled by dedicated routines")
        }
    }
}

fn srgb_to_linear(value: f32) -> f32 {
    if value > 0.04045 {
        ((value + 0.055) / 1.055).powf(2.4)
    } else {
        value / 12.92
    }
}

fn linear_to_srgb(value: f32) -> f32 {
    if value > 0.003_130_8 {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    } else {
        value * 12.92
    }
}

/// Default value of an absent channel: 0, or 1 for alpha.
fn missing_channel(channel: usize) -> f32 {
    if channel == 3 {
        1.0
    } else {
        0.0
    }
}

// ---- normal-format channel access ----

fn load_raw(info: &FormatInfo, pixel: &[u8], channel: usize) -> Option<u32> {
    let offset = info.normal_offset[channel];
    if offset == INVALID_OFFSET {
        return None;
    }

    let start = (offset * info.element_size) as usize;
    let raw = match info.element_size {
        1 => u32::from(pixel[start]),
        2 => u32::from(u16::from_le_bytes([pixel[start], pixel[start + 1]])),
        4 => u32::from_le_bytes([
            pixel[start],
            pixel[start + 1],
            pixel[start + 2],
            pixel[start + 3],
        ]),
        _ => unreachable!(),
    };
    Some(raw)
}

fn store_raw(info: &FormatInfo, pixel: &mut [u8], channel: usize, raw: u32) {
    let offset = info.normal_offset[channel];
    if offset == INVALID_OFFSET {
        return;
    }

    let start = (offset * info.element_size) as usize;
    match info.element_size {
        1 => pixel[start] = raw as u8,
        2 => pixel[start..start + 2].copy_from_slice(&(raw as u16).to_le_bytes()),
        4 => pixel[start..start + 4].copy_from_slice(&raw.to_le_bytes()),
        _ => unreachable!(),
    }
}

fn get_f32_normal_int(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    let bits = info.element_size * 8;
    for channel in 0..4 {
        out[channel] = match load_raw(info, pixel, channel) {
            Some(raw) => decode_channel(raw, bits, info.numeric),
            None => missing_channel(channel),
        };
    }
}

fn set_f32_normal_int(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    let bits = info.element_size * 8;
    for channel in 0..4 {
        store_raw(
            info,
            pixel,
            channel,
            encode_channel(values[channel], bits, info.numeric),
        );
    }
}

fn get_f32_normal_f16(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    for channel in 0..4 {
        out[channel] = match load_raw(info, pixel, channel) {
            Some(raw) => f16::from_bits(raw as u16).to_f32(),
            None => missing_channel(channel),
        };
    }
}

fn set_f32_normal_f16(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    for channel in 0..4 {
        store_raw(
            info,
            pixel,
            channel,
            u32::from(f16::from_f32(values[channel]).to_bits()),
        );
    }
}

fn get_f32_normal_f32(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    for channel in 0..4 {
        out[channel] = match load_raw(info, pixel, channel) {
            Some(raw) => f32::from_bits(raw),
            None => missing_channel(channel),
        };
    }
}

fn set_f32_normal_f32(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    for channel in 0..4 {
        store_raw(info, pixel, channel, values[channel].to_bits());
    }
}

fn get_f32_normal_srgb(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    for channel in 0..4 {
        out[channel] = match load_raw(info, pixel, channel) {
            Some(raw) => {
                let value = unorm_decode(raw, 8);
                if channel == 3 {
                    value
                } else {
                    srgb_to_linear(value)
                }
            }
            None => missing_channel(channel),
        };
    }
}

fn set_f32_normal_srgb(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    for channel in 0..4 {
        let value = if channel == 3 {
            values[channel]
        } else {
            linear_to_srgb(values[channel].clamp(0.0, 1.0))
        };
        store_raw(info, pixel, channel, unorm_encode(value, 8));
    }
}

fn get_i32_normal(info: &FormatInfo, pixel: &[u8], out: &mut [i32; 4]) {
    let bits = info.element_size * 8;
    for channel in 0..4 {
        out[channel] = match load_raw(info, pixel, channel) {
            Some(raw) => sign_extend(raw, bits),
            None => i32::from(channel == 3),
        };
    }
}

fn get_u32_normal(info: &FormatInfo, pixel: &[u8], out: &mut [u32; 4]) {
    for channel in 0..4 {
        out[channel] = match load_raw(info, pixel, channel) {
            Some(raw) => raw,
            None => u32::from(channel == 3),
        };
    }
}

fn set_i32_normal(info: &FormatInfo, pixel: &mut [u8], values: [i32; 4]) {
    let bits = info.element_size * 8;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    for channel in 0..4 {
        let clamped = i64::from(values[channel]).clamp(min, max);
        let mask = ((1u64 << bits) - 1) as u32;
        store_raw(info, pixel, channel, (clamped as u32) & mask);
    }
}

fn set_u32_normal(info: &FormatInfo, pixel: &mut [u8], values: [u32; 4]) {
    let bits = info.element_size * 8;
    let max = (1u64 << bits) - 1;
    for channel in 0..4 {
        let clamped = u64::from(values[channel]).min(max);
        store_raw(info, pixel, channel, clamped as u32);
    }
}

// ---- packed-format channel access ----

fn load_word(info: &FormatInfo, pixel: &[u8]) -> u32 {
    match info.total_size {
        1 => u32::from(pixel[0]),
        2 => u32::from(u16::from_le_bytes([pixel[0], pixel[1]])),
        4 => u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]),
        _ => unreachable!(),
    }
}

fn store_word(info: &FormatInfo, pixel: &mut [u8], word: u32) {
    match info.total_size {
        1 => pixel[0] = word as u8,
        2 => pixel[..2].copy_from_slice(&(word as u16).to_le_bytes()),
        4 => pixel[..4].copy_from_slice(&word.to_le_bytes()),
        _ => unreachable!(),
    }
}

fn extract(word: u32, info: &FormatInfo, channel: usize) -> Option<u32> {
    let offset = info.packed_offset[channel];
    if offset == INVALID_OFFSET {
        return None;
    }

    let bits = info.packed_bits[channel];
    Some((word >> offset) & (((1u64 << bits) - 1) as u32))
}

fn get_f32_packed_int(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    let word = load_word(info, pixel);
    for channel in 0..4 {
        out[channel] = match extract(word, info, channel) {
            Some(raw) => decode_channel(raw, info.packed_bits[channel], info.numeric),
            None => missing_channel(channel),
        };
    }
}

fn set_f32_packed_int(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    let mut word = 0;
    for channel in 0..4 {
        let offset = info.packed_offset[channel];
        if offset == INVALID_OFFSET {
            continue;
        }
        let raw = encode_channel(values[channel], info.packed_bits[channel], info.numeric);
        word |= raw << offset;
    }
    store_word(info, pixel, word);
}

fn get_f32_packed_srgb(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    let word = load_word(info, pixel);
    for channel in 0..4 {
        out[channel] = match extract(word, info, channel) {
            Some(raw) => {
                let value = unorm_decode(raw, info.packed_bits[channel]);
                if channel == 3 {
                    value
                } else {
                    srgb_to_linear(value)
                }
            }
            None => missing_channel(channel),
        };
    }
}

fn set_f32_packed_srgb(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    let mut word = 0;
    for channel in 0..4 {
        let offset = info.packed_offset[channel];
        if offset == INVALID_OFFSET {
            continue;
        }
        let value = if channel == 3 {
            values[channel]
        } else {
            linear_to_srgb(values[channel].clamp(0.0, 1.0))
        };
        word |= unorm_encode(value, info.packed_bits[channel]) << offset;
    }
    store_word(info, pixel, word);
}

fn get_i32_packed(info: &FormatInfo, pixel: &[u8], out: &mut [i32; 4]) {
    let word = load_word(info, pixel);
    for channel in 0..4 {
        out[channel] = match extract(word, info, channel) {
            Some(raw) => sign_extend(raw, info.packed_bits[channel]),
            None => i32::from(channel == 3),
        };
    }
}

fn get_u32_packed(info: &FormatInfo, pixel: &[u8], out: &mut [u32; 4]) {
    let word = load_word(info, pixel);
    for channel in 0..4 {
        out[channel] = match extract(word, info, channel) {
            Some(raw) => raw,
            None => u32::from(channel == 3),
        };
    }
}

fn set_i32_packed(info: &FormatInfo, pixel: &mut [u8], values: [i32; 4]) {
    let mut word = 0;
    for channel in 0..4 {
        let offset = info.packed_offset[channel];
        if offset == INVALID_OFFSET {
            continue;
        }
        let bits = info.packed_bits[channel];
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        let clamped = i64::from(values[channel]).clamp(min, max);
        let mask = ((1u64 << bits) - 1) as u32;
        word |= ((clamped as u32) & mask) << offset;
    }
    store_word(info, pixel, word);
}

fn set_u32_packed(info: &FormatInfo, pixel: &mut [u8], values: [u32; 4]) {
    let mut word = 0;
    for channel in 0..4 {
        let offset = info.packed_offset[channel];
        if offset == INVALID_OFFSET {
            continue;
        }
        let bits = info.packed_bits[channel];
        let max = (1u64 << bits) - 1;
        let clamped = u64::from(values[channel]).min(max) as u32;
        word |= clamped << offset;
    }
    store_word(info, pixel, word);
}

// ---- shared-exponent and small-float packs ----

/// Narrows an f16 bit pattern to an unsigned float with the same 5-bit
/// exponent and a `mantissa_bits`-wide mantissa (the f11/f10 encodings).
fn f32_to_ufloat(value: f32, mantissa_bits: u32) -> u32 {
    // Negative, zero and NaN all encode as zero.
    if value <= 0.0 || value.is_nan() {
        return 0;
    }

    let half_bits = u32::from(f16::from_f32(value).to_bits());
    (half_bits & 0x7FFF) >> (10 - mantissa_bits)
}

fn ufloat_to_f32(raw: u32, mantissa_bits: u32) -> f32 {
    f16::from_bits(((raw << (10 - mantissa_bits)) & 0x7FFF) as u16).to_f32()
}

fn get_f32_b10g11r11(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    let word = load_word(info, pixel);
    out[0] = ufloat_to_f32(word & 0x7FF, 6);
    out[1] = ufloat_to_f32((word >> 11) & 0x7FF, 6);
    out[2] = ufloat_to_f32((word >> 22) & 0x3FF, 5);
    out[3] = 1.0;
}

fn set_f32_b10g11r11(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    let word = f32_to_ufloat(values[0], 6)
        | (f32_to_ufloat(values[1], 6) << 11)
        | (f32_to_ufloat(values[2], 5) << 22);
    store_word(info, pixel, word);
}

const RGB9E5_EXP_BIAS: i32 = 15;
const RGB9E5_MANTISSA_BITS: i32 = 9;
const RGB9E5_MAX_EXP: i32 = 31;

fn exp2i(exponent: i32) -> f32 {
    (exponent as f32).exp2()
}

fn rgb9e5_max_value() -> f32 {
    let max_mantissa = ((1 << RGB9E5_MANTISSA_BITS) - 1) as f32 / (1 << RGB9E5_MANTISSA_BITS) as f32;
    max_mantissa * exp2i(RGB9E5_MAX_EXP - RGB9E5_EXP_BIAS)
}

fn get_f32_e5b9g9r9(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    let word = load_word(info, pixel);
    let exponent = ((word >> 27) & 0x1F) as i32;
    let scale = exp2i(exponent - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    out[0] = (word & 0x1FF) as f32 * scale;
    out[1] = ((word >> 9) & 0x1FF) as f32 * scale;
    out[2] = ((word >> 18) & 0x1FF) as f32 * scale;
    out[3] = 1.0;
}

fn set_f32_e5b9g9r9(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    let limit = rgb9e5_max_value();
    let clamp = |v: f32| {
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, limit)
        }
    };

    let red = clamp(values[0]);
    let green = clamp(values[1]);
    let blue = clamp(values[2]);
    let max = red.max(green).max(blue);

    // Shared exponent from the largest component, with half an ulp
    // injected so mantissa extraction rounds instead of truncating.
    let mut exponent = (-RGB9E5_EXP_BIAS - 1).max(max.log2().floor() as i32) + 1 + RGB9E5_EXP_BIAS;
    let mut scale = exp2i(exponent - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    if (max / scale + 0.5).floor() as u32 == 1 << RGB9E5_MANTISSA_BITS {
        exponent += 1;
        scale = exp2i(exponent - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    }

    let encode = |v: f32| ((v / scale + 0.5).floor() as u32).min((1 << RGB9E5_MANTISSA_BITS) - 1);
    let word = encode(red)
        | (encode(green) << 9)
        | (encode(blue) << 18)
        | ((exponent.clamp(0, RGB9E5_MAX_EXP) as u32) << 27);
    store_word(info, pixel, word);
}

// ---- depth/stencil ----

fn get_depth_d16(_: &FormatInfo, pixel: &[u8]) -> f32 {
    unorm_decode(u32::from(u16::from_le_bytes([pixel[0], pixel[1]])), 16)
}

fn get_depth_d24(_: &FormatInfo, pixel: &[u8]) -> f32 {
    let raw = u32::from_le_bytes([pixel[0], pixel[1], pixel[2], 0]);
    unorm_decode(raw & 0x00FF_FFFF, 24)
}

fn get_depth_d32(_: &FormatInfo, pixel: &[u8]) -> f32 {
    f32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]])
}

fn get_stencil_u8(info: &FormatInfo, pixel: &[u8]) -> u8 {
    pixel[info.stencil_offset as usize]
}

fn set_depth_stencil_d16(info: &FormatInfo, pixel: &mut [u8], depth: f32, stencil: u8) {
    let raw = unorm_encode(depth, 16) as u16;
    pixel[..2].copy_from_slice(&raw.to_le_bytes());
    if info.has_stencil() {
        pixel[info.stencil_offset as usize] = stencil;
    }
}

fn set_depth_stencil_d24(info: &FormatInfo, pixel: &mut [u8], depth: f32, stencil: u8) {
    let raw = unorm_encode(depth, 24);
    pixel[0] = raw as u8;
    pixel[1] = (raw >> 8) as u8;
    pixel[2] = (raw >> 16) as u8;
    if info.has_stencil() {
        pixel[info.stencil_offset as usize] = stencil;
    } else {
        pixel[3] = 0;
    }
}

fn set_depth_stencil_d32(info: &FormatInfo, pixel: &mut [u8], depth: f32, stencil: u8) {
    pixel[..4].copy_from_slice(&depth.to_le_bytes());
    if info.has_stencil() {
        pixel[info.stencil_offset as usize] = stencil;
    }
}

fn set_depth_stencil_s8(_: &FormatInfo, pixel: &mut [u8], _: f32, stencil: u8) {
    pixel[0] = stencil;
}

fn get_f32_depth(info: &FormatInfo, pixel: &[u8], out: &mut [f32; 4]) {
    let codec_depth = match info.format {
        Format::D16Unorm | Format::D16UnormS8Uint => get_depth_d16(info, pixel),
        Format::X8D24UnormPack32 | Format::D24UnormS8Uint => get_depth_d24(info, pixel),
        Format::D32Sfloat | Format::D32SfloatS8Uint => get_depth_d32(info, pixel),
        _ => 0.0,
    };
    *out = [codec_depth, 0.0, 0.0, 1.0];
}

fn set_f32_depth(info: &FormatInfo, pixel: &mut [u8], values: [f32; 4]) {
    let stencil = if info.has_stencil() {
        pixel[info.stencil_offset as usize]
    } else {
        0
    };
    match info.format {
        Format::D16Unorm | Format::D16UnormS8Uint => {
            set_depth_stencil_d16(info, pixel, values[0], stencil)
        }
        Format::X8D24UnormPack32 | Format::D24UnormS8Uint => {
            set_depth_stencil_d24(info, pixel, values[0], stencil)
        }
        Format::D32Sfloat | Format::D32SfloatS8Uint => {
            set_depth_stencil_d32(info, pixel, values[0], stencil)
        }
        _ => {}
    }
}

fn get_u32_depth(info: &FormatInfo, pixel: &[u8], out: &mut [u32; 4]) {
    let stencil = if info.has_stencil() {
        u32::from(pixel[info.stencil_offset as usize])
    } else {
        0
    };
    *out = [stencil, 0, 0, 1];
}

fn set_u32_depth(info: &FormatInfo, pixel: &mut [u8], values: [u32; 4]) {
    if info.has_stencil() {
        pixel[info.stencil_offset as usize] = values[0].min(255) as u8;
    }
}

// ---- refusal stubs ----

fn no_depth(info: &FormatInfo, _: &[u8]) -> f32 {
    panic!("{:?} has no depth aspect", info.format)
}

fn no_stencil(info: &FormatInfo, _: &[u8]) -> u8 {
    panic!("{:?} has no stencil aspect", info.format)
}

fn no_set_depth_stencil(info: &FormatInfo, _: &mut [u8], _: f32, _: u8) {
    panic!("{:?} has no depth/stencil aspect", info.format)
}

fn get_f32_unsupported(info: &FormatInfo, _: &[u8], _: &mut [f32; 4]) {
    panic!("unsupported per-pixel read for {:?}", info.format)
}

fn get_i32_unsupported(info: &FormatInfo, _: &[u8], _: &mut [i32; 4]) {
    panic!("unsupported per-pixel read for {:?}", info.format)
}

fn get_u32_unsupported(info: &FormatInfo, _: &[u8], _: &mut [u32; 4]) {
    panic!("unsupported per-pixel read for {:?}", info.format)
}

fn set_f32_unsupported(info: &FormatInfo, _: &mut [u8], _: [f32; 4]) {
    panic!("unsupported per-pixel write for {:?}", info.format)
}

fn set_i32_unsupported(info: &FormatInfo, _: &mut [u8], _: [i32; 4]) {
    panic!("unsupported per-pixel write for {:?}", info.format)
}

fn set_u32_unsupported(info: &FormatInfo, _: &mut [u8], _: [u32; 4]) {
    panic!("unsupported per-pixel write for {:?}", info.format)
}

#[cfg(test)]
mod tests {
    use super::{ClearColor, PixelCodec};
    use crate::format::Format;

    #[test]
    fn rgba8_unorm_roundtrip() {
        let codec = PixelCodec::new(Format::R8G8B8A8Unorm);
        let mut pixel = [0u8; 4];
        codec.write_f32(&mut pixel, [1.0, 0.0, 0.5, 1.0]);
        assert_eq!(pixel, [0xFF, 0x00, 0x80, 0xFF]);

        let values = codec.read_f32(&pixel);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 0.0);
        assert!((values[2] - 0.5).abs() < 1.0 / 255.0);
        assert_eq!(values[3], 1.0);
    }

    #[test]
    fn bgra8_swizzles() {
        let codec = PixelCodec::new(Format::B8G8R8A8Unorm);
        let mut pixel = [0u8; 4];
        codec.write_f32(&mut pixel, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(pixel, [0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn missing_alpha_reads_one() {
        let codec = PixelCodec::new(Format::R8G8B8Unorm);
        let pixel = [0u8; 3];
        assert_eq!(codec.read_f32(&pixel)[3], 1.0);
    }

    #[test]
    fn snorm_clamps_most_negative() {
        let codec = PixelCodec::new(Format::R8Snorm);
        let pixel = [0x80u8]; // -128
        assert_eq!(codec.read_f32(&pixel)[0], -1.0);
    }

    #[test]
    fn packed_565_roundtrip() {
        let codec = PixelCodec::new(Format::R5G6B5UnormPack16);
        let mut pixel = [0u8; 2];
        codec.write_f32(&mut pixel, [1.0, 0.0, 1.0, 1.0]);
        let word = u16::from_le_bytes(pixel);
        assert_eq!(word, 0b11111_000000_11111);
    }

    #[test]
    fn srgb_is_nonlinear() {
        let codec = PixelCodec::new(Format::R8G8B8A8Srgb);
        let mut pixel = [0u8; 4];
        codec.write_f32(&mut pixel, [0.5, 0.5, 0.5, 0.5]);
        // Colour channels go through the transfer curve, alpha stays
        // linear.
        assert_eq!(pixel[0], 188);
        assert_eq!(pixel[3], 128);

        let back = codec.read_f32(&pixel);
        assert!((back[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn depth24_masks_low_bits() {
        let codec = PixelCodec::new(Format::D24UnormS8Uint);
        let mut pixel = [0u8; 4];
        codec.write_depth_stencil(&mut pixel, 1.0, 0xAB);
        assert_eq!(pixel, [0xFF, 0xFF, 0xFF, 0xAB]);
        assert_eq!(codec.read_depth(&pixel), 1.0);
        assert_eq!(codec.read_stencil(&pixel), 0xAB);
    }

    #[test]
    fn depth32_is_raw_float() {
        let codec = PixelCodec::new(Format::D32Sfloat);
        let mut pixel = [0u8; 4];
        codec.write_depth_stencil(&mut pixel, 0.75, 0);
        assert_eq!(codec.read_depth(&pixel), 0.75);
    }

    #[test]
    fn uint_write_clamps() {
        let codec = PixelCodec::new(Format::R8Uint);
        let mut pixel = [0u8];
        codec.write_u32(&mut pixel, [300, 0, 0, 0]);
        assert_eq!(pixel[0], 255);
    }

    #[test]
    fn b10g11r11_roundtrip_exact_for_small_powers() {
        let codec = PixelCodec::new(Format::B10G11R11UfloatPack32);
        let mut pixel = [0u8; 4];
        codec.write_f32(&mut pixel, [0.5, 1.0, 2.0, 1.0]);
        let back = codec.read_f32(&pixel);
        assert_eq!(&back[..3], &[0.5, 1.0, 2.0]);
        assert_eq!(back[3], 1.0);
    }

    #[test]
    fn e5b9g9r9_shared_exponent() {
        let codec = PixelCodec::new(Format::E5B9G9R9UfloatPack32);
        let mut pixel = [0u8; 4];
        codec.write_f32(&mut pixel, [1.0, 0.25, 0.125, 1.0]);
        let back = codec.read_f32(&pixel);
        assert!((back[0] - 1.0).abs() < 1.0 / 256.0);
        assert!((back[1] - 0.25).abs() < 1.0 / 256.0);
        assert!((back[2] - 0.125).abs() < 1.0 / 256.0);
    }

    #[test]
    fn clear_color_dispatch() {
        let codec = PixelCodec::new(Format::R32Uint);
        let mut pixel = [0u8; 4];
        codec.write_clear(&mut pixel, ClearColor::Uint([0xDEAD_BEEF, 0, 0, 0]));
        assert_eq!(u32::from_le_bytes(pixel), 0xDEAD_BEEF);
    }

    #[test]
    #[should_panic(expected = "unsupported")]
    fn astc_codec_is_refused() {
        PixelCodec::new(Format::Astc4x4UnormBlock);
    }

    #[test]
    #[should_panic(expected = "unsupported")]
    fn planar_codec_is_refused() {
        PixelCodec::new(Format::G8B8R83Plane420Unorm);
    }
}
