//! Execution of the data-movement commands.
//!
//! Copies move bytes row by row along the region rectangles; coordinates
//! are block-quantized when either side is compressed. Clears and blits
//! go through the per-format codec.

use crate::descriptor::FilterMode;
use crate::device::DeviceState;
use crate::format::{ClearColor, Format, NumericType, PixelCodec};
use crate::image::Image;

use super::cmd::{
    BlitImageCmd, ClearAttachmentsCmd, ClearColorImageCmd, ClearDepthStencilImageCmd,
    CopyBufferCmd, CopyBufferToImageCmd, CopyImageCmd, CopyImageToBufferCmd, FillBufferCmd,
    ImageAspects, UpdateBufferCmd,
};

pub(super) fn copy_buffer(cmd: &CopyBufferCmd) {
    for region in &cmd.regions {
        let src = cmd.src.data(region.src_offset, region.size);
        cmd.dst
            .data_mut(region.dst_offset, region.size)
            .copy_from_slice(src);
    }
}

pub(super) fn update_buffer(cmd: &UpdateBufferCmd) {
    cmd.buffer
        .data_mut(cmd.offset, cmd.bytes.len() as u64)
        .copy_from_slice(&cmd.bytes);
}

pub(super) fn fill_buffer(cmd: &FillBufferCmd) {
    assert!(
        cmd.size % 4 == 0,
        "fill size must be a multiple of 4 bytes"
    );
    let pattern = cmd.data.to_le_bytes();
    for chunk in cmd.buffer.data_mut(cmd.offset, cmd.size).chunks_exact_mut(4) {
        chunk.copy_from_slice(&pattern);
    }
}

/// Block-quantizes an x/width pair for a compressed format.
fn quantize_x(format: Format, x: u32, width: u32) -> (u32, u32) {
    let info = format.info();
    if info.is_compressed() {
        (
            x.div_ceil(info.block_width),
            width.div_ceil(info.block_width),
        )
    } else {
        (x, width)
    }
}

fn quantize_y(format: Format, y: u32, height: u32) -> (u32, u32) {
    let info = format.info();
    if info.is_compressed() {
        (
            y.div_ceil(info.block_height),
            height.div_ceil(info.block_height),
        )
    } else {
        (y, height)
    }
}

pub(super) fn copy_image(cmd: &CopyImageCmd) {
    let src_info = cmd.src.format().info();
    let dst_info = cmd.dst.format().info();
    assert_eq!(
        src_info.total_size, dst_info.total_size,
        "image copy between incompatible pixel sizes",
    );
    let pixel_size = u64::from(src_info.total_size);

    for region in &cmd.regions {
        let (src_x, width) = quantize_x(cmd.src.format(), region.src_offset.x as u32, region.extent.x);
        let (src_y, height) =
            quantize_y(cmd.src.format(), region.src_offset.y as u32, region.extent.y);
        let (dst_x, _) = quantize_x(cmd.dst.format(), region.dst_offset.x as u32, region.extent.x);
        let (dst_y, _) = quantize_y(cmd.dst.format(), region.dst_offset.y as u32, region.extent.y);

        let row_bytes = u64::from(width) * pixel_size;
        for layer in 0..region.src_subresource.layer_count {
            for z in 0..region.extent.z {
                for y in 0..height {
                    let src_offset = cmd.src.pixel_offset(
                        src_x,
                        src_y + y,
                        region.src_offset.z as u32 + z,
                        region.src_subresource.mip_level,
                        region.src_subresource.base_array_layer + layer,
                    );
                    let dst_offset = cmd.dst.pixel_offset(
                        dst_x,
                        dst_y + y,
                        region.dst_offset.z as u32 + z,
                        region.dst_subresource.mip_level,
                        region.dst_subresource.base_array_layer + layer,
                    );

                    let src = cmd.src.data(src_offset, row_bytes);
                    cmd.dst.data_mut(dst_offset, row_bytes).copy_from_slice(src);
                }
            }
        }
    }
}

/// Resolves the buffer-side addressing of a buffer/image copy region:
/// `(row_length, image_height)` in pixels (blocks for compressed), with
/// zeroes defaulting to the image extent.
fn buffer_pitch(
    format: Format,
    row_length: u32,
    image_height: u32,
    extent_width: u32,
    extent_height: u32,
) -> (u64, u64) {
    let info = format.info();
    let mut rows = if row_length == 0 { extent_width } else { row_length };
    let mut lines = if image_height == 0 {
        extent_height
    } else {
        image_height
    };
    if info.is_compressed() {
        rows = rows.div_ceil(info.block_width);
        lines = lines.div_ceil(info.block_height);
    }
    (u64::from(rows), u64::from(lines))
}

pub(super) fn copy_buffer_to_image(cmd: &CopyBufferToImageCmd) {
    each_buffer_image_row(cmd.dst.as_ref(), &cmd.regions, |buffer_offset, image_offset, len| {
        let src = cmd.src.data(buffer_offset, len);
        cmd.dst.data_mut(image_offset, len).copy_from_slice(src);
    });
}

pub(super) fn copy_image_to_buffer(cmd: &CopyImageToBufferCmd) {
    each_buffer_image_row(cmd.src.as_ref(), &cmd.regions, |buffer_offset, image_offset, len| {
        let src = cmd.src.data(image_offset, len);
        cmd.dst.data_mut(buffer_offset, len).copy_from_slice(src);
    });
}

/// Walks every row of every buffer/image copy region, yielding
/// `(buffer_offset, image_offset, row_bytes)`.
fn each_buffer_image_row(
    image: &Image,
    regions: &[super::cmd::BufferImageCopy],
    mut row: impl FnMut(u64, u64, u64),
) {
    let format = image.format();
    let pixel_size = u64::from(format.info().total_size);

    for region in regions {
        let (image_x, width) = quantize_x(format, region.image_offset.x as u32, region.image_extent.x);
        let (image_y, height) =
            quantize_y(format, region.image_offset.y as u32, region.image_extent.y);
        let (row_pitch, line_pitch) = buffer_pitch(
            format,
            region.buffer_row_length,
            region.buffer_image_height,
            region.image_extent.x,
            region.image_extent.y,
        );

        let row_bytes = u64::from(width) * pixel_size;
        for layer in 0..region.image_subresource.layer_count {
            for z in 0..region.image_extent.z {
                for y in 0..height {
                    let slice_index =
                        u64::from(layer) * u64::from(region.image_extent.z) + u64::from(z);
                    let row_index = slice_index * line_pitch + u64::from(y);
                    let buffer_offset = region.buffer_offset + row_index * row_pitch * pixel_size;

                    let image_offset = image.pixel_offset(
                        image_x,
                        image_y + y,
                        region.image_offset.z as u32 + z,
                        region.image_subresource.mip_level,
                        region.image_subresource.base_array_layer + layer,
                    );

                    row(buffer_offset, image_offset, row_bytes);
                }
            }
        }
    }
}

/// Reads the canonical float value of one pixel, decoding through the
/// block decoder for compressed sources.
pub(crate) fn read_pixel_f32(
    codec: &PixelCodec,
    image: &Image,
    x: u32,
    y: u32,
    z: u32,
    level: u32,
    layer: u32,
) -> [f32; 4] {
    let info = image.format().info();
    let size = u64::from(info.total_size);
    if info.is_compressed() {
        let offset = image.pixel_offset(
            x / info.block_width,
            y / info.block_height,
            z,
            level,
            layer,
        );
        codec.read_f32_at(
            image.data(offset, size),
            x % info.block_width,
            y % info.block_height,
        )
    } else {
        let offset = image.pixel_offset(x, y, z, level, layer);
        codec.read_f32(image.data(offset, size))
    }
}

pub(crate) fn write_pixel_f32(
    codec: &PixelCodec,
    image: &Image,
    x: u32,
    y: u32,
    z: u32,
    level: u32,
    layer: u32,
    values: [f32; 4],
) {
    let size = u64::from(image.format().info().total_size);
    let offset = image.pixel_offset(x, y, z, level, layer);
    codec.write_f32(image.data_mut(offset, size), values);
}

pub(super) fn blit_image(device: &mut DeviceState, cmd: &BlitImageCmd) {
    let src = cmd.src.as_ref();
    let dst = cmd.dst.as_ref();
    let src_codec = device.codec(src.format());
    let dst_codec = device.codec(dst.format());
    let dst_numeric = dst.format().info().numeric;

    for region in &cmd.regions {
        let src_level = region.src_subresource.mip_level;
        let dst_level = region.dst_subresource.mip_level;

        let src_extent = region.src_offsets[1] - region.src_offsets[0];
        let dst_extent = region.dst_offsets[1] - region.dst_offsets[0];

        let (dst_width, flip_x) = abs_extent(dst_extent.x);
        let (dst_height, flip_y) = abs_extent(dst_extent.y);
        let (dst_depth, flip_z) = abs_extent(dst_extent.z);

        for layer in 0..region.dst_subresource.layer_count {
            let src_layer = region.src_subresource.base_array_layer + layer;
            let dst_layer = region.dst_subresource.base_array_layer + layer;

            for z in 0..dst_depth {
                for y in 0..dst_height {
                    for x in 0..dst_width {
                        let dst_x = blit_dst_coord(x, flip_x, region.dst_offsets[0].x, region.dst_offsets[1].x);
                        let dst_y = blit_dst_coord(y, flip_y, region.dst_offsets[0].y, region.dst_offsets[1].y);
                        let dst_z = blit_dst_coord(z, flip_z, region.dst_offsets[0].z, region.dst_offsets[1].z);

                        let u = blit_src_coord(dst_x, region.dst_offsets[0].x, dst_extent.x, region.src_offsets[0].x, src_extent.x);
                        let v = blit_src_coord(dst_y, region.dst_offsets[0].y, dst_extent.y, region.src_offsets[0].y, src_extent.y);
                        let w = blit_src_coord(dst_z, region.dst_offsets[0].z, dst_extent.z, region.src_offsets[0].z, src_extent.z);

                        let value = match dst_numeric {
                            NumericType::UInt | NumericType::SInt => {
                                assert_eq!(
                                    cmd.filter,
                                    FilterMode::Nearest,
                                    "linear filtering of integer formats is not supported",
                                );
                                // Integer blits move raw channel values.
                                let (sx, sy, sz) = nearest(src, u, v, w, src_level);
                                let offset = src.pixel_offset(sx, sy, sz, src_level, src_layer);
                                let size = u64::from(src.format().info().total_size);
                                let raw = src_codec.read_u32(src.data(offset, size));
                                let dst_offset = dst.pixel_offset(
                                    dst_x as u32,
                                    dst_y as u32,
                                    dst_z as u32,
                                    dst_level,
                                    dst_layer,
                                );
                                let dst_size = u64::from(dst.format().info().total_size);
                                dst_codec.write_u32(dst.data_mut(dst_offset, dst_size), raw);
                                continue;
                            }
                            _ => match cmd.filter {
                                FilterMode::Nearest => {
                                    let (sx, sy, sz) = nearest(src, u, v, w, src_level);
                                    read_pixel_f32(&src_codec, src, sx, sy, sz, src_level, src_layer)
                                }
                                FilterMode::Linear => {
                                    sample_linear(&src_codec, src, u, v, w, src_level, src_layer)
                                }
                            },
                        };

                        write_pixel_f32(
                            &dst_codec,
                            dst,
                            dst_x as u32,
                            dst_y as u32,
                            dst_z as u32,
                            dst_level,
                            dst_layer,
                            value,
                        );
                    }
                }
            }
        }
    }
}

fn abs_extent(extent: i32) -> (u32, bool) {
    if extent < 0 {
        ((-extent) as u32, true)
    } else {
        (extent as u32, false)
    }
}

/// Destination coordinate for iteration index `i`; negative extents
/// iterate from the second corner.
fn blit_dst_coord(i: u32, flipped: bool, start: i32, end: i32) -> i32 {
    if flipped {
        i as i32 + end
    } else {
        i as i32 + start
    }
}

/// Maps a destination coordinate into continuous source texel space with
/// the pixel-center rule.
fn blit_src_coord(dst: i32, dst_start: i32, dst_extent: i32, src_start: i32, src_extent: i32) -> f32 {
    if dst_extent == 0 {
        return src_start as f32;
    }
    (dst as f32 + 0.5 - dst_start as f32) * (src_extent as f32 / dst_extent as f32)
        + src_start as f32
}

fn level_extent(image: &Image, level: u32) -> (u32, u32, u32) {
    let info = image.format().info();
    let level = image.image_size().level(level);
    if info.is_compressed() {
        // Levels of compressed images are stored in blocks; sampling
        // works on texels.
        (
            level.width * info.block_width,
            level.height * info.block_height,
            level.depth,
        )
    } else {
        (level.width, level.height, level.depth)
    }
}

fn nearest(image: &Image, u: f32, v: f32, w: f32, level: u32) -> (u32, u32, u32) {
    let (width, height, depth) = level_extent(image, level);
    (
        (u.floor().max(0.0) as u32).min(width - 1),
        (v.floor().max(0.0) as u32).min(height - 1),
        (w.floor().max(0.0) as u32).min(depth - 1),
    )
}

fn sample_linear(
    codec: &PixelCodec,
    image: &Image,
    u: f32,
    v: f32,
    w: f32,
    level: u32,
    layer: u32,
) -> [f32; 4] {
    let (width, height, depth) = level_extent(image, level);
    let clamp = |coord: f32, size: u32| -> (u32, u32, f32) {
        let base = coord - 0.5;
        let floor = base.floor();
        let frac = base - floor;
        let i0 = (floor.max(0.0) as u32).min(size - 1);
        let i1 = ((floor + 1.0).max(0.0) as u32).min(size - 1);
        (i0, i1, frac)
    };

    let (x0, x1, fx) = clamp(u, width);
    let (y0, y1, fy) = clamp(v, height);
    let (z0, _z1, _fz) = clamp(w, depth);

    // Bilinear in the plane; the depth axis uses the nearer slice.
    let mut result = [0.0f32; 4];
    let corners = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ];
    for (x, y, weight) in corners {
        let texel = read_pixel_f32(codec, image, x, y, z0, level, layer);
        for channel in 0..4 {
            result[channel] += texel[channel] * weight;
        }
    }
    result
}

/// Fills every pixel of the named levels/layers with one encoded value.
fn fill_levels(
    image: &Image,
    base_level: u32,
    level_count: u32,
    base_layer: u32,
    layer_count: u32,
    template: &[u8],
) {
    let pixel_size = template.len() as u64;
    for level in base_level..base_level + level_count {
        let extent = image.image_size().level(level);
        for layer in base_layer..base_layer + layer_count {
            for z in 0..extent.depth {
                for y in 0..extent.height {
                    let row_offset = image.pixel_offset(0, y, z, level, layer);
                    let row = image.data_mut(row_offset, pixel_size * u64::from(extent.width));
                    for pixel in row.chunks_exact_mut(template.len()) {
                        pixel.copy_from_slice(template);
                    }
                }
            }
        }
    }
}

/// Clears colour image contents through the codec.
pub(crate) fn clear_color_levels(
    device: &mut DeviceState,
    image: &Image,
    color: ClearColor,
    base_level: u32,
    level_count: u32,
    base_layer: u32,
    layer_count: u32,
) {
    let codec = device.codec(image.format());
    let mut template = vec![0u8; image.format().info().total_size as usize];
    codec.write_clear(&mut template, color);
    fill_levels(image, base_level, level_count, base_layer, layer_count, &template);
}

/// Clears depth/stencil image contents through the codec.
///
/// When only one aspect is named the other is preserved pixel by pixel.
pub(crate) fn clear_depth_stencil_levels(
    device: &mut DeviceState,
    image: &Image,
    aspects: ImageAspects,
    depth: f32,
    stencil: u8,
    base_level: u32,
    level_count: u32,
    base_layer: u32,
    layer_count: u32,
) {
    let codec = device.codec(image.format());
    let info = image.format().info();
    let pixel_size = u64::from(info.total_size);

    let full = (!info.has_depth() || aspects.contains(ImageAspects::DEPTH))
        && (!info.has_stencil() || aspects.contains(ImageAspects::STENCIL));

    if full {
        let mut template = vec![0u8; info.total_size as usize];
        codec.write_depth_stencil(&mut template, depth, stencil);
        fill_levels(image, base_level, level_count, base_layer, layer_count, &template);
        return;
    }

    for level in base_level..base_level + level_count {
        let extent = *image.image_size().level(level);
        for layer in base_layer..base_layer + layer_count {
            for z in 0..extent.depth {
                for y in 0..extent.height {
                    for x in 0..extent.width {
                        let offset = image.pixel_offset(x, y, z, level, layer);
                        let pixel = image.data_mut(offset, pixel_size);
                        let new_depth = if aspects.contains(ImageAspects::DEPTH) {
                            depth
                        } else {
                            codec.read_depth(pixel)
                        };
                        let new_stencil = if aspects.contains(ImageAspects::STENCIL) {
                            stencil
                        } else {
                            codec.read_stencil(pixel)
                        };
                        codec.write_depth_stencil(pixel, new_depth, new_stencil);
                    }
                }
            }
        }
    }
}

pub(super) fn clear_color_image(device: &mut DeviceState, cmd: &ClearColorImageCmd) {
    for range in &cmd.ranges {
        assert!(
            range.aspects.contains(ImageAspects::COLOR),
            "colour clear on a non-colour aspect",
        );
        clear_color_levels(
            device,
            cmd.image.as_ref(),
            cmd.color,
            range.base_mip_level,
            range.level_count,
            range.base_array_layer,
            range.layer_count,
        );
    }
}

pub(super) fn clear_depth_stencil_image(device: &mut DeviceState, cmd: &ClearDepthStencilImageCmd) {
    for range in &cmd.ranges {
        clear_depth_stencil_levels(
            device,
            cmd.image.as_ref(),
            range.aspects,
            cmd.depth,
            cmd.stencil as u8,
            range.base_mip_level,
            range.level_count,
            range.base_array_layer,
            range.layer_count,
        );
    }
}

pub(super) fn clear_attachments(device: &mut DeviceState, cmd: &ClearAttachmentsCmd) {
    let instance = device
        .graphics
        .render_pass
        .clone()
        .expect("ClearAttachments outside a render pass");
    let subpass = &instance.render_pass.subpasses()[0];

    for attachment in &cmd.attachments {
        let (view, clear) = if attachment.aspects.contains(ImageAspects::COLOR) {
            let reference = &subpass.color_attachments[attachment.color_attachment as usize];
            if !reference.is_used() {
                continue;
            }
            let view = &instance.framebuffer.attachments()[reference.attachment as usize];
            (view, attachment.clear_value)
        } else {
            let Some(reference) = subpass.depth_stencil_attachment else {
                continue;
            };
            let view = &instance.framebuffer.attachments()[reference.attachment as usize];
            (view, attachment.clear_value)
        };

        let image = view.image();
        let codec = device.codec(image.format());
        let pixel_size = u64::from(image.format().info().total_size);

        for rect in &cmd.rects {
            let level = view.base_mip_level();
            for layer in rect.base_array_layer..rect.base_array_layer + rect.layer_count {
                let layer = view.base_array_layer() + layer;
                let x0 = rect.rect.offset.x.max(0) as u32;
                let y0 = rect.rect.offset.y.max(0) as u32;
                for y in y0..y0 + rect.rect.extent.y {
                    for x in x0..x0 + rect.rect.extent.x {
                        let offset = image.pixel_offset(x, y, 0, level, layer);
                        let pixel = image.data_mut(offset, pixel_size);
                        match clear {
                            crate::render_pass::ClearValue::Color(color) => {
                                codec.write_clear(pixel, color)
                            }
                            crate::render_pass::ClearValue::DepthStencil { depth, stencil } => {
                                codec.write_depth_stencil(pixel, depth, stencil as u8)
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Aspect set covered by a depth/stencil format, used for load-op clears.
pub(super) fn format_aspects(format: Format) -> ImageAspects {
    let info = format.info();
    let mut aspects = ImageAspects::empty();
    if info.has_depth() {
        aspects |= ImageAspects::DEPTH;
    }
    if info.has_stencil() {
        aspects |= ImageAspects::STENCIL;
    }
    if aspects.is_empty() {
        aspects = ImageAspects::COLOR;
    }
    aspects
}
