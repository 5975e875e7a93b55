//! The draw and dispatch drivers.
//!
//! Drawing runs in two stages: the vertex driver invokes the vertex entry
//! point once per input vertex and captures its outputs, then the
//! rasterizer walks every candidate pixel of each triangle, interpolates
//! the captured outputs and invokes the fragment entry point for covered
//! pixels. Writeback goes through the per-format codec.

use std::sync::Arc;

use glam::{UVec2, UVec3, Vec2, Vec4};
use tracing::trace_span;

use crate::buffer::WHOLE_SIZE;
use crate::command::cmd::{DrawCmd, DrawIndexedCmd};
use crate::command::transfer;
use crate::descriptor::DescriptorValue;
use crate::device::{DeviceState, GraphicsState, PipelineBindState};
use crate::format::PixelCodec;
use crate::image::Image;
use crate::pipeline::{
    BlendFactor, BlendOp, ColorBlendAttachment, ColorWriteMask, CompareOp, GraphicsPipeline,
    Pipeline, PrimitiveTopology, VertexInputState,
};
use crate::render_pass::Rect2D;
use crate::shader::{
    BuiltinInput, EntryPoint, ExecutionModel, ShaderModule, ShaderState, Variable, VariableType,
};
use crate::{MAX_COLOR_ATTACHMENTS, MAX_DESCRIPTOR_SETS};

/// Fixed per-variable slot size in the vertex output storage; large
/// enough for any interface type without per-type layout bookkeeping.
const VARIABLE_STRIDE: usize = 256;

pub(crate) fn draw(device: &mut DeviceState, cmd: &DrawCmd) {
    let _span = trace_span!("draw").entered();

    if cmd.instance_count != 1 {
        panic!("unsupported draw: instance_count {}", cmd.instance_count);
    }
    if cmd.first_instance != 0 {
        panic!("unsupported draw: first_instance {}", cmd.first_instance);
    }

    let vertices: Vec<u32> = (cmd.first_vertex..cmd.first_vertex + cmd.vertex_count).collect();
    draw_vertices(device, &vertices);
}

pub(crate) fn draw_indexed(device: &mut DeviceState, cmd: &DrawIndexedCmd) {
    let _span = trace_span!("draw_indexed").entered();

    if cmd.instance_count != 1 {
        panic!("unsupported draw: instance_count {}", cmd.instance_count);
    }
    if cmd.first_instance != 0 {
        panic!("unsupported draw: first_instance {}", cmd.first_instance);
    }

    let binding = device
        .graphics
        .index_binding
        .clone()
        .expect("indexed draw without a bound index buffer");

    let vertices: Vec<u32> = (0..cmd.index_count)
        .map(|i| {
            let offset =
                binding.offset + u64::from(cmd.first_index + i) * u64::from(binding.stride);
            let bytes = binding.buffer.data(offset, u64::from(binding.stride));
            let index = match binding.stride {
                1 => u32::from(bytes[0]),
                2 => u32::from(u16::from_le_bytes([bytes[0], bytes[1]])),
                4 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                _ => unreachable!(),
            };
            (index as i32 + cmd.vertex_offset) as u32
        })
        .collect();

    draw_vertices(device, &vertices);
}

fn draw_vertices(device: &mut DeviceState, vertices: &[u32]) {
    let pipeline = match &device.graphics.bind.pipeline {
        Some(Pipeline::Graphics(pipeline)) => pipeline.clone(),
        Some(Pipeline::Compute(_)) | None => panic!("draw without a bound graphics pipeline"),
    };

    if pipeline.stages.tessellation_control.is_some()
        || pipeline.stages.tessellation_evaluation.is_some()
    {
        panic!("unsupported draw: tessellation stages");
    }
    if pipeline.stages.geometry.is_some() {
        panic!("unsupported draw: geometry stage");
    }
    if pipeline.multisample.rasterization_samples != 1 {
        panic!(
            "unsupported draw: {} rasterization samples",
            pipeline.multisample.rasterization_samples,
        );
    }
    if pipeline.input_assembly.topology != PrimitiveTopology::TriangleList {
        panic!(
            "unsupported draw: topology {:?}",
            pipeline.input_assembly.topology,
        );
    }

    let output = run_vertex_stage(device, &pipeline, vertices);
    rasterize(device, &pipeline, &output);
}

/// Captured vertex-stage results: one fixed-stride slot per output
/// location plus one trailing builtin slot (clip position) per vertex.
struct VertexOutputs {
    data: Vec<u8>,
    vertex_stride: usize,
    location_count: usize,
    count: usize,
}

impl VertexOutputs {
    fn new(count: usize, location_count: usize) -> Self {
        let vertex_stride = (location_count + 1) * VARIABLE_STRIDE;
        Self {
            data: vec![0; count.max(1) * vertex_stride],
            vertex_stride,
            location_count,
            count,
        }
    }

    fn read_vec4(&self, vertex: usize, slot: usize) -> Vec4 {
        let offset = vertex * self.vertex_stride + slot * VARIABLE_STRIDE;
        let values: [f32; 4] = bytemuck::pod_read_unaligned(&self.data[offset..offset + 16]);
        Vec4::from_array(values)
    }

    fn output(&self, vertex: usize, location: usize) -> Vec4 {
        self.read_vec4(vertex, location)
    }

    fn position(&self, vertex: usize) -> Vec4 {
        self.read_vec4(vertex, self.location_count)
    }
}

fn run_vertex_stage(
    device: &mut DeviceState,
    pipeline: &GraphicsPipeline,
    vertices: &[u32],
) -> VertexOutputs {
    let _span = trace_span!("vertex_stage").entered();

    let stage = &pipeline.stages.vertex;
    let entry = stage
        .module
        .entry_point(ExecutionModel::Vertex, &stage.entry_point)
        .unwrap_or_else(|| panic!("vertex entry point {:?} not found", stage.entry_point));

    let location_count = stage
        .module
        .outputs(entry)
        .iter()
        .map(|output| output.location as usize + 1)
        .max()
        .unwrap_or(0);

    let mut output = VertexOutputs::new(vertices.len(), location_count);
    let vertex_stride = output.vertex_stride;
    // One base pointer for all slot variables; the storage never moves.
    let base = output.data.as_mut_ptr();

    let uniforms = load_descriptor_variables(&device.graphics.bind, stage.module.as_ref(), entry);
    let push_constants = device.push_constants;

    for (slot, vertex) in vertices.iter().enumerate() {
        let inputs = load_vertex_input(&device.graphics, &pipeline.vertex_input, *vertex);

        let slot_base = slot * vertex_stride;
        let mut outputs: Vec<Variable> = (0..location_count)
            // SAFETY: Slots live in `output.data`, which outlives every
            // invocation and is only accessed through these variables
            // until the stage completes.
            .map(|location| unsafe {
                Variable::pointer(base.add(slot_base + location * VARIABLE_STRIDE))
            })
            .collect();
        // SAFETY: As above; the builtin slot trails the location slots.
        let mut builtins =
            vec![unsafe { Variable::pointer(base.add(slot_base + location_count * VARIABLE_STRIDE)) }];

        let mut state = ShaderState {
            inputs,
            outputs: &mut outputs,
            builtins: &mut builtins,
            builtin_input: BuiltinInput {
                vertex_index: *vertex,
                instance_index: 0,
                workgroup_id: UVec3::ZERO,
            },
            uniforms: &uniforms,
            push_constants: &push_constants,
        };
        stage.module.dispatch(entry, &mut state);
    }

    output
}

/// Builds the per-location vertex inputs for one vertex: a pointer into
/// the bound vertex buffer at
/// `base_offset + stride * vertex + attribute.offset`.
fn load_vertex_input(
    graphics: &GraphicsState,
    vertex_input: &VertexInputState,
    vertex: u32,
) -> Vec<Variable> {
    let count = vertex_input
        .max_location()
        .map_or(0, |location| location as usize + 1);
    let mut inputs = vec![Variable::Unknown; count];

    for attribute in &vertex_input.attributes {
        let binding = vertex_input.binding(attribute.binding);
        let bound = graphics.vertex_bindings[binding.binding as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("vertex binding {} has no bound buffer", binding.binding));

        let offset = bound.offset
            + u64::from(binding.stride) * u64::from(vertex)
            + u64::from(attribute.offset);
        let size = u64::from(attribute.format.info().total_size);
        let data = bound.buffer.data(offset, size);

        // SAFETY: The buffer stays bound (and its memory alive) for the
        // whole draw; replay is single threaded.
        inputs[attribute.location as usize] =
            unsafe { Variable::pointer(data.as_ptr().cast_mut()) };
    }

    inputs
}

/// Exposes every buffer-backed descriptor variable of `module` as a
/// uniform variable, with dynamic offsets applied.
fn load_descriptor_variables(
    bind: &PipelineBindState,
    module: &dyn ShaderModule,
    entry: EntryPoint,
) -> [Vec<Variable>; MAX_DESCRIPTOR_SETS] {
    let mut uniforms: [Vec<Variable>; MAX_DESCRIPTOR_SETS] = Default::default();

    for variable in module.descriptors(entry) {
        if !variable.kind.is_buffer() {
            continue;
        }

        let set = bind.set(variable.set as usize).unwrap_or_else(|| {
            panic!(
                "shader references descriptor set {} which is not bound",
                variable.set,
            )
        });
        let Some((declaration, value)) = set.value(variable.binding) else {
            panic!(
                "shader references binding {}.{} which the set does not declare",
                variable.set, variable.binding,
            );
        };
        let DescriptorValue::Buffer(region) = value else {
            panic!(
                "descriptor {}.{} does not hold a buffer",
                variable.set, variable.binding,
            );
        };

        // One dynamic offset per dynamic binding, consumed in binding
        // order.
        let dynamic_offset = if declaration.kind.is_dynamic() {
            let dynamic_index = set
                .bindings()
                .filter(|(decl, _)| decl.kind.is_dynamic() && decl.binding < variable.binding)
                .count();
            u64::from(bind.dynamic_offsets(variable.set as usize)[dynamic_index])
        } else {
            0
        };

        let offset = region.offset + dynamic_offset;
        let len = if region.range == WHOLE_SIZE {
            region.buffer.size() - offset
        } else {
            region.range
        };

        let layout = variable.layout.clone().unwrap_or_else(|| {
            panic!(
                "buffer descriptor {}.{} has no block layout",
                variable.set, variable.binding,
            )
        });

        let slots = &mut uniforms[variable.set as usize];
        if slots.len() <= variable.binding as usize {
            slots.resize(variable.binding as usize + 1, Variable::Unknown);
        }

        let data = region.buffer.data_mut(offset, len);
        // SAFETY: The region's buffer is held alive by the bound
        // descriptor set for the whole draw; replay is single threaded.
        slots[variable.binding as usize] =
            unsafe { Variable::uniform(data.as_mut_ptr(), len as usize, layout) };
    }

    uniforms
}

fn edge(a: Vec4, b: Vec4, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

/// One bound colour attachment of the current subpass.
struct ColorTarget {
    image: Arc<Image>,
    codec: PixelCodec,
    blend: ColorBlendAttachment,
}

struct DepthTarget {
    image: Arc<Image>,
    codec: PixelCodec,
    compare: CompareOp,
    write_enable: bool,
}

impl DepthTarget {
    fn read(&self, x: u32, y: u32) -> f32 {
        let offset = self.image.pixel_offset(x, y, 0, 0, 0);
        let size = u64::from(self.image.format().info().total_size);
        self.codec.read_depth(self.image.data(offset, size))
    }

    fn write(&self, x: u32, y: u32, depth: f32) {
        let offset = self.image.pixel_offset(x, y, 0, 0, 0);
        let size = u64::from(self.image.format().info().total_size);
        let pixel = self.image.data_mut(offset, size);
        let stencil = if self.image.format().info().has_stencil() {
            self.codec.read_stencil(pixel)
        } else {
            0
        };
        self.codec.write_depth_stencil(pixel, depth, stencil);
    }
}

fn rasterize(device: &mut DeviceState, pipeline: &GraphicsPipeline, output: &VertexOutputs) {
    let _span = trace_span!("fragment_stage").entered();

    let Some(stage) = pipeline.stages.fragment.clone() else {
        return;
    };
    let entry = stage
        .module
        .entry_point(ExecutionModel::Fragment, &stage.entry_point)
        .unwrap_or_else(|| panic!("fragment entry point {:?} not found", stage.entry_point));

    let instance = device
        .graphics
        .render_pass
        .clone()
        .expect("draw outside a render pass");
    let subpass = &instance.render_pass.subpasses()[0];

    // Resolve attachments up front; the pixel loop only touches codecs
    // and images.
    let mut colors: [Option<ColorTarget>; MAX_COLOR_ATTACHMENTS] = Default::default();
    for (slot, reference) in subpass.color_attachments.iter().enumerate() {
        if !reference.is_used() {
            continue;
        }
        let view = &instance.framebuffer.attachments()[reference.attachment as usize];
        let image = view.image().clone();
        let codec = device.codec(image.format());
        colors[slot] = Some(ColorTarget {
            image,
            codec,
            blend: pipeline.blend.get(slot).copied().unwrap_or_default(),
        });
    }

    let depth = subpass
        .depth_stencil_attachment
        .filter(|reference| reference.is_used())
        .map(|reference| {
            let view = &instance.framebuffer.attachments()[reference.attachment as usize];
            let image = view.image().clone();
            let codec = device.codec(image.format());
            let (compare, write) = match pipeline.depth_stencil {
                Some(state) if state.depth_test_enable => {
                    (state.depth_compare_op, state.depth_write_enable)
                }
                Some(state) => (CompareOp::Always, state.depth_write_enable),
                None => (CompareOp::Less, true),
            };
            DepthTarget {
                image,
                codec,
                compare,
                write_enable: write,
            }
        });

    let extent = instance.framebuffer.extent();
    let region = pixel_region(&device.graphics, &instance.render_area, extent);
    if region.extent == UVec2::ZERO {
        return;
    }

    let uniforms = load_descriptor_variables(&device.graphics.bind, stage.module.as_ref(), entry);
    let push_constants = device.push_constants;

    let input_count = stage
        .module
        .inputs(entry)
        .iter()
        .map(|input| {
            assert_eq!(
                input.ty,
                VariableType::F32Vec4,
                "unsupported fragment input type at location {}",
                input.location,
            );
            input.location as usize + 1
        })
        .max()
        .unwrap_or(0);

    // Staging for interpolated inputs and shader outputs. After the
    // pointer variables are created the storage is only accessed through
    // them.
    let mut input_storage = vec![[0.0f32; 4]; input_count.max(1)];
    let mut output_storage = [[0.0f32; 4]; MAX_COLOR_ATTACHMENTS];

    let input_base = input_storage.as_mut_ptr();
    let output_base = output_storage.as_mut_ptr();

    // SAFETY: The staging buffers above outlive every invocation in the
    // pixel loop and are never reallocated.
    let inputs: Vec<Variable> = (0..input_count)
        .map(|location| unsafe { Variable::pointer(input_base.add(location).cast()) })
        .collect();
    let mut outputs: Vec<Variable> = (0..MAX_COLOR_ATTACHMENTS)
        .map(|slot| unsafe { Variable::pointer(output_base.add(slot).cast()) })
        .collect();
    let mut builtins: [Variable; 0] = [];

    // Clip-space positions with perspective divide applied.
    let positions: Vec<Vec4> = (0..output.count)
        .map(|vertex| {
            let position = output.position(vertex);
            position / position.w
        })
        .collect();

    let triangle_count = output.count / 3;
    for triangle in 0..triangle_count {
        let i0 = triangle * 3 + 2;
        let i1 = triangle * 3 + 1;
        let i2 = triangle * 3;
        let p0 = positions[i0];
        let p1 = positions[i1];
        let p2 = positions[i2];

        let area = edge(p0, p1, Vec2::new(p2.x, p2.y));
        if area == 0.0 {
            continue;
        }

        let x0 = region.offset.x as u32;
        let y0 = region.offset.y as u32;
        for y in y0..y0 + region.extent.y {
            let yn = (y as f32 + 0.5) / extent.y as f32 * 2.0 - 1.0;
            for x in x0..x0 + region.extent.x {
                let xn = (x as f32 + 0.5) / extent.x as f32 * 2.0 - 1.0;
                let point = Vec2::new(xn, yn);

                let mut w0 = edge(p1, p2, point);
                let mut w1 = edge(p2, p0, point);
                let mut w2 = edge(p0, p1, point);
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                w0 /= area;
                w1 /= area;
                w2 /= area;

                let depth_value = w0 * p0.z + w1 * p1.z + w2 * p2.z;

                if let Some(target) = &depth {
                    if !target.compare.compare(depth_value, target.read(x, y)) {
                        continue;
                    }
                }

                // Interpolate the vertex outputs for every fragment
                // input location.
                for (location, input) in inputs.iter().enumerate() {
                    let v0 = output.output(i0, location);
                    let v1 = output.output(i1, location);
                    let v2 = output.output(i2, location);
                    input.write(&Variable::Vec4F(v0 * w0 + v1 * w1 + v2 * w2));
                }

                let mut state = ShaderState {
                    inputs: inputs.clone(),
                    outputs: &mut outputs,
                    builtins: &mut builtins,
                    builtin_input: BuiltinInput::default(),
                    uniforms: &uniforms,
                    push_constants: &push_constants,
                };
                stage.module.dispatch(entry, &mut state);

                for (slot, target) in colors.iter().enumerate() {
                    let Some(target) = target else {
                        continue;
                    };
                    let source = outputs[slot].deref(VariableType::F32Vec4).as_vec4();
                    write_color(target, x, y, source);
                }

                if let Some(target) = &depth {
                    if target.write_enable {
                        target.write(x, y, depth_value);
                    }
                }
            }
        }
    }
}

/// The pixels a draw may touch: framebuffer extent clipped by the render
/// area and scissor 0 (when set).
fn pixel_region(graphics: &GraphicsState, render_area: &Rect2D, extent: UVec2) -> Rect2D {
    let mut region = Rect2D::covering(extent).intersect(render_area);
    if let Some(scissor) = &graphics.dynamic.scissors[0] {
        region = region.intersect(scissor);
    }
    region
}

fn blend_factor(factor: BlendFactor, source: Vec4, destination: Vec4) -> Vec4 {
    match factor {
        BlendFactor::Zero => Vec4::ZERO,
        BlendFactor::One => Vec4::ONE,
        BlendFactor::SrcColor => source,
        BlendFactor::OneMinusSrcColor => Vec4::ONE - source,
        BlendFactor::DstColor => destination,
        BlendFactor::OneMinusDstColor => Vec4::ONE - destination,
        BlendFactor::SrcAlpha => Vec4::splat(source.w),
        BlendFactor::OneMinusSrcAlpha => Vec4::splat(1.0 - source.w),
        BlendFactor::DstAlpha => Vec4::splat(destination.w),
        BlendFactor::OneMinusDstAlpha => Vec4::splat(1.0 - destination.w),
    }
}

fn blend_op(op: BlendOp, source: Vec4, destination: Vec4) -> Vec4 {
    match op {
        BlendOp::Add => source + destination,
        BlendOp::Subtract => source - destination,
        BlendOp::ReverseSubtract => destination - source,
        BlendOp::Min => source.min(destination),
        BlendOp::Max => source.max(destination),
    }
}

fn write_color(target: &ColorTarget, x: u32, y: u32, source: Vec4) {
    let blend = &target.blend;

    let value = if blend.blend_enable || blend.color_write_mask != ColorWriteMask::all() {
        let destination = Vec4::from_array(transfer::read_pixel_f32(
            &target.codec,
            &target.image,
            x,
            y,
            0,
            0,
            0,
        ));

        let mut value = if blend.blend_enable {
            let src_color =
                source * blend_factor(blend.src_color_blend_factor, source, destination);
            let dst_color =
                destination * blend_factor(blend.dst_color_blend_factor, source, destination);
            let color = blend_op(blend.color_blend_op, src_color, dst_color);

            let src_alpha =
                source.w * blend_factor(blend.src_alpha_blend_factor, source, destination).w;
            let dst_alpha =
                destination.w * blend_factor(blend.dst_alpha_blend_factor, source, destination).w;
            let alpha = blend_op(
                blend.alpha_blend_op,
                Vec4::splat(src_alpha),
                Vec4::splat(dst_alpha),
            )
            .w;

            Vec4::new(color.x, color.y, color.z, alpha)
        } else {
            source
        };

        for (channel, mask) in [
            ColorWriteMask::R,
            ColorWriteMask::G,
            ColorWriteMask::B,
            ColorWriteMask::A,
        ]
        .into_iter()
        .enumerate()
        {
            if !blend.color_write_mask.contains(mask) {
                value[channel] = destination[channel];
            }
        }
        value
    } else {
        source
    };

    transfer::write_pixel_f32(&target.codec, &target.image, x, y, 0, 0, 0, value.to_array());
}

pub(crate) fn dispatch(device: &mut DeviceState, group_count: UVec3) {
    let _span = trace_span!("dispatch").entered();

    let pipeline = match &device.compute.pipeline {
        Some(Pipeline::Compute(pipeline)) => pipeline.clone(),
        Some(Pipeline::Graphics(_)) | None => panic!("dispatch without a bound compute pipeline"),
    };

    let stage = &pipeline.stage;
    let entry = stage
        .module
        .entry_point(ExecutionModel::GlCompute, &stage.entry_point)
        .unwrap_or_else(|| panic!("compute entry point {:?} not found", stage.entry_point));

    let uniforms = load_descriptor_variables(&device.compute, stage.module.as_ref(), entry);
    let push_constants = device.push_constants;
    let mut outputs: [Variable; 0] = [];
    let mut builtins: [Variable; 0] = [];

    for z in 0..group_count.z {
        for y in 0..group_count.y {
            for x in 0..group_count.x {
                let mut state = ShaderState {
                    inputs: Vec::new(),
                    outputs: &mut outputs,
                    builtins: &mut builtins,
                    builtin_input: BuiltinInput {
                        vertex_index: 0,
                        instance_index: 0,
                        workgroup_id: UVec3::new(x, y, z),
                    },
                    uniforms: &uniforms,
                    push_constants: &push_constants,
                };
                stage.module.dispatch(entry, &mut state);
            }
        }
    }
}
