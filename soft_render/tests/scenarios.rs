//! End-to-end submissions against the software device.

use std::io::Write;
use std::sync::{Arc, Mutex};

use glam::{IVec2, IVec3, UVec2, UVec3, Vec4};

use soft_render::buffer::Buffer;
use soft_render::command::cmd::{
    BufferCopy, BufferImageCopy, ImageAspects, ImageBlit, IndexType, SubresourceLayers,
    SubresourceRange,
};
use soft_render::command::{
    CommandBuffer, CommandBufferLevel, CommandBufferUsage, CommandPoolFlags,
};
use soft_render::descriptor::{
    BufferRegion, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorType,
    DescriptorValue, DescriptorWrite, FilterMode, ShaderStages,
};
use soft_render::device::{DebugOutput, DeviceState, Event};
use soft_render::format::{format_info, ClearColor, Format, PixelCodec};
use soft_render::image::{Image, ImageView};
use soft_render::memory::DeviceMemory;
use soft_render::pipeline::{
    BindPoint, ColorBlendAttachment, CompareOp, ComputePipeline, DepthStencilState,
    GraphicsPipeline, GraphicsShaderStages, InputAssemblyState, MultisampleState, Pipeline,
    PipelineLayout, PrimitiveTopology, RasterizationState, ShaderStageState, VertexInputAttribute,
    VertexInputBinding, VertexInputRate, VertexInputState,
};
use soft_render::render_pass::{
    AttachmentDescription, AttachmentLoadOp, AttachmentReference, AttachmentStoreOp, ClearValue,
    Framebuffer, ImageLayout, Rect2D, RenderPass, SubpassDescription,
};
use soft_render::shader::{
    DescriptorVariable, EntryPoint, ExecutionModel, LocationVariable, ShaderModule, ShaderState,
    StructLayout, StructMember, Variable, VariableType,
};

/// A hand-written compiled module with a single entry point.
#[derive(Debug)]
struct TestShader {
    model: ExecutionModel,
    name: &'static str,
    inputs: Vec<LocationVariable>,
    outputs: Vec<LocationVariable>,
    descriptors: Vec<DescriptorVariable>,
    run: fn(&mut ShaderState<'_>),
}

impl TestShader {
    fn new(model: ExecutionModel, name: &'static str, run: fn(&mut ShaderState<'_>)) -> Self {
        Self {
            model,
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            descriptors: Vec::new(),
            run,
        }
    }

    fn with_input(mut self, location: u32) -> Self {
        self.inputs.push(LocationVariable {
            location,
            ty: VariableType::F32Vec4,
        });
        self
    }

    fn with_output(mut self, location: u32) -> Self {
        self.outputs.push(LocationVariable {
            location,
            ty: VariableType::F32Vec4,
        });
        self
    }

    fn with_descriptor(mut self, set: u32, binding: u32, kind: DescriptorType) -> Self {
        self.descriptors.push(DescriptorVariable {
            set,
            binding,
            kind,
            layout: Some(Arc::new(StructLayout {
                members: vec![StructMember {
                    offset: 0,
                    ty: VariableType::F32Vec4,
                    row_major: false,
                    matrix_stride: 0,
                }],
            })),
        });
        self
    }
}

impl ShaderModule for TestShader {
    fn entry_point(&self, model: ExecutionModel, name: &str) -> Option<EntryPoint> {
        (model == self.model && name == self.name).then_some(EntryPoint(0))
    }

    fn inputs(&self, _: EntryPoint) -> Vec<LocationVariable> {
        self.inputs.clone()
    }

    fn outputs(&self, _: EntryPoint) -> Vec<LocationVariable> {
        self.outputs.clone()
    }

    fn descriptors(&self, _: EntryPoint) -> Vec<DescriptorVariable> {
        self.descriptors.clone()
    }

    fn dispatch(&self, _: EntryPoint, state: &mut ShaderState<'_>) {
        (self.run)(state);
    }
}

fn passthrough_vs(state: &mut ShaderState<'_>) {
    let position = state.input(0).deref(VariableType::F32Vec4);
    state.builtin(0).write(&position);
}

fn green_fs(state: &mut ShaderState<'_>) {
    state
        .output(0)
        .write(&Variable::Vec4F(Vec4::new(0.0, 1.0, 0.0, 1.0)));
}

fn red_fs(state: &mut ShaderState<'_>) {
    state
        .output(0)
        .write(&Variable::Vec4F(Vec4::new(1.0, 0.0, 0.0, 1.0)));
}

fn blue_fs(state: &mut ShaderState<'_>) {
    state
        .output(0)
        .write(&Variable::Vec4F(Vec4::new(0.0, 0.0, 1.0, 1.0)));
}

fn uniform_color_fs(state: &mut ShaderState<'_>) {
    let color = state.uniform(0, 0).child(0).deref(VariableType::F32Vec4);
    state.output(0).write(&color);
}

fn make_image(format: Format, extent: UVec3) -> Arc<Image> {
    let mut image = Image::new(format, extent, 1, 1);
    let memory = DeviceMemory::alloc(image.image_size().total_size).unwrap();
    image.bind_memory(&memory, 0);
    Arc::new(image)
}

fn make_buffer(size: u64) -> Arc<Buffer> {
    let mut buffer = Buffer::new(size);
    let memory = DeviceMemory::alloc(size).unwrap();
    buffer.bind_memory(&memory, 0);
    Arc::new(buffer)
}

fn make_buffer_with(bytes: &[u8]) -> Arc<Buffer> {
    let buffer = make_buffer(bytes.len() as u64);
    buffer.data_mut(0, bytes.len() as u64).copy_from_slice(bytes);
    buffer
}

fn primary() -> CommandBuffer {
    CommandBuffer::new(CommandBufferLevel::Primary, CommandPoolFlags::empty())
}

fn color_pass(format: Format, load_op: AttachmentLoadOp) -> Arc<RenderPass> {
    Arc::new(RenderPass::new(
        vec![AttachmentDescription::new(
            format,
            load_op,
            AttachmentStoreOp::Store,
        )],
        vec![SubpassDescription {
            color_attachments: vec![AttachmentReference {
                attachment: 0,
                layout: ImageLayout::ColorAttachment,
            }],
            ..Default::default()
        }],
    ))
}

fn color_depth_pass(color: Format, depth: Format) -> Arc<RenderPass> {
    Arc::new(RenderPass::new(
        vec![
            AttachmentDescription::new(color, AttachmentLoadOp::Clear, AttachmentStoreOp::Store),
            AttachmentDescription::new(depth, AttachmentLoadOp::Clear, AttachmentStoreOp::Store),
        ],
        vec![SubpassDescription {
            color_attachments: vec![AttachmentReference {
                attachment: 0,
                layout: ImageLayout::ColorAttachment,
            }],
            depth_stencil_attachment: Some(AttachmentReference {
                attachment: 1,
                layout: ImageLayout::DepthStencilAttachment,
            }),
            ..Default::default()
        }],
    ))
}

fn vec4_vertex_input() -> VertexInputState {
    VertexInputState {
        bindings: vec![VertexInputBinding {
            binding: 0,
            stride: 16,
            input_rate: VertexInputRate::Vertex,
        }],
        attributes: vec![VertexInputAttribute {
            location: 0,
            binding: 0,
            format: Format::R32G32B32A32Sfloat,
            offset: 0,
        }],
    }
}

fn graphics_pipeline(
    fragment: fn(&mut ShaderState<'_>),
    depth_stencil: Option<DepthStencilState>,
) -> Pipeline {
    let vs = TestShader::new(ExecutionModel::Vertex, "main", passthrough_vs).with_input(0);
    let fs = TestShader::new(ExecutionModel::Fragment, "main", fragment).with_output(0);

    Pipeline::Graphics(Arc::new(GraphicsPipeline {
        stages: GraphicsShaderStages {
            vertex: ShaderStageState {
                module: Arc::new(vs),
                entry_point: "main".to_owned(),
            },
            tessellation_control: None,
            tessellation_evaluation: None,
            geometry: None,
            fragment: Some(ShaderStageState {
                module: Arc::new(fs),
                entry_point: "main".to_owned(),
            }),
        },
        vertex_input: vec4_vertex_input(),
        input_assembly: InputAssemblyState {
            topology: PrimitiveTopology::TriangleList,
        },
        rasterization: RasterizationState::default(),
        multisample: MultisampleState::default(),
        depth_stencil,
        blend: vec![ColorBlendAttachment::default()],
    }))
}

/// A full-screen triangle at a fixed depth, in clip space.
fn fullscreen_triangle(z: f32) -> Arc<Buffer> {
    let vertices: [f32; 12] = [
        -1.0, -1.0, z, 1.0, //
        3.0, -1.0, z, 1.0, //
        -1.0, 3.0, z, 1.0,
    ];
    make_buffer_with(bytemuck::cast_slice(&vertices))
}

fn read_image(image: &Arc<Image>, device: &mut DeviceState, len: u64) -> Vec<u8> {
    let staging = make_buffer(len);
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.copy_image_to_buffer(
        image.clone(),
        staging.clone(),
        &[BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: SubresourceLayers::default(),
            image_offset: IVec3::ZERO,
            image_extent: image.extent(),
        }],
    );
    commands.end();
    commands.submit(device);
    staging.data(0, len).to_vec()
}

#[test]
fn solid_clear() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(4, 4, 1));
    let render_pass = color_pass(Format::R8G8B8A8Unorm, AttachmentLoadOp::Clear);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(image.clone())],
        UVec2::new(4, 4),
    ));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(4, 4)),
            vec![ClearValue::Color(ClearColor::Float([1.0, 0.0, 0.0, 1.0]))],
        )
        .unwrap();
    commands.end_render_pass().unwrap();
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&image, &mut device, 64);
    for pixel in bytes.chunks_exact(4) {
        assert_eq!(pixel, [0xFF, 0x00, 0x00, 0xFF]);
    }
}

#[test]
fn fullscreen_triangle_covers_every_pixel() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(2, 2, 1));
    let render_pass = color_pass(Format::R8G8B8A8Unorm, AttachmentLoadOp::Clear);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(image.clone())],
        UVec2::new(2, 2),
    ));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(2, 2)),
            vec![ClearValue::Color(ClearColor::Float([0.0; 4]))],
        )
        .unwrap();
    commands.bind_pipeline(BindPoint::Graphics, graphics_pipeline(green_fs, None));
    commands.bind_vertex_buffers(0, vec![(fullscreen_triangle(0.0), 0)]);
    commands.draw(3, 1, 0, 0);
    commands.end_render_pass().unwrap();
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&image, &mut device, 16);
    for pixel in bytes.chunks_exact(4) {
        assert_eq!(pixel, [0x00, 0xFF, 0x00, 0xFF]);
    }
}

#[test]
fn depth_test_culls_farther_triangle() {
    let color = make_image(Format::R8G8B8A8Unorm, UVec3::new(2, 2, 1));
    let depth = make_image(Format::D32Sfloat, UVec3::new(2, 2, 1));
    let render_pass = color_depth_pass(Format::R8G8B8A8Unorm, Format::D32Sfloat);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(color.clone()), ImageView::new(depth.clone())],
        UVec2::new(2, 2),
    ));

    let depth_state = Some(DepthStencilState {
        depth_test_enable: true,
        depth_write_enable: true,
        depth_compare_op: CompareOp::Less,
    });

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(2, 2)),
            vec![
                ClearValue::Color(ClearColor::Float([0.0; 4])),
                ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                },
            ],
        )
        .unwrap();

    commands.bind_pipeline(BindPoint::Graphics, graphics_pipeline(red_fs, depth_state));
    commands.bind_vertex_buffers(0, vec![(fullscreen_triangle(0.5), 0)]);
    commands.draw(3, 1, 0, 0);

    commands.bind_pipeline(BindPoint::Graphics, graphics_pipeline(blue_fs, depth_state));
    commands.bind_vertex_buffers(0, vec![(fullscreen_triangle(0.7), 0)]);
    commands.draw(3, 1, 0, 0);

    commands.end_render_pass().unwrap();
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&color, &mut device, 16);
    for pixel in bytes.chunks_exact(4) {
        assert_eq!(pixel, [0xFF, 0x00, 0x00, 0xFF]);
    }
}

#[test]
fn buffer_image_roundtrip() {
    let source: Vec<u8> = (0..16).collect();
    let upload = make_buffer_with(&source);
    let readback = make_buffer(16);
    let image = make_image(Format::R8Uint, UVec3::new(4, 4, 1));

    let region = BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: SubresourceLayers::default(),
        image_offset: IVec3::ZERO,
        image_extent: UVec3::new(4, 4, 1),
    };

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.copy_buffer_to_image(upload, image.clone(), &[region]);
    commands.copy_image_to_buffer(image, readback.clone(), &[region]);
    commands.end();
    commands.submit(&mut device);

    assert_eq!(readback.data(0, 16), source.as_slice());
}

#[test]
fn dynamic_uniform_offsets_select_colors() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(4, 2, 1));
    let render_pass = color_pass(Format::R8G8B8A8Unorm, AttachmentLoadOp::Clear);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(image.clone())],
        UVec2::new(4, 2),
    ));

    // Two colours, 256 bytes apart for the two dynamic offsets.
    let uniforms = make_buffer(272);
    uniforms
        .data_mut(0, 16)
        .copy_from_slice(bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 1.0]));
    uniforms
        .data_mut(256, 16)
        .copy_from_slice(bytemuck::cast_slice(&[0.0f32, 0.0, 1.0, 1.0]));

    let set_layout = Arc::new(DescriptorSetLayout::new(vec![DescriptorSetLayoutBinding {
        binding: 0,
        kind: DescriptorType::UniformBufferDynamic,
        count: 1,
        stages: ShaderStages::FRAGMENT,
    }]));
    let mut set = DescriptorSet::new(set_layout.clone());
    set.update(&[DescriptorWrite {
        binding: 0,
        value: DescriptorValue::Buffer(BufferRegion {
            buffer: uniforms,
            offset: 0,
            range: 16,
        }),
    }]);
    let set = Arc::new(set);

    let pipeline_layout = Arc::new(PipelineLayout {
        set_layouts: vec![set_layout],
        push_constant_size: 0,
    });

    let vs = TestShader::new(ExecutionModel::Vertex, "main", passthrough_vs).with_input(0);
    let fs = TestShader::new(ExecutionModel::Fragment, "main", uniform_color_fs)
        .with_output(0)
        .with_descriptor(0, 0, DescriptorType::UniformBufferDynamic);
    let pipeline = Pipeline::Graphics(Arc::new(GraphicsPipeline {
        stages: GraphicsShaderStages {
            vertex: ShaderStageState {
                module: Arc::new(vs),
                entry_point: "main".to_owned(),
            },
            tessellation_control: None,
            tessellation_evaluation: None,
            geometry: None,
            fragment: Some(ShaderStageState {
                module: Arc::new(fs),
                entry_point: "main".to_owned(),
            }),
        },
        vertex_input: vec4_vertex_input(),
        input_assembly: InputAssemblyState {
            topology: PrimitiveTopology::TriangleList,
        },
        rasterization: RasterizationState::default(),
        multisample: MultisampleState::default(),
        depth_stencil: None,
        blend: vec![ColorBlendAttachment::default()],
    }));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(4, 2)),
            vec![ClearValue::Color(ClearColor::Float([0.0; 4]))],
        )
        .unwrap();
    commands.bind_pipeline(BindPoint::Graphics, pipeline);
    commands.bind_vertex_buffers(0, vec![(fullscreen_triangle(0.0), 0)]);

    commands.set_scissor(0, vec![Rect2D::new(IVec2::new(0, 0), UVec2::new(2, 2))]);
    commands
        .bind_descriptor_sets(
            BindPoint::Graphics,
            pipeline_layout.clone(),
            0,
            vec![set.clone()],
            vec![0],
        )
        .unwrap();
    commands.draw(3, 1, 0, 0);

    commands.set_scissor(0, vec![Rect2D::new(IVec2::new(2, 0), UVec2::new(2, 2))]);
    commands
        .bind_descriptor_sets(BindPoint::Graphics, pipeline_layout, 0, vec![set], vec![256])
        .unwrap();
    commands.draw(3, 1, 0, 0);

    commands.end_render_pass().unwrap();
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&image, &mut device, 32);
    for y in 0..2 {
        for x in 0..4 {
            let pixel = &bytes[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
            if x < 2 {
                assert_eq!(pixel, [0xFF, 0x00, 0x00, 0xFF], "pixel ({x}, {y})");
            } else {
                assert_eq!(pixel, [0x00, 0x00, 0xFF, 0xFF], "pixel ({x}, {y})");
            }
        }
    }
}

#[test]
fn format_roundtrip_through_canonical_floats() {
    let formats = [
        Format::R8Unorm,
        Format::R8G8B8A8Unorm,
        Format::B8G8R8A8Unorm,
        Format::R8G8B8A8Snorm,
        Format::R8G8B8A8Srgb,
        Format::R8G8B8A8Uint,
        Format::R5G6B5UnormPack16,
        Format::A2B10G10R10UnormPack32,
        Format::R16G16B16A16Sfloat,
        Format::R32G32B32A32Sfloat,
        Format::B10G11R11UfloatPack32,
        Format::E5B9G9R9UfloatPack32,
    ];

    for format in formats {
        let info = format_info(format);
        let codec = PixelCodec::new(format);
        let pixel_size = info.total_size as usize;
        let len = (16 * pixel_size) as u64;

        // A deterministic gradient, encoded once to make it
        // representable.
        let staging = make_buffer(len);
        {
            let bytes = staging.data_mut(0, len);
            for (index, pixel) in bytes.chunks_exact_mut(pixel_size).enumerate() {
                let base = index as f32 / 15.0;
                codec.write_f32(pixel, [base, 1.0 - base, base * 0.5, 1.0]);
            }
        }

        let image_a = make_image(format, UVec3::new(4, 4, 1));
        let image_b = make_image(format, UVec3::new(4, 4, 1));
        let region = BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: SubresourceLayers::default(),
            image_offset: IVec3::ZERO,
            image_extent: UVec3::new(4, 4, 1),
        };

        let mut device = DeviceState::new();
        let mut commands = primary();
        commands.begin(CommandBufferUsage::empty());
        commands.copy_buffer_to_image(staging.clone(), image_a.clone(), &[region]);
        commands.end();
        commands.submit(&mut device);

        // Convert every pixel to canonical floats and back.
        let first = read_image(&image_a, &mut device, len);
        let converted = make_buffer(len);
        {
            let bytes = converted.data_mut(0, len);
            for (source, target) in first
                .chunks_exact(pixel_size)
                .zip(bytes.chunks_exact_mut(pixel_size))
            {
                let canonical = codec.read_f32(source);
                codec.write_f32(target, canonical);
            }
        }

        let mut commands = primary();
        commands.begin(CommandBufferUsage::empty());
        commands.copy_buffer_to_image(converted, image_b.clone(), &[region]);
        commands.end();
        commands.submit(&mut device);

        let second = read_image(&image_b, &mut device, len);
        assert_eq!(first, second, "roundtrip mismatch for {format:?}");
    }
}

#[test]
fn copy_buffer_reverse_is_identity() {
    let source: Vec<u8> = (0..64).map(|value| value as u8 ^ 0xA5).collect();
    let a = make_buffer_with(&source);
    let b = make_buffer(64);
    let c = make_buffer(64);

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.copy_buffer(
        a,
        b.clone(),
        &[BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: 64,
        }],
    );
    commands.copy_buffer(
        b,
        c.clone(),
        &[BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: 64,
        }],
    );
    commands.end();
    commands.submit(&mut device);

    assert_eq!(c.data(0, 64), source.as_slice());
}

#[test]
fn replay_is_deterministic() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(4, 4, 1));
    let render_pass = color_pass(Format::R8G8B8A8Unorm, AttachmentLoadOp::Clear);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(image.clone())],
        UVec2::new(4, 4),
    ));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(4, 4)),
            vec![ClearValue::Color(ClearColor::Float([0.25, 0.5, 0.75, 1.0]))],
        )
        .unwrap();
    commands.bind_pipeline(BindPoint::Graphics, graphics_pipeline(green_fs, None));
    commands.bind_vertex_buffers(0, vec![(fullscreen_triangle(0.0), 0)]);
    commands.draw(3, 1, 0, 0);
    commands.end_render_pass().unwrap();
    commands.end();

    commands.submit(&mut device);
    let first = read_image(&image, &mut device, 64);

    commands.submit(&mut device);
    let second = read_image(&image, &mut device, 64);

    assert_eq!(first, second);
}

#[test]
fn secondary_commands_replay_inline() {
    let buffer = make_buffer(16);

    let mut secondary = CommandBuffer::new(CommandBufferLevel::Secondary, CommandPoolFlags::empty());
    secondary.begin(CommandBufferUsage::empty());
    secondary.fill_buffer(buffer.clone(), 0, 16, 0xDEAD_BEEF);
    secondary.end();

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.execute_commands(vec![Arc::new(secondary)]).unwrap();
    commands.end();
    commands.submit(&mut device);

    for chunk in buffer.data(0, 16).chunks_exact(4) {
        assert_eq!(u32::from_le_bytes(chunk.try_into().unwrap()), 0xDEAD_BEEF);
    }
}

#[test]
fn indexed_draw_uses_index_buffer() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(2, 2, 1));
    let render_pass = color_pass(Format::R8G8B8A8Unorm, AttachmentLoadOp::Clear);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(image.clone())],
        UVec2::new(2, 2),
    ));

    // Vertices stored out of order; indices restore the triangle.
    let vertices: [f32; 16] = [
        0.0, 0.0, 0.0, 0.0, // unused
        -1.0, -1.0, 0.0, 1.0, //
        3.0, -1.0, 0.0, 1.0, //
        -1.0, 3.0, 0.0, 1.0,
    ];
    let vertex_buffer = make_buffer_with(bytemuck::cast_slice(&vertices));
    let index_buffer = make_buffer_with(bytemuck::cast_slice(&[1u16, 2, 3]));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(2, 2)),
            vec![ClearValue::Color(ClearColor::Float([0.0; 4]))],
        )
        .unwrap();
    commands.bind_pipeline(BindPoint::Graphics, graphics_pipeline(green_fs, None));
    commands.bind_vertex_buffers(0, vec![(vertex_buffer, 0)]);
    commands.bind_index_buffer(index_buffer, 0, IndexType::U16);
    commands.draw_indexed(3, 1, 0, 0, 0);
    commands.end_render_pass().unwrap();
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&image, &mut device, 16);
    for pixel in bytes.chunks_exact(4) {
        assert_eq!(pixel, [0x00, 0xFF, 0x00, 0xFF]);
    }
}

fn workgroup_writer_cs(state: &mut ShaderState<'_>) {
    let id = state.builtin_input.workgroup_id;
    let mut color = Vec4::new(id.x as f32, id.y as f32, id.z as f32, 1.0);
    // Push constants scale the written value.
    let scale = f32::from_le_bytes(state.push_constants[0..4].try_into().unwrap());
    color *= scale;
    state.uniform(0, 0).child(0).write(&Variable::Vec4F(color));
}

#[test]
fn compute_dispatch_writes_storage_buffer() {
    let storage = make_buffer(16);

    let set_layout = Arc::new(DescriptorSetLayout::new(vec![DescriptorSetLayoutBinding {
        binding: 0,
        kind: DescriptorType::StorageBuffer,
        count: 1,
        stages: ShaderStages::COMPUTE,
    }]));
    let mut set = DescriptorSet::new(set_layout.clone());
    set.update(&[DescriptorWrite {
        binding: 0,
        value: DescriptorValue::Buffer(BufferRegion {
            buffer: storage.clone(),
            offset: 0,
            range: 16,
        }),
    }]);
    let set = Arc::new(set);

    let pipeline_layout = Arc::new(PipelineLayout {
        set_layouts: vec![set_layout],
        push_constant_size: 4,
    });

    let cs = TestShader::new(ExecutionModel::GlCompute, "main", workgroup_writer_cs)
        .with_descriptor(0, 0, DescriptorType::StorageBuffer);
    let pipeline = Pipeline::Compute(Arc::new(ComputePipeline {
        stage: ShaderStageState {
            module: Arc::new(cs),
            entry_point: "main".to_owned(),
        },
    }));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.bind_pipeline(BindPoint::Compute, pipeline);
    commands
        .bind_descriptor_sets(BindPoint::Compute, pipeline_layout.clone(), 0, vec![set], vec![])
        .unwrap();
    commands
        .push_constants(
            pipeline_layout,
            ShaderStages::COMPUTE,
            0,
            &2.0f32.to_le_bytes(),
        )
        .unwrap();
    commands.dispatch(UVec3::new(2, 1, 1));
    commands.end();
    commands.submit(&mut device);

    // The last workgroup (id 1) wrote (2, 0, 0, 2).
    let bytes = storage.data(0, 16);
    let values: &[f32] = bytemuck::cast_slice(bytes);
    assert_eq!(values, &[2.0, 0.0, 0.0, 2.0]);
}

#[test]
fn blit_upscales_with_nearest_filter() {
    let src = make_image(Format::R8G8B8A8Unorm, UVec3::new(2, 2, 1));
    let dst = make_image(Format::R8G8B8A8Unorm, UVec3::new(4, 4, 1));

    // Four distinct quadrant colours.
    let pixels: [u8; 16] = [
        0xFF, 0x00, 0x00, 0xFF, // red
        0x00, 0xFF, 0x00, 0xFF, // green
        0x00, 0x00, 0xFF, 0xFF, // blue
        0xFF, 0xFF, 0xFF, 0xFF, // white
    ];
    let upload = make_buffer_with(&pixels);

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.copy_buffer_to_image(
        upload,
        src.clone(),
        &[BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: SubresourceLayers::default(),
            image_offset: IVec3::ZERO,
            image_extent: UVec3::new(2, 2, 1),
        }],
    );
    commands.blit_image(
        src,
        dst.clone(),
        &[ImageBlit {
            src_subresource: SubresourceLayers::default(),
            src_offsets: [IVec3::ZERO, IVec3::new(2, 2, 1)],
            dst_subresource: SubresourceLayers::default(),
            dst_offsets: [IVec3::ZERO, IVec3::new(4, 4, 1)],
        }],
        FilterMode::Nearest,
    );
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&dst, &mut device, 64);
    // Each source pixel becomes a 2x2 block.
    let expect = |x: usize, y: usize| -> &[u8] {
        let index = (y / 2) * 2 + (x / 2);
        &pixels[index * 4..index * 4 + 4]
    };
    for y in 0..4 {
        for x in 0..4 {
            let pixel = &bytes[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
            assert_eq!(pixel, expect(x, y), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn clear_color_image_fills_selected_range() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(4, 4, 1));

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.clear_color_image(
        image.clone(),
        ClearColor::Float([0.0, 1.0, 0.0, 1.0]),
        &[SubresourceRange {
            aspects: ImageAspects::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }],
    );
    commands.end();
    commands.submit(&mut device);

    let bytes = read_image(&image, &mut device, 64);
    for pixel in bytes.chunks_exact(4) {
        assert_eq!(pixel, [0x00, 0xFF, 0x00, 0xFF]);
    }
}

#[test]
fn events_toggle_at_replay_time() {
    let event = Arc::new(Event::new());

    let mut device = DeviceState::new();
    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.set_event(event.clone());
    commands.end();

    assert!(!event.is_signaled());
    commands.submit(&mut device);
    assert!(event.is_signaled());

    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.reset_event(event.clone());
    commands.pipeline_barrier();
    commands.end();
    commands.submit(&mut device);
    assert!(!event.is_signaled());
}

/// Collects debug output across the submit boundary.
#[derive(Clone)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn debug_stream_labels_each_command() {
    let sink = SharedSink(Arc::new(Mutex::new(Vec::new())));
    let buffer = make_buffer(16);

    let mut device = DeviceState::new();
    device.debug = Some(DebugOutput::new(Box::new(sink.clone())));

    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands.fill_buffer(buffer.clone(), 0, 16, 0);
    commands.update_buffer(buffer, 0, &[1, 2, 3, 4]);
    commands.pipeline_barrier();
    commands.end();
    commands.submit(&mut device);

    let log = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(log.contains("FillBuffer:"));
    assert!(log.contains("UpdateBuffer:"));
    assert!(log.contains("PipelineBarrier:"));
}

#[test]
fn double_begin_render_pass_is_rejected() {
    let image = make_image(Format::R8G8B8A8Unorm, UVec3::new(2, 2, 1));
    let render_pass = color_pass(Format::R8G8B8A8Unorm, AttachmentLoadOp::Load);
    let framebuffer = Arc::new(Framebuffer::new(
        vec![ImageView::new(image)],
        UVec2::new(2, 2),
    ));

    let mut commands = primary();
    commands.begin(CommandBufferUsage::empty());
    commands
        .begin_render_pass(
            render_pass.clone(),
            framebuffer.clone(),
            Rect2D::covering(UVec2::new(2, 2)),
            vec![],
        )
        .unwrap();
    let error = commands
        .begin_render_pass(
            render_pass,
            framebuffer,
            Rect2D::covering(UVec2::new(2, 2)),
            vec![],
        )
        .unwrap_err();
    assert!(matches!(
        error,
        soft_render::command::RecordError::RenderPassActive
    ));
}

#[test]
fn reset_and_rerecord_matches_fresh_buffer() {
    let target_a = make_buffer(16);
    let target_b = make_buffer(16);

    let mut device = DeviceState::new();

    // Record, submit, reset, record something else.
    let mut recycled = primary();
    recycled.begin(CommandBufferUsage::empty());
    recycled.fill_buffer(target_a.clone(), 0, 16, 0x1111_1111);
    recycled.end();
    recycled.submit(&mut device);
    recycled.reset();
    recycled.begin(CommandBufferUsage::empty());
    recycled.fill_buffer(target_a.clone(), 0, 16, 0x2222_2222);
    recycled.end();
    recycled.submit(&mut device);

    // The same second session from a fresh buffer.
    let mut fresh = primary();
    fresh.begin(CommandBufferUsage::empty());
    fresh.fill_buffer(target_b.clone(), 0, 16, 0x2222_2222);
    fresh.end();
    fresh.submit(&mut device);

    assert_eq!(target_a.data(0, 16), target_b.data(0, 16));
}
