//! Command records.
//!
//! Each recorded operation becomes one immutable [`Command`] value.
//! Records copy their input arrays eagerly and hold strong references to
//! every resource they name, so replay never depends on caller memory.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use bitflags::bitflags;
use glam::{IVec3, UVec3};

use crate::buffer::Buffer;
use crate::descriptor::{DescriptorSet, DescriptorWrite, FilterMode, ShaderStages};
use crate::device::{Event, Viewport};
use crate::format::ClearColor;
use crate::image::Image;
use crate::pipeline::{BindPoint, Pipeline, PipelineLayout};
use crate::render_pass::{ClearValue, Framebuffer, Rect2D, RenderPass};

use super::CommandBuffer;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ImageAspects: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    /// Bytes per index.
    pub fn stride(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SubresourceLayers {
    pub aspects: ImageAspects,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl Default for SubresourceLayers {
    fn default() -> Self {
        Self {
            aspects: ImageAspects::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SubresourceRange {
    pub aspects: ImageAspects,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageCopy {
    pub src_subresource: SubresourceLayers,
    pub src_offset: IVec3,
    pub dst_subresource: SubresourceLayers,
    pub dst_offset: IVec3,
    pub extent: UVec3,
}

#[derive(Copy, Clone, Debug)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    /// Row pitch in pixels; zero means tightly packed.
    pub buffer_row_length: u32,
    /// Plane pitch in rows; zero means tightly packed.
    pub buffer_image_height: u32,
    pub image_subresource: SubresourceLayers,
    pub image_offset: IVec3,
    pub image_extent: UVec3,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageBlit {
    pub src_subresource: SubresourceLayers,
    /// Source corners; the second corner may be smaller for flips.
    pub src_offsets: [IVec3; 2],
    pub dst_subresource: SubresourceLayers,
    pub dst_offsets: [IVec3; 2],
}

#[derive(Copy, Clone, Debug)]
pub struct ClearAttachment {
    pub aspects: ImageAspects,
    pub color_attachment: u32,
    pub clear_value: ClearValue,
}

#[derive(Copy, Clone, Debug)]
pub struct ClearRect {
    pub rect: Rect2D,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Clone, Debug)]
pub struct BindPipelineCmd {
    pub bind_point: BindPoint,
    pub pipeline: Pipeline,
}

#[derive(Clone, Debug)]
pub struct BindDescriptorSetsCmd {
    pub bind_point: BindPoint,
    pub layout: Arc<PipelineLayout>,
    pub first_set: u32,
    pub sets: Vec<Arc<DescriptorSet>>,
    pub dynamic_offsets: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct BindVertexBuffersCmd {
    pub first_binding: u32,
    pub buffers: Vec<(Arc<Buffer>, u64)>,
}

#[derive(Clone, Debug)]
pub struct BindIndexBufferCmd {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub index_type: IndexType,
}

#[derive(Clone, Debug)]
pub struct SetViewportCmd {
    pub first: u32,
    pub viewports: Vec<Viewport>,
}

#[derive(Clone, Debug)]
pub struct SetScissorCmd {
    pub first: u32,
    pub scissors: Vec<Rect2D>,
}

#[derive(Clone, Debug)]
pub struct PushConstantsCmd {
    pub layout: Arc<PipelineLayout>,
    pub stages: ShaderStages,
    pub offset: u32,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct PushDescriptorSetCmd {
    pub bind_point: BindPoint,
    pub layout: Arc<PipelineLayout>,
    pub set: u32,
    pub writes: Vec<DescriptorWrite>,
}

#[derive(Clone, Debug)]
pub struct BeginRenderPassCmd {
    pub render_pass: Arc<RenderPass>,
    pub framebuffer: Arc<Framebuffer>,
    pub render_area: Rect2D,
    pub clear_values: Vec<ClearValue>,
}

#[derive(Clone, Debug)]
pub struct CopyBufferCmd {
    pub src: Arc<Buffer>,
    pub dst: Arc<Buffer>,
    pub regions: Vec<BufferCopy>,
}

#[derive(Clone, Debug)]
pub struct CopyImageCmd {
    pub src: Arc<Image>,
    pub dst: Arc<Image>,
    pub regions: Vec<ImageCopy>,
}

#[derive(Clone, Debug)]
pub struct CopyBufferToImageCmd {
    pub src: Arc<Buffer>,
    pub dst: Arc<Image>,
    pub regions: Vec<BufferImageCopy>,
}

#[derive(Clone, Debug)]
pub struct CopyImageToBufferCmd {
    pub src: Arc<Image>,
    pub dst: Arc<Buffer>,
    pub regions: Vec<BufferImageCopy>,
}

#[derive(Clone, Debug)]
pub struct BlitImageCmd {
    pub src: Arc<Image>,
    pub dst: Arc<Image>,
    pub regions: Vec<ImageBlit>,
    pub filter: FilterMode,
}

#[derive(Clone, Debug)]
pub struct UpdateBufferCmd {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct FillBufferCmd {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub size: u64,
    pub data: u32,
}

#[derive(Clone, Debug)]
pub struct ClearColorImageCmd {
    pub image: Arc<Image>,
    pub color: ClearColor,
    pub ranges: Vec<SubresourceRange>,
}

#[derive(Clone, Debug)]
pub struct ClearDepthStencilImageCmd {
    pub image: Arc<Image>,
    pub depth: f32,
    pub stencil: u32,
    pub ranges: Vec<SubresourceRange>,
}

#[derive(Clone, Debug)]
pub struct ClearAttachmentsCmd {
    pub attachments: Vec<ClearAttachment>,
    pub rects: Vec<ClearRect>,
}

#[derive(Copy, Clone, Debug)]
pub struct DrawCmd {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct DrawIndexedCmd {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

#[derive(Clone, Debug)]
pub struct ExecuteCommandsCmd {
    pub buffers: Vec<Arc<CommandBuffer>>,
}

/// One recorded operation.
#[derive(Clone, Debug)]
pub enum Command {
    BindPipeline(BindPipelineCmd),
    BindDescriptorSets(BindDescriptorSetsCmd),
    BindVertexBuffers(BindVertexBuffersCmd),
    BindIndexBuffer(BindIndexBufferCmd),
    SetViewport(SetViewportCmd),
    SetScissor(SetScissorCmd),
    SetDepthBounds { min: f32, max: f32 },
    SetStencilReference { reference: u32 },
    PushConstants(PushConstantsCmd),
    PushDescriptorSet(PushDescriptorSetCmd),
    BeginRenderPass(BeginRenderPassCmd),
    EndRenderPass,
    CopyBuffer(CopyBufferCmd),
    CopyImage(CopyImageCmd),
    CopyBufferToImage(CopyBufferToImageCmd),
    CopyImageToBuffer(CopyImageToBufferCmd),
    BlitImage(BlitImageCmd),
    UpdateBuffer(UpdateBufferCmd),
    FillBuffer(FillBufferCmd),
    ClearColorImage(ClearColorImageCmd),
    ClearDepthStencilImage(ClearDepthStencilImageCmd),
    ClearAttachments(ClearAttachmentsCmd),
    Draw(DrawCmd),
    DrawIndexed(DrawIndexedCmd),
    Dispatch { group_count: UVec3 },
    SetEvent(Arc<Event>),
    ResetEvent(Arc<Event>),
    WaitEvents { events: Vec<Arc<Event>> },
    PipelineBarrier,
    ExecuteCommands(ExecuteCommandsCmd),
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindPipeline(cmd) => {
                write!(f, "BindPipeline: binding {:?} pipeline", cmd.bind_point)
            }
            Self::BindDescriptorSets(cmd) => write!(
                f,
                "BindDescriptorSets: binding {} sets starting at {} with {} dynamic offsets",
                cmd.sets.len(),
                cmd.first_set,
                cmd.dynamic_offsets.len(),
            ),
            Self::BindVertexBuffers(cmd) => write!(
                f,
                "BindVertexBuffers: binding {} buffers starting at {}",
                cmd.buffers.len(),
                cmd.first_binding,
            ),
            Self::BindIndexBuffer(cmd) => write!(
                f,
                "BindIndexBuffer: binding {:?} indices at offset {}",
                cmd.index_type, cmd.offset,
            ),
            Self::SetViewport(cmd) => write!(
                f,
                "SetViewport: setting {} viewports starting at {}",
                cmd.viewports.len(),
                cmd.first,
            ),
            Self::SetScissor(cmd) => write!(
                f,
                "SetScissor: setting {} scissors starting at {}",
                cmd.scissors.len(),
                cmd.first,
            ),
            Self::SetDepthBounds { min, max } => {
                write!(f, "SetDepthBounds: setting bounds to {min}..{max}")
            }
            Self::SetStencilReference { reference } => {
                write!(f, "SetStencilReference: setting reference to {reference}")
            }
            Self::PushConstants(cmd) => write!(
                f,
                "PushConstants: pushing {} bytes at offset {}",
                cmd.bytes.len(),
                cmd.offset,
            ),
            Self::PushDescriptorSet(cmd) => write!(
                f,
                "PushDescriptorSet: pushing {} writes into set {}",
                cmd.writes.len(),
                cmd.set,
            ),
            Self::BeginRenderPass(cmd) => write!(
                f,
                "BeginRenderPass: beginning render pass over {}x{}",
                cmd.framebuffer.extent().x,
                cmd.framebuffer.extent().y,
            ),
            Self::EndRenderPass => write!(f, "EndRenderPass: ending render pass"),
            Self::CopyBuffer(cmd) => {
                write!(f, "CopyBuffer: copying {} regions", cmd.regions.len())
            }
            Self::CopyImage(cmd) => {
                write!(f, "CopyImage: copying {} regions", cmd.regions.len())
            }
            Self::CopyBufferToImage(cmd) => write!(
                f,
                "CopyBufferToImage: copying {} regions",
                cmd.regions.len(),
            ),
            Self::CopyImageToBuffer(cmd) => write!(
                f,
                "CopyImageToBuffer: copying {} regions",
                cmd.regions.len(),
            ),
            Self::BlitImage(cmd) => write!(
                f,
                "BlitImage: blitting {} regions with {:?} filter",
                cmd.regions.len(),
                cmd.filter,
            ),
            Self::UpdateBuffer(cmd) => write!(
                f,
                "UpdateBuffer: writing {} bytes at offset {}",
                cmd.bytes.len(),
                cmd.offset,
            ),
            Self::FillBuffer(cmd) => write!(
                f,
                "FillBuffer: filling {} bytes at offset {} with {:#010x}",
                cmd.size, cmd.offset, cmd.data,
            ),
            Self::ClearColorImage(cmd) => write!(
                f,
                "ClearColorImage: clearing {} ranges",
                cmd.ranges.len(),
            ),
            Self::ClearDepthStencilImage(cmd) => write!(
                f,
                "ClearDepthStencilImage: clearing {} ranges to depth {}",
                cmd.ranges.len(),
                cmd.depth,
            ),
            Self::ClearAttachments(cmd) => write!(
                f,
                "ClearAttachments: clearing {} attachments over {} rects",
                cmd.attachments.len(),
                cmd.rects.len(),
            ),
            Self::Draw(cmd) => write!(
                f,
                "Draw: drawing {} vertices from {} ({} instances)",
                cmd.vertex_count, cmd.first_vertex, cmd.instance_count,
            ),
            Self::DrawIndexed(cmd) => write!(
                f,
                "DrawIndexed: drawing {} indices from {} ({} instances)",
                cmd.index_count, cmd.first_index, cmd.instance_count,
            ),
            Self::Dispatch { group_count } => write!(
                f,
                "Dispatch: dispatching {}x{}x{} work groups",
                group_count.x, group_count.y, group_count.z,
            ),
            Self::SetEvent(_) => write!(f, "SetEvent: signalling event"),
            Self::ResetEvent(_) => write!(f, "ResetEvent: resetting event"),
            Self::WaitEvents { events } => {
                write!(f, "WaitEvents: waiting on {} events", events.len())
            }
            Self::PipelineBarrier => write!(f, "PipelineBarrier: sequence point"),
            Self::ExecuteCommands(cmd) => write!(
                f,
                "ExecuteCommands: executing {} secondary buffers",
                cmd.buffers.len(),
            ),
        }
    }
}
