//! Command buffers: recording, validation and replay.

pub mod cmd;

mod replay;
pub(crate) mod transfer;

use std::sync::Arc;

use bitflags::bitflags;
use glam::UVec3;
use thiserror::Error;

use crate::buffer::Buffer;
use crate::descriptor::{DescriptorSet, DescriptorWrite, FilterMode, ShaderStages};
use crate::device::{DeviceState, Event, Viewport};
use crate::format::ClearColor;
use crate::image::Image;
use crate::pipeline::{BindPoint, Pipeline, PipelineLayout};
use crate::render_pass::{ClearValue, Framebuffer, Rect2D, RenderPass};
use crate::{MAX_DESCRIPTOR_SETS, MAX_PUSH_CONSTANTS_SIZE};

use cmd::{
    BeginRenderPassCmd, BindDescriptorSetsCmd, BindIndexBufferCmd, BindPipelineCmd,
    BindVertexBuffersCmd, BlitImageCmd, BufferCopy, BufferImageCopy, ClearAttachment,
    ClearAttachmentsCmd, ClearColorImageCmd, ClearDepthStencilImageCmd, ClearRect, Command,
    CopyBufferCmd, CopyBufferToImageCmd, CopyImageCmd, CopyImageToBufferCmd, DrawCmd,
    DrawIndexedCmd, ExecuteCommandsCmd, FillBufferCmd, ImageBlit, ImageCopy, IndexType,
    PushConstantsCmd, PushDescriptorSetCmd, SetScissorCmd, SetViewportCmd, SubresourceRange,
    UpdateBufferCmd,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CommandPoolFlags: u32 {
        /// Buffers may be individually reset by `begin`.
        const RESET_COMMAND_BUFFER = 1 << 0;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CommandBufferUsage: u32 {
        /// The buffer becomes invalid once its submission completes.
        const ONE_TIME_SUBMIT = 1 << 0;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Pending,
    Invalid,
}

/// A recording-time validation failure.
///
/// Any of these forces the buffer into the `Invalid` state.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected {expected} dynamic offsets, got {provided}")]
    DynamicOffsetCount { expected: usize, provided: usize },
    #[error("descriptor set slot {0} exceeds the bound limit")]
    DescriptorSetSlot(usize),
    #[error("push constant range {offset}..{end} exceeds the push constant region")]
    PushConstantRange { offset: u32, end: u32 },
    #[error("a render pass is already active")]
    RenderPassActive,
    #[error("no render pass is active")]
    NoRenderPassActive,
    #[error("secondary command buffer is not executable")]
    SecondaryNotExecutable,
    #[error("only secondary command buffers can be executed")]
    NotSecondary,
    #[error("only primary command buffers can execute secondaries")]
    NotPrimary,
}

/// A deferred command stream.
///
/// Commands are validated while recording and replayed in order against a
/// [`DeviceState`] at submit time.
#[derive(Debug)]
pub struct CommandBuffer {
    level: CommandBufferLevel,
    pool_flags: CommandPoolFlags,
    usage: CommandBufferUsage,
    state: CommandBufferState,
    in_render_pass: bool,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new(level: CommandBufferLevel, pool_flags: CommandPoolFlags) -> Self {
        Self {
            level,
            pool_flags,
            usage: CommandBufferUsage::empty(),
            state: CommandBufferState::Initial,
            in_render_pass: false,
            commands: Vec::new(),
        }
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub(crate) fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Moves the buffer into the `Recording` state.
    ///
    /// Pools created with `RESET_COMMAND_BUFFER` implicitly reset the
    /// buffer first; otherwise the buffer must be in the `Initial` state.
    pub fn begin(&mut self, usage: CommandBufferUsage) {
        if self
            .pool_flags
            .contains(CommandPoolFlags::RESET_COMMAND_BUFFER)
        {
            self.reset();
        } else {
            assert_eq!(
                self.state,
                CommandBufferState::Initial,
                "begin on a command buffer that is not in the initial state",
            );
        }

        self.usage = usage;
        self.state = CommandBufferState::Recording;
    }

    /// Finishes recording; the buffer becomes `Executable`.
    pub fn end(&mut self) {
        assert_eq!(
            self.state,
            CommandBufferState::Recording,
            "end on a command buffer that is not recording",
        );
        self.state = CommandBufferState::Executable;
    }

    /// Returns the buffer to the `Initial` state, dropping all recorded
    /// commands. Invalid while a submission is pending.
    pub fn reset(&mut self) {
        assert_ne!(
            self.state,
            CommandBufferState::Pending,
            "reset on a pending command buffer",
        );
        self.commands.clear();
        self.in_render_pass = false;
        self.state = CommandBufferState::Initial;
    }

    /// Replays the recorded commands against `device`.
    ///
    /// Commands execute sequentially in recorded order; every command
    /// observes the state mutations of its predecessors.
    pub fn submit(&mut self, device: &mut DeviceState) {
        assert_eq!(
            self.state,
            CommandBufferState::Executable,
            "submit on a command buffer that is not executable",
        );
        self.state = CommandBufferState::Pending;

        replay::run(device, &self.commands);

        self.state = if self.usage.contains(CommandBufferUsage::ONE_TIME_SUBMIT) {
            CommandBufferState::Invalid
        } else {
            CommandBufferState::Executable
        };
    }

    fn record(&mut self, command: Command) {
        assert_eq!(
            self.state,
            CommandBufferState::Recording,
            "recording into a command buffer that is not recording",
        );
        self.commands.push(command);
    }

    fn record_checked(
        &mut self,
        command: Result<Command, RecordError>,
    ) -> Result<(), RecordError> {
        assert_eq!(
            self.state,
            CommandBufferState::Recording,
            "recording into a command buffer that is not recording",
        );
        match command {
            Ok(command) => {
                self.commands.push(command);
                Ok(())
            }
            Err(error) => {
                self.state = CommandBufferState::Invalid;
                Err(error)
            }
        }
    }

    pub fn bind_pipeline(&mut self, bind_point: BindPoint, pipeline: Pipeline) {
        self.record(Command::BindPipeline(BindPipelineCmd {
            bind_point,
            pipeline,
        }));
    }

    /// Installs `sets` into consecutive slots starting at `first_set`.
    ///
    /// `dynamic_offsets` must hold exactly one entry per dynamic binding
    /// across all of `sets`, in set then binding order.
    pub fn bind_descriptor_sets(
        &mut self,
        bind_point: BindPoint,
        layout: Arc<PipelineLayout>,
        first_set: u32,
        sets: Vec<Arc<DescriptorSet>>,
        dynamic_offsets: Vec<u32>,
    ) -> Result<(), RecordError> {
        let command = {
            let last_slot = first_set as usize + sets.len();
            let expected: usize = sets.iter().map(|set| set.dynamic_binding_count()).sum();

            if last_slot > MAX_DESCRIPTOR_SETS {
                Err(RecordError::DescriptorSetSlot(last_slot - 1))
            } else if expected != dynamic_offsets.len() {
                Err(RecordError::DynamicOffsetCount {
                    expected,
                    provided: dynamic_offsets.len(),
                })
            } else {
                Ok(Command::BindDescriptorSets(BindDescriptorSetsCmd {
                    bind_point,
                    layout,
                    first_set,
                    sets,
                    dynamic_offsets,
                }))
            }
        };
        self.record_checked(command)
    }

    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: Vec<(Arc<Buffer>, u64)>) {
        self.record(Command::BindVertexBuffers(BindVertexBuffersCmd {
            first_binding,
            buffers,
        }));
    }

    pub fn bind_index_buffer(&mut self, buffer: Arc<Buffer>, offset: u64, index_type: IndexType) {
        self.record(Command::BindIndexBuffer(BindIndexBufferCmd {
            buffer,
            offset,
            index_type,
        }));
    }

    pub fn set_viewport(&mut self, first: u32, viewports: Vec<Viewport>) {
        self.record(Command::SetViewport(SetViewportCmd { first, viewports }));
    }

    pub fn set_scissor(&mut self, first: u32, scissors: Vec<Rect2D>) {
        self.record(Command::SetScissor(SetScissorCmd { first, scissors }));
    }

    pub fn set_depth_bounds(&mut self, min: f32, max: f32) {
        self.record(Command::SetDepthBounds { min, max });
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.record(Command::SetStencilReference { reference });
    }

    /// Copies `bytes` into the push-constant region at `offset`.
    pub fn push_constants(
        &mut self,
        layout: Arc<PipelineLayout>,
        stages: ShaderStages,
        offset: u32,
        bytes: &[u8],
    ) -> Result<(), RecordError> {
        let end = offset + bytes.len() as u32;
        let command = if end > MAX_PUSH_CONSTANTS_SIZE as u32 {
            Err(RecordError::PushConstantRange { offset, end })
        } else {
            Ok(Command::PushConstants(PushConstantsCmd {
                layout,
                stages,
                offset,
                bytes: bytes.to_vec(),
            }))
        };
        self.record_checked(command)
    }

    /// Merges `writes` into the device-owned push-descriptor set in slot
    /// `set`.
    pub fn push_descriptor_set(
        &mut self,
        bind_point: BindPoint,
        layout: Arc<PipelineLayout>,
        set: u32,
        writes: Vec<DescriptorWrite>,
    ) {
        self.record(Command::PushDescriptorSet(PushDescriptorSetCmd {
            bind_point,
            layout,
            set,
            writes,
        }));
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: Arc<RenderPass>,
        framebuffer: Arc<Framebuffer>,
        render_area: Rect2D,
        clear_values: Vec<ClearValue>,
    ) -> Result<(), RecordError> {
        let command = if self.in_render_pass {
            Err(RecordError::RenderPassActive)
        } else {
            Ok(Command::BeginRenderPass(BeginRenderPassCmd {
                render_pass,
                framebuffer,
                render_area,
                clear_values,
            }))
        };
        let result = self.record_checked(command);
        if result.is_ok() {
            self.in_render_pass = true;
        }
        result
    }

    pub fn end_render_pass(&mut self) -> Result<(), RecordError> {
        let command = if self.in_render_pass {
            Ok(Command::EndRenderPass)
        } else {
            Err(RecordError::NoRenderPassActive)
        };
        let result = self.record_checked(command);
        if result.is_ok() {
            self.in_render_pass = false;
        }
        result
    }

    pub fn copy_buffer(&mut self, src: Arc<Buffer>, dst: Arc<Buffer>, regions: &[BufferCopy]) {
        self.record(Command::CopyBuffer(CopyBufferCmd {
            src,
            dst,
            regions: regions.to_vec(),
        }));
    }

    pub fn copy_image(&mut self, src: Arc<Image>, dst: Arc<Image>, regions: &[ImageCopy]) {
        self.record(Command::CopyImage(CopyImageCmd {
            src,
            dst,
            regions: regions.to_vec(),
        }));
    }

    pub fn copy_buffer_to_image(
        &mut self,
        src: Arc<Buffer>,
        dst: Arc<Image>,
        regions: &[BufferImageCopy],
    ) {
        self.record(Command::CopyBufferToImage(CopyBufferToImageCmd {
            src,
            dst,
            regions: regions.to_vec(),
        }));
    }

    pub fn copy_image_to_buffer(
        &mut self,
        src: Arc<Image>,
        dst: Arc<Buffer>,
        regions: &[BufferImageCopy],
    ) {
        self.record(Command::CopyImageToBuffer(CopyImageToBufferCmd {
            src,
            dst,
            regions: regions.to_vec(),
        }));
    }

    pub fn blit_image(
        &mut self,
        src: Arc<Image>,
        dst: Arc<Image>,
        regions: &[ImageBlit],
        filter: FilterMode,
    ) {
        self.record(Command::BlitImage(BlitImageCmd {
            src,
            dst,
            regions: regions.to_vec(),
            filter,
        }));
    }

    pub fn update_buffer(&mut self, buffer: Arc<Buffer>, offset: u64, bytes: &[u8]) {
        self.record(Command::UpdateBuffer(UpdateBufferCmd {
            buffer,
            offset,
            bytes: bytes.to_vec(),
        }));
    }

    pub fn fill_buffer(&mut self, buffer: Arc<Buffer>, offset: u64, size: u64, data: u32) {
        self.record(Command::FillBuffer(FillBufferCmd {
            buffer,
            offset,
            size,
            data,
        }));
    }

    pub fn clear_color_image(
        &mut self,
        image: Arc<Image>,
        color: ClearColor,
        ranges: &[SubresourceRange],
    ) {
        self.record(Command::ClearColorImage(ClearColorImageCmd {
            image,
            color,
            ranges: ranges.to_vec(),
        }));
    }

    pub fn clear_depth_stencil_image(
        &mut self,
        image: Arc<Image>,
        depth: f32,
        stencil: u32,
        ranges: &[SubresourceRange],
    ) {
        self.record(Command::ClearDepthStencilImage(ClearDepthStencilImageCmd {
            image,
            depth,
            stencil,
            ranges: ranges.to_vec(),
        }));
    }

    pub fn clear_attachments(&mut self, attachments: &[ClearAttachment], rects: &[ClearRect]) {
        self.record(Command::ClearAttachments(ClearAttachmentsCmd {
            attachments: attachments.to_vec(),
            rects: rects.to_vec(),
        }));
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.record(Command::Draw(DrawCmd {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        }));
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.record(Command::DrawIndexed(DrawIndexedCmd {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        }));
    }

    pub fn dispatch(&mut self, group_count: UVec3) {
        self.record(Command::Dispatch { group_count });
    }

    pub fn set_event(&mut self, event: Arc<Event>) {
        self.record(Command::SetEvent(event));
    }

    pub fn reset_event(&mut self, event: Arc<Event>) {
        self.record(Command::ResetEvent(event));
    }

    /// Replay is sequential, so waiting is a sequence point: every prior
    /// command has already completed when this one runs.
    pub fn wait_events(&mut self, events: Vec<Arc<Event>>) {
        self.record(Command::WaitEvents { events });
    }

    pub fn pipeline_barrier(&mut self) {
        self.record(Command::PipelineBarrier);
    }

    /// Inlines the commands of each secondary buffer at this point.
    pub fn execute_commands(
        &mut self,
        buffers: Vec<Arc<CommandBuffer>>,
    ) -> Result<(), RecordError> {
        let command = if self.level != CommandBufferLevel::Primary {
            Err(RecordError::NotPrimary)
        } else if let Some(error) = buffers.iter().find_map(|buffer| {
            if buffer.level != CommandBufferLevel::Secondary {
                Some(RecordError::NotSecondary)
            } else if buffer.state != CommandBufferState::Executable {
                Some(RecordError::SecondaryNotExecutable)
            } else {
                None
            }
        }) {
            Err(error)
        } else {
            Ok(Command::ExecuteCommands(ExecuteCommandsCmd { buffers }))
        };
        self.record_checked(command)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        CommandBuffer, CommandBufferLevel, CommandBufferState, CommandBufferUsage,
        CommandPoolFlags, RecordError,
    };
    use crate::device::DeviceState;
    use crate::pipeline::PipelineLayout;

    fn primary() -> CommandBuffer {
        CommandBuffer::new(CommandBufferLevel::Primary, CommandPoolFlags::empty())
    }

    #[test]
    fn state_machine_happy_path() {
        let mut buffer = primary();
        assert_eq!(buffer.state(), CommandBufferState::Initial);

        buffer.begin(CommandBufferUsage::empty());
        assert_eq!(buffer.state(), CommandBufferState::Recording);

        buffer.end();
        assert_eq!(buffer.state(), CommandBufferState::Executable);

        let mut device = DeviceState::new();
        buffer.submit(&mut device);
        assert_eq!(buffer.state(), CommandBufferState::Executable);

        buffer.reset();
        assert_eq!(buffer.state(), CommandBufferState::Initial);
    }

    #[test]
    fn one_time_submit_invalidates() {
        let mut buffer = primary();
        buffer.begin(CommandBufferUsage::ONE_TIME_SUBMIT);
        buffer.end();

        let mut device = DeviceState::new();
        buffer.submit(&mut device);
        assert_eq!(buffer.state(), CommandBufferState::Invalid);
    }

    #[test]
    fn reset_pool_allows_restarting() {
        let mut buffer = CommandBuffer::new(
            CommandBufferLevel::Primary,
            CommandPoolFlags::RESET_COMMAND_BUFFER,
        );
        buffer.begin(CommandBufferUsage::empty());
        buffer.end();
        // Implicit reset via the pool flag.
        buffer.begin(CommandBufferUsage::empty());
        assert_eq!(buffer.state(), CommandBufferState::Recording);
    }

    #[test]
    #[should_panic(expected = "not in the initial state")]
    fn begin_twice_without_reset() {
        let mut buffer = primary();
        buffer.begin(CommandBufferUsage::empty());
        buffer.begin(CommandBufferUsage::empty());
    }

    #[test]
    #[should_panic(expected = "not recording")]
    fn end_before_begin() {
        let mut buffer = primary();
        buffer.end();
    }

    #[test]
    #[should_panic(expected = "not recording")]
    fn record_outside_recording() {
        let mut buffer = primary();
        buffer.draw(3, 1, 0, 0);
    }

    #[test]
    #[should_panic(expected = "not executable")]
    fn submit_without_end() {
        let mut buffer = primary();
        buffer.begin(CommandBufferUsage::empty());
        let mut device = DeviceState::new();
        buffer.submit(&mut device);
    }

    #[test]
    fn push_constant_range_is_validated() {
        let mut buffer = primary();
        buffer.begin(CommandBufferUsage::empty());
        let layout = Arc::new(PipelineLayout::default());
        let error = buffer
            .push_constants(
                layout,
                crate::descriptor::ShaderStages::VERTEX,
                120,
                &[0u8; 16],
            )
            .unwrap_err();
        assert!(matches!(error, RecordError::PushConstantRange { .. }));
        assert_eq!(buffer.state(), CommandBufferState::Invalid);
    }

    #[test]
    fn executing_a_primary_is_an_error() {
        let mut secondary_as_primary = primary();
        secondary_as_primary.begin(CommandBufferUsage::empty());
        secondary_as_primary.end();

        let mut buffer = primary();
        buffer.begin(CommandBufferUsage::empty());
        let error = buffer
            .execute_commands(vec![Arc::new(secondary_as_primary)])
            .unwrap_err();
        assert!(matches!(error, RecordError::NotSecondary));
    }
}
