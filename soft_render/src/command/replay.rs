//! Sequential command replay.
//!
//! One submission replays top to bottom on the calling thread; every
//! command observes the device-state mutations of all earlier commands.

use tracing::{trace, trace_span};

use crate::device::{BoundSet, DeviceState, IndexBinding, RenderPassInstance, VertexBinding};
use crate::raster;
use crate::render_pass::{AttachmentLoadOp, ClearValue};
use crate::MAX_VIEWPORTS;

use super::cmd::{BeginRenderPassCmd, BindDescriptorSetsCmd, Command};
use super::transfer;

pub(super) fn run(device: &mut DeviceState, commands: &[Command]) {
    let _span = trace_span!("CommandBuffer::submit").entered();

    for command in commands {
        if let Some(debug) = &mut device.debug {
            debug.line(format_args!("{command}"));
        }
        trace!(%command, "processing");

        process(device, command);
    }
}

fn process(device: &mut DeviceState, command: &Command) {
    match command {
        Command::BindPipeline(cmd) => {
            device.bind_state_mut(cmd.bind_point).pipeline = Some(cmd.pipeline.clone());
        }
        Command::BindDescriptorSets(cmd) => bind_descriptor_sets(device, cmd),
        Command::BindVertexBuffers(cmd) => {
            for (index, (buffer, offset)) in cmd.buffers.iter().enumerate() {
                device.graphics.vertex_bindings[cmd.first_binding as usize + index] =
                    Some(VertexBinding {
                        buffer: buffer.clone(),
                        offset: *offset,
                    });
            }
        }
        Command::BindIndexBuffer(cmd) => {
            device.graphics.index_binding = Some(IndexBinding {
                buffer: cmd.buffer.clone(),
                offset: cmd.offset,
                stride: cmd.index_type.stride(),
            });
        }
        Command::SetViewport(cmd) => {
            for (index, viewport) in cmd.viewports.iter().enumerate() {
                let slot = cmd.first as usize + index;
                assert!(slot < MAX_VIEWPORTS, "viewport slot {slot} out of range");
                device.graphics.dynamic.viewports[slot] = *viewport;
            }
        }
        Command::SetScissor(cmd) => {
            for (index, scissor) in cmd.scissors.iter().enumerate() {
                let slot = cmd.first as usize + index;
                assert!(slot < MAX_VIEWPORTS, "scissor slot {slot} out of range");
                device.graphics.dynamic.scissors[slot] = Some(*scissor);
            }
        }
        Command::SetDepthBounds { min, max } => {
            device.graphics.dynamic.min_depth_bounds = *min;
            device.graphics.dynamic.max_depth_bounds = *max;
        }
        Command::SetStencilReference { reference } => {
            device.graphics.dynamic.stencil_reference = *reference;
        }
        Command::PushConstants(cmd) => {
            let start = cmd.offset as usize;
            device.push_constants[start..start + cmd.bytes.len()].copy_from_slice(&cmd.bytes);
        }
        Command::PushDescriptorSet(cmd) => {
            let layout = cmd.layout.set_layouts[cmd.set as usize].clone();
            let state = device.bind_state_mut(cmd.bind_point);
            state
                .push_set_mut(cmd.set as usize, &layout)
                .update(&cmd.writes);
        }
        Command::BeginRenderPass(cmd) => begin_render_pass(device, cmd),
        Command::EndRenderPass => {
            device.graphics.render_pass = None;
        }
        Command::CopyBuffer(cmd) => transfer::copy_buffer(cmd),
        Command::CopyImage(cmd) => transfer::copy_image(cmd),
        Command::CopyBufferToImage(cmd) => transfer::copy_buffer_to_image(cmd),
        Command::CopyImageToBuffer(cmd) => transfer::copy_image_to_buffer(cmd),
        Command::BlitImage(cmd) => transfer::blit_image(device, cmd),
        Command::UpdateBuffer(cmd) => transfer::update_buffer(cmd),
        Command::FillBuffer(cmd) => transfer::fill_buffer(cmd),
        Command::ClearColorImage(cmd) => transfer::clear_color_image(device, cmd),
        Command::ClearDepthStencilImage(cmd) => transfer::clear_depth_stencil_image(device, cmd),
        Command::ClearAttachments(cmd) => transfer::clear_attachments(device, cmd),
        Command::Draw(cmd) => raster::draw(device, cmd),
        Command::DrawIndexed(cmd) => raster::draw_indexed(device, cmd),
        Command::Dispatch { group_count } => raster::dispatch(device, *group_count),
        Command::SetEvent(event) => event.signal(),
        Command::ResetEvent(event) => event.reset(),
        // Replay is serial; events and barriers only pin ordering, which
        // program order already provides.
        Command::WaitEvents { .. } | Command::PipelineBarrier => {}
        Command::ExecuteCommands(cmd) => {
            for buffer in &cmd.buffers {
                run(device, buffer.commands());
            }
        }
    }
}

fn bind_descriptor_sets(device: &mut DeviceState, cmd: &BindDescriptorSetsCmd) {
    let state = device.bind_state_mut(cmd.bind_point);

    // Offsets are consumed per set, one per dynamic binding, in binding
    // order. Recording validated the total count.
    let mut offsets = cmd.dynamic_offsets.iter().copied();
    for (index, set) in cmd.sets.iter().enumerate() {
        let consumed: Vec<u32> = offsets.by_ref().take(set.dynamic_binding_count()).collect();
        state.install_set(
            cmd.first_set as usize + index,
            BoundSet::Pool(set.clone()),
            consumed,
        );
    }
}

fn begin_render_pass(device: &mut DeviceState, cmd: &BeginRenderPassCmd) {
    assert_eq!(
        cmd.render_pass.subpasses().len(),
        1,
        "unsupported render pass: multiple subpasses",
    );

    device.graphics.render_pass = Some(RenderPassInstance {
        render_pass: cmd.render_pass.clone(),
        framebuffer: cmd.framebuffer.clone(),
        render_area: cmd.render_area,
    });

    let subpass = &cmd.render_pass.subpasses()[0];

    for reference in &subpass.color_attachments {
        if !reference.is_used() {
            continue;
        }

        let attachment = &cmd.render_pass.attachments()[reference.attachment as usize];
        if attachment.load_op != AttachmentLoadOp::Clear {
            continue;
        }

        let view = &cmd.framebuffer.attachments()[reference.attachment as usize];
        let image = view.image().clone();
        let color = cmd.clear_values[reference.attachment as usize].color();
        transfer::clear_color_levels(
            device,
            &image,
            color,
            0,
            image.mip_levels(),
            0,
            image.array_layers(),
        );
    }

    if let Some(reference) = subpass.depth_stencil_attachment {
        if reference.is_used() {
            let attachment = &cmd.render_pass.attachments()[reference.attachment as usize];
            if attachment.load_op == AttachmentLoadOp::Clear {
                let view = &cmd.framebuffer.attachments()[reference.attachment as usize];
                let image = view.image().clone();
                let aspects = transfer::format_aspects(image.format());
                let clear = cmd.clear_values[reference.attachment as usize];
                let ClearValue::DepthStencil { depth, stencil } = clear else {
                    panic!("depth attachment cleared with a colour value");
                };
                transfer::clear_depth_stencil_levels(
                    device,
                    &image,
                    aspects,
                    depth,
                    stencil as u8,
                    view.base_mip_level(),
                    1,
                    view.base_array_layer(),
                    1,
                );
            }
        }
    }
}
