//! Mutable device state that command replay works against.

use std::fmt::{self, Debug, Formatter};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::buffer::Buffer;
use crate::descriptor::DescriptorSet;
use crate::format::{Format, PixelCodec};
use crate::pipeline::{BindPoint, Pipeline};
use crate::render_pass::{Framebuffer, Rect2D, RenderPass};
use crate::{MAX_DESCRIPTOR_SETS, MAX_PUSH_CONSTANTS_SIZE, MAX_VERTEX_BINDINGS, MAX_VIEWPORTS};

#[derive(Copy, Clone, Debug)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Dynamic pipeline state set by `Set*` commands.
#[derive(Clone, Debug, Default)]
pub struct DynamicState {
    pub viewports: [Viewport; MAX_VIEWPORTS],
    pub scissors: [Option<Rect2D>; MAX_VIEWPORTS],
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
    pub stencil_reference: u32,
}

/// A descriptor set installed into a slot: either a pool-owned set or a
/// push-descriptor set owned by the device.
#[derive(Clone, Debug)]
pub enum BoundSet {
    Pool(Arc<DescriptorSet>),
    Push(DescriptorSet),
}

impl BoundSet {
    pub fn get(&self) -> &DescriptorSet {
        match self {
            Self::Pool(set) => set,
            Self::Push(set) => set,
        }
    }
}

/// Bound state of one pipeline bind point.
#[derive(Clone, Debug, Default)]
pub struct PipelineBindState {
    pub pipeline: Option<Pipeline>,
    sets: [Option<BoundSet>; MAX_DESCRIPTOR_SETS],
    dynamic_offsets: [Vec<u32>; MAX_DESCRIPTOR_SETS],
}

impl PipelineBindState {
    pub fn set(&self, slot: usize) -> Option<&DescriptorSet> {
        self.sets[slot].as_ref().map(BoundSet::get)
    }

    /// Dynamic offsets for the set in `slot`, one per dynamic binding in
    /// binding order.
    pub fn dynamic_offsets(&self, slot: usize) -> &[u32] {
        &self.dynamic_offsets[slot]
    }

    pub(crate) fn install_set(&mut self, slot: usize, set: BoundSet, offsets: Vec<u32>) {
        self.sets[slot] = Some(set);
        self.dynamic_offsets[slot] = offsets;
    }

    /// The push-descriptor set in `slot`, lazily created from `layout`
    /// when the slot does not already hold one.
    pub(crate) fn push_set_mut(
        &mut self,
        slot: usize,
        layout: &Arc<crate::descriptor::DescriptorSetLayout>,
    ) -> &mut DescriptorSet {
        let needs_init = !matches!(self.sets[slot], Some(BoundSet::Push(_)));
        if needs_init {
            self.sets[slot] = Some(BoundSet::Push(DescriptorSet::new(layout.clone())));
            self.dynamic_offsets[slot].clear();
        }

        match self.sets[slot] {
            Some(BoundSet::Push(ref mut set)) => set,
            _ => unreachable!(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VertexBinding {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
}

#[derive(Clone, Debug)]
pub struct IndexBinding {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    /// Bytes per index: 1, 2 or 4.
    pub stride: u32,
}

/// The active render pass instance.
#[derive(Clone, Debug)]
pub struct RenderPassInstance {
    pub render_pass: Arc<RenderPass>,
    pub framebuffer: Arc<Framebuffer>,
    pub render_area: Rect2D,
}

#[derive(Debug, Default)]
pub struct GraphicsState {
    pub bind: PipelineBindState,
    pub vertex_bindings: [Option<VertexBinding>; MAX_VERTEX_BINDINGS],
    pub index_binding: Option<IndexBinding>,
    pub render_pass: Option<RenderPassInstance>,
    pub dynamic: DynamicState,
}

/// A host-visible signal cell toggled by `SetEvent`/`ResetEvent`.
#[derive(Debug, Default)]
pub struct Event {
    signaled: AtomicBool,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.signaled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.signaled.store(false, Ordering::SeqCst);
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }
}

/// Sink for the per-command debug stream.
///
/// Carried on the device state rather than process-wide so concurrent
/// devices do not interleave output.
pub struct DebugOutput {
    sink: Box<dyn Write + Send>,
}

impl DebugOutput {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }

    pub(crate) fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = writeln!(self.sink, "{args}");
    }
}

impl Debug for DebugOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugOutput").finish_non_exhaustive()
    }
}

/// The per-submit working set.
#[derive(Debug)]
pub struct DeviceState {
    pub graphics: GraphicsState,
    pub compute: PipelineBindState,
    pub push_constants: [u8; MAX_PUSH_CONSTANTS_SIZE],
    pub debug: Option<DebugOutput>,
    codecs: HashMap<Format, PixelCodec>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self {
            graphics: GraphicsState::default(),
            compute: PipelineBindState::default(),
            push_constants: [0; MAX_PUSH_CONSTANTS_SIZE],
            debug: None,
            codecs: HashMap::new(),
        }
    }

    /// The codec for `format`, built on first use.
    pub fn codec(&mut self, format: Format) -> PixelCodec {
        *self
            .codecs
            .entry(format)
            .or_insert_with(|| PixelCodec::new(format))
    }

    pub(crate) fn bind_state_mut(&mut self, bind_point: BindPoint) -> &mut PipelineBindState {
        match bind_point {
            BindPoint::Graphics => &mut self.graphics.bind,
            BindPoint::Compute => &mut self.compute,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}
