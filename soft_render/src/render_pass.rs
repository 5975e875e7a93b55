//! Render passes and framebuffers.

use glam::{IVec2, UVec2};

use crate::format::{ClearColor, Format};
use crate::image::ImageView;

/// Sentinel for an unused attachment slot.
pub const ATTACHMENT_UNUSED: u32 = u32::MAX;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    Present,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentLoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentStoreOp {
    Store,
    DontCare,
}

#[derive(Copy, Clone, Debug)]
pub struct AttachmentDescription {
    pub format: Format,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub stencil_load_op: AttachmentLoadOp,
    pub stencil_store_op: AttachmentStoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl AttachmentDescription {
    pub fn new(format: Format, load_op: AttachmentLoadOp, store_op: AttachmentStoreOp) -> Self {
        Self {
            format,
            load_op,
            store_op,
            stencil_load_op: AttachmentLoadOp::DontCare,
            stencil_store_op: AttachmentStoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::General,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: ImageLayout,
}

impl AttachmentReference {
    pub fn is_used(&self) -> bool {
        self.attachment != ATTACHMENT_UNUSED
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubpassDescription {
    pub color_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
    pub input_attachments: Vec<AttachmentReference>,
    pub resolve_attachments: Vec<AttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

#[derive(Debug)]
pub struct RenderPass {
    attachments: Vec<AttachmentDescription>,
    subpasses: Vec<SubpassDescription>,
}

impl RenderPass {
    pub fn new(
        attachments: Vec<AttachmentDescription>,
        subpasses: Vec<SubpassDescription>,
    ) -> Self {
        assert!(!subpasses.is_empty(), "render pass without subpasses");
        for subpass in &subpasses {
            for reference in subpass
                .color_attachments
                .iter()
                .chain(subpass.depth_stencil_attachment.iter())
            {
                assert!(
                    !reference.is_used() || (reference.attachment as usize) < attachments.len(),
                    "attachment reference {} out of range",
                    reference.attachment,
                );
            }
        }

        Self {
            attachments,
            subpasses,
        }
    }

    pub fn attachments(&self) -> &[AttachmentDescription] {
        &self.attachments
    }

    pub fn subpasses(&self) -> &[SubpassDescription] {
        &self.subpasses
    }
}

/// One image view per attachment slot.
#[derive(Debug)]
pub struct Framebuffer {
    attachments: Vec<ImageView>,
    extent: UVec2,
    layers: u32,
}

impl Framebuffer {
    pub fn new(attachments: Vec<ImageView>, extent: UVec2) -> Self {
        Self {
            attachments,
            extent,
            layers: 1,
        }
    }

    pub fn attachments(&self) -> &[ImageView] {
        &self.attachments
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }
}

/// An integer rectangle (render areas, scissors, clear rects).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect2D {
    pub offset: IVec2,
    pub extent: UVec2,
}

impl Rect2D {
    pub fn new(offset: IVec2, extent: UVec2) -> Self {
        Self { offset, extent }
    }

    pub fn covering(extent: UVec2) -> Self {
        Self {
            offset: IVec2::ZERO,
            extent,
        }
    }

    /// The intersection of two rectangles. Empty results collapse to a
    /// zero extent.
    pub fn intersect(&self, other: &Rect2D) -> Rect2D {
        let start = self.offset.max(other.offset);
        let self_end = self.offset + self.extent.as_ivec2();
        let other_end = other.offset + other.extent.as_ivec2();
        let end = self_end.min(other_end);
        let extent = (end - start).max(IVec2::ZERO).as_uvec2();
        Rect2D {
            offset: start,
            extent,
        }
    }
}

/// The clear value supplied for one attachment at BeginRenderPass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClearValue {
    Color(ClearColor),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn color(&self) -> ClearColor {
        match self {
            Self::Color(color) => *color,
            Self::DepthStencil { .. } => panic!("expected a colour clear value"),
        }
    }

    pub fn depth_stencil(&self) -> (f32, u32) {
        match self {
            Self::DepthStencil { depth, stencil } => (*depth, *stencil),
            Self::Color(_) => panic!("expected a depth/stencil clear value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec2, UVec2};

    use super::Rect2D;

    #[test]
    fn rect_intersection() {
        let a = Rect2D::new(IVec2::new(0, 0), UVec2::new(4, 4));
        let b = Rect2D::new(IVec2::new(2, 1), UVec2::new(4, 4));
        let clipped = a.intersect(&b);
        assert_eq!(clipped.offset, IVec2::new(2, 1));
        assert_eq!(clipped.extent, UVec2::new(2, 3));
    }

    #[test]
    fn disjoint_rects_have_empty_intersection() {
        let a = Rect2D::new(IVec2::new(0, 0), UVec2::new(2, 2));
        let b = Rect2D::new(IVec2::new(5, 5), UVec2::new(2, 2));
        assert_eq!(a.intersect(&b).extent, UVec2::ZERO);
    }
}
