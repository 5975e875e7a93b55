#![deny(unsafe_op_in_unsafe_fn)]

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod format;
pub mod image;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod shader;

mod raster;

/// Number of descriptor-set slots per bind point.
pub const MAX_DESCRIPTOR_SETS: usize = 8;
/// Number of vertex-buffer binding slots.
pub const MAX_VERTEX_BINDINGS: usize = 16;
/// Number of colour-attachment slots in a subpass.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;
/// Size of the push-constant region, in bytes.
pub const MAX_PUSH_CONSTANTS_SIZE: usize = 128;
/// Number of viewport/scissor slots.
pub const MAX_VIEWPORTS: usize = 1;
/// Largest supported image dimension on any axis.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;
/// Mip chain length of a `MAX_IMAGE_DIMENSION`-sized image.
pub const MAX_MIP_LEVELS: usize = MAX_IMAGE_DIMENSION.ilog2() as usize + 1;
