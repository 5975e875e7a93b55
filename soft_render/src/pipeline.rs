//! Graphics and compute pipeline state.

use std::sync::Arc;

use bitflags::bitflags;

use crate::format::Format;
use crate::shader::ShaderModule;

/// Pipeline usage category with independently bound state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindPoint {
    Graphics,
    Compute,
}

pub const BIND_POINT_COUNT: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Cw,
    Ccw,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareOp {
    /// Applies the comparison with the incoming value on the left.
    pub fn compare(self, new: f32, current: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Less => new < current,
            Self::Equal => new == current,
            Self::LessEqual => new <= current,
            Self::Greater => new > current,
            Self::NotEqual => new != current,
            Self::GreaterEqual => new >= current,
            Self::Always => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

#[derive(Copy, Clone, Debug)]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

#[derive(Copy, Clone, Debug)]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: Format,
    pub offset: u32,
}

#[derive(Clone, Debug, Default)]
pub struct VertexInputState {
    pub bindings: Vec<VertexInputBinding>,
    pub attributes: Vec<VertexInputAttribute>,
}

impl VertexInputState {
    /// The binding description for `binding`. Referencing an undeclared
    /// binding is fatal.
    pub fn binding(&self, binding: u32) -> &VertexInputBinding {
        self.bindings
            .iter()
            .find(|description| description.binding == binding)
            .unwrap_or_else(|| panic!("vertex attribute references undeclared binding {binding}"))
    }

    pub fn max_location(&self) -> Option<u32> {
        self.attributes
            .iter()
            .map(|attribute| attribute.location)
            .max()
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InputAssemblyState {
    pub topology: PrimitiveTopology,
}

#[derive(Copy, Clone, Debug)]
pub struct RasterizationState {
    pub front_face: FrontFace,
    pub cull_mode: Option<Face>,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            front_face: FrontFace::Ccw,
            cull_mode: None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct MultisampleState {
    pub rasterization_samples: u32,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            rasterization_samples: 1,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u32 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend configuration for one colour attachment slot.
#[derive(Copy, Clone, Debug)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_blend_factor: BlendFactor,
    pub dst_color_blend_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_blend_factor: BlendFactor,
    pub dst_alpha_blend_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorWriteMask,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_blend_factor: BlendFactor::One,
            dst_color_blend_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_blend_factor: BlendFactor::One,
            dst_alpha_blend_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorWriteMask::all(),
        }
    }
}

/// The descriptor-set and push-constant interface shared by pipelines.
#[derive(Clone, Debug, Default)]
pub struct PipelineLayout {
    pub set_layouts: Vec<Arc<crate::descriptor::DescriptorSetLayout>>,
    pub push_constant_size: u32,
}

/// A shader stage: compiled module plus entry point name.
#[derive(Clone, Debug)]
pub struct ShaderStageState {
    pub module: Arc<dyn ShaderModule>,
    pub entry_point: String,
}

#[derive(Clone, Debug)]
pub struct GraphicsShaderStages {
    pub vertex: ShaderStageState,
    pub tessellation_control: Option<ShaderStageState>,
    pub tessellation_evaluation: Option<ShaderStageState>,
    pub geometry: Option<ShaderStageState>,
    pub fragment: Option<ShaderStageState>,
}

#[derive(Clone, Debug)]
pub struct GraphicsPipeline {
    pub stages: GraphicsShaderStages,
    pub vertex_input: VertexInputState,
    pub input_assembly: InputAssemblyState,
    pub rasterization: RasterizationState,
    pub multisample: MultisampleState,
    pub depth_stencil: Option<DepthStencilState>,
    /// One entry per colour attachment slot; missing entries behave as
    /// blend-disabled writes.
    pub blend: Vec<ColorBlendAttachment>,
}

#[derive(Clone, Debug)]
pub struct ComputePipeline {
    pub stage: ShaderStageState,
}

#[derive(Clone, Debug)]
pub enum Pipeline {
    Graphics(Arc<GraphicsPipeline>),
    Compute(Arc<ComputePipeline>),
}

impl Pipeline {
    pub fn bind_point(&self) -> BindPoint {
        match self {
            Self::Graphics(_) => BindPoint::Graphics,
            Self::Compute(_) => BindPoint::Compute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CompareOp;

    #[test]
    fn compare_ops() {
        assert!(CompareOp::Less.compare(0.5, 1.0));
        assert!(!CompareOp::Less.compare(1.0, 0.5));
        assert!(CompareOp::Always.compare(1.0, 0.0));
        assert!(!CompareOp::Never.compare(0.0, 1.0));
        assert!(CompareOp::GreaterEqual.compare(1.0, 1.0));
    }
}
