//! Descriptor sets and their layouts.

use std::sync::Arc;

use bitflags::bitflags;

use crate::buffer::Buffer;
use crate::image::ImageView;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    SampledImage,
    StorageImage,
    Sampler,
    CombinedImageSampler,
}

impl DescriptorType {
    /// Dynamic-offset variants consume one offset per bind.
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::UniformBufferDynamic | Self::StorageBufferDynamic)
    }

    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer
                | Self::StorageBuffer
                | Self::UniformBufferDynamic
                | Self::StorageBufferDynamic
        )
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub kind: DescriptorType,
    pub count: u32,
    pub stages: ShaderStages,
}

/// An ordered list of binding declarations.
#[derive(Debug)]
pub struct DescriptorSetLayout {
    bindings: Vec<DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    pub fn new(mut bindings: Vec<DescriptorSetLayoutBinding>) -> Self {
        bindings.sort_unstable_by_key(|binding| binding.binding);
        for pair in bindings.windows(2) {
            assert_ne!(
                pair[0].binding, pair[1].binding,
                "duplicate binding {} in descriptor set layout",
                pair[0].binding,
            );
        }
        Self { bindings }
    }

    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Number of dynamic offsets a bind of this layout consumes.
    pub fn dynamic_binding_count(&self) -> usize {
        self.bindings
            .iter()
            .filter(|binding| binding.kind.is_dynamic())
            .count()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug)]
pub struct Sampler {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
        }
    }
}

/// A bound buffer range.
#[derive(Clone, Debug)]
pub struct BufferRegion {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub range: u64,
}

/// The resource stored in one binding slot.
#[derive(Clone, Debug, Default)]
pub enum DescriptorValue {
    #[default]
    Empty,
    Buffer(BufferRegion),
    Image(ImageView),
    CombinedImageSampler {
        view: ImageView,
        sampler: Arc<Sampler>,
    },
    Sampler(Arc<Sampler>),
}

impl DescriptorValue {
    pub fn buffer_region(&self) -> Option<&BufferRegion> {
        match self {
            Self::Buffer(region) => Some(region),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub value: DescriptorValue,
}

/// A descriptor set: layout plus one value per declared binding.
#[derive(Clone, Debug)]
pub struct DescriptorSet {
    layout: Arc<DescriptorSetLayout>,
    values: Vec<DescriptorValue>,
}

impl DescriptorSet {
    pub fn new(layout: Arc<DescriptorSetLayout>) -> Self {
        let values = vec![DescriptorValue::Empty; layout.bindings().len()];
        Self { layout, values }
    }

    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }

    /// Writes resources into binding slots.
    ///
    /// Panics when a write names a binding the layout does not declare.
    pub fn update(&mut self, writes: &[DescriptorWrite]) {
        for write in writes {
            let index = self
                .layout
                .bindings()
                .iter()
                .position(|binding| binding.binding == write.binding)
                .unwrap_or_else(|| {
                    panic!("descriptor write to undeclared binding {}", write.binding)
                });
            self.values[index] = write.value.clone();
        }
    }

    /// Bindings in declaration order, paired with their values.
    pub fn bindings(
        &self,
    ) -> impl Iterator<Item = (&DescriptorSetLayoutBinding, &DescriptorValue)> {
        self.layout.bindings().iter().zip(&self.values)
    }

    pub fn value(&self, binding: u32) -> Option<(&DescriptorSetLayoutBinding, &DescriptorValue)> {
        self.bindings().find(|(decl, _)| decl.binding == binding)
    }

    pub fn dynamic_binding_count(&self) -> usize {
        self.layout.dynamic_binding_count()
    }
}
