//! The compiled-module interface and shader execution state.
//!
//! A [`ShaderModule`] is a fully lowered shader: the runner asks it for
//! entry points, per-location interface variables and descriptor
//! variables, then calls [`ShaderModule::dispatch`] with a populated
//! [`ShaderState`]. How the module came to be (SPIR-V lowering, hand
//! written code in tests) is outside this crate.

use std::fmt::Debug;
use std::sync::Arc;

use glam::{Mat4, UVec3, Vec4};

use crate::descriptor::DescriptorType;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionModel {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    GlCompute,
}

/// Handle for one entry point within a module.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryPoint(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VariableType {
    F32Vec4,
    F32Mat4,
}

/// One per-location interface variable of an entry point.
#[derive(Copy, Clone, Debug)]
pub struct LocationVariable {
    pub location: u32,
    pub ty: VariableType,
}

/// One member of a uniform block.
#[derive(Copy, Clone, Debug)]
pub struct StructMember {
    pub offset: u32,
    pub ty: VariableType,
    pub row_major: bool,
    pub matrix_stride: u32,
}

#[derive(Clone, Debug, Default)]
pub struct StructLayout {
    pub members: Vec<StructMember>,
}

/// One descriptor variable of an entry point.
#[derive(Clone, Debug)]
pub struct DescriptorVariable {
    pub set: u32,
    pub binding: u32,
    pub kind: DescriptorType,
    /// Block layout for buffer-backed descriptors.
    pub layout: Option<Arc<StructLayout>>,
}

/// Builtin inputs for one invocation.
#[derive(Copy, Clone, Debug, Default)]
pub struct BuiltinInput {
    pub vertex_index: u32,
    pub instance_index: u32,
    pub workgroup_id: UVec3,
}

/// Builtin outputs of a vertex invocation.
#[derive(Copy, Clone, Debug, Default)]
#[repr(C)]
pub struct BuiltinOutput {
    pub position: Vec4,
    pub point_size: f32,
    pub clip_distance: [f32; 1],
}

/// A shader-visible value.
///
/// Mutation happens only through the `Pointer` variant. Pointer variables
/// are created by the runner over storage that stays live for the whole
/// invocation (vertex output slots, fragment input staging, buffer
/// regions); replay is single threaded, so no other access overlaps.
#[derive(Clone, Debug, Default)]
pub enum Variable {
    #[default]
    Unknown,
    Pointer(*mut u8),
    Vec4F(Vec4),
    Mat4F(Mat4),
    Uniform(UniformRef),
}

/// A buffer-backed uniform block with its member layout.
#[derive(Clone, Debug)]
pub struct UniformRef {
    base: *mut u8,
    len: usize,
    layout: Arc<StructLayout>,
}

impl Variable {
    /// Wraps a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid (and unaliased by concurrent writers) for
    /// every later projection through the returned variable.
    pub unsafe fn pointer(ptr: *mut u8) -> Self {
        Self::Pointer(ptr)
    }

    /// Wraps a buffer region as a uniform block.
    ///
    /// # Safety
    ///
    /// As for [`Variable::pointer`]: the region must stay valid for every
    /// later projection.
    pub unsafe fn uniform(base: *mut u8, len: usize, layout: Arc<StructLayout>) -> Self {
        Self::Uniform(UniformRef { base, len, layout })
    }

    /// Projects member `index` out of a struct-backed variable.
    pub fn child(&self, index: usize) -> Variable {
        match self {
            Self::Uniform(uniform) => {
                let member = uniform
                    .layout
                    .members
                    .get(index)
                    .unwrap_or_else(|| panic!("uniform block has no member {index}"));

                match member.ty {
                    VariableType::F32Mat4 => {
                        if member.row_major {
                            panic!("unsupported uniform layout: row-major matrix member");
                        }
                        if member.matrix_stride != 16 {
                            panic!(
                                "unsupported uniform layout: matrix stride {}",
                                member.matrix_stride
                            );
                        }
                        assert!(member.offset as usize + 64 <= uniform.len);
                    }
                    VariableType::F32Vec4 => {
                        assert!(member.offset as usize + 16 <= uniform.len);
                    }
                }

                // SAFETY: In range per the checks above; validity is the
                // `Variable::uniform` contract.
                Self::Pointer(unsafe { uniform.base.add(member.offset as usize) })
            }
            _ => panic!("child projection on a non-struct variable"),
        }
    }

    /// Loads the value behind a pointer variable.
    pub fn deref(&self, ty: VariableType) -> Variable {
        let Self::Pointer(ptr) = self else {
            panic!("deref of a non-pointer variable");
        };

        // SAFETY: Validity is the `Variable::pointer` contract; reads are
        // unaligned-safe.
        unsafe {
            match ty {
                VariableType::F32Vec4 => {
                    let values = ptr.cast::<[f32; 4]>().read_unaligned();
                    Self::Vec4F(Vec4::from_array(values))
                }
                VariableType::F32Mat4 => {
                    let values = ptr.cast::<[[f32; 4]; 4]>().read_unaligned();
                    Self::Mat4F(Mat4::from_cols_array_2d(&values))
                }
            }
        }
    }

    /// Stores `value` through a pointer variable.
    pub fn write(&self, value: &Variable) {
        let Self::Pointer(ptr) = self else {
            panic!("write through a non-pointer variable");
        };

        // SAFETY: Validity is the `Variable::pointer` contract.
        unsafe {
            match value {
                Variable::Vec4F(vector) => {
                    ptr.cast::<[f32; 4]>().write_unaligned(vector.to_array());
                }
                Variable::Mat4F(matrix) => {
                    ptr.cast::<[[f32; 4]; 4]>()
                        .write_unaligned(matrix.to_cols_array_2d());
                }
                _ => panic!("only vector and matrix values can be stored"),
            }
        }
    }

    pub fn as_vec4(&self) -> Vec4 {
        match self {
            Self::Vec4F(vector) => *vector,
            _ => panic!("variable is not a 4-component float vector"),
        }
    }

    pub fn as_mat4(&self) -> Mat4 {
        match self {
            Self::Mat4F(matrix) => *matrix,
            _ => panic!("variable is not a 4x4 float matrix"),
        }
    }
}

/// Everything one invocation can see.
///
/// The runner populates the state, dispatches the entry point, then reads
/// outputs back out of the storage its pointer variables referenced.
#[derive(Debug)]
pub struct ShaderState<'a> {
    /// Per-location inputs.
    pub inputs: Vec<Variable>,
    /// Per-location outputs; pointer variables into runner storage.
    pub outputs: &'a mut [Variable],
    /// Builtin outputs; pointer variables into runner storage.
    pub builtins: &'a mut [Variable],
    pub builtin_input: BuiltinInput,
    /// Per-set, per-binding descriptor values.
    pub uniforms: &'a [Vec<Variable>],
    pub push_constants: &'a [u8],
}

impl ShaderState<'_> {
    pub fn input(&self, location: u32) -> &Variable {
        &self.inputs[location as usize]
    }

    pub fn output(&self, location: u32) -> &Variable {
        &self.outputs[location as usize]
    }

    /// The builtin output at `index` (0 is clip position).
    pub fn builtin(&self, index: usize) -> &Variable {
        &self.builtins[index]
    }

    pub fn uniform(&self, set: u32, binding: u32) -> &Variable {
        &self.uniforms[set as usize][binding as usize]
    }
}

/// A compiled shader module.
pub trait ShaderModule: Debug + Send + Sync {
    /// Finds an entry point by execution model and name.
    fn entry_point(&self, model: ExecutionModel, name: &str) -> Option<EntryPoint>;

    /// Per-location inputs of the entry point.
    fn inputs(&self, entry: EntryPoint) -> Vec<LocationVariable>;

    /// Per-location outputs of the entry point.
    fn outputs(&self, entry: EntryPoint) -> Vec<LocationVariable>;

    /// Descriptor variables referenced by the entry point.
    fn descriptors(&self, entry: EntryPoint) -> Vec<DescriptorVariable>;

    /// Runs the entry point to completion.
    fn dispatch(&self, entry: EntryPoint, state: &mut ShaderState<'_>);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::{Mat4, Vec4};

    use super::{StructLayout, StructMember, Variable, VariableType};

    #[test]
    fn pointer_roundtrip_vec4() {
        let mut storage = [0u8; 16];
        let var = unsafe { Variable::pointer(storage.as_mut_ptr()) };
        var.write(&Variable::Vec4F(Vec4::new(1.0, 2.0, 3.0, 4.0)));
        let value = var.deref(VariableType::F32Vec4).as_vec4();
        assert_eq!(value, Vec4::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn uniform_matrix_member() {
        let mut storage = [0u8; 80];
        let matrix = Mat4::from_scale(glam::Vec3::splat(2.0));
        storage[16..80].copy_from_slice(bytemuck::cast_slice(&matrix.to_cols_array()));

        let layout = Arc::new(StructLayout {
            members: vec![
                StructMember {
                    offset: 0,
                    ty: VariableType::F32Vec4,
                    row_major: false,
                    matrix_stride: 0,
                },
                StructMember {
                    offset: 16,
                    ty: VariableType::F32Mat4,
                    row_major: false,
                    matrix_stride: 16,
                },
            ],
        });

        let var = unsafe { Variable::uniform(storage.as_mut_ptr(), storage.len(), layout) };
        let loaded = var.child(1).deref(VariableType::F32Mat4).as_mat4();
        assert_eq!(loaded, matrix);
    }

    #[test]
    #[should_panic(expected = "row-major")]
    fn row_major_matrices_are_refused() {
        let mut storage = [0u8; 64];
        let layout = Arc::new(StructLayout {
            members: vec![StructMember {
                offset: 0,
                ty: VariableType::F32Mat4,
                row_major: true,
                matrix_stride: 16,
            }],
        });

        let var = unsafe { Variable::uniform(storage.as_mut_ptr(), storage.len(), layout) };
        var.child(0);
    }

    #[test]
    #[should_panic(expected = "non-pointer")]
    fn deref_requires_pointer() {
        Variable::Vec4F(Vec4::ZERO).deref(VariableType::F32Vec4);
    }
}
