//! GPU-side layouts for the bone palette and skinned vertices

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::core::{Error, Result, MAX_BONES, MAX_BONES_PER_VERTEX};

/// GPU-side bone transform (mat4 for skinning matrix)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuBoneTransform {
    pub matrix: [[f32; 4]; 4],
}

impl GpuBoneTransform {
    /// Create from a glam Mat4
    pub fn from_mat4(matrix: Mat4) -> Self {
        Self {
            matrix: matrix.to_cols_array_2d(),
        }
    }

    /// Create identity transform
    pub fn identity() -> Self {
        Self::from_mat4(Mat4::IDENTITY)
    }
}

/// Fixed-capacity matrix palette, uploaded as a single uniform array.
///
/// Slots past the live bone count stay identity so a shader indexing a
/// stale id never reads garbage.
pub struct BonePalette {
    transforms: Vec<GpuBoneTransform>,
    len: usize,
}

impl BonePalette {
    /// Palette sized for the shader's `MAX_BONES` array.
    pub fn new() -> Self {
        Self::with_capacity(MAX_BONES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transforms: vec![GpuBoneTransform::identity(); capacity],
            len: 0,
        }
    }

    /// Overwrite the palette with new matrices.
    pub fn write(&mut self, matrices: &[Mat4]) -> Result<()> {
        if matrices.len() > self.transforms.len() {
            return Err(Error::Skeleton(format!(
                "matrix count {} exceeds palette capacity {}",
                matrices.len(),
                self.transforms.len()
            )));
        }

        for (slot, matrix) in self.transforms.iter_mut().zip(matrices) {
            *slot = GpuBoneTransform::from_mat4(*matrix);
        }
        for slot in &mut self.transforms[matrices.len()..self.len.max(matrices.len())] {
            *slot = GpuBoneTransform::identity();
        }
        self.len = matrices.len();
        Ok(())
    }

    /// Number of live bones.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.transforms.len()
    }

    pub fn transforms(&self) -> &[GpuBoneTransform] {
        &self.transforms
    }

    /// Whole palette as bytes, ready for a buffer write.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.transforms)
    }
}

impl Default for BonePalette {
    fn default() -> Self {
        Self::new()
    }
}

/// Interleaved vertex consumed by the skinning vertex shader
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub bone_ids: [u32; MAX_BONES_PER_VERTEX],
    pub bone_weights: [f32; MAX_BONES_PER_VERTEX],
}
