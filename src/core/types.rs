//! Core type aliases and re-exports

pub use glam::{
    Vec2, Vec3, Vec4,
    Mat4,
    Quat,
};

/// Maximum number of bones per skeleton (size of the shader's palette array)
pub const MAX_BONES: usize = 128;

/// Bone influences packed into each vertex
pub const MAX_BONES_PER_VERTEX: usize = 4;

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
