//! Skeletal animation system

pub mod builder;
pub mod clip;
pub mod gpu;
pub mod model;
pub mod skeleton;
pub mod skinning;

pub use builder::SkeletonBuilder;
pub use clip::{Animation, AnimationChannel, Interpolate, Keyframe, Track};
pub use gpu::{BonePalette, GpuBoneTransform, SkinnedVertex};
pub use model::SkinnedModel;
pub use skeleton::{Bone, BoneKind, Skeleton};
pub use skinning::{assemble_influences, InfluenceStats, SkinnedMesh, VertexInfluences};
