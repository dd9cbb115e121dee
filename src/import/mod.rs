//! Asset import: format-neutral scene description and the glTF reader

pub mod config;
pub mod gltf;
pub mod scene;

pub use config::{ImportConfig, DEFAULT_TICKS_PER_SECOND};
pub use scene::{
    ImportedAnimation, ImportedBone, ImportedBoneWeights, ImportedChannel, ImportedMesh,
    ImportedNode, ImportedScene, NodeIndex, SCENE_ROOT_NAME,
};
