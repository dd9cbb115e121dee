//! Error types for rigview

use thiserror::Error;

/// Main error type for the viewer core
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glTF import error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("No mesh references any bone")]
    NoBones,

    #[error("None of the {0} referenced bones exist in the scene graph")]
    RootBoneNotFound(usize),

    #[error("Skeleton error: {0}")]
    Skeleton(String),

    #[error("Animation error: {0}")]
    Animation(String),

    #[error("Config error: {0}")]
    Config(String),
}
