//! Skinned model: a skeleton plus the meshes it deforms

use std::path::Path;

use glam::{Mat4, Vec3};

use super::builder::SkeletonBuilder;
use super::skeleton::Skeleton;
use super::skinning::{bounds_of, SkinnedMesh};
use crate::core::Result;
use crate::import::{self, ImportConfig, ImportedScene};

/// A loaded skinned asset
#[derive(Clone, Debug, Default)]
pub struct SkinnedModel {
    pub skeleton: Skeleton,
    pub meshes: Vec<SkinnedMesh>,
}

impl SkinnedModel {
    /// Build from an already imported scene.
    pub fn from_scene(scene: &ImportedScene, config: &ImportConfig) -> Result<Self> {
        SkeletonBuilder::new(config.clone()).build(scene)
    }

    /// Import a glTF file from disk and build it.
    pub fn load(path: &Path, config: &ImportConfig) -> Result<Self> {
        log::info!("Loading skinned model {}", path.display());
        let scene = import::gltf::load(path)?;
        Self::from_scene(&scene, config)
    }

    /// Like [`load`](Self::load), but a failed import is logged and yields an
    /// empty model that callers treat as absent.
    pub fn load_or_empty(path: &Path, config: &ImportConfig) -> Self {
        match Self::load(path, config) {
            Ok(model) => model,
            Err(e) => {
                log::error!("Failed to load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.skeleton.is_empty() && self.meshes.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(SkinnedMesh::vertex_count).sum()
    }

    /// Bounds of all meshes deformed by the current palette.
    pub fn deformed_bounds(&self) -> Option<(Vec3, Vec3)> {
        self.deformed_bounds_with(self.skeleton.bone_matrices())
    }

    fn deformed_bounds_with(&self, palette: &[Mat4]) -> Option<(Vec3, Vec3)> {
        let points: Vec<Vec3> = self
            .meshes
            .iter()
            .flat_map(|mesh| mesh.deform(palette))
            .collect();
        bounds_of(&points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ImportedBoneWeights, ImportedMesh};

    fn one_bone_scene() -> ImportedScene {
        let mut scene = ImportedScene::default();
        scene.add_node(scene.root(), "bone", Mat4::IDENTITY);
        scene.add_bone("bone", Mat4::IDENTITY);
        scene.meshes.push(ImportedMesh {
            name: "quad".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)],
            bone_weights: vec![ImportedBoneWeights {
                bone_name: "bone".into(),
                weights: vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            }],
            ..Default::default()
        });
        scene
    }

    #[test]
    fn test_from_scene() {
        let model = SkinnedModel::from_scene(&one_bone_scene(), &ImportConfig::default()).unwrap();
        assert!(!model.is_empty());
        assert_eq!(model.vertex_count(), 3);
        assert_eq!(model.skeleton.bone_count(), 1);
    }

    #[test]
    fn test_deformed_bounds_follow_bone() {
        let mut model = SkinnedModel::from_scene(&one_bone_scene(), &ImportConfig::default()).unwrap();
        let (min, max) = model.deformed_bounds().unwrap();
        assert!((min - Vec3::ZERO).length() < 1e-5);
        assert!((max - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);

        model.skeleton.set_local_transform(0, Mat4::from_translation(Vec3::Z));
        model.skeleton.update_bone_matrices();
        let (min, _) = model.deformed_bounds().unwrap();
        assert!((min - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let model = SkinnedModel::load_or_empty(Path::new("does/not/exist.gltf"), &ImportConfig::default());
        assert!(model.is_empty());
        assert!(model.deformed_bounds().is_none());
    }
}
