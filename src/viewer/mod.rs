//! Headless frame loop driving a skinned model

pub mod config;

pub use config::ViewerConfig;

use serde::Serialize;

use crate::animation::{BonePalette, SkinnedModel};
use crate::core::time::FrameClock;

/// Per-frame summary, written by `rigview --dump`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    /// Seconds of scaled animation time since start or last reset
    pub time: f64,
    pub animation: Option<String>,
    pub bone_count: usize,
    /// Deformed mesh bounds, `None` when nothing is loaded
    pub bounds_min: Option<[f32; 3]>,
    pub bounds_max: Option<[f32; 3]>,
}

/// Owns a model and steps its animation one frame at a time
pub struct Viewer {
    config: ViewerConfig,
    model: SkinnedModel,
    clock: FrameClock,
    palette: BonePalette,
    animation_time: f64,
}

impl Viewer {
    /// Load the configured model. A failed load is logged and leaves the
    /// viewer with an empty model.
    pub fn new(config: ViewerConfig) -> Self {
        let model = SkinnedModel::load_or_empty(&config.model_path, &config.import);
        Self::with_model(config, model)
    }

    /// Wrap an already built model.
    pub fn with_model(config: ViewerConfig, model: SkinnedModel) -> Self {
        let mut viewer = Self {
            clock: FrameClock::new(config.frame_step),
            config,
            model,
            palette: BonePalette::new(),
            animation_time: 0.0,
        };
        viewer.select_configured_animation();
        viewer.write_palette();
        viewer
    }

    fn select_configured_animation(&mut self) {
        if self.model.skeleton.animation_count() == 0 {
            return;
        }
        if let Some(name) = self.config.animation.clone() {
            if self.model.skeleton.select_animation(&name) {
                return;
            }
        }
        if let Some(index) = self.config.animation_index {
            self.model.skeleton.select_animation_index(index);
        }
    }

    fn write_palette(&mut self) {
        if let Err(e) = self.palette.write(self.model.skeleton.bone_matrices()) {
            log::error!("Bone palette upload failed: {}", e);
        }
    }

    /// Advance one frame. Returns the scaled delta in seconds.
    pub fn step(&mut self) -> f64 {
        let delta = self.clock.tick() * self.config.playback_speed;
        self.animation_time += delta;
        self.model.skeleton.update(delta);
        self.write_palette();
        delta
    }

    /// Return the skeleton to its bind pose and restart the animation.
    pub fn reset_pose(&mut self) {
        if let Some(index) = self.model.skeleton.current_animation_index() {
            self.model.skeleton.select_animation_index(index);
        }
        self.model.skeleton.reset_to_bind_pose();
        self.animation_time = 0.0;
        self.write_palette();
    }

    pub fn model(&self) -> &SkinnedModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut SkinnedModel {
        &mut self.model
    }

    pub fn palette(&self) -> &BonePalette {
        &self.palette
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn frame_report(&self) -> FrameReport {
        let bounds = self.model.deformed_bounds();
        FrameReport {
            frame: self.clock.frame_count(),
            time: self.animation_time,
            animation: self
                .model
                .skeleton
                .current_animation()
                .map(|animation| animation.name.clone()),
            bone_count: self.model.skeleton.bone_count(),
            bounds_min: bounds.map(|(min, _)| min.to_array()),
            bounds_max: bounds.map(|(_, max)| max.to_array()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::GpuBoneTransform;
    use crate::core::time::FrameStep;
    use crate::import::{
        ImportedAnimation, ImportedBoneWeights, ImportedChannel, ImportedMesh, ImportedScene,
    };
    use glam::{Mat4, Vec3};

    /// One bone sliding along +X by one unit per second over two seconds.
    fn sliding_model() -> SkinnedModel {
        let mut scene = ImportedScene::default();
        scene.add_node(scene.root(), "bone", Mat4::IDENTITY);
        scene.add_bone("bone", Mat4::IDENTITY);
        scene.meshes.push(ImportedMesh {
            name: "point".into(),
            positions: vec![Vec3::ZERO],
            bone_weights: vec![ImportedBoneWeights {
                bone_name: "bone".into(),
                weights: vec![(0, 1.0)],
            }],
            ..Default::default()
        });
        scene.animations.push(ImportedAnimation {
            name: "slide".into(),
            duration: 2.0,
            ticks_per_second: 1.0,
            channels: vec![ImportedChannel {
                node_name: "bone".into(),
                position_keys: vec![(0.0, Vec3::ZERO), (2.0, Vec3::new(2.0, 0.0, 0.0))],
                ..Default::default()
            }],
        });
        SkinnedModel::from_scene(&scene, &Default::default()).unwrap()
    }

    fn config(seconds: f64) -> ViewerConfig {
        ViewerConfig {
            animation: Some("slide".into()),
            frame_step: FrameStep::Fixed { seconds },
            ..Default::default()
        }
    }

    #[test]
    fn test_step_advances_animation_and_palette() {
        let mut viewer = Viewer::with_model(config(0.5), sliding_model());
        assert_eq!(viewer.palette().len(), 1);

        viewer.step();
        let report = viewer.frame_report();
        assert_eq!(report.frame, 1);
        assert_eq!(report.time, 0.5);
        assert_eq!(report.animation.as_deref(), Some("slide"));
        assert_eq!(report.bone_count, 1);
        let min = report.bounds_min.unwrap();
        assert!((min[0] - 0.5).abs() < 1e-5);

        let expected = GpuBoneTransform::from_mat4(Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)));
        let uploaded = viewer.palette().transforms()[0];
        for (a, b) in uploaded.matrix.iter().flatten().zip(expected.matrix.iter().flatten()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_playback_speed_scales_delta() {
        let mut viewer = Viewer::with_model(
            ViewerConfig {
                playback_speed: 2.0,
                ..config(0.25)
            },
            sliding_model(),
        );
        assert_eq!(viewer.step(), 0.5);
        let min = viewer.frame_report().bounds_min.unwrap();
        assert!((min[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_reset_pose() {
        let mut viewer = Viewer::with_model(config(0.5), sliding_model());
        viewer.step();
        viewer.reset_pose();

        let report = viewer.frame_report();
        assert_eq!(report.time, 0.0);
        assert_eq!(report.bounds_min, Some([0.0, 0.0, 0.0]));
        assert_eq!(viewer.palette().transforms()[0], GpuBoneTransform::identity());

        // Playback restarts from the first key
        viewer.step();
        let min = viewer.frame_report().bounds_min.unwrap();
        assert!((min[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_name_falls_back_to_index() {
        let viewer = Viewer::with_model(
            ViewerConfig {
                animation: Some("missing".into()),
                animation_index: Some(0),
                ..config(0.5)
            },
            sliding_model(),
        );
        assert_eq!(viewer.model().skeleton.current_animation_index(), Some(0));
    }

    #[test]
    fn test_missing_model_runs_empty() {
        let mut viewer = Viewer::new(ViewerConfig {
            model_path: "does/not/exist.gltf".into(),
            ..config(0.5)
        });
        viewer.step();
        let report = viewer.frame_report();
        assert_eq!(report.bone_count, 0);
        assert!(report.bounds_min.is_none());
        assert!(report.animation.is_none());
        assert!(viewer.palette().is_empty());
    }
}
