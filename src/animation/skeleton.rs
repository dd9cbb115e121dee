//! Skeletal bone hierarchy and per-frame matrix palette

use std::collections::HashMap;

use glam::Mat4;

use super::clip::Animation;
use crate::core::{Error, Result, MAX_BONES};

/// Whether a bone deforms vertices or only carries a transform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneKind {
    /// Referenced by vertex weights, offset matrix comes from the importer.
    Weighted,
    /// Helper node kept to chain transforms between two real bones.
    Virtual,
}

/// A single bone in a skeletal hierarchy
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub id: usize,
    pub parent_id: Option<usize>,
    /// Inverse bind pose, mesh space to bone space.
    pub offset_matrix: Mat4,
    /// Current transform relative to the parent.
    pub local_transform: Mat4,
    bind_pose_transform: Mat4,
    pub children: Vec<usize>,
    pub kind: BoneKind,
}

impl Bone {
    /// Local transform captured at construction.
    pub fn bind_pose_transform(&self) -> Mat4 {
        self.bind_pose_transform
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A hierarchical skeleton plus the animations that drive it
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    bone_names: HashMap<String, usize>,
    roots: Vec<usize>,
    global_transforms: Vec<Mat4>,
    bone_matrices: Vec<Mat4>,
    animations: Vec<Animation>,
    animation_names: HashMap<String, usize>,
    current_animation: Option<usize>,
}

impl Skeleton {
    /// Create an empty skeleton
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bone to the skeleton and return its id.
    ///
    /// Parents must be added before their children, so ids always respect
    /// parent-before-child order.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent_id: Option<usize>,
        offset_matrix: Mat4,
        local_transform: Mat4,
        kind: BoneKind,
    ) -> Result<usize> {
        let name = name.into();

        if self.bones.len() >= MAX_BONES {
            let helpers = self.bones.iter().filter(|bone| bone.kind == BoneKind::Virtual).count();
            return Err(Error::Skeleton(format!(
                "{:?} bone '{}' exceeds the limit of {} bones ({} of them helper nodes kept as virtual bones)",
                kind, name, MAX_BONES, helpers
            )));
        }

        if let Some(parent) = parent_id {
            if parent >= self.bones.len() {
                return Err(Error::Skeleton(format!(
                    "bone '{}' has invalid parent index {}",
                    name, parent
                )));
            }
        }

        if self.bone_names.contains_key(&name) {
            return Err(Error::Skeleton(format!("bone name '{}' already exists", name)));
        }

        let id = self.bones.len();
        match parent_id {
            Some(parent) => self.bones[parent].children.push(id),
            None => self.roots.push(id),
        }

        self.bone_names.insert(name.clone(), id);
        self.bones.push(Bone {
            name,
            id,
            parent_id,
            offset_matrix,
            local_transform,
            bind_pose_transform: local_transform,
            children: Vec::new(),
            kind,
        });
        self.global_transforms.push(Mat4::IDENTITY);
        self.bone_matrices.push(offset_matrix);

        Ok(id)
    }

    /// Get the number of bones in the skeleton
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Get a bone by id
    pub fn bone(&self, id: usize) -> Option<&Bone> {
        self.bones.get(id)
    }

    /// Find a bone id by name
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    /// Bones without a parent, in id order. Well-formed skeletons have one.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Overwrite a bone's local transform. Returns false for an unknown id.
    pub fn set_local_transform(&mut self, id: usize, transform: Mat4) -> bool {
        match self.bones.get_mut(id) {
            Some(bone) => {
                bone.local_transform = transform;
                true
            }
            None => false,
        }
    }

    /// Skinning matrices from the last update, indexed by bone id.
    ///
    /// The slice is overwritten by the next update.
    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    /// Model-space bone transforms from the last update, indexed by bone id.
    pub fn global_transforms(&self) -> &[Mat4] {
        &self.global_transforms
    }

    /// Skinning matrix of a bone by name.
    pub fn bone_matrix(&self, name: &str) -> Option<Mat4> {
        match self.find_bone(name) {
            Some(id) => Some(self.bone_matrices[id]),
            None => {
                log::error!("Failed to find bone '{}'", name);
                None
            }
        }
    }

    // -- Animations ----------------------------------------------------------

    /// Store an animation and return its index.
    ///
    /// A name that is already taken gets a `_N` suffix; an empty name becomes
    /// `animation_<index>`.
    pub fn add_animation(&mut self, mut animation: Animation) -> usize {
        let index = self.animations.len();

        if animation.name.is_empty() {
            animation.name = format!("animation_{}", index);
        }
        if self.animation_names.contains_key(&animation.name) {
            let base = animation.name.clone();
            let mut suffix = 1;
            while self.animation_names.contains_key(&format!("{}_{}", base, suffix)) {
                suffix += 1;
            }
            animation.name = format!("{}_{}", base, suffix);
            log::debug!("Renamed duplicate animation '{}' to '{}'", base, animation.name);
        }

        self.animation_names.insert(animation.name.clone(), index);
        self.animations.push(animation);
        index
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    /// Animation names in index order.
    pub fn animation_names(&self) -> Vec<&str> {
        self.animations.iter().map(|a| a.name.as_str()).collect()
    }

    /// Index of the animation with the given name.
    pub fn find_animation(&self, name: &str) -> Option<usize> {
        self.animation_names.get(name).copied()
    }

    /// The animation currently driving the bones, if any.
    pub fn current_animation(&self) -> Option<&Animation> {
        self.current_animation.and_then(|index| self.animations.get(index))
    }

    pub fn current_animation_index(&self) -> Option<usize> {
        self.current_animation
    }

    /// Select an animation by name and rewind it.
    ///
    /// An unknown name is logged and leaves the current selection untouched.
    pub fn select_animation(&mut self, name: &str) -> bool {
        match self.find_animation(name) {
            Some(index) => self.select_animation_index(index),
            None => {
                log::error!("Failed to find animation '{}'", name);
                false
            }
        }
    }

    /// Select an animation by index and rewind it.
    ///
    /// An out-of-range index is logged and leaves the current selection untouched.
    pub fn select_animation_index(&mut self, index: usize) -> bool {
        match self.animations.get_mut(index) {
            Some(animation) => {
                animation.reset();
                log::info!("Playing animation '{}'", animation.name);
                self.current_animation = Some(index);
                true
            }
            None => {
                log::error!(
                    "Animation index {} out of range ({} loaded)",
                    index,
                    self.animations.len()
                );
                false
            }
        }
    }

    /// Unbind the current animation. Bones keep their last local transforms.
    pub fn clear_animation(&mut self) {
        self.current_animation = None;
    }

    // -- Evaluation ------------------------------------------------------------

    /// Advance the current animation by `delta_seconds` and rebuild the palette.
    pub fn update(&mut self, delta_seconds: f64) {
        if let Some(animation) = self
            .current_animation
            .and_then(|index| self.animations.get_mut(index))
        {
            let tick = animation.advance(delta_seconds);
            for (bone_id, transform) in animation.sample(tick) {
                if let Some(bone) = self.bones.get_mut(bone_id) {
                    bone.local_transform = transform;
                }
            }
        }

        self.update_bone_matrices();
    }

    /// Restore every bone to its bind pose and rebuild the palette.
    pub fn reset_to_bind_pose(&mut self) {
        for bone in &mut self.bones {
            bone.local_transform = bone.bind_pose_transform;
        }
        self.update_bone_matrices();
    }

    /// Propagate local transforms down the hierarchy.
    ///
    /// Every root is traversed, so a malformed multi-root skeleton still gets
    /// fresh matrices for all bones.
    pub fn update_bone_matrices(&mut self) {
        let mut stack: Vec<(usize, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, Mat4::IDENTITY))
            .collect();

        while let Some((id, parent_transform)) = stack.pop() {
            let bone = &self.bones[id];
            let global = parent_transform * bone.local_transform;

            self.global_transforms[id] = global;
            self.bone_matrices[id] = global * bone.offset_matrix;

            stack.extend(bone.children.iter().rev().map(|&child| (child, global)));
        }
    }

    /// World-space transform of a bone computed by walking its parent chain.
    ///
    /// Independent of the cached buffers; returns `None` for an unknown id.
    pub fn compute_global_transform(&self, id: usize) -> Option<Mat4> {
        let mut bone = self.bones.get(id)?;
        let mut transform = bone.local_transform;
        let mut steps = 0;

        while let Some(parent) = bone.parent_id {
            steps += 1;
            if steps > self.bones.len() {
                return None;
            }
            bone = &self.bones[parent];
            transform = bone.local_transform * transform;
        }

        Some(transform)
    }
}
