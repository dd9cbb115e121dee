//! Skeleton construction from an imported scene
//!
//! The builder turns the importer's node tree, bone offsets and per-mesh
//! weights into a [`Skeleton`] with dense, parent-before-child bone ids, then
//! binds vertex influences and animations against it.
//!
//! Rest pose is rebuilt from the offset matrices alone: a bone's bind-pose
//! global transform is the inverse of its offset, and its local transform is
//! that global expressed relative to the parent's bind-pose global.

use std::collections::HashSet;

use glam::{Mat4, Quat, Vec3};

use super::clip::{Animation, AnimationChannel, Keyframe, Track};
use super::model::SkinnedModel;
use super::skeleton::{BoneKind, Skeleton};
use super::skinning::SkinnedMesh;
use crate::core::{Error, Result};
use crate::import::{ImportConfig, ImportedAnimation, ImportedChannel, ImportedScene, NodeIndex};

/// Builds skinned models from imported scenes
pub struct SkeletonBuilder {
    config: ImportConfig,
}

/// Per-build lookup state shared by the tree walks
struct BuildContext<'a> {
    scene: &'a ImportedScene,
    bone_names: HashSet<&'a str>,
    /// True when the node or any of its descendants is a bone node.
    subtree_has_bone: Vec<bool>,
    /// Nodes already turned into bones or skipped by a walk.
    visited: Vec<bool>,
    /// Bind-pose global transform per bone id.
    bind_globals: Vec<Mat4>,
    /// Bone id created for each node.
    bone_of_node: Vec<Option<usize>>,
}

impl<'a> BuildContext<'a> {
    fn new(scene: &'a ImportedScene, names: &'a [String]) -> Self {
        let bone_names: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut context = Self {
            scene,
            bone_names,
            subtree_has_bone: vec![false; scene.node_count()],
            visited: vec![false; scene.node_count()],
            bind_globals: Vec::new(),
            bone_of_node: vec![None; scene.node_count()],
        };
        context.mark_bone_subtrees();
        context
    }

    /// A node is a bone if its name is a bone name and it is the node that
    /// name resolves to (duplicate node names only count once).
    fn is_bone(&self, node: NodeIndex) -> bool {
        self.scene
            .node(node)
            .map(|n| self.bone_names.contains(n.name.as_str()) && self.scene.find_node(&n.name) == Some(node))
            .unwrap_or(false)
    }

    fn mark_bone_subtrees(&mut self) {
        // Children always have larger indices than their parents in the arena,
        // so a reverse sweep sees every child before its parent.
        for node in (0..self.scene.node_count()).rev() {
            if self.is_bone(node) {
                self.subtree_has_bone[node] = true;
            }
            if self.subtree_has_bone[node] {
                if let Some(parent) = self.scene.parent_of(node) {
                    self.subtree_has_bone[parent] = true;
                }
            }
        }
    }

    /// Topmost bone above the first bone name found in the graph.
    fn find_root_bone(&self, names: &[String]) -> Option<NodeIndex> {
        let start = names
            .iter()
            .filter_map(|name| self.scene.find_node(name))
            .find(|&node| self.is_bone(node))?;

        let mut root = start;
        let mut current = start;
        let mut steps = 0;
        while let Some(parent) = self.scene.parent_of(current) {
            steps += 1;
            if steps > self.scene.node_count() {
                break;
            }
            if self.is_bone(parent) {
                root = parent;
            }
            current = parent;
        }
        Some(root)
    }

    fn offset_of(&self, name: &str) -> Mat4 {
        match self.scene.find_bone(name) {
            Some(bone) => bone.offset_matrix,
            None => {
                log::error!("Failed to find offset matrix for bone '{}'", name);
                Mat4::IDENTITY
            }
        }
    }

    /// Add every bone reachable from `start` to the skeleton, depth first.
    fn add_subtree(&mut self, skeleton: &mut Skeleton, start: NodeIndex, parent: Option<usize>) -> Result<()> {
        let mut stack = vec![(start, parent)];

        while let Some((node_index, parent_id)) = stack.pop() {
            if self.visited[node_index] || !self.subtree_has_bone[node_index] {
                continue;
            }
            self.visited[node_index] = true;

            let scene = self.scene;
            let Some(node) = scene.node(node_index) else {
                continue;
            };

            let next_parent = if self.is_bone(node_index) {
                let offset = self.offset_of(&node.name);
                let bind_global = offset.inverse();
                let local = match parent_id {
                    Some(p) => self.bind_globals[p].inverse() * bind_global,
                    None => bind_global,
                };
                let id = skeleton.add_bone(node.name.clone(), parent_id, offset, local, BoneKind::Weighted)?;
                self.bind_globals.push(bind_global);
                self.bone_of_node[node_index] = Some(id);
                Some(id)
            } else if let Some(p) = parent_id {
                if skeleton.find_bone(&node.name).is_some() {
                    log::warn!("Helper node '{}' shares a bone name, skipping it", node.name);
                    parent_id
                } else {
                    let bind_global = self.bind_globals[p] * node.local_transform;
                    let id = skeleton.add_bone(
                        node.name.clone(),
                        Some(p),
                        bind_global.inverse(),
                        node.local_transform,
                        BoneKind::Virtual,
                    )?;
                    self.bind_globals.push(bind_global);
                    self.bone_of_node[node_index] = Some(id);
                    log::debug!("Kept helper node '{}' as virtual bone {}", node.name, id);
                    Some(id)
                }
            } else {
                None
            };

            stack.extend(node.children.iter().rev().map(|&child| (child, next_parent)));
        }

        Ok(())
    }

    /// Keep the non-bone nodes between the scene root and `root_bone` as
    /// virtual bones, outermost first. Returns the id the root bone hangs from.
    ///
    /// Animation channels pose the root bone relative to its parent node, so
    /// an Armature transform above it has to stay in the chain.
    fn add_root_ancestors(&mut self, skeleton: &mut Skeleton, root_bone: NodeIndex) -> Result<Option<usize>> {
        let scene = self.scene;
        let mut chain = Vec::new();
        let mut current = root_bone;
        while let Some(parent) = scene.parent_of(current) {
            if parent == scene.root() || chain.len() > scene.node_count() {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        let scene_transform = scene
            .node(scene.root())
            .map(|root| root.local_transform)
            .unwrap_or(Mat4::IDENTITY);

        let mut parent_id = None;
        for &node_index in chain.iter().rev() {
            let node = &scene.nodes()[node_index];
            if skeleton.find_bone(&node.name).is_some() {
                log::warn!("Ancestor node '{}' repeats a bone name, skipping it", node.name);
                continue;
            }

            let (bind_global, local) = match parent_id {
                Some(p) => (self.bind_globals[p] * node.local_transform, node.local_transform),
                None => {
                    let global = scene_transform * node.local_transform;
                    (global, global)
                }
            };
            let id = skeleton.add_bone(node.name.clone(), parent_id, bind_global.inverse(), local, BoneKind::Virtual)?;
            self.bind_globals.push(bind_global);
            self.visited[node_index] = true;
            self.bone_of_node[node_index] = Some(id);
            log::debug!("Kept ancestor node '{}' as virtual bone {}", node.name, id);
            parent_id = Some(id);
        }

        Ok(parent_id)
    }

    /// Add bones the main walk missed. A branch below an already built bone
    /// attaches to it; a bone with no built ancestor becomes an extra root.
    fn add_stray_bones(&mut self, skeleton: &mut Skeleton) -> Result<()> {
        let scene = self.scene;
        let mut stack = vec![(scene.root(), None)];

        while let Some((node_index, parent_id)) = stack.pop() {
            if !self.subtree_has_bone[node_index] {
                continue;
            }
            let Some(node) = scene.node(node_index) else {
                continue;
            };

            if self.visited[node_index] {
                let next = self.bone_of_node[node_index].or(parent_id);
                stack.extend(node.children.iter().rev().map(|&child| (child, next)));
                continue;
            }

            match parent_id {
                Some(parent) => {
                    log::warn!(
                        "Node '{}' is outside the main hierarchy, attaching it under bone {}",
                        node.name, parent
                    );
                    self.add_subtree(skeleton, node_index, Some(parent))?;
                }
                None if self.is_bone(node_index) => {
                    log::warn!("Bone '{}' is outside the main hierarchy, adding it as an extra root", node.name);
                    self.add_subtree(skeleton, node_index, None)?;
                }
                None => stack.extend(node.children.iter().rev().map(|&child| (child, None))),
            }
        }

        Ok(())
    }
}

impl SkeletonBuilder {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Build the skeleton and skinned meshes of `scene`.
    ///
    /// Fails when no mesh has bone weights or none of the weighted bones
    /// exist in the scene graph.
    pub fn build(&self, scene: &ImportedScene) -> Result<SkinnedModel> {
        let mut skeleton = self.build_skeleton(scene)?;

        for imported in &scene.animations {
            let animation = self.build_animation(imported, &skeleton);
            skeleton.add_animation(animation);
        }
        skeleton.update_bone_matrices();

        let meshes: Vec<SkinnedMesh> = scene
            .meshes
            .iter()
            .filter(|mesh| {
                if !mesh.has_bones() {
                    log::debug!("Skipping mesh '{}' without bones", mesh.name);
                }
                mesh.has_bones()
            })
            .map(|mesh| SkinnedMesh::from_imported(mesh, &skeleton))
            .collect();

        log::info!(
            "Built skeleton with {} bones, {} animations, {} skinned meshes",
            skeleton.bone_count(),
            skeleton.animation_count(),
            meshes.len()
        );

        Ok(SkinnedModel { skeleton, meshes })
    }

    /// Build only the bone hierarchy of `scene`.
    pub fn build_skeleton(&self, scene: &ImportedScene) -> Result<Skeleton> {
        let names = scene.bone_names();
        if names.is_empty() {
            return Err(Error::NoBones);
        }

        let mut context = BuildContext::new(scene, &names);
        let root = context
            .find_root_bone(&names)
            .ok_or(Error::RootBoneNotFound(names.len()))?;
        log::debug!("Root bone is '{}'", scene.nodes()[root].name);

        let mut skeleton = Skeleton::new();
        let parent = context.add_root_ancestors(&mut skeleton, root)?;
        context.add_subtree(&mut skeleton, root, parent)?;
        context.add_stray_bones(&mut skeleton)?;

        let missing = names.iter().filter(|name| skeleton.find_bone(name).is_none()).count();
        if missing > 0 {
            log::warn!("{} weighted bones have no node in the scene graph", missing);
        }

        skeleton.update_bone_matrices();
        Ok(skeleton)
    }

    /// Bind an imported animation's channels to bone ids.
    pub fn build_animation(&self, imported: &ImportedAnimation, skeleton: &Skeleton) -> Animation {
        let ticks_per_second = self.config.ticks_per_second(imported.ticks_per_second);
        let mut animation = Animation::new(imported.name.clone(), imported.duration, ticks_per_second);
        animation.playback_speed = self.config.playback_speed;

        let mut end_time: f64 = 0.0;
        for channel in &imported.channels {
            match skeleton.find_bone(&channel.node_name) {
                Some(bone_id) => {
                    let converted = convert_channel(channel);
                    end_time = end_time.max(converted.end_time());
                    animation.add_channel(bone_id, converted);
                }
                None => log::warn!(
                    "Animation '{}' targets unknown node '{}', dropping channel",
                    imported.name, channel.node_name
                ),
            }
        }

        if !(animation.duration.is_finite() && animation.duration > 0.0) {
            animation.duration = end_time;
        }
        animation
    }
}

impl Default for SkeletonBuilder {
    fn default() -> Self {
        Self::new(ImportConfig::default())
    }
}

fn convert_channel(channel: &ImportedChannel) -> AnimationChannel {
    AnimationChannel::new(
        Track::new(channel.position_keys.iter().map(|&(t, v)| Keyframe::new(t, v)).collect::<Vec<Keyframe<Vec3>>>()),
        Track::new(channel.rotation_keys.iter().map(|&(t, q)| Keyframe::new(t, q)).collect::<Vec<Keyframe<Quat>>>()),
        Track::new(channel.scale_keys.iter().map(|&(t, v)| Keyframe::new(t, v)).collect::<Vec<Keyframe<Vec3>>>()),
    )
}
