//! glTF 2.0 reader producing an [`ImportedScene`]
//!
//! glTF stores skinning per vertex (`JOINTS_0`/`WEIGHTS_0` indexing into the
//! skin's joint list) and animation times in seconds. Both are reshaped here
//! into the per-bone weight lists and tick-based tracks the builder expects.
//! Images are not loaded.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ::gltf::animation::util::ReadOutputs;
use ::gltf::animation::Interpolation;
use ::gltf::mesh::Mode;
use glam::{Mat4, Quat, Vec2, Vec3};

use super::scene::{
    ImportedAnimation, ImportedBoneWeights, ImportedChannel, ImportedMesh, ImportedScene, NodeIndex,
    SCENE_ROOT_NAME,
};
use crate::core::{Error, Result};

/// glTF animation times are seconds; one tick is one second.
const GLTF_TICKS_PER_SECOND: f64 = 1.0;

/// Read a `.gltf` or `.glb` file and its buffers.
pub fn load(path: &Path) -> Result<ImportedScene> {
    let ::gltf::Gltf { document, blob } = ::gltf::Gltf::open(path)?;
    let buffers = ::gltf::import_buffers(&document, path.parent(), blob)?;
    from_document(&document, &buffers)
}

/// Convert an already parsed document.
pub fn from_document(document: &::gltf::Document, buffers: &[::gltf::buffer::Data]) -> Result<ImportedScene> {
    let gltf_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| Error::Import("document has no scene".into()))?;

    let mut scene = ImportedScene::new(SCENE_ROOT_NAME, Mat4::IDENTITY);
    let node_map = load_nodes(&mut scene, &gltf_scene);

    let mut static_meshes = 0;
    for node in document.nodes().filter(|n| node_map.contains_key(&n.index())) {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        match node.skin() {
            Some(skin) => load_skinned_mesh(&mut scene, &mesh, &skin, buffers),
            None => static_meshes += 1,
        }
    }
    if static_meshes > 0 {
        log::debug!("Skipped {} meshes without a skin", static_meshes);
    }

    for animation in document.animations() {
        scene.animations.push(load_animation(&animation, buffers));
    }

    log::info!(
        "Imported {} nodes, {} bones, {} skinned primitives, {} animations",
        scene.node_count(),
        scene.bones.len(),
        scene.meshes.len(),
        scene.animations.len()
    );

    Ok(scene)
}

fn node_name(node: &::gltf::Node) -> String {
    match node.name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("node_{}", node.index()),
    }
}

/// Copy the scene's node tree under the synthetic root. Returns glTF node
/// index to scene node index.
fn load_nodes(scene: &mut ImportedScene, gltf_scene: &::gltf::Scene) -> HashMap<usize, NodeIndex> {
    let mut node_map = HashMap::new();
    let root = scene.root();
    let top_level: Vec<::gltf::Node> = gltf_scene.nodes().collect();
    let mut stack: Vec<(::gltf::Node, NodeIndex)> = top_level.into_iter().rev().map(|n| (n, root)).collect();

    while let Some((node, parent)) = stack.pop() {
        if node_map.contains_key(&node.index()) {
            log::warn!("glTF node {} is reachable twice, ignoring the repeat", node.index());
            continue;
        }
        let transform = Mat4::from_cols_array_2d(&node.transform().matrix());
        let index = scene.add_node(parent, node_name(&node), transform);
        node_map.insert(node.index(), index);

        let children: Vec<::gltf::Node> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, index)));
    }

    node_map
}

fn load_skinned_mesh(
    scene: &mut ImportedScene,
    mesh: &::gltf::Mesh,
    skin: &::gltf::Skin,
    buffers: &[::gltf::buffer::Data],
) {
    let joint_names: Vec<String> = skin.joints().map(|joint| node_name(&joint)).collect();
    let skin_reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let inverse_bind_matrices: Vec<Mat4> = skin_reader
        .read_inverse_bind_matrices()
        .map(|matrices| matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();

    for (i, name) in joint_names.iter().enumerate() {
        let offset = inverse_bind_matrices.get(i).copied().unwrap_or(Mat4::IDENTITY);
        scene.add_bone(name.clone(), offset);
    }

    let mesh_name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh_{}", mesh.index()));

    for primitive in mesh.primitives() {
        let name = format!("{}/{}", mesh_name, primitive.index());
        if primitive.mode() != Mode::Triangles {
            log::warn!("Primitive '{}' is not a triangle list, skipping", name);
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            log::warn!("Primitive '{}' has no positions, skipping", name);
            continue;
        };
        let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|normals| normals.map(Vec3::from).collect())
            .unwrap_or_default();
        let texcoords: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|texcoords| texcoords.into_f32().map(Vec2::from).collect())
            .unwrap_or_default();
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_default();

        let mut per_joint: Vec<Vec<(u32, f32)>> = vec![Vec::new(); joint_names.len()];
        let mut invalid_joints = 0;
        if let (Some(joints), Some(weights)) = (reader.read_joints(0), reader.read_weights(0)) {
            for (vertex, (joints, weights)) in joints.into_u16().zip(weights.into_f32()).enumerate() {
                for (joint, weight) in joints.into_iter().zip(weights) {
                    if weight <= 0.0 {
                        continue;
                    }
                    match per_joint.get_mut(joint as usize) {
                        Some(list) => list.push((vertex as u32, weight)),
                        None => invalid_joints += 1,
                    }
                }
            }
        }
        if invalid_joints > 0 {
            log::warn!("Primitive '{}' has {} weights on joints outside its skin", name, invalid_joints);
        }

        let bone_weights: Vec<ImportedBoneWeights> = per_joint
            .into_iter()
            .zip(&joint_names)
            .filter(|(weights, _)| !weights.is_empty())
            .map(|(weights, bone_name)| ImportedBoneWeights {
                bone_name: bone_name.clone(),
                weights,
            })
            .collect();

        if bone_weights.is_empty() {
            log::warn!("Primitive '{}' has no joint weights", name);
        }

        scene.meshes.push(ImportedMesh {
            name,
            positions,
            normals,
            texcoords,
            indices,
            bone_weights,
        });
    }
}

/// Pair key times with values. Cubic-spline outputs are stored as
/// (in-tangent, value, out-tangent) triplets; only the value is kept.
fn keyframes<T: Copy>(times: &[f64], values: Vec<T>, cubic_spline: bool) -> Vec<(f64, T)> {
    if cubic_spline {
        times
            .iter()
            .copied()
            .zip(values.chunks(3).filter_map(|triplet| triplet.get(1).copied()))
            .collect()
    } else {
        times.iter().copied().zip(values).collect()
    }
}

fn load_animation(animation: &::gltf::Animation, buffers: &[::gltf::buffer::Data]) -> ImportedAnimation {
    let name = animation.name().map(str::to_string).unwrap_or_default();
    // Keyed by glTF node, paired with the node's rest pose.
    let mut channels: BTreeMap<usize, (ImportedChannel, ([f32; 3], [f32; 4], [f32; 3]))> = BTreeMap::new();
    let mut duration: f64 = 0.0;

    for channel in animation.channels() {
        let target = channel.target().node();
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(inputs) = reader.read_inputs() else {
            log::warn!("Animation '{}' has a channel without key times", name);
            continue;
        };
        let times: Vec<f64> = inputs.map(f64::from).collect();
        duration = times.iter().copied().fold(duration, f64::max);

        let cubic_spline = channel.sampler().interpolation() == Interpolation::CubicSpline;
        let (entry, _) = channels.entry(target.index()).or_insert_with(|| {
            let channel = ImportedChannel {
                node_name: node_name(&target),
                ..Default::default()
            };
            (channel, target.transform().decomposed())
        });

        match reader.read_outputs() {
            Some(ReadOutputs::Translations(values)) => {
                entry.position_keys = keyframes(&times, values.map(Vec3::from).collect(), cubic_spline);
            }
            Some(ReadOutputs::Rotations(values)) => {
                let rotations = values
                    .into_f32()
                    .map(|q| Quat::from_array(q).normalize())
                    .collect();
                entry.rotation_keys = keyframes(&times, rotations, cubic_spline);
            }
            Some(ReadOutputs::Scales(values)) => {
                entry.scale_keys = keyframes(&times, values.map(Vec3::from).collect(), cubic_spline);
            }
            Some(ReadOutputs::MorphTargetWeights(_)) => {
                log::debug!("Animation '{}': ignoring morph target weights", name);
            }
            None => log::warn!("Animation '{}' has a channel without output values", name),
        }
    }

    // glTF leaves unanimated properties at the node's rest value, so they
    // become single-key tracks instead of falling back to identity.
    let channels = channels
        .into_values()
        .map(|(mut channel, (translation, rotation, scale))| {
            if channel.position_keys.is_empty() {
                channel.position_keys.push((0.0, Vec3::from(translation)));
            }
            if channel.rotation_keys.is_empty() {
                channel.rotation_keys.push((0.0, Quat::from_array(rotation).normalize()));
            }
            if channel.scale_keys.is_empty() {
                channel.scale_keys.push((0.0, Vec3::from(scale)));
            }
            channel
        })
        .collect();

    ImportedAnimation {
        name,
        duration,
        ticks_per_second: GLTF_TICKS_PER_SECOND,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::json;

    use crate::animation::SkinnedModel;
    use crate::import::ImportConfig;

    fn push_f32s(bytes: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn push_u16s(bytes: &mut Vec<u8>, values: &[u16]) {
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Two-joint chain ("hip" -> "spine") skinning a three-vertex strip, with a
    /// rotation animation on the spine.
    fn write_test_gltf(dir: &Path) -> std::path::PathBuf {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let mut bytes = Vec::new();
        push_f32s(&mut bytes, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0]); // 0..36 positions
        push_u16s(&mut bytes, &[0, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0]); // 36..60 joints
        push_f32s(&mut bytes, &[1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]); // 60..108 weights
        push_u16s(&mut bytes, &[0, 1, 2, 0]); // 108..116 indices + padding
        push_f32s(&mut bytes, &Mat4::IDENTITY.to_cols_array()); // 116..180
        push_f32s(&mut bytes, &Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)).to_cols_array()); // 180..244
        push_f32s(&mut bytes, &[0.0, 2.0]); // 244..252 key times
        push_f32s(&mut bytes, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, half, half]); // 252..284 rotations
        assert_eq!(bytes.len(), 284);

        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        let document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0, 1] }],
            "nodes": [
                { "name": "Body", "mesh": 0, "skin": 0 },
                { "name": "hip", "children": [2] },
                { "name": "spine", "translation": [0.0, 1.0, 0.0] }
            ],
            "meshes": [{
                "name": "strip",
                "primitives": [{
                    "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 },
                    "indices": 3
                }]
            }],
            "skins": [{ "joints": [1, 2], "inverseBindMatrices": 4 }],
            "animations": [{
                "name": "bend",
                "channels": [{ "sampler": 0, "target": { "node": 2, "path": "rotation" } }],
                "samplers": [{ "input": 5, "output": 6, "interpolation": "LINEAR" }]
            }],
            "buffers": [{ "byteLength": bytes.len(), "uri": uri }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 24 },
                { "buffer": 0, "byteOffset": 60, "byteLength": 48 },
                { "buffer": 0, "byteOffset": 108, "byteLength": 6 },
                { "buffer": 0, "byteOffset": 116, "byteLength": 128 },
                { "buffer": 0, "byteOffset": 244, "byteLength": 8 },
                { "buffer": 0, "byteOffset": 252, "byteLength": 32 }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [0.0, 2.0, 0.0] },
                { "bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
                { "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" },
                { "bufferView": 4, "componentType": 5126, "count": 2, "type": "MAT4" },
                { "bufferView": 5, "componentType": 5126, "count": 2, "type": "SCALAR",
                  "min": [0.0], "max": [2.0] },
                { "bufferView": 6, "componentType": 5126, "count": 2, "type": "VEC4" }
            ]
        });

        let path = dir.join("strip.gltf");
        std::fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_load_scene_graph_and_skin() {
        let dir = tempfile::tempdir().unwrap();
        let scene = load(&write_test_gltf(dir.path())).unwrap();

        assert_eq!(scene.node_count(), 4);
        let hip = scene.find_node("hip").unwrap();
        let spine = scene.find_node("spine").unwrap();
        assert_eq!(scene.parent_of(hip), Some(scene.root()));
        assert_eq!(scene.parent_of(spine), Some(hip));
        let spine_node = scene.node(spine).unwrap();
        assert!(spine_node.local_transform.abs_diff_eq(Mat4::from_translation(Vec3::Y), 1e-6));

        assert_eq!(scene.bones.len(), 2);
        let offset = scene.find_bone("spine").unwrap().offset_matrix;
        assert!(offset.abs_diff_eq(Mat4::from_translation(Vec3::NEG_Y), 1e-6));
    }

    #[test]
    fn test_load_regroups_weights_per_bone() {
        let dir = tempfile::tempdir().unwrap();
        let scene = load(&write_test_gltf(dir.path())).unwrap();

        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "strip/0");
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.normals.is_empty());

        let hip = mesh.bone_weights.iter().find(|w| w.bone_name == "hip").unwrap();
        assert_eq!(hip.weights, vec![(0, 1.0), (1, 0.5)]);
        let spine = mesh.bone_weights.iter().find(|w| w.bone_name == "spine").unwrap();
        assert_eq!(spine.weights, vec![(1, 0.5), (2, 1.0)]);
    }

    #[test]
    fn test_load_animation_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let scene = load(&write_test_gltf(dir.path())).unwrap();

        assert_eq!(scene.animations.len(), 1);
        let animation = &scene.animations[0];
        assert_eq!(animation.name, "bend");
        assert_eq!(animation.duration, 2.0);
        assert_eq!(animation.ticks_per_second, 1.0);
        assert_eq!(animation.channels.len(), 1);

        let channel = &animation.channels[0];
        assert_eq!(channel.node_name, "spine");
        assert_eq!(channel.rotation_keys.len(), 2);
        assert_eq!(channel.position_keys, vec![(0.0, Vec3::Y)]);
        assert_eq!(channel.scale_keys, vec![(0.0, Vec3::ONE)]);
        assert!(channel.rotation_keys[1].1.angle_between(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)) < 1e-4);
    }

    #[test]
    fn test_load_full_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_gltf(dir.path());
        let mut model = SkinnedModel::load(&path, &ImportConfig::default()).unwrap();

        assert_eq!(model.skeleton.bone_count(), 2);
        assert_eq!(model.skeleton.animation_names(), vec!["bend"]);
        for matrix in model.skeleton.bone_matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }

        // Halfway through the bend the tip vertex has swung 45 degrees about the spine joint
        assert!(model.skeleton.select_animation("bend"));
        model.skeleton.update(1.0);
        let deformed = model.meshes[0].deform(model.skeleton.bone_matrices());
        let expected = Vec3::new(-std::f32::consts::FRAC_1_SQRT_2, 1.0 + std::f32::consts::FRAC_1_SQRT_2, 0.0);
        assert!((deformed[2] - expected).length() < 1e-3);
        assert!((deformed[0] - Vec3::ZERO).length() < 1e-5);
    }

    #[test]
    fn test_keyframes_cubic_spline_takes_values() {
        let keys = keyframes(&[0.0, 1.0], vec![9, 1, 9, 9, 2, 9], true);
        assert_eq!(keys, vec![(0.0, 1), (1.0, 2)]);
        let keys = keyframes(&[0.0, 1.0], vec![1, 2], false);
        assert_eq!(keys, vec![(0.0, 1), (1.0, 2)]);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load(Path::new("no/such/file.gltf")).is_err());
    }
}
