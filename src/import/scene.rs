//! Imported scene data
//!
//! Format-neutral description of what an importer hands to the skeleton
//! builder: a node tree with local transforms, the set of bones with their
//! offset (inverse bind) matrices, per-mesh vertex data with per-bone vertex
//! weights, and the raw animation tracks keyed by node name.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Quat, Vec2, Vec3};

/// Name given to the synthetic root of scenes built with `Default`.
pub const SCENE_ROOT_NAME: &str = "<scene root>";

/// Index of a node in an [`ImportedScene`].
pub type NodeIndex = usize;

/// A single node of the imported scene graph.
#[derive(Clone, Debug)]
pub struct ImportedNode {
    pub name: String,
    /// Transform relative to the parent node.
    pub local_transform: Mat4,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
}

/// A bone as reported by the importer.
#[derive(Clone, Debug)]
pub struct ImportedBone {
    pub name: String,
    /// Inverse bind pose: maps mesh space into this bone's space.
    pub offset_matrix: Mat4,
}

/// Vertex weights contributed by one bone to one mesh.
#[derive(Clone, Debug, Default)]
pub struct ImportedBoneWeights {
    pub bone_name: String,
    /// `(vertex_index, weight)` pairs.
    pub weights: Vec<(u32, f32)>,
}

/// Vertex data of one mesh plus its bone weights.
#[derive(Clone, Debug, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Empty when the source has no normals.
    pub normals: Vec<Vec3>,
    /// Empty when the source has no texture coordinates.
    pub texcoords: Vec<Vec2>,
    /// Triangle list indices. Empty means non-indexed.
    pub indices: Vec<u32>,
    pub bone_weights: Vec<ImportedBoneWeights>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_bones(&self) -> bool {
        !self.bone_weights.is_empty()
    }
}

/// Keyframe tracks for one node in one animation, times in ticks.
#[derive(Clone, Debug, Default)]
pub struct ImportedChannel {
    pub node_name: String,
    pub position_keys: Vec<(f64, Vec3)>,
    pub rotation_keys: Vec<(f64, Quat)>,
    pub scale_keys: Vec<(f64, Vec3)>,
}

/// A named animation as reported by the importer.
#[derive(Clone, Debug, Default)]
pub struct ImportedAnimation {
    pub name: String,
    /// Length in ticks.
    pub duration: f64,
    /// 0 when the source does not specify a rate.
    pub ticks_per_second: f64,
    pub channels: Vec<ImportedChannel>,
}

/// Everything the skeleton builder needs from an imported asset.
#[derive(Clone, Debug)]
pub struct ImportedScene {
    nodes: Vec<ImportedNode>,
    root: NodeIndex,
    node_names: HashMap<String, NodeIndex>,
    pub bones: Vec<ImportedBone>,
    pub meshes: Vec<ImportedMesh>,
    pub animations: Vec<ImportedAnimation>,
}

impl ImportedScene {
    /// Create a scene containing only a root node.
    pub fn new(root_name: impl Into<String>, root_transform: Mat4) -> Self {
        let name = root_name.into();
        let mut node_names = HashMap::new();
        node_names.insert(name.clone(), 0);

        Self {
            nodes: vec![ImportedNode {
                name,
                local_transform: root_transform,
                parent: None,
                children: Vec::new(),
            }],
            root: 0,
            node_names,
            bones: Vec::new(),
            meshes: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// Root node index.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Add a child node under `parent`. Returns the new node's index.
    ///
    /// # Panics
    /// Panics if `parent` is not a node of this scene.
    pub fn add_node(&mut self, parent: NodeIndex, name: impl Into<String>, local_transform: Mat4) -> NodeIndex {
        assert!(parent < self.nodes.len(), "parent node {} does not exist", parent);

        let index = self.nodes.len();
        let name = name.into();
        // First node wins a name lookup, later duplicates stay reachable by index.
        self.node_names.entry(name.clone()).or_insert(index);
        self.nodes.push(ImportedNode {
            name,
            local_transform,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    /// Register a bone and its offset matrix. A repeated name keeps the first offset.
    pub fn add_bone(&mut self, name: impl Into<String>, offset_matrix: Mat4) {
        let name = name.into();
        if self.find_bone(&name).is_some() {
            return;
        }
        self.bones.push(ImportedBone { name, offset_matrix });
    }

    pub fn node(&self, index: NodeIndex) -> Option<&ImportedNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[ImportedNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find a node index by name.
    pub fn find_node(&self, name: &str) -> Option<NodeIndex> {
        self.node_names.get(name).copied()
    }

    /// Parent of a node, `None` for the root or an invalid index.
    pub fn parent_of(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.nodes.get(index)?.parent
    }

    /// Find a bone by name.
    pub fn find_bone(&self, name: &str) -> Option<&ImportedBone> {
        self.bones.iter().find(|bone| bone.name == name)
    }

    /// Distinct bone names referenced by any mesh's weight data, in first-seen order.
    pub fn bone_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for mesh in &self.meshes {
            for weights in &mesh.bone_weights {
                if seen.insert(weights.bone_name.as_str()) {
                    names.push(weights.bone_name.clone());
                }
            }
        }
        names
    }
}

impl Default for ImportedScene {
    fn default() -> Self {
        Self::new(SCENE_ROOT_NAME, Mat4::IDENTITY)
    }
}
