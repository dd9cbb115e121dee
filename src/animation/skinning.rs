//! Per-vertex bone influences and skinned mesh data

use glam::{Mat4, Vec2, Vec3};

use super::gpu::SkinnedVertex;
use super::skeleton::Skeleton;
use crate::core::MAX_BONES_PER_VERTEX;
use crate::import::ImportedMesh;

/// Up to four `(bone id, weight)` pairs for one vertex
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VertexInfluences {
    pub bone_ids: [u32; MAX_BONES_PER_VERTEX],
    pub weights: [f32; MAX_BONES_PER_VERTEX],
}

impl VertexInfluences {
    /// Store an influence in the first slot with zero weight.
    ///
    /// Returns false when all slots are taken and the influence is dropped.
    /// Zero, negative and non-finite weights are ignored.
    pub fn add(&mut self, bone_id: u32, weight: f32) -> bool {
        if !(weight.is_finite() && weight > 0.0) {
            return true;
        }
        match self.weights.iter().position(|&w| w == 0.0) {
            Some(slot) => {
                self.bone_ids[slot] = bone_id;
                self.weights[slot] = weight;
                true
            }
            None => false,
        }
    }

    /// Number of slots in use.
    pub fn count(&self) -> usize {
        self.weights.iter().filter(|&&w| w > 0.0).count()
    }

    pub fn is_unweighted(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    /// Scale weights to sum to one. An unweighted vertex is bound fully to bone 0.
    pub fn normalize(&mut self) {
        let sum: f32 = self.weights.iter().sum();
        if sum <= 0.0 {
            self.bone_ids = [0; MAX_BONES_PER_VERTEX];
            self.weights = [1.0, 0.0, 0.0, 0.0];
            return;
        }
        if sum != 1.0 {
            for weight in &mut self.weights {
                *weight /= sum;
            }
        }
    }

    /// Weighted sum of the palette matrices for this vertex.
    pub fn blend_matrix(&self, palette: &[Mat4]) -> Mat4 {
        let mut blended = Mat4::ZERO;
        for (&id, &weight) in self.bone_ids.iter().zip(&self.weights) {
            if weight == 0.0 {
                continue;
            }
            if let Some(matrix) = palette.get(id as usize) {
                blended += *matrix * weight;
            }
        }
        blended
    }
}

/// Counters reported by [`assemble_influences`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InfluenceStats {
    /// Influences discarded because a vertex already had four.
    pub dropped: usize,
    /// Vertices with no influence, bound to bone 0.
    pub unweighted: usize,
    /// Weight entries naming an unknown bone or an out-of-range vertex.
    pub skipped: usize,
}

/// Build normalized per-vertex influences for a mesh against a skeleton.
pub fn assemble_influences(mesh: &ImportedMesh, skeleton: &Skeleton) -> (Vec<VertexInfluences>, InfluenceStats) {
    let vertex_count = mesh.vertex_count();
    let mut influences = vec![VertexInfluences::default(); vertex_count];
    let mut stats = InfluenceStats::default();

    for bone_weights in &mesh.bone_weights {
        let Some(bone_id) = skeleton.find_bone(&bone_weights.bone_name) else {
            log::warn!(
                "Mesh '{}' references unknown bone '{}'",
                mesh.name, bone_weights.bone_name
            );
            stats.skipped += bone_weights.weights.len();
            continue;
        };

        for &(vertex, weight) in &bone_weights.weights {
            match influences.get_mut(vertex as usize) {
                Some(influence) => {
                    if !influence.add(bone_id as u32, weight) {
                        stats.dropped += 1;
                    }
                }
                None => stats.skipped += 1,
            }
        }
    }

    for influence in &mut influences {
        if influence.is_unweighted() {
            stats.unweighted += 1;
        }
        influence.normalize();
    }

    if stats.skipped > 0 {
        log::warn!("Mesh '{}': skipped {} invalid bone weights", mesh.name, stats.skipped);
    }
    if stats.dropped > 0 || stats.unweighted > 0 {
        log::debug!(
            "Mesh '{}': dropped {} excess influences, {} unweighted vertices bound to bone 0",
            mesh.name, stats.dropped, stats.unweighted
        );
    }

    (influences, stats)
}

/// Vertex data of one mesh with its bone influences
#[derive(Clone, Debug, Default)]
pub struct SkinnedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub influences: Vec<VertexInfluences>,
}

impl SkinnedMesh {
    /// Pair an imported mesh with influences resolved against `skeleton`.
    pub fn from_imported(mesh: &ImportedMesh, skeleton: &Skeleton) -> Self {
        let (influences, _) = assemble_influences(mesh, skeleton);
        Self {
            name: mesh.name.clone(),
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            texcoords: mesh.texcoords.clone(),
            indices: mesh.indices.clone(),
            influences,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles drawn by [`vertices`](Self::vertices).
    pub fn triangle_count(&self) -> usize {
        self.triangles().iter().filter(|triangle| self.is_valid(triangle)).count()
    }

    /// Corner indices of every complete triangle, valid or not.
    fn triangles(&self) -> Vec<[usize; 3]> {
        if self.indices.is_empty() {
            (0..self.positions.len() / 3)
                .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
                .collect()
        } else {
            self.indices
                .chunks_exact(3)
                .map(|c| [c[0] as usize, c[1] as usize, c[2] as usize])
                .collect()
        }
    }

    fn is_valid(&self, triangle: &[usize; 3]) -> bool {
        triangle.iter().all(|&index| index < self.positions.len())
    }

    fn vertex(&self, index: usize) -> Option<SkinnedVertex> {
        let position = self.positions.get(index)?;
        let normal = self.normals.get(index).copied().unwrap_or(Vec3::ZERO);
        let texcoord = self.texcoords.get(index).copied().unwrap_or(Vec2::ZERO);
        let influence = self.influences.get(index).copied().unwrap_or_else(|| {
            let mut fallback = VertexInfluences::default();
            fallback.normalize();
            fallback
        });

        Some(SkinnedVertex {
            position: position.to_array(),
            normal: normal.to_array(),
            texcoord: texcoord.to_array(),
            bone_ids: influence.bone_ids,
            bone_weights: influence.weights,
        })
    }

    /// Triangle-list vertices with one entry per index, ready for upload.
    ///
    /// A triangle with any index past the vertex arrays is dropped whole, as
    /// is a trailing partial triangle, so the result is always a valid list.
    pub fn vertices(&self) -> Vec<SkinnedVertex> {
        let triangles = self.triangles();
        let mut vertices = Vec::with_capacity(triangles.len() * 3);
        let mut dropped = 0;
        for triangle in &triangles {
            if !self.is_valid(triangle) {
                dropped += 1;
                continue;
            }
            vertices.extend(triangle.iter().filter_map(|&index| self.vertex(index)));
        }
        if dropped > 0 {
            log::warn!("Mesh '{}': dropped {} triangles with invalid indices", self.name, dropped);
        }
        vertices
    }

    /// Axis-aligned bounds of the bind-pose positions.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        bounds_of(&self.positions)
    }

    /// Positions deformed by linear blend skinning with the given palette.
    pub fn deform(&self, palette: &[Mat4]) -> Vec<Vec3> {
        self.positions
            .iter()
            .zip(&self.influences)
            .map(|(position, influence)| influence.blend_matrix(palette).transform_point3(*position))
            .collect()
    }
}

/// Axis-aligned bounds of a point set, `None` when empty.
pub fn bounds_of(points: &[Vec3]) -> Option<(Vec3, Vec3)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))))
}
