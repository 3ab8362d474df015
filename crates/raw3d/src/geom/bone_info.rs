//! Per-bone bounds and per-mesh bone usage

use super::Geom;
use crate::error::{Raw3dError, Result};
use crate::math::BBox;
use glam::Vec3;

/// Amount added on every side of a bone box
pub const BONE_BBOX_INFLATE: f32 = 0.1;

impl Geom {
    /// Recompute bone boxes and mesh bone counts
    ///
    /// Each bone box covers every vertex with any weight on that bone. A
    /// bone with no vertices gets a box around its bind translation. Boxes
    /// are inflated by [`BONE_BBOX_INFLATE`].
    ///
    /// A mesh's bone count is one past the highest bone referenced by the
    /// vertices of its facets, which is the bone prefix needed to skin it
    /// when bones are in LOD order. A mesh referencing no bones gets zero.
    pub fn compute_bone_info(&mut self) -> Result<()> {
        let bone_total = self.bones.len();
        let mut boxes = vec![BBox::EMPTY; bone_total];
        for (i, vertex) in self.vertices.iter().enumerate() {
            for weight in vertex.weights() {
                let bbox = boxes
                    .get_mut(weight.bone)
                    .ok_or(Raw3dError::IndexOutOfRange {
                        what: "vertex weight bone",
                        index: i,
                        value: weight.bone,
                        len: bone_total,
                    })?;
                bbox.add_point(vertex.position);
            }
        }

        for (bone, mut bbox) in self.bones.iter_mut().zip(boxes) {
            if bbox.is_empty() {
                bbox = BBox::from_point(bone.translation);
            }
            bbox.inflate(Vec3::splat(BONE_BBOX_INFLATE));
            bone.bbox = bbox;
        }

        let mut counts = vec![0; self.meshes.len()];
        for (i, facet) in self.facets.iter().enumerate() {
            let mesh_total = counts.len();
            let count = counts.get_mut(facet.mesh).ok_or(Raw3dError::IndexOutOfRange {
                what: "facet mesh",
                index: i,
                value: facet.mesh,
                len: mesh_total,
            })?;
            for &index in facet.indices() {
                let vertex = self.vertices.get(index).ok_or(Raw3dError::IndexOutOfRange {
                    what: "facet vertex",
                    index: i,
                    value: index,
                    len: self.vertices.len(),
                })?;
                for weight in vertex.weights() {
                    *count = (*count).max(weight.bone + 1);
                }
            }
        }
        for (mesh, count) in self.meshes.iter_mut().zip(counts) {
            mesh.bone_count = count;
        }

        log::trace!(
            "Computed bone info for {} bones and {} meshes",
            self.bones.len(),
            self.meshes.len()
        );
        Ok(())
    }
}
