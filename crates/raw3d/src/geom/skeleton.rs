//! Rebinding skin weights to another skeleton and removing bind bones

use super::{Geom, GeomBone, Vertex, Weight};
use crate::anim::Anim;
use crate::error::{Raw3dError, Result};
use crate::hierarchy::{self, SkeletonNode};

impl Vertex {
    /// Sum weights that reference the same bone, keeping first occurrence order
    pub fn merge_duplicate_weights(&mut self) {
        let mut merged: Vec<Weight> = Vec::with_capacity(self.weight_count);
        for weight in self.weights() {
            match merged.iter_mut().find(|w| w.bone == weight.bone) {
                Some(existing) => existing.weight += weight.weight,
                None => merged.push(*weight),
            }
        }
        self.weights[..merged.len()].copy_from_slice(&merged);
        self.weight_count = merged.len();
    }
}

/// For every source bone, the target bone named like it or its nearest
/// named ancestor
fn match_bones<S: SkeletonNode, T: SkeletonNode>(source: &[S], target: &[T]) -> Vec<Option<usize>> {
    (0..source.len())
        .map(|bone| {
            hierarchy::chain_to_root(source, bone)
                .find_map(|b| hierarchy::find_bone(target, source[b].name()))
        })
        .collect()
}

impl Geom {
    /// Rebind skin weights to the bind skeleton of `anim`
    ///
    /// Returns the number of weights that fell back to bone 0, see
    /// [`Geom::apply_new_skeleton_from_geom`].
    pub fn apply_new_skeleton_from_anim(&mut self, anim: &Anim) -> Result<usize> {
        let bones: Vec<GeomBone> = anim
            .bones
            .iter()
            .map(|b| GeomBone::new(b.name.clone(), b.parent, b.bind()))
            .collect();
        let matches = match_bones(&self.bones, &anim.bones);
        self.rebind(bones, &matches, false)
    }

    /// Rebind skin weights to the skeleton of `other`
    ///
    /// Each weight moves to the bone of `other` named like its current bone
    /// or, failing that, like the nearest ancestor with a counterpart.
    /// Weights with no named ancestor at all fall back to bone 0 and are
    /// logged. The bone array is then replaced by a copy of `other`'s.
    ///
    /// Vertex positions are re-expressed from the bind transform of their
    /// primary bone in the old skeleton into that of the matched bone.
    ///
    /// # Returns
    ///
    /// The number of weights that fell back to bone 0.
    pub fn apply_new_skeleton_from_geom(&mut self, other: &Geom) -> Result<usize> {
        let matches = match_bones(&self.bones, &other.bones);
        self.rebind(other.bones.clone(), &matches, true)
    }

    fn rebind(
        &mut self,
        mut bones: Vec<GeomBone>,
        matches: &[Option<usize>],
        rebase_positions: bool,
    ) -> Result<usize> {
        if bones.is_empty() {
            return Err(Raw3dError::EmptyBindSkeleton("target".to_string()));
        }
        for (i, vertex) in self.vertices.iter().enumerate() {
            if let Some(bad) = vertex.weights().iter().find(|w| w.bone >= matches.len()) {
                return Err(Raw3dError::IndexOutOfRange {
                    what: "vertex weight bone",
                    index: i,
                    value: bad.bone,
                    len: matches.len(),
                });
            }
        }

        let mut fallbacks = 0;
        for vertex in &mut self.vertices {
            let primary = vertex.primary_bone();
            if rebase_positions {
                if let Some(old) = primary {
                    let bind = self.bones[old].bind().to_matrix();
                    vertex.position = bind.inverse().transform_point3(vertex.position);
                }
            }

            for weight in vertex.weights_mut() {
                weight.bone = matches[weight.bone].unwrap_or_else(|| {
                    fallbacks += 1;
                    0
                });
            }
            vertex.merge_duplicate_weights();
            vertex.sort_weights();

            if rebase_positions {
                if let Some(new) = primary.map(|old| matches[old].unwrap_or(0)) {
                    vertex.position = bones[new].bind().to_matrix().transform_point3(vertex.position);
                }
            }
        }
        if fallbacks > 0 {
            log::warn!(
                "{} weights had no matching bone in the new skeleton and were bound to bone 0",
                fallbacks
            );
        }

        hierarchy::refresh_child_counts(&mut bones);
        self.bones = bones;
        self.compute_bone_info()?;
        Ok(fallbacks)
    }

    /// Remove one bind bone
    ///
    /// Children move to the removed bone's parent. Weights on the removed
    /// bone move to its parent, or to bone 0 for a root, and weights on
    /// later bones shift down by one.
    pub fn delete_bone(&mut self, bone: usize) -> Result<()> {
        if bone < self.bones.len() && self.bones.len() == 1 {
            return Err(Raw3dError::Sanity {
                element: "bone",
                index: bone,
                reason: "cannot delete the only bone".to_string(),
            });
        }
        let parent = self.bones.get(bone).and_then(|b| b.parent);
        let removed = hierarchy::remove_bone(&mut self.bones, bone)?;

        let target = match parent {
            Some(p) => p,
            None => {
                log::warn!(
                    "Deleted root bone '{}', its weights are moved to bone 0",
                    removed.name
                );
                0
            }
        };
        for vertex in &mut self.vertices {
            for weight in vertex.weights_mut() {
                weight.bone = hierarchy::shift_after_removal(weight.bone, bone)
                    .unwrap_or(target);
            }
            vertex.merge_duplicate_weights();
            vertex.sort_weights();
        }
        log::debug!("Deleted bone {} '{}'", bone, removed.name);
        Ok(())
    }

    /// Remove a bind bone by name. Unknown names are ignored.
    pub fn delete_bone_by_name(&mut self, name: &str) -> Result<()> {
        match self.bone_index_by_name(name) {
            Some(bone) => self.delete_bone(bone),
            None => Ok(()),
        }
    }
}
