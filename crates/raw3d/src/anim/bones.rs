//! Structural edits of the animation skeleton
//!
//! Removing a bone with children or cutting the skeleton at a new root
//! changes which parent every surviving key is relative to. Those paths go
//! through world space: world matrices are built with the old hierarchy,
//! realigned to the new bone array, and converted back to local keys against
//! the new parents.

use super::Anim;
use crate::error::{Raw3dError, Result};
use crate::hierarchy;
use crate::math::KeyFrame;
use glam::Mat4;
use raw3d_utils::text;

const DUMMY_TAG: &str = "dummy";

impl Anim {
    /// Remove one bone, keeping the world pose of every other bone
    ///
    /// Children of the removed bone are attached to its parent. When the bone
    /// has no children its key column is simply dropped.
    pub fn delete_bone(&mut self, bone: usize) -> Result<()> {
        let n = self.bones.len();
        if bone >= n {
            return Err(Raw3dError::IndexOutOfRange {
                what: "bone",
                index: bone,
                value: bone,
                len: n,
            });
        }
        self.check_grid()?;

        let has_children = self.bones.iter().any(|b| b.parent == Some(bone));
        log::debug!(
            "Deleting bone {} '{}' from '{}'",
            bone,
            self.bones[bone].name,
            self.name
        );

        if !has_children {
            hierarchy::remove_bone(&mut self.bones, bone)?;
            self.keys = self
                .keys
                .chunks(n)
                .flat_map(|row| {
                    row.iter()
                        .enumerate()
                        .filter(move |&(i, _)| i != bone)
                        .map(|(_, key)| *key)
                })
                .collect();
            return Ok(());
        }

        let world: Vec<Vec<Mat4>> = (0..self.frame_count)
            .map(|frame| {
                let mut matrices = self.raw_world_matrices(frame);
                matrices.remove(bone);
                matrices
            })
            .collect();

        hierarchy::remove_bone(&mut self.bones, bone)?;
        self.keys = vec![KeyFrame::IDENTITY; self.frame_count * self.bones.len()];
        for (frame, matrices) in world.iter().enumerate() {
            self.set_frame_from_world(frame, matrices);
        }
        Ok(())
    }

    /// Remove a bone by name. Unknown names are ignored.
    pub fn delete_bone_by_name(&mut self, name: &str) -> Result<()> {
        match self.bone_index_by_name(name) {
            Some(bone) => self.delete_bone(bone),
            None => Ok(()),
        }
    }

    /// Remove every bone whose name contains "dummy"
    ///
    /// A dummy root is only removed when it has exactly one child, which then
    /// becomes the root in its place.
    pub fn delete_dummy_bones(&mut self) -> Result<()> {
        let mut deleted = 0;
        loop {
            let counts = hierarchy::child_counts(&self.bones);
            let victim = self.bones.iter().enumerate().position(|(i, bone)| {
                text::contains_ignore_case(&bone.name, DUMMY_TAG)
                    && (bone.parent.is_some() || counts[i] == 1)
            });
            match victim {
                Some(bone) => {
                    self.delete_bone(bone)?;
                    deleted += 1;
                }
                None => break,
            }
        }
        if deleted > 0 {
            log::info!("Deleted {} dummy bones from '{}'", deleted, self.name);
        }
        Ok(())
    }

    /// Make `root` the root of the skeleton, dropping every bone before it
    ///
    /// Every bone after `root` must descend from bones at or after `root`.
    /// The new root's keys hold its former world transform, so the world pose
    /// of every retained bone is unchanged.
    pub fn set_new_root(&mut self, root: usize) -> Result<()> {
        let n = self.bones.len();
        if root >= n {
            return Err(Raw3dError::IndexOutOfRange {
                what: "new root bone",
                index: root,
                value: root,
                len: n,
            });
        }
        self.check_grid()?;

        let mut bones = self.bones[root..].to_vec();
        for (i, bone) in bones.iter_mut().enumerate().skip(1) {
            match bone.parent {
                Some(parent) if parent >= root => bone.parent = Some(parent - root),
                parent => {
                    return Err(Raw3dError::DanglingParent {
                        bone: root + i,
                        parent,
                    });
                }
            }
        }
        bones[0].parent = None;
        hierarchy::refresh_child_counts(&mut bones);

        let world: Vec<Vec<Mat4>> = (0..self.frame_count)
            .map(|frame| self.raw_world_matrices(frame).split_off(root))
            .collect();

        self.bones = bones;
        self.keys = vec![KeyFrame::IDENTITY; self.frame_count * self.bones.len()];
        for (frame, matrices) in world.iter().enumerate() {
            self.set_frame_from_world(frame, matrices);
        }

        log::debug!("Re-rooted '{}' at bone {}, {} bones remain", self.name, root, self.bones.len());
        Ok(())
    }
}
