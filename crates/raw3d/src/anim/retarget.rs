//! Retargeting an animation onto a reference skeleton

use super::{Anim, BoneKeyFlags};
use crate::error::{Raw3dError, Result};
use crate::math::{KeyFrame, Transform3};
use glam::Vec3;

impl Anim {
    /// Reshape this animation so its bones match `bind` exactly
    ///
    /// The animation is first re-rooted at the bone named like the reference
    /// root, then every bone missing from the reference is deleted. The
    /// reference bones are copied verbatim and each one receives the key
    /// column of the same-named source bone. Reference bones without a source
    /// counterpart get a constant key built from their bind rotation and
    /// scale with zero translation.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when every reference bone was found, `Ok(false)` when some
    /// keys had to be synthesized.
    pub fn apply_new_skeleton(&mut self, bind: &Self) -> Result<bool> {
        let bind_root = bind
            .bones
            .first()
            .ok_or_else(|| Raw3dError::EmptyBindSkeleton(bind.name.clone()))?;

        let root = self
            .bone_index_by_name(&bind_root.name)
            .ok_or_else(|| Raw3dError::RootNotFound(bind_root.name.clone()))?;
        if root != 0 {
            self.set_new_root(root)?;
        }

        loop {
            let Some(extra) = self
                .bones
                .iter()
                .position(|bone| bind.bone_index_by_name(&bone.name).is_none())
            else {
                break;
            };
            if self.bones.len() == 1 {
                return Err(Raw3dError::EmptyBindSkeleton(self.name.clone()));
            }
            self.delete_bone(extra)?;
        }

        let mut bones = bind.bones.clone();
        let new_count = bones.len();
        let mut keys = vec![KeyFrame::IDENTITY; self.frame_count * new_count];
        let mut complete = true;

        for (i, bone) in bones.iter_mut().enumerate() {
            match self.bone_index_by_name(&bone.name) {
                Some(source) => {
                    bone.flags
                        .set(BoneKeyFlags::MASKED, self.bones[source].is_masked());
                    for frame in 0..self.frame_count {
                        keys[frame * new_count + i] = *self.key(frame, source);
                    }
                }
                None => {
                    log::warn!(
                        "Bone '{}' of '{}' has no counterpart in '{}', using a constant pose",
                        bone.name,
                        bind.name,
                        self.name
                    );
                    complete = false;
                    let key = Transform3::new(bone.bind_scale, bone.bind_rotation, Vec3::ZERO);
                    for frame in 0..self.frame_count {
                        keys[frame * new_count + i] = key;
                    }
                }
            }
        }

        self.bones = bones;
        self.keys = keys;
        Ok(complete)
    }
}
