//! Frame range editing, bind baking and root recentering

use super::Anim;
use crate::error::{Raw3dError, Result};
use crate::hierarchy;
use crate::math::{KeyFrame, Transform3};
use glam::{EulerRot, Mat4, Quat, Vec3};

bitflags::bitflags! {
    /// Bind pose components to bake into the key frames
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
    pub struct BakeFlags: u8 {
        const SCALE = 0x1;
        const ROTATION = 0x2;
        const TRANSLATION = 0x4;
    }
}

bitflags::bitflags! {
    /// Root motion components removed by [`Anim::recenter`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
    pub struct RecenterAxes: u8 {
        const TX = 0x01;
        const TY = 0x02;
        const TZ = 0x04;
        const PITCH = 0x08;
        const YAW = 0x10;
        const ROLL = 0x20;
        const TRANSLATION = Self::TX.bits() | Self::TY.bits() | Self::TZ.bits();
        const ROTATION = Self::PITCH.bits() | Self::YAW.bits() | Self::ROLL.bits();
    }
}

impl Anim {
    /// Copy `count` whole frames starting at `start`
    pub fn copy_frames(&self, start: usize, count: usize) -> Result<Vec<KeyFrame>> {
        let end = start + count;
        if end > self.frame_count {
            return Err(Raw3dError::InvalidFrameRange {
                start,
                end,
                frames: self.frame_count,
            });
        }
        let n = self.bones.len();
        Ok(self.keys[start * n..end * n].to_vec())
    }

    /// Insert whole frames before frame `dest`
    ///
    /// `keys` must hold a multiple of the bone count, laid out like the grid.
    pub fn insert_frames(&mut self, dest: usize, keys: &[KeyFrame]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let n = self.bones.len();
        if n == 0 || keys.len() % n != 0 {
            return Err(Raw3dError::PartialFrame {
                keys: keys.len(),
                bones: n,
            });
        }
        if dest > self.frame_count {
            return Err(Raw3dError::InvalidFrameRange {
                start: dest,
                end: dest,
                frames: self.frame_count,
            });
        }
        self.check_grid()?;

        let at = dest * n;
        self.keys.splice(at..at, keys.iter().copied());
        self.frame_count += keys.len() / n;
        Ok(())
    }

    /// Keep only frames `start..end`
    pub fn remove_frames_outside(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end || end > self.frame_count {
            return Err(Raw3dError::InvalidFrameRange {
                start,
                end,
                frames: self.frame_count,
            });
        }
        if start == 0 && end == self.frame_count {
            return Ok(());
        }
        self.check_grid()?;

        let n = self.bones.len();
        self.keys.truncate(end * n);
        self.keys.drain(..start * n);
        self.frame_count = end - start;
        Ok(())
    }

    /// Move the selected bind pose components into the key frames
    ///
    /// For every frame the skinning matrices are rebuilt against a bind pose
    /// with the selected components reset to identity, converted back to
    /// local keys, and finally the bones' bind pose is reset to match. The
    /// skinned result of every frame is unchanged.
    pub fn bake_binding_into_frames(&mut self, bake: BakeFlags) -> Result<()> {
        self.check_grid()?;

        let baked_binds: Vec<Transform3> = self
            .bones
            .iter()
            .map(|bone| reset_bind(bone.bind(), bake))
            .collect();
        let adjust: Vec<Mat4> = self
            .bones
            .iter()
            .zip(&baked_binds)
            .map(|(bone, bind)| bone.bind_matrix_inv * bind.to_matrix())
            .collect();

        for frame in 0..self.frame_count {
            let mut world = self.raw_world_matrices(frame);
            for (matrix, adjust) in world.iter_mut().zip(&adjust) {
                *matrix *= *adjust;
            }
            let locals = hierarchy::local_matrices(&self.bones, &world);
            for (key, local) in self.frame_keys_mut(frame).iter_mut().zip(&locals) {
                *key = Transform3::from_matrix(local);
            }
        }

        for (bone, bind) in self.bones.iter_mut().zip(baked_binds) {
            bone.set_bind(bind);
        }
        log::debug!("Baked {:?} of the bind pose into '{}'", bake, self.name);
        Ok(())
    }

    /// Remove drift and initial orientation from the root bone
    ///
    /// Translation axes shift every root key by the difference between the
    /// first frame's velocity and its position on that axis. Rotation axes
    /// apply the selected Euler components of the inverse first-frame root
    /// rotation to every root key.
    pub fn recenter(&mut self, axes: RecenterAxes) -> Result<()> {
        self.check_grid()?;
        if self.bones.is_empty() || self.frame_count == 0 {
            return Ok(());
        }

        if axes.intersects(RecenterAxes::TRANSLATION) {
            let center = self.key(0, 0).translation;
            let velocity = if self.frame_count > 1 {
                self.key(1, 0).translation - center
            } else {
                Vec3::ZERO
            };
            let offset = velocity - center;
            let delta = Vec3::new(
                if axes.contains(RecenterAxes::TX) { offset.x } else { 0.0 },
                if axes.contains(RecenterAxes::TY) { offset.y } else { 0.0 },
                if axes.contains(RecenterAxes::TZ) { offset.z } else { 0.0 },
            );
            for frame in 0..self.frame_count {
                self.key_mut(frame, 0).translation += delta;
            }
        }

        if axes.intersects(RecenterAxes::ROTATION) {
            let (yaw, pitch, roll) = self.key(0, 0).rotation.inverse().to_euler(EulerRot::YXZ);
            let filtered = Quat::from_euler(
                EulerRot::YXZ,
                if axes.contains(RecenterAxes::YAW) { yaw } else { 0.0 },
                if axes.contains(RecenterAxes::PITCH) { pitch } else { 0.0 },
                if axes.contains(RecenterAxes::ROLL) { roll } else { 0.0 },
            );
            for frame in 0..self.frame_count {
                let key = self.key_mut(frame, 0);
                key.rotation = (filtered * key.rotation).normalize();
                key.translation = filtered * key.translation;
            }
        }
        Ok(())
    }
}

fn reset_bind(bind: Transform3, bake: BakeFlags) -> Transform3 {
    Transform3 {
        scale: if bake.contains(BakeFlags::SCALE) { Vec3::ONE } else { bind.scale },
        rotation: if bake.contains(BakeFlags::ROTATION) {
            Quat::IDENTITY
        } else {
            bind.rotation
        },
        translation: if bake.contains(BakeFlags::TRANSLATION) {
            Vec3::ZERO
        } else {
            bind.translation
        },
    }
}
