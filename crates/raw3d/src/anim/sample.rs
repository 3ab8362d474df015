//! Sampling key frames into local keys and local-to-world matrices

use super::Anim;
use crate::error::{Raw3dError, Result};
use crate::hierarchy;
use crate::math::{strip_yaw, KeyFrame, Transform3};
use glam::Mat4;

bitflags::bitflags! {
    /// Root motion to strip when sampling a frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
    pub struct MotionFilter: u8 {
        /// Zero the root translation on X and Z
        const HORIZONTAL = 0x1;
        /// Zero the root translation on Y
        const VERTICAL = 0x2;
        /// Remove the yaw of the root rotation
        const YAW = 0x4;
    }
}

impl Anim {
    /// Bracketing frames and blend factor for a fractional frame
    ///
    /// Time wraps over `frame_count - 1` frames since the last frame of a
    /// looping animation repeats the first.
    fn bracket(&self, frame: f32) -> (usize, usize, f32) {
        if self.frame_count <= 1 {
            return (0, 0, 0.0);
        }
        let span = (self.frame_count - 1) as f32;
        let wrapped = frame.rem_euclid(span);
        let frame0 = (wrapped.floor() as usize).min(self.frame_count - 1);
        let frame1 = (frame0 + 1) % self.frame_count;
        (frame0, frame1, wrapped - frame0 as f32)
    }

    /// Interpolated local keys of every bone at a fractional frame
    pub fn compute_bone_keys(&self, frame: f32) -> Vec<KeyFrame> {
        if self.frame_count == 0 {
            return Vec::new();
        }
        let (frame0, frame1, t) = self.bracket(frame);
        self.frame_keys(frame0)
            .iter()
            .zip(self.frame_keys(frame1))
            .map(|(a, b)| a.blend(t, b))
            .collect()
    }

    /// Local-to-world skinning matrices of every bone at a fractional frame
    ///
    /// Keys are interpolated, concatenated down the hierarchy and multiplied
    /// by each bone's inverse bind matrix.
    pub fn compute_bones_l2w(&self, frame: f32) -> Vec<Mat4> {
        let locals: Vec<Mat4> = self
            .compute_bone_keys(frame)
            .iter()
            .map(Transform3::to_matrix)
            .collect();
        self.apply_bind(hierarchy::world_matrices(&self.bones, &locals))
    }

    /// Skinning matrices of one whole frame with root motion optionally removed
    pub fn compute_bones_l2w_filtered(&self, frame: usize, filter: MotionFilter) -> Vec<Mat4> {
        if self.frame_count == 0 {
            return Vec::new();
        }
        let frame = frame % (self.frame_count - 1).max(1);

        let mut keys = self.frame_keys(frame).to_vec();
        if let Some(root) = keys.first_mut() {
            if filter.contains(MotionFilter::HORIZONTAL) {
                root.translation.x = 0.0;
                root.translation.z = 0.0;
            }
            if filter.contains(MotionFilter::VERTICAL) {
                root.translation.y = 0.0;
            }
            if filter.contains(MotionFilter::YAW) {
                root.rotation = strip_yaw(root.rotation);
            }
        }

        let locals: Vec<Mat4> = keys.iter().map(Transform3::to_matrix).collect();
        self.apply_bind(hierarchy::world_matrices(&self.bones, &locals))
    }

    /// Skinning matrix of a single bone at a fractional frame
    pub fn compute_bone_l2w(&self, bone: usize, frame: f32) -> Result<Mat4> {
        self.check_bone(bone)?;
        if self.frame_count == 0 {
            return Err(Raw3dError::InvalidFrameRange {
                start: 0,
                end: 0,
                frames: 0,
            });
        }
        let (frame0, frame1, t) = self.bracket(frame);
        let row0 = self.frame_keys(frame0);
        let row1 = self.frame_keys(frame1);

        let world = hierarchy::chain_to_root(&self.bones, bone).fold(Mat4::IDENTITY, |acc, i| {
            row0[i].blend(t, &row1[i]).to_matrix() * acc
        });
        Ok(world * self.bones[bone].bind_matrix_inv)
    }

    /// Skinning matrix of a single bone at a whole frame, without interpolation
    pub fn compute_raw_bone_l2w(&self, bone: usize, frame: usize) -> Result<Mat4> {
        self.check_bone(bone)?;
        if frame >= self.frame_count {
            return Err(Raw3dError::InvalidFrameRange {
                start: frame,
                end: frame + 1,
                frames: self.frame_count,
            });
        }
        let row = self.frame_keys(frame);
        let world = hierarchy::chain_to_root(&self.bones, bone)
            .fold(Mat4::IDENTITY, |acc, i| row[i].to_matrix() * acc);
        Ok(world * self.bones[bone].bind_matrix_inv)
    }

    fn apply_bind(&self, mut world: Vec<Mat4>) -> Vec<Mat4> {
        for (matrix, bone) in world.iter_mut().zip(&self.bones) {
            *matrix *= bone.bind_matrix_inv;
        }
        world
    }

    fn check_bone(&self, bone: usize) -> Result<()> {
        if bone < self.bones.len() {
            Ok(())
        } else {
            Err(Raw3dError::IndexOutOfRange {
                what: "bone",
                index: bone,
                value: bone,
                len: self.bones.len(),
            })
        }
    }
}
