//! Skeletal animation aggregate
//!
//! An [`Anim`] holds a bone hierarchy with bind pose and a grid of local key
//! frames. Bones are the columns of the grid and frames are the rows, so the
//! key of `bone` at `frame` lives at `frame * bone_count + bone`. Every
//! operation that changes the number of bones or frames resizes the grid in
//! the same step.
//!
//! # Example
//!
//! ```rust
//! use raw3d::anim::{Anim, AnimBone};
//! use raw3d::math::Transform3;
//! use glam::Vec3;
//!
//! let bones = vec![
//!     AnimBone::new("Root", None, Transform3::IDENTITY),
//!     AnimBone::new("Spine_LOD[1]", Some(0), Transform3::IDENTITY),
//!     AnimBone::new("Dummy01", Some(1), Transform3::IDENTITY),
//! ];
//! let mut anim = Anim::with_skeleton("walk", bones, 10);
//! anim.key_mut(3, 1).translation = Vec3::Y;
//!
//! anim.clean_up()?;
//! assert_eq!(anim.bone_count(), 2);
//! assert_eq!(anim.keys.len(), 10 * 2);
//! # Ok::<(), raw3d::Raw3dError>(())
//! ```

mod bones;
mod frames;
mod io;
mod lod;
mod looping;
mod retarget;
mod sample;

pub use frames::{BakeFlags, RecenterAxes};
pub use lod::{lod_group_of, LodGroup};
pub use sample::MotionFilter;

use crate::error::{Raw3dError, Result};
use crate::hierarchy::{self, SkeletonNode};
use crate::math::{KeyFrame, Transform3};
use glam::{Mat4, Quat, Vec3};
use raw3d_utils::debug;

/// Largest bone count accepted by [`Anim::sanity_check`] (exclusive)
pub const MAX_BONES: usize = 2048;
/// Largest frame count accepted by [`Anim::sanity_check`] (exclusive)
pub const MAX_FRAMES: usize = 65536;
/// Default sampling rate
pub const DEFAULT_FPS: u32 = 60;

bitflags::bitflags! {
    /// Which channels of a bone carry animation, and whether it is masked out
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
    pub struct BoneKeyFlags: u8 {
        const SCALE_KEYS = 0x1;
        const ROTATION_KEYS = 0x2;
        const TRANSLATION_KEYS = 0x4;
        const MASKED = 0x8;
    }
}

/// A bone of an animation skeleton
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AnimBone {
    pub name: String,
    pub parent: Option<usize>,
    pub child_count: usize,
    pub bind_scale: Vec3,
    pub bind_rotation: Quat,
    pub bind_translation: Vec3,
    pub flags: BoneKeyFlags,
    /// Derived from the bind components, see [`AnimBone::update_bind_matrices`]
    pub bind_matrix: Mat4,
    pub bind_matrix_inv: Mat4,
}

impl Default for AnimBone {
    fn default() -> Self {
        Self::new("", None, Transform3::IDENTITY)
    }
}

impl AnimBone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, bind: Transform3) -> Self {
        let mut bone = Self {
            name: name.into(),
            parent,
            child_count: 0,
            bind_scale: bind.scale,
            bind_rotation: bind.rotation,
            bind_translation: bind.translation,
            flags: BoneKeyFlags::SCALE_KEYS
                | BoneKeyFlags::ROTATION_KEYS
                | BoneKeyFlags::TRANSLATION_KEYS,
            bind_matrix: Mat4::IDENTITY,
            bind_matrix_inv: Mat4::IDENTITY,
        };
        bone.update_bind_matrices();
        bone
    }

    pub fn bind(&self) -> Transform3 {
        Transform3::new(self.bind_scale, self.bind_rotation, self.bind_translation)
    }

    /// Replace the bind components and recompute the bind matrices
    pub fn set_bind(&mut self, bind: Transform3) {
        self.bind_scale = bind.scale;
        self.bind_rotation = bind.rotation;
        self.bind_translation = bind.translation;
        self.update_bind_matrices();
    }

    pub fn update_bind_matrices(&mut self) {
        self.bind_matrix = self.bind().to_matrix();
        self.bind_matrix_inv = self.bind_matrix.inverse();
    }

    pub fn is_masked(&self) -> bool {
        self.flags.contains(BoneKeyFlags::MASKED)
    }
}

impl SkeletonNode for AnimBone {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<usize> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<usize>) {
        self.parent = parent;
    }

    fn set_child_count(&mut self, count: usize) {
        self.child_count = count;
    }
}

/// Timed marker attached to the animation
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Event {
    pub name: String,
    pub parent_name: String,
    pub kind: i32,
    pub radius: f32,
    pub frame0: i32,
    pub frame1: i32,
    pub position: Vec3,
}

/// Extended event carrying a bag of user values
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct SuperEvent {
    pub name: String,
    pub kind: i32,
    pub start_frame: i32,
    pub end_frame: i32,
    pub position: Vec3,
    pub rotation: Quat,
    pub radius: f32,
    pub show_axis: bool,
    pub show_sphere: bool,
    pub show_box: bool,
    pub axis_size: f32,
    pub width: f32,
    pub length: f32,
    pub height: f32,
    pub strings: [String; 5],
    pub ints: [i32; 5],
    pub floats: [f32; 8],
    pub bools: [bool; 8],
    pub colors: [[u8; 4]; 4],
}

/// Object attached to a bone, animated through [`PropFrame`]s
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Prop {
    pub name: String,
    pub parent_bone: Option<usize>,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PropFrame {
    pub transform: Transform3,
    pub visible: bool,
}

/// Skeleton plus key frame grid
#[derive(custom_debug::Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Anim {
    pub name: String,
    pub fps: u32,
    pub frame_count: usize,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub bones: Vec<AnimBone>,
    /// Row-major grid: frames are rows, bones are columns
    #[debug(with = debug::trimmed_collection_fmt)]
    pub keys: Vec<KeyFrame>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub events: Vec<Event>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub super_events: Vec<SuperEvent>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub props: Vec<Prop>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub prop_frames: Vec<PropFrame>,
}

impl Default for Anim {
    fn default() -> Self {
        Self {
            name: String::new(),
            fps: DEFAULT_FPS,
            frame_count: 0,
            bones: Vec::new(),
            keys: Vec::new(),
            events: Vec::new(),
            super_events: Vec::new(),
            props: Vec::new(),
            prop_frames: Vec::new(),
        }
    }
}

impl Anim {
    /// An animation with `frame_count` frames, every key holding the bone's bind pose
    pub fn with_skeleton(name: impl Into<String>, bones: Vec<AnimBone>, frame_count: usize) -> Self {
        let mut bones = bones;
        hierarchy::refresh_child_counts(&mut bones);
        let row: Vec<KeyFrame> = bones.iter().map(AnimBone::bind).collect();
        let keys = row.iter().copied().cycle().take(row.len() * frame_count).collect();
        Self {
            name: name.into(),
            frame_count,
            bones,
            keys,
            ..Self::default()
        }
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Position of a key in the grid
    #[inline]
    pub fn key_index(&self, frame: usize, bone: usize) -> usize {
        frame * self.bones.len() + bone
    }

    pub fn key(&self, frame: usize, bone: usize) -> &KeyFrame {
        &self.keys[self.key_index(frame, bone)]
    }

    pub fn key_mut(&mut self, frame: usize, bone: usize) -> &mut KeyFrame {
        let index = self.key_index(frame, bone);
        &mut self.keys[index]
    }

    /// All bone keys of one frame
    pub fn frame_keys(&self, frame: usize) -> &[KeyFrame] {
        let n = self.bones.len();
        &self.keys[frame * n..(frame + 1) * n]
    }

    pub fn frame_keys_mut(&mut self, frame: usize) -> &mut [KeyFrame] {
        let n = self.bones.len();
        &mut self.keys[frame * n..(frame + 1) * n]
    }

    /// Key frames of one bone across all frames
    pub fn bone_keys(&self, bone: usize) -> impl Iterator<Item = &KeyFrame> + '_ {
        self.keys.iter().skip(bone).step_by(self.bones.len().max(1))
    }

    /// Index of a bone by name, ignoring ASCII case
    pub fn bone_index_by_name(&self, name: &str) -> Option<usize> {
        hierarchy::find_bone(&self.bones, name)
    }

    /// Whether one bone is an ancestor of the other
    pub fn are_bones_from_same_branch(&self, a: usize, b: usize) -> bool {
        hierarchy::are_bones_from_same_branch(&self.bones, a, b)
    }

    /// True if any bone is masked out
    pub fn is_masked(&self) -> bool {
        self.bones.iter().any(AnimBone::is_masked)
    }

    /// Same bone names, hierarchy and bind matrices
    pub fn has_same_skeleton(&self, other: &Self) -> bool {
        self.bones.len() == other.bones.len()
            && self.bones.iter().zip(&other.bones).all(|(a, b)| {
                a.name.eq_ignore_ascii_case(&b.name)
                    && a.parent == b.parent
                    && a.child_count == b.child_count
                    && a.bind_matrix.abs_diff_eq(b.bind_matrix, 1e-4)
            })
    }

    /// Verify the grid holds exactly `frame_count * bone_count` keys
    pub fn check_grid(&self) -> Result<()> {
        let expected = self.frame_count * self.bones.len();
        if self.keys.len() == expected {
            Ok(())
        } else {
            Err(Raw3dError::Sanity {
                element: "key frame grid",
                index: self.keys.len(),
                reason: format!(
                    "expected {} keys for {} frames of {} bones",
                    expected,
                    self.frame_count,
                    self.bones.len()
                ),
            })
        }
    }

    /// Validate counts, parent links and the key frame grid
    pub fn sanity_check(&self) -> Result<()> {
        if self.bones.is_empty() || self.bones.len() >= MAX_BONES {
            return Err(Raw3dError::Sanity {
                element: "bone count",
                index: self.bones.len(),
                reason: format!("must be between 1 and {}", MAX_BONES - 1),
            });
        }
        if self.frame_count >= MAX_FRAMES {
            return Err(Raw3dError::Sanity {
                element: "frame count",
                index: self.frame_count,
                reason: format!("must be below {}", MAX_FRAMES),
            });
        }
        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent.filter(|&p| p >= self.bones.len()) {
                return Err(Raw3dError::IndexOutOfRange {
                    what: "bone parent",
                    index: i,
                    value: parent,
                    len: self.bones.len(),
                });
            }
        }
        if let Some((bone, parent)) = hierarchy::first_forward_reference(&self.bones) {
            return Err(Raw3dError::Sanity {
                element: "bone",
                index: bone,
                reason: format!("parent {} does not precede it", parent),
            });
        }
        self.check_grid()
    }

    /// Put bones in LOD order, then strip dummy bones
    pub fn clean_up(&mut self) -> Result<()> {
        self.put_bones_in_lod_order()?;
        self.delete_dummy_bones()
    }

    /// World matrices of one frame without the bind pose applied
    pub(crate) fn raw_world_matrices(&self, frame: usize) -> Vec<Mat4> {
        let locals: Vec<Mat4> = self
            .frame_keys(frame)
            .iter()
            .map(Transform3::to_matrix)
            .collect();
        hierarchy::world_matrices(&self.bones, &locals)
    }

    /// Overwrite one frame's keys from world matrices of the current hierarchy
    pub(crate) fn set_frame_from_world(&mut self, frame: usize, world: &[Mat4]) {
        let locals = hierarchy::local_matrices(&self.bones, world);
        for (key, local) in self.frame_keys_mut(frame).iter_mut().zip(&locals) {
            *key = Transform3::from_matrix(local);
        }
    }
}
