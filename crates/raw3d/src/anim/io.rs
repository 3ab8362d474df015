//! Animation records: `AnimInfo`, `Skeleton` and `KeyFrames`

use super::{Anim, AnimBone, BoneKeyFlags, MAX_FRAMES};
use crate::error::{Raw3dError, Result};
use crate::hierarchy;
use crate::math::{KeyFrame, Transform3};
use crate::records::{Record, RecordItem, RecordReader, RecordWriter};

pub(crate) const ANIM_INFO: &str = "AnimInfo";
pub(crate) const SKELETON: &str = "Skeleton";
pub(crate) const KEY_FRAMES: &str = "KeyFrames";

impl Anim {
    /// Write the header, the skeleton and the key frame grid
    pub fn write_records<W: RecordWriter>(&self, writer: &mut W) -> Result<()> {
        self.check_grid()?;

        let info = RecordItem::new()
            .with("Name", self.name.as_str())
            .with("FPS", self.fps)
            .with("nFrames", self.frame_count);
        writer.write_record(Record::new(ANIM_INFO, vec![info]))?;

        let skeleton = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| {
                RecordItem::new()
                    .with("Index", i)
                    .with("Name", bone.name.as_str())
                    .with("nChildren", bone.child_count)
                    .with("iParent", bone.parent)
                    .with("Scale", bone.bind_scale)
                    .with("Rotate", bone.bind_rotation)
                    .with("Pos", bone.bind_translation)
                    .with("bScaleKeys", bone.flags.contains(BoneKeyFlags::SCALE_KEYS))
                    .with("bRotKeys", bone.flags.contains(BoneKeyFlags::ROTATION_KEYS))
                    .with("bPosKeys", bone.flags.contains(BoneKeyFlags::TRANSLATION_KEYS))
                    .with("bMasked", bone.is_masked())
            })
            .collect();
        writer.write_record(Record::new(SKELETON, skeleton))?;

        let n = self.bones.len().max(1);
        let keys = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                RecordItem::new()
                    .with("iKey", i)
                    .with("iBone", i % n)
                    .with("iFrame", i / n)
                    .with("Scale", key.scale)
                    .with("Rotate", key.rotation)
                    .with("Translate", key.translation)
            })
            .collect();
        writer.write_record(Record::new(KEY_FRAMES, keys))?;

        log::debug!(
            "Wrote animation '{}': {} bones, {} frames",
            self.name,
            self.bones.len(),
            self.frame_count
        );
        Ok(())
    }

    /// Rebuild an animation from its records
    ///
    /// Bind matrices and child counts are recomputed rather than trusted.
    /// Keys are placed by their `iBone`/`iFrame` fields, so item order does
    /// not matter, but every grid slot must be filled exactly once. Frame
    /// counts of [`MAX_FRAMES`] or more are rejected before the grid is
    /// allocated.
    pub fn read_records<R: RecordReader>(reader: &mut R) -> Result<Self> {
        let info = reader.read_required_record(ANIM_INFO)?;
        let header = info
            .items
            .first()
            .ok_or_else(|| Raw3dError::Record(format!("record '{}' is empty", ANIM_INFO)))?;

        let name = header.string("Name")?.to_string();
        let fps = u32::try_from(header.index("FPS")?)
            .map_err(|_| Raw3dError::Record("FPS does not fit in 32 bits".to_string()))?;
        let frame_count = header.index("nFrames")?;
        if frame_count >= MAX_FRAMES {
            return Err(Raw3dError::Record(format!(
                "{} frames declared, at most {} are supported",
                frame_count,
                MAX_FRAMES - 1
            )));
        }

        let mut bones = Vec::new();
        for item in &reader.read_required_record(SKELETON)?.items {
            bones.push(read_bone(item)?);
        }
        hierarchy::refresh_child_counts(&mut bones);

        let n = bones.len();
        let key_count = n.checked_mul(frame_count).ok_or_else(|| {
            Raw3dError::Record(format!(
                "a grid of {} bones and {} frames is too large",
                n, frame_count
            ))
        })?;
        let mut keys = vec![KeyFrame::IDENTITY; key_count];
        let mut filled = vec![false; keys.len()];
        for item in &reader.read_required_record(KEY_FRAMES)?.items {
            let bone = item.index("iBone")?;
            let frame = item.index("iFrame")?;
            if bone >= n || frame >= frame_count {
                return Err(Raw3dError::Record(format!(
                    "key for bone {} at frame {} is outside a grid of {} bones and {} frames",
                    bone, frame, n, frame_count
                )));
            }
            let slot = frame * n + bone;
            if std::mem::replace(&mut filled[slot], true) {
                return Err(Raw3dError::Record(format!(
                    "duplicate key for bone {} at frame {}",
                    bone, frame
                )));
            }
            keys[slot] = Transform3::new(
                item.vec3("Scale")?,
                item.quat("Rotate")?,
                item.vec3("Translate")?,
            );
        }
        if let Some(missing) = filled.iter().position(|f| !f) {
            return Err(Raw3dError::Record(format!(
                "missing key for bone {} at frame {}",
                missing % n.max(1),
                missing / n.max(1)
            )));
        }

        let anim = Self {
            name,
            fps,
            frame_count,
            bones,
            keys,
            ..Self::default()
        };
        log::debug!(
            "Read animation '{}': {} bones, {} frames",
            anim.name,
            anim.bones.len(),
            anim.frame_count
        );
        Ok(anim)
    }
}

fn read_bone(item: &RecordItem) -> Result<AnimBone> {
    let bind = Transform3::new(item.vec3("Scale")?, item.quat("Rotate")?, item.vec3("Pos")?);
    let mut bone = AnimBone::new(item.string("Name")?, item.optional_index("iParent")?, bind);

    bone.flags
        .set(BoneKeyFlags::SCALE_KEYS, item.boolean("bScaleKeys")?);
    bone.flags
        .set(BoneKeyFlags::ROTATION_KEYS, item.boolean("bRotKeys")?);
    bone.flags
        .set(BoneKeyFlags::TRANSLATION_KEYS, item.boolean("bPosKeys")?);
    // Older writers did not store the mask
    if item.has("bMasked") {
        bone.flags.set(BoneKeyFlags::MASKED, item.boolean("bMasked")?);
    }
    Ok(bone)
}
