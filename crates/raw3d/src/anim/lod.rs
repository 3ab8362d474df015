//! Bone ordering for skeleton LOD
//!
//! Bones may carry a `LOD[n]` tag in their name. After ordering, parents
//! precede children and bones of one LOD group are contiguous, so a renderer
//! can drop every bone past a group boundary to get a cheaper skeleton.

use super::{Anim, AnimBone};
use crate::error::{Raw3dError, Result};
use crate::hierarchy;

const LOD_TAG: &str = "LOD[";
const MAX_LOD_GROUP: u32 = 1000;

/// LOD group of a bone. Sorts as `Root < Inherit < Level(0) < Level(1) ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LodGroup {
    /// Untagged root bone, always kept
    Root,
    /// Untagged bone below an untagged parent
    Inherit,
    Level(u32),
}

/// Parse the LOD group declared by a bone name
///
/// # Arguments
///
/// * `bone` - Index of the bone, used in error messages
/// * `name` - The bone name, possibly containing `LOD[n]`
/// * `is_root` - Whether the bone has no parent
pub fn lod_group_of(bone: usize, name: &str, is_root: bool) -> Result<LodGroup> {
    let Some(start) = name.find(LOD_TAG) else {
        return Ok(if is_root {
            LodGroup::Root
        } else {
            LodGroup::Inherit
        });
    };

    let malformed = |reason: String| Raw3dError::MalformedLodTag {
        bone,
        name: name.to_string(),
        reason,
    };

    let rest = &name[start + LOD_TAG.len()..];
    let end = rest
        .find(']')
        .ok_or_else(|| malformed("missing ']'".to_string()))?;
    let level: u32 = rest[..end]
        .trim()
        .parse()
        .map_err(|_| malformed(format!("'{}' is not a group number", &rest[..end])))?;
    if level > MAX_LOD_GROUP {
        return Err(malformed(format!(
            "group {} is above the maximum of {}",
            level, MAX_LOD_GROUP
        )));
    }
    Ok(LodGroup::Level(level))
}

/// Resolve inherited groups, parents first
///
/// Untagged bones take the group of a tagged parent. A bone tagged with a
/// lower group than its parent is moved up to the parent's group.
fn resolve_groups(bones: &[AnimBone], declared: &[LodGroup]) -> Vec<LodGroup> {
    let mut resolved: Vec<Option<LodGroup>> = vec![None; bones.len()];

    for bone in 0..bones.len() {
        let chain: Vec<usize> = hierarchy::chain_to_root(bones, bone)
            .take_while(|&i| resolved[i].is_none())
            .collect();

        for &i in chain.iter().rev() {
            let own = declared[i];
            let parent = bones[i].parent;
            let group = match parent.and_then(|p| resolved[p]) {
                Some(inherited @ LodGroup::Level(_)) if own == LodGroup::Inherit => inherited,
                Some(inherited) if inherited > own => {
                    let parent_name = parent.map_or("", |p| bones[p].name.as_str());
                    log::warn!(
                        "Bone '{}' declares LOD group {:?}, lower than its parent '{}' in {:?}; using the parent's group",
                        bones[i].name,
                        own,
                        parent_name,
                        inherited
                    );
                    inherited
                }
                _ => own,
            };
            resolved[i] = Some(group);
        }
    }

    resolved
        .into_iter()
        .zip(declared)
        .map(|(group, &own)| group.unwrap_or(own))
        .collect()
}

impl Anim {
    /// Reorder bones so parents precede children and LOD groups are contiguous
    ///
    /// Bones are sorted by resolved LOD group, then by their original parent
    /// index, then by their original index. Parent links and the key frame
    /// columns are remapped accordingly. The skeleton is left untouched when
    /// an error is returned.
    pub fn put_bones_in_lod_order(&mut self) -> Result<()> {
        self.check_grid()?;

        let n = self.bones.len();
        let mut declared = Vec::with_capacity(n);
        for (i, bone) in self.bones.iter().enumerate() {
            let depth = hierarchy::bone_depth(&self.bones, i)?;
            let group = lod_group_of(i, &bone.name, bone.parent.is_none())?;
            log::trace!("Bone {} '{}' at depth {} declares {:?}", i, bone.name, depth, group);
            declared.push(group);
        }
        let groups = resolve_groups(&self.bones, &declared);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| (groups[i], self.bones[i].parent, i));

        let mut remap = vec![0; n];
        for (new_index, &old_index) in order.iter().enumerate() {
            remap[old_index] = new_index;
        }

        let mut bones: Vec<AnimBone> = order
            .iter()
            .map(|&old_index| {
                let mut bone = self.bones[old_index].clone();
                bone.parent = bone.parent.map(|p| remap[p]);
                bone
            })
            .collect();

        if let Some((bone, parent)) = hierarchy::first_forward_reference(&bones) {
            return Err(Raw3dError::LodSortFailed { bone, parent });
        }
        hierarchy::refresh_child_counts(&mut bones);

        let mut keys = Vec::with_capacity(self.keys.len());
        for frame in 0..self.frame_count {
            let row = self.frame_keys(frame);
            keys.extend(order.iter().map(|&old_index| row[old_index]));
        }

        self.bones = bones;
        self.keys = keys;

        log::debug!("Put {} bones of '{}' in LOD order", n, self.name);
        Ok(())
    }
}
