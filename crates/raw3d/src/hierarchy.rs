//! Bone hierarchy utilities
//!
//! Skeletons are flat arrays of bones where each bone names its parent by
//! index. The helpers here work on any bone type through [`SkeletonNode`], so
//! the animation skeleton and the geometry bind skeleton share one
//! implementation of parent-chain walking, reparenting and name lookup.

use crate::error::{Raw3dError, Result};
use glam::Mat4;
use raw3d_utils::text;

/// A bone that lives in an index-linked hierarchy
pub trait SkeletonNode {
    fn name(&self) -> &str;
    fn parent(&self) -> Option<usize>;
    fn set_parent(&mut self, parent: Option<usize>);
    fn set_child_count(&mut self, count: usize);
}

/// Iterator over the ancestors of a bone, nearest first
///
/// Stops at the root, at a parent index outside the array, or after visiting
/// as many bones as the array holds, whichever comes first.
pub struct Ancestors<'a, B> {
    bones: &'a [B],
    current: Option<usize>,
    remaining: usize,
}

impl<B: SkeletonNode> Iterator for Ancestors<'_, B> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.current?;
        let bone = self.bones.get(index)?;
        self.remaining -= 1;
        self.current = bone.parent();
        Some(index)
    }
}

/// Ancestors of `bone`, starting with its parent
pub fn ancestors<B: SkeletonNode>(bones: &[B], bone: usize) -> Ancestors<'_, B> {
    Ancestors {
        bones,
        current: bones.get(bone).and_then(SkeletonNode::parent),
        remaining: bones.len(),
    }
}

/// `bone` followed by all of its ancestors
pub fn chain_to_root<B: SkeletonNode>(bones: &[B], bone: usize) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(bone)
        .filter(move |&b| b < bones.len())
        .chain(ancestors(bones, bone))
}

/// Whether `ancestor` appears on the parent chain of `bone`
pub fn is_ancestor<B: SkeletonNode>(bones: &[B], ancestor: usize, bone: usize) -> bool {
    ancestors(bones, bone).any(|index| index == ancestor)
}

/// Whether one bone is an ancestor of the other
pub fn are_bones_from_same_branch<B: SkeletonNode>(bones: &[B], a: usize, b: usize) -> bool {
    is_ancestor(bones, b, a) || is_ancestor(bones, a, b)
}

/// Number of links between `bone` and its root
pub fn bone_depth<B: SkeletonNode>(bones: &[B], bone: usize) -> Result<usize> {
    let mut depth = 0;
    let mut current = bones.get(bone).and_then(SkeletonNode::parent);
    while let Some(parent) = current {
        if depth >= bones.len() {
            return Err(Raw3dError::CyclicHierarchy(bone));
        }
        let node = bones.get(parent).ok_or(Raw3dError::IndexOutOfRange {
            what: "bone parent",
            index: bone,
            value: parent,
            len: bones.len(),
        })?;
        depth += 1;
        current = node.parent();
    }
    Ok(depth)
}

/// Number of direct children of every bone
pub fn child_counts<B: SkeletonNode>(bones: &[B]) -> Vec<usize> {
    let mut counts = vec![0; bones.len()];
    for bone in bones {
        if let Some(count) = bone.parent().and_then(|p| counts.get_mut(p)) {
            *count += 1;
        }
    }
    counts
}

/// Recompute the cached child count of every bone
pub fn refresh_child_counts<B: SkeletonNode>(bones: &mut [B]) {
    let counts = child_counts(bones);
    for (bone, count) in bones.iter_mut().zip(counts) {
        bone.set_child_count(count);
    }
}

/// Index of the first bone whose name matches, ignoring ASCII case
pub fn find_bone<B: SkeletonNode>(bones: &[B], name: &str) -> Option<usize> {
    text::position_by_name(bones.iter().map(SkeletonNode::name), name)
}

/// First bone whose parent does not precede it, as `(bone, parent)`
pub fn first_forward_reference<B: SkeletonNode>(bones: &[B]) -> Option<(usize, usize)> {
    bones
        .iter()
        .enumerate()
        .find_map(|(i, bone)| bone.parent().filter(|&p| p >= i).map(|p| (i, p)))
}

/// Splice a bone out of the hierarchy and return it
///
/// Children of the removed bone are attached to its parent and every parent
/// index past the removed slot shifts down by one. Child counts are refreshed.
pub fn remove_bone<B: SkeletonNode>(bones: &mut Vec<B>, index: usize) -> Result<B> {
    if index >= bones.len() {
        return Err(Raw3dError::IndexOutOfRange {
            what: "bone",
            index,
            value: index,
            len: bones.len(),
        });
    }

    let grand_parent = bones[index].parent();
    for bone in bones.iter_mut() {
        match bone.parent() {
            Some(p) if p == index => bone.set_parent(grand_parent),
            _ => {}
        }
        if let Some(p) = bone.parent().filter(|&p| p > index) {
            bone.set_parent(Some(p - 1));
        }
    }

    let removed = bones.remove(index);
    refresh_child_counts(bones);
    Ok(removed)
}

/// Map an index through a removal of `removed`; `None` for the removed slot
pub fn shift_after_removal(index: usize, removed: usize) -> Option<usize> {
    match index.cmp(&removed) {
        std::cmp::Ordering::Less => Some(index),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(index - 1),
    }
}

/// Concatenate local matrices down the hierarchy into world matrices
///
/// Parents do not need to precede their children. A parent index outside the
/// array is treated as a root.
pub fn world_matrices<B: SkeletonNode>(bones: &[B], locals: &[Mat4]) -> Vec<Mat4> {
    let count = bones.len().min(locals.len());
    let mut world: Vec<Option<Mat4>> = vec![None; count];
    let mut chain = Vec::new();

    for bone in 0..count {
        chain.clear();
        let mut base = Mat4::IDENTITY;
        let mut current = Some(bone);
        while let Some(index) = current {
            if let Some(resolved) = world[index] {
                base = resolved;
                break;
            }
            if chain.len() > count {
                break;
            }
            chain.push(index);
            current = bones[index].parent().filter(|&p| p < count);
        }
        for &index in chain.iter().rev() {
            base *= locals[index];
            world[index] = Some(base);
        }
    }

    world.into_iter().map(|m| m.unwrap_or(Mat4::IDENTITY)).collect()
}

/// Express world matrices relative to each bone's parent
pub fn local_matrices<B: SkeletonNode>(bones: &[B], world: &[Mat4]) -> Vec<Mat4> {
    bones
        .iter()
        .zip(world)
        .map(|(bone, matrix)| match bone.parent().and_then(|p| world.get(p)) {
            Some(parent) => parent.inverse() * *matrix,
            None => *matrix,
        })
        .collect()
}
