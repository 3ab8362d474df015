//! Integration tests for skeleton edits and animation frame operations

use super::{assert_grid, bone_chain, init_logging, world_matrices};
use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;
use raw3d::anim::{lod_group_of, Anim, AnimBone, LodGroup, RecenterAxes};
use raw3d::math::Transform3;
use raw3d::Raw3dError;

fn named_skeleton(bones: &[(&str, Option<usize>)], frames: usize) -> Anim {
    let bones = bones
        .iter()
        .map(|&(name, parent)| AnimBone::new(name, parent, Transform3::IDENTITY))
        .collect();
    let mut anim = Anim::with_skeleton("named", bones, frames);
    // Tag every key with its bone and frame
    for frame in 0..frames {
        for bone in 0..anim.bone_count() {
            anim.key_mut(frame, bone).translation = Vec3::new(bone as f32, frame as f32, 0.0);
        }
    }
    anim
}

#[test]
fn test_lod_tagged_grandchild_sorts_last() {
    init_logging();
    let mut anim = named_skeleton(
        &[
            ("Root", None),
            ("Child", Some(0)),
            ("Spine_LOD[2]", Some(1)),
            ("Arm", Some(1)),
        ],
        3,
    );

    anim.put_bones_in_lod_order().unwrap();

    let names: Vec<_> = anim.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["Root", "Child", "Arm", "Spine_LOD[2]"]);

    let spine = anim.bone_index_by_name("spine_lod[2]").unwrap();
    let parent = anim.bones[spine].parent.unwrap();
    assert!(parent < spine);
    assert_eq!(lod_group_of(spine, &anim.bones[spine].name, false).unwrap(), LodGroup::Level(2));

    // Key columns follow their bones
    assert_eq!(anim.key(2, spine).translation, Vec3::new(2.0, 2.0, 0.0));
    assert_eq!(anim.key(1, 2).translation, Vec3::new(3.0, 1.0, 0.0));
    for (i, bone) in anim.bones.iter().enumerate() {
        assert!(bone.parent.is_none_or(|p| p < i));
    }
    assert_grid(&anim);
}

#[test]
fn test_delete_leaf_keeps_surviving_keys() {
    let mut anim = bone_chain(4, 3);
    let before = anim.clone();

    anim.delete_bone(3).unwrap();

    assert_eq!(anim.bone_count(), 3);
    assert_grid(&anim);
    for frame in 0..3 {
        assert_eq!(anim.frame_keys(frame), &before.frame_keys(frame)[..3]);
    }
}

#[test]
fn test_delete_inner_bone_keeps_world_pose() {
    let mut anim = bone_chain(4, 3);
    let before: Vec<_> = (0..3).map(|f| world_matrices(&anim, f)).collect();

    anim.delete_bone(1).unwrap();

    assert_eq!(anim.bones[1].name, "Bone2");
    assert_eq!(anim.bones[1].parent, Some(0));
    assert_grid(&anim);
    for (frame, old) in before.iter().enumerate() {
        let new = world_matrices(&anim, frame);
        for (new_bone, old_bone) in [(0, 0), (1, 2), (2, 3)] {
            assert!(
                new[new_bone].abs_diff_eq(old[old_bone], 1e-4),
                "bone {} moved at frame {}",
                old_bone,
                frame
            );
        }
    }
}

#[test]
fn test_new_root_keeps_descendant_positions() {
    let mut anim = bone_chain(5, 2);
    let before: Vec<_> = (0..2).map(|f| world_matrices(&anim, f)).collect();

    anim.set_new_root(2).unwrap();

    assert_eq!(anim.bone_count(), 3);
    assert_eq!(anim.bones[0].name, "Bone2");
    assert_eq!(anim.bones[0].parent, None);
    assert_eq!(anim.bones[1].parent, Some(0));
    assert_eq!(anim.bones[2].parent, Some(1));
    assert_grid(&anim);
    for (frame, old) in before.iter().enumerate() {
        let new = world_matrices(&anim, frame);
        for (new_bone, old_bone) in [(1, 3), (2, 4)] {
            let moved = new[new_bone].w_axis.truncate();
            let original = old[old_bone].w_axis.truncate();
            assert!(moved.abs_diff_eq(original, 1e-4), "{} != {}", moved, original);
        }
    }
}

#[test]
fn test_new_root_rejects_dangling_branch() {
    let mut anim = named_skeleton(&[("Root", None), ("A", Some(0)), ("B", Some(0))], 1);
    assert!(matches!(
        anim.set_new_root(1),
        Err(Raw3dError::DanglingParent { bone: 2, .. })
    ));
    assert_eq!(anim.bone_count(), 3);
}

#[test]
fn test_retarget_reports_completeness() {
    init_logging();
    let source = named_skeleton(&[("Root", None), ("Spine", Some(0)), ("Arm", Some(1))], 4);

    let mut matching = source.clone();
    let bind = named_skeleton(&[("root", None), ("spine", Some(0))], 1);
    assert!(matching.apply_new_skeleton(&bind).unwrap());
    assert_eq!(matching.bone_count(), 2);
    assert_eq!(matching.key(3, 1).translation, Vec3::new(1.0, 3.0, 0.0));

    let mut partial = source;
    let mut bind = named_skeleton(&[("Root", None), ("Spine", Some(0)), ("Head", Some(1))], 1);
    let head_rotation = Quat::from_rotation_x(0.5);
    bind.bones[2].set_bind(Transform3::new(Vec3::splat(2.0), head_rotation, Vec3::Y));
    assert!(!partial.apply_new_skeleton(&bind).unwrap());

    assert_eq!(partial.bone_count(), 3);
    assert_grid(&partial);
    for frame in 0..4 {
        let head = partial.key(frame, 2);
        assert_eq!(head.translation, Vec3::ZERO);
        assert_eq!(head.scale, Vec3::splat(2.0));
        assert_eq!(head.rotation, head_rotation);
    }
}

#[test]
fn test_retarget_without_root_fails() {
    let mut anim = named_skeleton(&[("Root", None), ("Spine", Some(0))], 2);
    let bind = named_skeleton(&[("Pelvis", None)], 1);
    assert_eq!(
        anim.apply_new_skeleton(&bind),
        Err(Raw3dError::RootNotFound("Pelvis".to_string()))
    );
}

#[test]
fn test_frame_editing_keeps_grid() {
    let mut anim = named_skeleton(&[("Root", None), ("Spine", Some(0))], 6);

    let copied = anim.copy_frames(1, 2).unwrap();
    assert_eq!(copied.len(), 4);

    anim.insert_frames(0, &copied).unwrap();
    assert_eq!(anim.frame_count, 8);
    assert_grid(&anim);
    assert_eq!(anim.key(0, 1).translation, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(anim.key(2, 1).translation, Vec3::new(1.0, 0.0, 0.0));

    anim.remove_frames_outside(2, 5).unwrap();
    assert_eq!(anim.frame_count, 3);
    assert_grid(&anim);
    assert_eq!(anim.key(0, 0).translation, Vec3::new(0.0, 0.0, 0.0));

    assert!(matches!(
        anim.insert_frames(0, &copied[..3]),
        Err(Raw3dError::PartialFrame { keys: 3, bones: 2 })
    ));
    assert!(anim.copy_frames(2, 5).is_err());
}

#[test]
fn test_clean_up_removes_dummies_in_lod_order() {
    let mut anim = named_skeleton(
        &[
            ("Root", None),
            ("Hand_LOD[1]", Some(0)),
            ("Dummy01", Some(0)),
            ("Finger", Some(1)),
        ],
        2,
    );

    anim.clean_up().unwrap();

    let names: Vec<_> = anim.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["Root", "Hand_LOD[1]", "Finger"]);
    assert_grid(&anim);
    anim.sanity_check().unwrap();
}

#[test]
fn test_recenter_translation_axes() {
    let mut anim = named_skeleton(&[("Root", None)], 3);
    for frame in 0..3 {
        anim.key_mut(frame, 0).translation = Vec3::new(5.0 + frame as f32, 1.0, 2.0);
    }

    anim.recenter(RecenterAxes::TX | RecenterAxes::TZ).unwrap();

    // The first frame lands one step of drift from the origin
    assert!(anim.key(0, 0).translation.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
    assert!(anim.key(2, 0).translation.abs_diff_eq(Vec3::new(3.0, 1.0, 0.0), 1e-5));
}

#[test]
fn test_sampling_interpolates_between_frames() {
    let anim = named_skeleton(&[("Root", None), ("Spine", Some(0))], 3);

    let keys = anim.compute_bone_keys(0.5);
    assert_eq!(keys.len(), 2);
    assert!(keys[1].translation.abs_diff_eq(Vec3::new(1.0, 0.5, 0.0), 1e-6));

    let matrices = anim.compute_bones_l2w(0.5);
    assert_eq!(matrices.len(), 2);
    assert!(anim.compute_raw_bone_l2w(1, 9).is_err());
}

#[test]
fn test_loop_cleanup_skips_short_animation() {
    let mut anim = bone_chain(2, 3);
    let before = anim.clone();
    assert!(!anim.clean_looping_anim().unwrap());
    assert_eq!(anim, before);
}
