//! Shared helpers for the integration tests

mod anim;
mod geom;
mod records;

use glam::{Mat4, Quat, Vec2, Vec3};
use raw3d::anim::{Anim, AnimBone};
use raw3d::geom::{Facet, Geom, GeomBone, Mesh, Vertex};
use raw3d::hierarchy;
use raw3d::material::MaterialInstance;
use raw3d::math::Transform3;

/// Route library logs through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A chain of `count` bones, each one unit along +X from its parent
///
/// Keys rotate every bone a little more each frame so world poses depend
/// on the whole parent chain.
pub fn bone_chain(count: usize, frames: usize) -> Anim {
    let bones = (0..count)
        .map(|i| {
            AnimBone::new(
                format!("Bone{i}"),
                i.checked_sub(1),
                Transform3::new(Vec3::ONE, Quat::IDENTITY, Vec3::X),
            )
        })
        .collect();
    let mut anim = Anim::with_skeleton("chain", bones, frames);
    for frame in 0..frames {
        for bone in 0..count {
            let key = anim.key_mut(frame, bone);
            key.rotation = Quat::from_rotation_z(0.1 * (frame + bone) as f32);
            key.translation = Vec3::new(1.0, 0.1 * bone as f32, 0.0);
        }
    }
    anim
}

/// Forward kinematics of one frame, without the bind pose
pub fn world_matrices(anim: &Anim, frame: usize) -> Vec<Mat4> {
    let locals: Vec<Mat4> = anim
        .frame_keys(frame)
        .iter()
        .map(Transform3::to_matrix)
        .collect();
    hierarchy::world_matrices(&anim.bones, &locals)
}

pub fn assert_grid(anim: &Anim) {
    assert_eq!(anim.keys.len(), anim.frame_count * anim.bone_count());
}

/// A vertex fully skinned to `bone`, facing up, with its XZ position as uv
pub fn skinned_vertex(position: Vec3, bone: usize) -> Vertex {
    let mut vertex = Vertex::at(position);
    vertex.push_weight(bone, 1.0).unwrap();
    vertex.push_normal(Vec3::Y).unwrap();
    vertex.push_uv(Vec2::new(position.x, position.z)).unwrap();
    vertex
}

/// A `size` by `size` grid of quads where every triangle owns its vertices
pub fn triangle_soup(size: usize) -> Geom {
    let mut geom = Geom {
        bones: vec![
            GeomBone::new("Root", None, Transform3::IDENTITY),
            GeomBone::new("Hip", Some(0), Transform3::IDENTITY),
        ],
        meshes: vec![Mesh::new("ground")],
        materials: vec![MaterialInstance::new("dirt")],
        ..Geom::default()
    };
    for x in 0..size {
        for z in 0..size {
            let corner = |dx: usize, dz: usize| Vec3::new((x + dx) as f32, 0.0, (z + dz) as f32);
            let bone = usize::from(x >= size / 2);
            for triangle in [
                [corner(0, 0), corner(1, 1), corner(1, 0)],
                [corner(0, 0), corner(0, 1), corner(1, 1)],
            ] {
                let base = geom.vertices.len();
                for position in triangle {
                    geom.vertices.push(skinned_vertex(position, bone));
                }
                geom.facets.push(Facet::triangle(0, 0, [base, base + 1, base + 2]));
            }
        }
    }
    geom
}
