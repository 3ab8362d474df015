//! Integration tests for the mesh cleanup pipeline and skeleton rebinding

use super::{init_logging, skinned_vertex, triangle_soup};
use glam::{Vec2, Vec3};
use pretty_assertions::assert_eq;
use raw3d::anim::{Anim, AnimBone};
use raw3d::geom::{CleanOptions, Facet, Geom, GeomBone, Mesh, Vertex, WeldTolerances};
use raw3d::material::MaterialInstance;
use raw3d::math::Transform3;
use raw3d::Raw3dError;

#[test]
fn test_perfect_duplicate_facet_removed() {
    init_logging();
    let mut geom = Geom {
        meshes: vec![Mesh::new("tri")],
        materials: vec![MaterialInstance::new("flat")],
        ..Geom::default()
    };
    geom.bones.push(GeomBone::new("Root", None, Transform3::IDENTITY));
    for position in [Vec3::ZERO, Vec3::Z, Vec3::X] {
        geom.vertices.push(skinned_vertex(position, 0));
    }
    geom.facets.push(Facet::triangle(0, 0, [0, 1, 2]));
    geom.facets.push(Facet::triangle(0, 0, [1, 2, 0]));

    let stats = geom.clean_mesh(&CleanOptions::default()).unwrap();

    assert_eq!(stats.total_facets_removed(), 1);
    assert_eq!(stats.duplicate_facets_removed, 1);
    assert_eq!(geom.facets.len(), 1);
}

#[test]
fn test_soup_welds_to_shared_grid() {
    let mut geom = triangle_soup(4);
    assert_eq!(geom.vertices.len(), 96);

    let stats = geom.clean_mesh(&CleanOptions::default()).unwrap();

    // Columns of vertices on the bone seam stay split
    assert_eq!(geom.vertices.len(), 25 + 5);
    assert_eq!(stats.vertices_welded, 96 - 30);
    assert_eq!(geom.facets.len(), 32);
    for facet in &geom.facets {
        assert!(facet.indices().iter().all(|&v| v < geom.vertices.len()));
        assert!(facet.plane.normal.abs_diff_eq(Vec3::Y, 1e-6));
    }
    geom.sanity_check().unwrap();
}

#[test]
fn test_clean_mesh_twice_changes_nothing() {
    let mut geom = triangle_soup(3);
    geom.facets.push(Facet::triangle(0, 0, [1, 2, 0]));
    geom.vertices.push(Vertex::at(Vec3::splat(50.0)));

    let first = geom.clean_mesh(&CleanOptions::default()).unwrap();
    assert!(!first.is_unchanged());
    let cleaned = geom.clone();

    let second = geom.clean_mesh(&CleanOptions::default()).unwrap();
    assert!(second.is_unchanged(), "{:?}", second);
    assert_eq!(geom, cleaned);
}

#[test]
fn test_weld_respects_channels_and_tolerance() {
    let mut geom = triangle_soup(1);
    // Shift one copy of the shared corner, well within the default tolerance
    geom.vertices[3].position += Vec3::splat(0.0004);
    // Give another copy a different uv
    geom.vertices[5].uvs[0] = Vec2::new(9.0, 9.0);

    let stats = geom.clean_mesh(&CleanOptions::default()).unwrap();

    // Corner (0,0) welds, corner (1,1) stays split by its uv
    assert_eq!(stats.vertices_welded, 1);
    assert_eq!(geom.vertices.len(), 5);
    let shared: Vec<_> = geom.facets.iter().map(|f| f.vertices[0]).collect();
    assert_eq!(shared[0], shared[1]);

    let mut strict = triangle_soup(1);
    strict.vertices[3].position += Vec3::splat(0.0004);
    let options = CleanOptions {
        tolerances: WeldTolerances {
            position: 1.0e-7,
            ..WeldTolerances::default()
        },
        ..CleanOptions::default()
    };
    let stats = strict.clean_mesh(&options).unwrap();
    assert_eq!(stats.vertices_welded, 0);
    assert_eq!(strict.vertices.len(), 6);
}

#[test]
fn test_clean_weights_normalizes() {
    let mut geom = triangle_soup(1);
    for (i, vertex) in geom.vertices.iter_mut().enumerate() {
        vertex.weights[0].weight = 0.2;
        vertex.push_weight(1, 0.6).unwrap();
        vertex.push_weight(0, 0.01 * i as f32).unwrap();
    }

    geom.clean_weights(2, 0.05);

    for vertex in &geom.vertices {
        let total: f32 = vertex.weights().iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(vertex.weights().windows(2).all(|w| w[0].weight >= w[1].weight));
        assert_eq!(vertex.primary_bone(), Some(1));
        assert!(vertex.weight_count <= 2);
    }
}

#[test]
fn test_isolate_and_rebind() {
    init_logging();
    let mut geom = triangle_soup(2);
    geom.meshes.push(Mesh::new("rock"));
    for facet in geom.facets.iter_mut().skip(6) {
        facet.mesh = 1;
    }
    geom.clean_mesh(&CleanOptions::default()).unwrap();

    let rock = geom.isolate_mesh_by_name("Rock").unwrap().unwrap();
    assert_eq!(rock.facets.len(), 2);
    assert_eq!(rock.meshes.len(), 1);

    let bind = Anim::with_skeleton(
        "bind",
        vec![
            AnimBone::new("Root", None, Transform3::IDENTITY),
            AnimBone::new("Spine", Some(0), Transform3::IDENTITY),
        ],
        1,
    );
    let fallbacks = geom.apply_new_skeleton_from_anim(&bind).unwrap();
    assert_eq!(fallbacks, 0);
    assert!(!geom.is_bone_used(1));
    assert_eq!(geom.bones[1].name, "Spine");
    assert!(geom.meshes.iter().all(|m| m.bone_count == 1));
}

#[test]
fn test_fatal_cleanup_conditions() {
    let mut geom = triangle_soup(1);
    geom.facets[0].mesh = 3;
    assert!(matches!(
        geom.clean_mesh(&CleanOptions::default()),
        Err(Raw3dError::IndexOutOfRange { what: "facet mesh", .. })
    ));

    let mut far = triangle_soup(1);
    for i in 0..5001 {
        far.vertices.push(Vertex::at(Vec3::new(1.0e6 + i as f32, 0.0, 0.0)));
    }
    assert_eq!(
        far.clean_mesh(&CleanOptions::default()),
        Err(Raw3dError::TooManyOutliers(5001))
    );
}
