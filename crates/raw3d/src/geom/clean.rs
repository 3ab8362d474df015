//! The mesh cleanup pipeline
//!
//! [`Geom::clean_mesh`] runs a fixed sequence of stages:
//!
//! 1. normalize normals, tangents and binormals
//! 2. sort skin weights from heaviest to lightest
//! 3. weld equivalent vertices
//! 4. drop degenerate facets and the facets of the removed mesh
//! 5. drop vertices no facet references
//! 6. drop duplicate facets, repeating 5 while that frees vertices
//! 7. drop unused material instances and sort their parameters
//! 8. drop unused meshes
//! 9. sort meshes by name
//!
//! Facet planes are recomputed at the end. Running the pipeline on its own
//! output removes nothing.

use super::{Facet, Geom, WeldTolerances, MAX_FACET_VERTICES, MIN_FACET_VERTICES};
use crate::error::{Raw3dError, Result};
use std::collections::HashMap;

/// Facets whose edge cross product is shorter than this are degenerate
pub const DEGENERATE_FACET_LENGTH: f32 = 0.00001;

/// Options for [`Geom::clean_mesh`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CleanOptions {
    /// Remove every facet of this mesh
    pub remove_mesh: Option<usize>,
    pub tolerances: WeldTolerances,
}

impl CleanOptions {
    pub fn removing_mesh(mesh: usize) -> Self {
        Self {
            remove_mesh: Some(mesh),
            ..Self::default()
        }
    }
}

/// What each cleanup stage removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CleanStats {
    pub vertices_welded: usize,
    pub degenerate_facets_removed: usize,
    pub mesh_facets_removed: usize,
    pub unused_vertices_removed: usize,
    pub duplicate_facets_removed: usize,
    pub materials_removed: usize,
    pub meshes_removed: usize,
}

impl CleanStats {
    pub fn total_facets_removed(&self) -> usize {
        self.degenerate_facets_removed + self.mesh_facets_removed + self.duplicate_facets_removed
    }

    pub fn total_vertices_removed(&self) -> usize {
        self.vertices_welded + self.unused_vertices_removed
    }

    /// True when no stage removed anything
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

impl Geom {
    /// Run the full cleanup pipeline
    ///
    /// Stops at the first fatal condition, leaving the stages already run
    /// applied.
    ///
    /// # Errors
    ///
    /// - [`Raw3dError::Sanity`] for a facet with fewer than three or more
    ///   than [`MAX_FACET_VERTICES`] vertices
    /// - [`Raw3dError::ChannelMismatch`] when binormal and tangent counts
    ///   differ or a vertex has fewer normals than binormals
    /// - [`Raw3dError::IndexOutOfRange`] for facet vertex, material or mesh
    ///   indices outside their arrays
    /// - [`Raw3dError::TooManyOutliers`] from the weld
    /// - [`Raw3dError::NoFacets`] / [`Raw3dError::NoVertices`] when a stage
    ///   leaves nothing behind
    pub fn clean_mesh(&mut self, options: &CleanOptions) -> Result<CleanStats> {
        let mut stats = CleanStats::default();

        self.check_facet_vertices()?;
        self.normalize_normals()?;
        for vertex in &mut self.vertices {
            vertex.sort_weights();
        }

        stats.vertices_welded = self.weld_vertices(&options.tolerances)?;
        log::debug!("Welded {} vertices", stats.vertices_welded);

        let (degenerate, removed_mesh) = self.remove_degenerate_facets(options.remove_mesh);
        stats.degenerate_facets_removed = degenerate;
        stats.mesh_facets_removed = removed_mesh;
        log::debug!(
            "Removed {} degenerate facets and {} facets of the removed mesh",
            degenerate,
            removed_mesh
        );
        if self.facets.is_empty() {
            return Err(Raw3dError::NoFacets);
        }

        loop {
            stats.unused_vertices_removed += self.remove_unused_vertices()?;
            let duplicates = self.remove_duplicate_facets();
            stats.duplicate_facets_removed += duplicates;
            if self.facets.is_empty() {
                return Err(Raw3dError::NoFacets);
            }
            if duplicates == 0 {
                break;
            }
        }
        log::debug!(
            "Removed {} unused vertices and {} duplicate facets",
            stats.unused_vertices_removed,
            stats.duplicate_facets_removed
        );

        stats.materials_removed = self.remove_unused_materials()?;
        stats.meshes_removed = self.remove_unused_meshes()?;
        self.sort_meshes_by_name();
        self.update_planes();

        log::info!(
            "Clean mesh: {} facets, {} vertices and {} materials removed",
            stats.total_facets_removed(),
            stats.total_vertices_removed(),
            stats.materials_removed
        );
        Ok(stats)
    }

    fn check_facet_vertices(&self) -> Result<()> {
        let count = self.vertices.len();
        for (i, facet) in self.facets.iter().enumerate() {
            if !(MIN_FACET_VERTICES..=MAX_FACET_VERTICES).contains(&facet.vertex_count) {
                return Err(Raw3dError::Sanity {
                    element: "facet",
                    index: i,
                    reason: format!("has {} vertices", facet.vertex_count),
                });
            }
            if let Some(&bad) = facet.indices().iter().find(|&&v| v >= count) {
                return Err(Raw3dError::IndexOutOfRange {
                    what: "facet vertex",
                    index: i,
                    value: bad,
                    len: count,
                });
            }
        }
        Ok(())
    }

    fn normalize_normals(&mut self) -> Result<()> {
        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            if vertex.binormal_count != vertex.tangent_count
                || vertex.normal_count < vertex.binormal_count
            {
                return Err(Raw3dError::ChannelMismatch {
                    vertex: i,
                    binormals: vertex.binormal_count,
                    tangents: vertex.tangent_count,
                    normals: vertex.normal_count,
                });
            }
            let binormals = vertex.binormal_count;
            let count = vertex.btn_count();
            for (j, btn) in vertex.btns[..count].iter_mut().enumerate() {
                btn.normal = btn.normal.normalize_or_zero();
                if j < binormals {
                    btn.binormal = btn.binormal.normalize_or_zero();
                    btn.tangent = btn.tangent.normalize_or_zero();
                }
            }
        }
        Ok(())
    }

    /// Returns the degenerate and removed-mesh facet counts
    fn remove_degenerate_facets(&mut self, remove_mesh: Option<usize>) -> (usize, usize) {
        let vertices = &self.vertices;
        let mut degenerate = 0;
        let mut removed_mesh = 0;
        self.facets.retain(|facet| {
            if remove_mesh == Some(facet.mesh) {
                removed_mesh += 1;
                return false;
            }
            let p = |i: usize| vertices[facet.vertices[i]].position;
            let normal = (p(1) - p(0)).cross(p(2) - p(0));
            if normal.length() < DEGENERATE_FACET_LENGTH {
                degenerate += 1;
                return false;
            }
            true
        });
        (degenerate, removed_mesh)
    }

    fn remove_unused_vertices(&mut self) -> Result<usize> {
        if self.vertices.is_empty() {
            return Err(Raw3dError::NoVertices);
        }
        let mut used = vec![false; self.vertices.len()];
        for facet in &self.facets {
            for &index in facet.indices() {
                used[index] = true;
            }
        }

        let remap = compact_remap(&used);
        let removed = used.iter().filter(|&&is_used| !is_used).count();
        if removed == 0 {
            return Ok(0);
        }

        let mut flags = used.into_iter();
        self.vertices.retain(|_| flags.next().unwrap_or(false));
        for facet in &mut self.facets {
            for index in facet.indices_mut() {
                *index = remap[*index];
            }
        }
        if self.vertices.is_empty() {
            return Err(Raw3dError::NoVertices);
        }
        Ok(removed)
    }

    /// Drop later facets with the same mesh, material and cyclic vertex order
    fn remove_duplicate_facets(&mut self) -> usize {
        let mut seen: HashMap<FacetKey, usize> = HashMap::with_capacity(self.facets.len());
        let before = self.facets.len();
        let mut position = 0;
        self.facets.retain(|facet| {
            let first = *seen.entry(FacetKey::of(facet)).or_insert(position);
            position += 1;
            first == position - 1
        });
        before - self.facets.len()
    }

    fn remove_unused_materials(&mut self) -> Result<usize> {
        if self.materials.is_empty() {
            return Ok(0);
        }
        let count = self.materials.len();
        let mut used = vec![false; count];
        for (i, facet) in self.facets.iter().enumerate() {
            *used.get_mut(facet.material).ok_or(Raw3dError::IndexOutOfRange {
                what: "facet material",
                index: i,
                value: facet.material,
                len: count,
            })? = true;
        }

        let remap = compact_remap(&used);
        let mut flags = used.iter();
        self.materials.retain(|_| flags.next().copied().unwrap_or(false));
        for facet in &mut self.facets {
            facet.material = remap[facet.material];
        }
        for material in &mut self.materials {
            material.sort_params();
        }
        Ok(count - self.materials.len())
    }

    fn remove_unused_meshes(&mut self) -> Result<usize> {
        let count = self.meshes.len();
        let mut used = vec![false; count];
        for (i, facet) in self.facets.iter().enumerate() {
            *used.get_mut(facet.mesh).ok_or(Raw3dError::IndexOutOfRange {
                what: "facet mesh",
                index: i,
                value: facet.mesh,
                len: count,
            })? = true;
        }

        let remap = compact_remap(&used);
        let mut flags = used.iter();
        self.meshes.retain(|_| flags.next().copied().unwrap_or(false));
        for facet in &mut self.facets {
            facet.mesh = remap[facet.mesh];
        }
        Ok(count - self.meshes.len())
    }

    /// Stable byte-order sort of the meshes, remapping facets to match
    fn sort_meshes_by_name(&mut self) {
        let mut order: Vec<usize> = (0..self.meshes.len()).collect();
        order.sort_by(|&a, &b| self.meshes[a].name.cmp(&self.meshes[b].name));

        let mut remap = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }
        let mut old = std::mem::take(&mut self.meshes);
        self.meshes = order.iter().map(|&i| std::mem::take(&mut old[i])).collect();
        for facet in &mut self.facets {
            facet.mesh = remap[facet.mesh];
        }
    }
}

/// Old index to compacted index for the kept entries
fn compact_remap(used: &[bool]) -> Vec<usize> {
    let mut next = 0;
    used.iter()
        .map(|&is_used| {
            let index = next;
            if is_used {
                next += 1;
            }
            index
        })
        .collect()
}

/// Rotation independent identity of a facet
#[derive(Debug, PartialEq, Eq, Hash)]
struct FacetKey {
    mesh: usize,
    material: usize,
    count: usize,
    vertices: [usize; MAX_FACET_VERTICES],
}

impl FacetKey {
    /// Uses the lexicographically smallest rotation of the vertex loop
    fn of(facet: &Facet) -> Self {
        let indices = facet.indices();
        let n = indices.len();
        let rotated = |start: usize| {
            let mut out = [usize::MAX; MAX_FACET_VERTICES];
            for (i, slot) in out.iter_mut().take(n).enumerate() {
                *slot = indices[(start + i) % n];
            }
            out
        };
        let vertices = (0..n).map(rotated).min().unwrap_or([usize::MAX; MAX_FACET_VERTICES]);
        Self {
            mesh: facet.mesh,
            material: facet.material,
            count: n,
            vertices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::tests::create_test_quad;
    use crate::geom::{Mesh, Vertex};
    use crate::material::MaterialInstance;
    use glam::Vec3;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicate_facet_removed_once() {
        let mut geom = create_test_quad();
        geom.facets.push(Facet::triangle(0, 0, [2, 1, 0]));

        let stats = geom.clean_mesh(&CleanOptions::default()).unwrap();

        assert_eq!(stats.duplicate_facets_removed, 1);
        assert_eq!(stats.total_facets_removed(), 1);
        assert_eq!(geom.facets.len(), 2);
    }

    #[test]
    fn test_reversed_facet_is_not_a_duplicate() {
        let mut geom = create_test_quad();
        geom.facets.push(Facet::triangle(0, 0, [0, 1, 2]));

        let stats = geom.clean_mesh(&CleanOptions::default()).unwrap();
        assert_eq!(stats.duplicate_facets_removed, 0);
        assert_eq!(geom.facets.len(), 3);
    }

    #[test]
    fn test_facet_key_ignores_rotation() {
        let a = Facet::polygon(0, 0, &[4, 1, 7, 2]).unwrap();
        let b = Facet::polygon(0, 0, &[7, 2, 4, 1]).unwrap();
        let c = Facet::polygon(0, 1, &[7, 2, 4, 1]).unwrap();
        assert_eq!(FacetKey::of(&a), FacetKey::of(&b));
        assert!(FacetKey::of(&a) != FacetKey::of(&c));
    }

    #[test]
    fn test_degenerate_facets_and_orphans() {
        let mut geom = create_test_quad();
        geom.vertices.push(Vertex::at(Vec3::new(2.0, 0.0, 0.0)));
        geom.vertices.push(Vertex::at(Vec3::new(3.0, 0.0, 0.0)));
        geom.vertices.push(Vertex::at(Vec3::new(9.0, 9.0, 9.0)));
        // Collinear
        geom.facets.push(Facet::triangle(0, 0, [1, 4, 5]));

        let stats = geom.clean_mesh(&CleanOptions::default()).unwrap();

        assert_eq!(stats.degenerate_facets_removed, 1);
        assert_eq!(stats.unused_vertices_removed, 3);
        assert_eq!(geom.vertices.len(), 4);
    }

    #[test]
    fn test_removed_mesh_and_unused_resources() {
        let mut geom = create_test_quad();
        geom.meshes.insert(0, Mesh::new("zeta"));
        geom.meshes.push(Mesh::new("alpha"));
        geom.materials.push(MaterialInstance::new("unused"));
        geom.materials.push(MaterialInstance::new("second"));
        for facet in &mut geom.facets {
            facet.mesh = 1;
        }
        geom.facets[1].material = 2;
        geom.facets.push(Facet::triangle(2, 0, [1, 2, 3]));
        geom.facets.push(Facet::triangle(0, 0, [3, 2, 1]));

        let stats = geom.clean_mesh(&CleanOptions::removing_mesh(0)).unwrap();

        assert_eq!(stats.mesh_facets_removed, 1);
        assert_eq!(stats.materials_removed, 1);
        assert_eq!(stats.meshes_removed, 1);
        let names: Vec<_> = geom.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "quad"]);
        assert_eq!(geom.facets[0].mesh, 1);
        assert_eq!(geom.facets[2].mesh, 0);
        assert_eq!(geom.facets[1].material, 1);
        assert_eq!(geom.materials[1].name, "second");
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let mut geom = create_test_quad();
        let copy = geom.vertices[0].clone();
        geom.vertices.push(copy);
        geom.facets.push(Facet::triangle(0, 0, [4, 2, 1]));

        let first = geom.clean_mesh(&CleanOptions::default()).unwrap();
        assert!(!first.is_unchanged());
        let cleaned = geom.clone();

        let second = geom.clean_mesh(&CleanOptions::default()).unwrap();
        assert!(second.is_unchanged(), "{:?}", second);
        assert_eq!(geom, cleaned);
    }

    #[test]
    fn test_fatal_conditions() {
        let mut geom = create_test_quad();
        geom.vertices[1].tangent_count = 1;
        assert!(matches!(
            geom.clean_mesh(&CleanOptions::default()),
            Err(Raw3dError::ChannelMismatch { vertex: 1, .. })
        ));

        let mut geom = create_test_quad();
        assert_eq!(
            geom.clean_mesh(&CleanOptions::removing_mesh(0)),
            Err(Raw3dError::NoFacets)
        );

        let mut geom = create_test_quad();
        geom.facets[0].material = 5;
        assert!(matches!(
            geom.clean_mesh(&CleanOptions::default()),
            Err(Raw3dError::IndexOutOfRange { what: "facet material", .. })
        ));

        let mut geom = create_test_quad();
        geom.facets[0].vertices[1] = 40;
        assert!(matches!(
            geom.clean_mesh(&CleanOptions::default()),
            Err(Raw3dError::IndexOutOfRange { what: "facet vertex", .. })
        ));
    }

    #[test]
    fn test_facet_vertex_count_out_of_range() {
        let mut geom = create_test_quad();
        geom.facets[1].vertex_count = 2;
        geom.facets[1].vertices[2] = 99;
        let before = geom.clone();

        assert!(matches!(
            geom.clean_mesh(&CleanOptions::default()),
            Err(Raw3dError::Sanity { element: "facet", index: 1, .. })
        ));
        assert_eq!(geom, before);

        let mut geom = create_test_quad();
        geom.facets[0].vertex_count = MAX_FACET_VERTICES + 1;
        assert!(matches!(
            geom.clean_mesh(&CleanOptions::default()),
            Err(Raw3dError::Sanity { element: "facet", index: 0, .. })
        ));
    }
}
