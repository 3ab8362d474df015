//! Smaller whole-geometry operations

use super::{Btn, Geom, Mesh, Vertex, MAX_NORMALS, WHITE};
use crate::hierarchy;
use crate::math::BBox;
use crate::parallel;
use std::f32::consts::PI;

/// Normals further apart than this are not averaged by [`Geom::collapse_normals`]
pub const DEFAULT_NORMAL_COLLAPSE_ANGLE: f32 = 20.0 * PI / 180.0;

/// Vertices closer than this share a position for normal collapsing
const SHARED_POSITION_DISTANCE: f32 = 0.001;

impl Geom {
    /// Give every vertex without colors a single white color
    ///
    /// Returns the number of vertices changed.
    pub fn force_add_color_if_none(&mut self) -> usize {
        let mut added = 0;
        for vertex in self.vertices.iter_mut().filter(|v| v.color_count == 0) {
            vertex.colors[0] = WHITE;
            vertex.color_count = 1;
            added += 1;
        }
        added
    }

    /// Move every facet into one mesh called `name`
    ///
    /// The new mesh keeps the largest bone count of the old ones.
    pub fn collapse_meshes(&mut self, name: &str) {
        let bone_count = self.meshes.iter().map(|m| m.bone_count).max().unwrap_or(0);
        for facet in &mut self.facets {
            facet.mesh = 0;
        }
        let mut mesh = Mesh::new(name);
        mesh.bone_count = bone_count;
        self.meshes = vec![mesh];
    }

    /// Average the normals of vertices sharing a position
    ///
    /// Normal set `k` of a vertex is replaced by the normalized sum of the
    /// set `k` normals of every vertex at the same position whose direction
    /// is within `threshold` radians. Sums use the normals as they were
    /// before the call. Returns the number of vertices whose normals changed.
    pub fn collapse_normals(&mut self, threshold: f32) -> usize {
        let min_dot = threshold.cos();
        let vertices = &self.vertices;

        let mut order: Vec<usize> = (0..vertices.len()).collect();
        order.sort_by(|&a, &b| vertices[a].position.x.total_cmp(&vertices[b].position.x));
        let mut rank = vec![0; order.len()];
        for (r, &i) in order.iter().enumerate() {
            rank[i] = r;
        }

        let collapsed: Vec<Option<[Btn; MAX_NORMALS]>> =
            parallel::map_indexed(vertices.len(), |i| {
                let vertex = &vertices[i];
                let count = vertex.normal_count.min(MAX_NORMALS);
                if count == 0 {
                    return None;
                }
                let mut sums: Vec<_> = vertex.btns[..count].iter().map(|b| b.normal).collect();
                let neighbours = shared_position_window(vertices, &order, rank[i]);
                for &j in neighbours.iter().filter(|&&j| j != i) {
                    let other = &vertices[j];
                    if other.position.distance(vertex.position) > SHARED_POSITION_DISTANCE {
                        continue;
                    }
                    let shared = count.min(other.normal_count);
                    for (k, sum) in sums.iter_mut().enumerate().take(shared) {
                        let normal = other.btns[k].normal;
                        if vertex.btns[k].normal.dot(normal) >= min_dot {
                            *sum += normal;
                        }
                    }
                }

                let mut btns = vertex.btns;
                for (btn, sum) in btns.iter_mut().zip(sums) {
                    btn.normal = sum.normalize_or_zero();
                }
                (btns != vertex.btns).then_some(btns)
            });

        let mut changed = 0;
        for (vertex, btns) in self.vertices.iter_mut().zip(collapsed) {
            if let Some(btns) = btns {
                vertex.btns = btns;
                changed += 1;
            }
        }
        log::debug!("Collapsed normals on {} vertices", changed);
        changed
    }

    /// Bounds of every vertex
    pub fn bbox(&self) -> BBox {
        let mut bbox = BBox::EMPTY;
        for vertex in &self.vertices {
            bbox.add_point(vertex.position);
        }
        bbox
    }

    /// Bounds of the vertices used by one mesh's facets
    pub fn mesh_bbox(&self, mesh: usize) -> BBox {
        let mut bbox = BBox::EMPTY;
        for facet in self.mesh_facets(mesh) {
            for vertex in facet.indices().iter().filter_map(|&v| self.vertices.get(v)) {
                bbox.add_point(vertex.position);
            }
        }
        bbox
    }

    /// Whether any vertex weight references `bone`
    pub fn is_bone_used(&self, bone: usize) -> bool {
        self.vertices
            .iter()
            .any(|v| v.weights().iter().any(|w| w.bone == bone))
    }

    /// Index of a bone by name, ignoring ASCII case
    pub fn bone_index_by_name(&self, name: &str) -> Option<usize> {
        hierarchy::find_bone(&self.bones, name)
    }

    /// Index of a mesh by name, ignoring ASCII case
    pub fn mesh_index_by_name(&self, name: &str) -> Option<usize> {
        raw3d_utils::text::position_by_name(self.meshes.iter().map(|m| m.name.as_str()), name)
    }

    /// Stable sort of the facets by mesh, then material
    pub fn sort_facets_by_material(&mut self) {
        self.facets.sort_by_key(|f| (f.mesh, f.material));
    }

    /// Stable sort of the facets by mesh, material, then the primary bone of
    /// their first vertex
    pub fn sort_facets_by_mesh_material_bone(&mut self) {
        let vertices = &self.vertices;
        self.facets.sort_by_key(|f| {
            let bone = f
                .indices()
                .first()
                .and_then(|&v| vertices.get(v))
                .and_then(Vertex::primary_bone)
                .unwrap_or(0);
            (f.mesh, f.material, bone)
        });
    }
}

/// Vertices whose X lies within the shared distance of the vertex at `rank`
fn shared_position_window(vertices: &[Vertex], order: &[usize], rank: usize) -> Vec<usize> {
    let x = vertices[order[rank]].position.x;
    let near = |r: &usize| (vertices[order[*r]].position.x - x).abs() <= SHARED_POSITION_DISTANCE;
    let before = (0..rank).rev().take_while(near);
    let after = (rank + 1..order.len()).take_while(near);
    before.chain(after).map(|r| order[r]).collect()
}
