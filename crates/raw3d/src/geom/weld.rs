//! Spatial vertex welding
//!
//! Vertices are bucketed into a square grid over their X/Z footprint. Each
//! surviving vertex is compared with the later vertices of its own and the
//! surrounding cells, and every match is remapped onto it. The grid radius is
//! derived from the position tolerance so two vertices close enough to match
//! always land in neighbouring cells.
//!
//! Candidate matches only read the vertex array, so they are computed through
//! [`crate::parallel::map_indexed`] and then applied in index order. The
//! result does not depend on the `parallel` feature.

use super::{Geom, Vertex};
use crate::error::{Raw3dError, Result};
use crate::parallel;
use glam::Vec4;

/// Coordinates further than this from the running X/Z bounds are outliers
pub const OUTLIER_DISTANCE: f32 = 10_000.0;
/// More outliers than this make the geometry unusable
pub const MAX_OUTLIERS: usize = 5000;
/// Smallest grid dimension
pub const MIN_GRID_DIMENSION: usize = 20;

/// Per-channel squared distance limits for two vertices to be welded
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct WeldTolerances {
    pub position: f32,
    /// Limit on the difference of squared weights
    pub weight: f32,
    pub normal: f32,
    pub uv: f32,
    /// Squared distance between colors on the 0-255 scale
    pub color: f32,
}

impl Default for WeldTolerances {
    fn default() -> Self {
        Self {
            position: 0.001,
            weight: 0.001,
            normal: 0.001,
            uv: 0.001,
            color: 3.0,
        }
    }
}

impl WeldTolerances {
    /// Whether two vertices are interchangeable
    ///
    /// Channel counts must agree exactly, weights must reference the same
    /// bones in the same order, and every channel must be within tolerance.
    pub fn vertices_match(&self, a: &Vertex, b: &Vertex) -> bool {
        if a.position.distance_squared(b.position) > self.position {
            return false;
        }

        if a.weight_count != b.weight_count {
            return false;
        }
        for (wa, wb) in a.weights().iter().zip(b.weights()) {
            if wa.bone != wb.bone {
                return false;
            }
            if (wa.weight * wa.weight - wb.weight * wb.weight).abs() > self.weight {
                return false;
            }
        }

        if a.normal_count != b.normal_count
            || a.tangent_count != b.tangent_count
            || a.binormal_count != b.binormal_count
        {
            return false;
        }
        let btns = a.btns.iter().zip(&b.btns);
        for (i, (ba, bb)) in btns.enumerate().take(a.btn_count()) {
            if i < a.normal_count && ba.normal.distance_squared(bb.normal) > self.normal {
                return false;
            }
            if i < a.tangent_count && ba.tangent.distance_squared(bb.tangent) > self.normal {
                return false;
            }
            if i < a.binormal_count && ba.binormal.distance_squared(bb.binormal) > self.normal {
                return false;
            }
        }

        if a.uv_count != b.uv_count {
            return false;
        }
        if a
            .uvs()
            .iter()
            .zip(b.uvs())
            .any(|(ua, ub)| ua.distance_squared(*ub) > self.uv)
        {
            return false;
        }

        if a.color_count != b.color_count {
            return false;
        }
        !a.colors().iter().zip(b.colors()).any(|(ca, cb)| {
            let ca = Vec4::from_array(ca.map(f32::from));
            let cb = Vec4::from_array(cb.map(f32::from));
            ca.distance_squared(cb) > self.color
        })
    }
}

/// Square grid over the X/Z extent of the vertices
struct WeldGrid {
    dimension: usize,
    min_x: f32,
    min_z: f32,
    scale_x: f32,
    scale_z: f32,
    /// Cells a matching neighbour can be away on each axis
    radius: usize,
    cells: Vec<Vec<usize>>,
}

impl WeldGrid {
    fn build(vertices: &[Vertex], tolerances: &WeldTolerances) -> Result<Self> {
        let first = vertices.first().ok_or(Raw3dError::NoVertices)?.position;
        let (mut min_x, mut max_x) = (first.x, first.x);
        let (mut min_z, mut max_z) = (first.z, first.z);

        let mut outliers = 0;
        for vertex in vertices {
            let p = vertex.position;
            let far_x = (max_x - p.x).abs() > OUTLIER_DISTANCE || (p.x - min_x).abs() > OUTLIER_DISTANCE;
            let far_z = (max_z - p.z).abs() > OUTLIER_DISTANCE || (p.z - min_z).abs() > OUTLIER_DISTANCE;
            if far_x || far_z || !p.is_finite() {
                outliers += 1;
                continue;
            }
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_z = min_z.min(p.z);
            max_z = max_z.max(p.z);
        }
        if outliers > MAX_OUTLIERS {
            return Err(Raw3dError::TooManyOutliers(outliers));
        }
        if outliers > 0 {
            log::warn!("{} vertices lie far outside the mesh bounds", outliers);
        }

        let dimension = MIN_GRID_DIMENSION.max((vertices.len() as f32).sqrt() as usize);
        let scale_x = (dimension - 1) as f32 / (max_x - min_x + 1.0);
        let scale_z = (dimension - 1) as f32 / (max_z - min_z + 1.0);
        let reach = tolerances.position.max(0.0).sqrt() * scale_x.max(scale_z);
        let radius = (reach.ceil() as usize).clamp(1, dimension);

        let mut grid = Self {
            dimension,
            min_x,
            min_z,
            scale_x,
            scale_z,
            radius,
            cells: vec![Vec::new(); dimension * dimension],
        };
        for (i, vertex) in vertices.iter().enumerate() {
            let (x, z) = grid.cell_of(vertex);
            grid.cells[x + z * dimension].push(i);
        }
        Ok(grid)
    }

    fn cell_of(&self, vertex: &Vertex) -> (usize, usize) {
        let last = (self.dimension - 1) as f32;
        let x = ((vertex.position.x - self.min_x) * self.scale_x).clamp(0.0, last);
        let z = ((vertex.position.z - self.min_z) * self.scale_z).clamp(0.0, last);
        // NaN clamps to NaN and casts to 0
        (x as usize, z as usize)
    }

    /// Vertices in the cells around `(cx, cz)`
    fn neighbours(&self, (cx, cz): (usize, usize)) -> impl Iterator<Item = usize> + '_ {
        let x_range = cx.saturating_sub(self.radius)..=(cx + self.radius).min(self.dimension - 1);
        let z_range = cz.saturating_sub(self.radius)..=(cz + self.radius).min(self.dimension - 1);
        z_range.flat_map(move |z| {
            x_range
                .clone()
                .flat_map(move |x| self.cells[x + z * self.dimension].iter().copied())
        })
    }
}

impl Geom {
    /// Merge equivalent vertices and rewrite facet indices
    ///
    /// Returns the number of vertices removed. Facet indices must be in range.
    pub(crate) fn weld_vertices(&mut self, tolerances: &WeldTolerances) -> Result<usize> {
        let grid = WeldGrid::build(&self.vertices, tolerances)?;
        log::debug!(
            "Welding {} vertices on a {}x{} grid (radius {}, {} workers)",
            self.vertices.len(),
            grid.dimension,
            grid.dimension,
            grid.radius,
            parallel::worker_count()
        );

        let vertices = &self.vertices;
        let candidates: Vec<Vec<usize>> = parallel::map_indexed(vertices.len(), |k| {
            let mut matches: Vec<usize> = grid
                .neighbours(grid.cell_of(&vertices[k]))
                .filter(|&j| j > k && tolerances.vertices_match(&vertices[k], &vertices[j]))
                .collect();
            matches.sort_unstable();
            matches
        });

        let mut remap: Vec<usize> = (0..vertices.len()).collect();
        for (k, matches) in candidates.iter().enumerate() {
            if remap[k] != k {
                continue;
            }
            for &j in matches {
                if remap[j] == j {
                    remap[j] = k;
                }
            }
        }

        let mut dense = vec![0; remap.len()];
        let mut kept = Vec::with_capacity(remap.len());
        for (i, &target) in remap.iter().enumerate() {
            if target == i {
                dense[i] = kept.len();
                kept.push(i);
            }
        }
        for facet in &mut self.facets {
            for index in facet.indices_mut() {
                *index = dense[remap[*index]];
            }
        }

        let removed = self.vertices.len() - kept.len();
        if removed > 0 {
            let old = std::mem::take(&mut self.vertices);
            self.vertices = kept.into_iter().map(|i| old[i].clone()).collect();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::tests::create_test_quad;
    use crate::geom::{Facet, Weight};
    use glam::{Vec2, Vec3};

    fn weighted(position: Vec3, bone: usize) -> Vertex {
        let mut vertex = Vertex::at(position);
        vertex.push_weight(bone, 1.0).unwrap();
        vertex
    }

    #[test]
    fn test_match_is_symmetric() {
        let tolerances = WeldTolerances::default();
        let mut a = weighted(Vec3::ZERO, 0);
        let mut b = weighted(Vec3::ZERO, 0);
        a.weights[0] = Weight::new(0, 1.0);
        b.weights[0] = Weight::new(0, 0.5);

        assert!(!tolerances.vertices_match(&a, &b));
        assert!(!tolerances.vertices_match(&b, &a));
    }

    #[test]
    fn test_channels_must_agree() {
        let tolerances = WeldTolerances::default();
        let a = weighted(Vec3::ONE, 1);

        let mut b = a.clone();
        assert!(tolerances.vertices_match(&a, &b));

        b.position += Vec3::splat(0.01);
        assert!(tolerances.vertices_match(&a, &b));
        b.position += Vec3::splat(0.1);
        assert!(!tolerances.vertices_match(&a, &b));

        let mut c = a.clone();
        c.push_uv(Vec2::ZERO).unwrap();
        assert!(!tolerances.vertices_match(&a, &c));

        let mut d = a.clone();
        d.weights[0].bone = 2;
        assert!(!tolerances.vertices_match(&a, &d));

        let mut e = a.clone();
        e.push_color([10, 10, 10, 255]).unwrap();
        let mut f = a.clone();
        f.push_color([11, 10, 10, 254]).unwrap();
        assert!(tolerances.vertices_match(&e, &f));
        f.colors[0] = [12, 10, 10, 255];
        assert!(!tolerances.vertices_match(&e, &f));
    }

    #[test]
    fn test_weld_rewrites_facets() {
        let mut geom = create_test_quad();
        // Split the shared edge so the second triangle has its own copies
        let copy0 = geom.vertices[0].clone();
        let copy2 = geom.vertices[2].clone();
        geom.vertices.push(copy0);
        geom.vertices.push(copy2);
        geom.facets[1] = Facet::triangle(0, 0, [4, 3, 5]);

        let removed = geom.weld_vertices(&WeldTolerances::default()).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(geom.vertices.len(), 4);
        assert_eq!(geom.facets[1].indices(), &[0, 3, 2]);
    }

    #[test]
    fn test_neighbouring_cells_are_searched() {
        let mut geom = Geom::default();
        // Near duplicates among evenly spaced points
        for i in 0..30 {
            geom.vertices.push(weighted(Vec3::new(i as f32, 0.0, 0.0), 0));
        }
        geom.vertices.push(weighted(Vec3::new(14.999, 0.0, 0.0), 0));
        geom.vertices.push(weighted(Vec3::new(15.001, 0.0, 0.0), 0));

        let removed = geom.weld_vertices(&WeldTolerances::default()).unwrap();
        // 14.999 welds with 15.0, then 15.001 too
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_too_many_outliers() {
        let mut geom = Geom::default();
        geom.vertices.push(weighted(Vec3::ZERO, 0));
        for i in 0..=MAX_OUTLIERS {
            geom.vertices
                .push(weighted(Vec3::new(50_000.0 + i as f32, 0.0, 0.0), 0));
        }
        assert_eq!(
            geom.weld_vertices(&WeldTolerances::default()),
            Err(Raw3dError::TooManyOutliers(MAX_OUTLIERS + 1))
        );
    }
}
