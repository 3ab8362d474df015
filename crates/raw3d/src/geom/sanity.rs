//! Structural validation of a [`Geom`]

use super::{
    Geom, MAX_COLORS, MAX_FACET_VERTICES, MAX_NORMALS, MAX_UVS, MAX_WEIGHTS, MIN_FACET_VERTICES,
};
use crate::error::{Raw3dError, Result};

pub const MAX_GEOM_MATERIALS: usize = 1000;
pub const MAX_GEOM_VERTICES: usize = 100_000_000;
pub const MAX_GEOM_FACETS: usize = 100_000_000;
pub const MAX_GEOM_BONES: usize = 100_000;
pub const MAX_GEOM_MESHES: usize = 100_000;

fn sanity(element: &'static str, index: usize, reason: impl Into<String>) -> Raw3dError {
    Raw3dError::Sanity {
        element,
        index,
        reason: reason.into(),
    }
}

fn check_count(element: &'static str, count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(sanity(element, count, format!("more than {}", max)));
    }
    Ok(())
}

impl Geom {
    /// Check element counts, index ranges and vertex channels
    ///
    /// Returns the first violation found.
    pub fn sanity_check(&self) -> Result<()> {
        check_count("materials", self.materials.len(), MAX_GEOM_MATERIALS)?;
        check_count("vertices", self.vertices.len(), MAX_GEOM_VERTICES)?;
        check_count("facets", self.facets.len(), MAX_GEOM_FACETS)?;
        check_count("bones", self.bones.len(), MAX_GEOM_BONES)?;
        check_count("meshes", self.meshes.len(), MAX_GEOM_MESHES)?;

        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= self.bones.len() {
                    return Err(Raw3dError::DanglingParent {
                        bone: i,
                        parent: Some(parent),
                    });
                }
            }
        }

        for (i, vertex) in self.vertices.iter().enumerate() {
            if !vertex.position.is_finite() {
                return Err(sanity("vertex", i, "position is not finite"));
            }
            let channels = [
                ("weights", vertex.weight_count, MAX_WEIGHTS),
                ("normals", vertex.normal_count, MAX_NORMALS),
                ("tangents", vertex.tangent_count, MAX_NORMALS),
                ("binormals", vertex.binormal_count, MAX_NORMALS),
                ("uvs", vertex.uv_count, MAX_UVS),
                ("colors", vertex.color_count, MAX_COLORS),
            ];
            for (name, count, max) in channels {
                if count > max {
                    return Err(sanity(
                        "vertex",
                        i,
                        format!("{} count {} exceeds {}", name, count, max),
                    ));
                }
            }
            for weight in vertex.weights() {
                if weight.bone >= self.bones.len() {
                    return Err(Raw3dError::IndexOutOfRange {
                        what: "vertex weight bone",
                        index: i,
                        value: weight.bone,
                        len: self.bones.len(),
                    });
                }
            }
        }

        for (i, facet) in self.facets.iter().enumerate() {
            if !(MIN_FACET_VERTICES..=MAX_FACET_VERTICES).contains(&facet.vertex_count) {
                return Err(sanity(
                    "facet",
                    i,
                    format!("has {} vertices", facet.vertex_count),
                ));
            }
            if facet.material >= self.materials.len() {
                return Err(Raw3dError::IndexOutOfRange {
                    what: "facet material",
                    index: i,
                    value: facet.material,
                    len: self.materials.len(),
                });
            }
            if facet.mesh >= self.meshes.len() {
                return Err(Raw3dError::IndexOutOfRange {
                    what: "facet mesh",
                    index: i,
                    value: facet.mesh,
                    len: self.meshes.len(),
                });
            }
            if let Some(&bad) = facet.indices().iter().find(|&&v| v >= self.vertices.len()) {
                return Err(Raw3dError::IndexOutOfRange {
                    what: "facet vertex",
                    index: i,
                    value: bad,
                    len: self.vertices.len(),
                });
            }
        }

        Ok(())
    }
}
