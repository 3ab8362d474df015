//! Skinned geometry aggregate
//!
//! A [`Geom`] owns a bind-pose skeleton, vertices with optional channels,
//! facets grouped into named meshes, and material instances. All relations
//! between these arrays are plain indices, and every operation that removes
//! or reorders elements rewrites the indices that point at them.
//!
//! Vertex channels use fixed capacity arrays with an explicit count, see
//! [`MAX_UVS`], [`MAX_NORMALS`], [`MAX_COLORS`] and [`MAX_WEIGHTS`].
//!
//! # Example
//!
//! ```rust
//! use raw3d::geom::{CleanOptions, Facet, Geom, Mesh, Vertex};
//! use glam::Vec3;
//!
//! let mut geom = Geom::default();
//! geom.meshes.push(Mesh::new("body"));
//! geom.vertices = vec![
//!     Vertex::at(Vec3::ZERO),
//!     Vertex::at(Vec3::X),
//!     Vertex::at(Vec3::Z),
//!     Vertex::at(Vec3::X),
//! ];
//! geom.facets.push(Facet::triangle(0, 0, [0, 1, 2]));
//! geom.facets.push(Facet::triangle(0, 0, [0, 3, 2]));
//!
//! let stats = geom.clean_mesh(&CleanOptions::default())?;
//! assert_eq!(geom.vertices.len(), 3);
//! assert_eq!(stats.total_facets_removed(), 1);
//! # Ok::<(), raw3d::Raw3dError>(())
//! ```

mod bone_info;
mod clean;
mod io;
mod isolate;
mod ops;
mod sanity;
mod skeleton;
mod weights;
mod weld;

pub use clean::{CleanOptions, CleanStats};
pub use ops::DEFAULT_NORMAL_COLLAPSE_ANGLE;
pub use sanity::{MAX_GEOM_BONES, MAX_GEOM_FACETS, MAX_GEOM_MATERIALS, MAX_GEOM_MESHES, MAX_GEOM_VERTICES};
pub use weld::WeldTolerances;

use crate::error::{Raw3dError, Result};
use crate::hierarchy::SkeletonNode;
use crate::material::MaterialInstance;
use crate::math::{BBox, Plane, Transform3};
use glam::{Quat, Vec2, Vec3};
use raw3d_utils::debug;

pub const MAX_UVS: usize = 8;
pub const MAX_NORMALS: usize = 3;
pub const MAX_COLORS: usize = 4;
pub const MAX_WEIGHTS: usize = 16;
pub const MAX_FACET_VERTICES: usize = 8;
pub const MIN_FACET_VERTICES: usize = 3;

/// 8-bit RGBA color
pub type Color = [u8; 4];

pub const WHITE: Color = [255; 4];

/// A bone of the bind skeleton
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct GeomBone {
    pub name: String,
    pub parent: Option<usize>,
    pub child_count: usize,
    pub scale: Vec3,
    pub rotation: Quat,
    pub translation: Vec3,
    /// Bounds of the vertices weighted to this bone, see [`Geom::compute_bone_info`]
    pub bbox: BBox,
}

impl Default for GeomBone {
    fn default() -> Self {
        Self::new("", None, Transform3::IDENTITY)
    }
}

impl GeomBone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, bind: Transform3) -> Self {
        Self {
            name: name.into(),
            parent,
            child_count: 0,
            scale: bind.scale,
            rotation: bind.rotation,
            translation: bind.translation,
            bbox: BBox::EMPTY,
        }
    }

    pub fn bind(&self) -> Transform3 {
        Transform3::new(self.scale, self.rotation, self.translation)
    }
}

impl SkeletonNode for GeomBone {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<usize> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<usize>) {
        self.parent = parent;
    }

    fn set_child_count(&mut self, count: usize) {
        self.child_count = count;
    }
}

/// A named group of facets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Mesh {
    pub name: String,
    /// Bone prefix length needed to skin this mesh
    pub bone_count: usize,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bone_count: 0,
        }
    }
}

/// Skin weight
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Weight {
    pub bone: usize,
    pub weight: f32,
}

impl Weight {
    pub fn new(bone: usize, weight: f32) -> Self {
        Self { bone, weight }
    }
}

/// Binormal, tangent and normal of one normal set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Btn {
    pub binormal: Vec3,
    pub tangent: Vec3,
    pub normal: Vec3,
}

/// A vertex with its optional channels
///
/// Only the first `*_count` entries of each channel array are meaningful.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Vertex {
    pub position: Vec3,
    pub frame: i32,
    pub weight_count: usize,
    pub normal_count: usize,
    pub tangent_count: usize,
    pub binormal_count: usize,
    pub uv_count: usize,
    pub color_count: usize,
    pub uvs: [Vec2; MAX_UVS],
    pub colors: [Color; MAX_COLORS],
    pub weights: [Weight; MAX_WEIGHTS],
    pub btns: [Btn; MAX_NORMALS],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            frame: 0,
            weight_count: 0,
            normal_count: 0,
            tangent_count: 0,
            binormal_count: 0,
            uv_count: 0,
            color_count: 0,
            uvs: [Vec2::ZERO; MAX_UVS],
            colors: [[0; 4]; MAX_COLORS],
            weights: [Weight::default(); MAX_WEIGHTS],
            btns: [Btn::default(); MAX_NORMALS],
        }
    }
}

impl Vertex {
    /// A vertex with no channels
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn weights(&self) -> &[Weight] {
        &self.weights[..self.weight_count.min(MAX_WEIGHTS)]
    }

    pub fn weights_mut(&mut self) -> &mut [Weight] {
        let count = self.weight_count.min(MAX_WEIGHTS);
        &mut self.weights[..count]
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs[..self.uv_count.min(MAX_UVS)]
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors[..self.color_count.min(MAX_COLORS)]
    }

    /// Number of normal sets in use on any of the three vectors
    pub fn btn_count(&self) -> usize {
        self.normal_count
            .max(self.tangent_count)
            .max(self.binormal_count)
            .min(MAX_NORMALS)
    }

    pub fn btns(&self) -> &[Btn] {
        &self.btns[..self.btn_count()]
    }

    /// Bone of the heaviest weight, once weights are sorted
    pub fn primary_bone(&self) -> Option<usize> {
        self.weights().first().map(|w| w.bone)
    }

    pub fn push_weight(&mut self, bone: usize, weight: f32) -> Result<()> {
        let slot = push_slot(self.weight_count, MAX_WEIGHTS, "vertex weights")?;
        self.weights[slot] = Weight::new(bone, weight);
        self.weight_count += 1;
        Ok(())
    }

    pub fn push_uv(&mut self, uv: Vec2) -> Result<()> {
        let slot = push_slot(self.uv_count, MAX_UVS, "vertex uvs")?;
        self.uvs[slot] = uv;
        self.uv_count += 1;
        Ok(())
    }

    pub fn push_color(&mut self, color: Color) -> Result<()> {
        let slot = push_slot(self.color_count, MAX_COLORS, "vertex colors")?;
        self.colors[slot] = color;
        self.color_count += 1;
        Ok(())
    }

    /// Add a normal set; zero binormal and tangent count as absent
    pub fn push_btn(&mut self, btn: Btn) -> Result<()> {
        let slot = push_slot(self.normal_count, MAX_NORMALS, "vertex normals")?;
        self.btns[slot] = btn;
        self.normal_count += 1;
        if btn.binormal != Vec3::ZERO || btn.tangent != Vec3::ZERO {
            self.binormal_count = self.normal_count;
            self.tangent_count = self.normal_count;
        }
        Ok(())
    }

    pub fn push_normal(&mut self, normal: Vec3) -> Result<()> {
        self.push_btn(Btn {
            normal,
            ..Btn::default()
        })
    }
}

fn push_slot(count: usize, capacity: usize, element: &'static str) -> Result<usize> {
    if count < capacity {
        Ok(count)
    } else {
        Err(Raw3dError::Sanity {
            element,
            index: count,
            reason: format!("capacity of {} reached", capacity),
        })
    }
}

/// A polygon of up to [`MAX_FACET_VERTICES`] vertices
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Facet {
    pub mesh: usize,
    pub vertex_count: usize,
    pub vertices: [usize; MAX_FACET_VERTICES],
    pub material: usize,
    pub plane: Plane,
}

impl Default for Facet {
    fn default() -> Self {
        Self {
            mesh: 0,
            vertex_count: 0,
            vertices: [0; MAX_FACET_VERTICES],
            material: 0,
            plane: Plane::default(),
        }
    }
}

impl Facet {
    pub fn triangle(mesh: usize, material: usize, indices: [usize; 3]) -> Self {
        let mut vertices = [0; MAX_FACET_VERTICES];
        vertices[..3].copy_from_slice(&indices);
        Self {
            mesh,
            vertex_count: 3,
            vertices,
            material,
            plane: Plane::default(),
        }
    }

    /// A polygon with 3 to [`MAX_FACET_VERTICES`] vertices
    pub fn polygon(mesh: usize, material: usize, indices: &[usize]) -> Result<Self> {
        if !(MIN_FACET_VERTICES..=MAX_FACET_VERTICES).contains(&indices.len()) {
            return Err(Raw3dError::Sanity {
                element: "facet vertex count",
                index: indices.len(),
                reason: format!(
                    "must be between {} and {}",
                    MIN_FACET_VERTICES, MAX_FACET_VERTICES
                ),
            });
        }
        let mut vertices = [0; MAX_FACET_VERTICES];
        vertices[..indices.len()].copy_from_slice(indices);
        Ok(Self {
            mesh,
            vertex_count: indices.len(),
            vertices,
            material,
            plane: Plane::default(),
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.vertices[..self.vertex_count.min(MAX_FACET_VERTICES)]
    }

    pub fn indices_mut(&mut self) -> &mut [usize] {
        let count = self.vertex_count.min(MAX_FACET_VERTICES);
        &mut self.vertices[..count]
    }
}

/// Skeleton, vertices, facets, meshes and material instances
#[derive(custom_debug::Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Geom {
    #[debug(with = debug::trimmed_collection_fmt)]
    pub bones: Vec<GeomBone>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub vertices: Vec<Vertex>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub facets: Vec<Facet>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub materials: Vec<MaterialInstance>,
    #[debug(with = debug::trimmed_collection_fmt)]
    pub meshes: Vec<Mesh>,
}

impl Geom {
    /// Recompute every facet plane from its first three vertices
    ///
    /// Facets referencing missing vertices keep their plane.
    pub fn update_planes(&mut self) {
        let vertices = &self.vertices;
        for facet in &mut self.facets {
            let corner = |i: usize| vertices.get(facet.vertices[i]).map(|v| v.position);
            if let (Some(a), Some(b), Some(c)) = (corner(0), corner(1), corner(2)) {
                facet.plane = Plane::from_points(a, b, c);
            }
        }
    }

    /// Facet indices of one mesh
    pub fn mesh_facets(&self, mesh: usize) -> impl Iterator<Item = &Facet> + '_ {
        self.facets.iter().filter(move |f| f.mesh == mesh)
    }
}
