//! Extracting one mesh into a standalone geometry

use super::{CleanOptions, Geom};
use crate::error::{Raw3dError, Result};

impl Geom {
    /// Copy one mesh into a new geometry
    ///
    /// Bones and materials are copied as they are. Every facet of the mesh
    /// gets its own copy of each vertex it uses, then the result goes through
    /// [`Geom::clean_mesh`] to weld and compact them again.
    ///
    /// Returns `None` when the mesh has no facets.
    pub fn isolate_mesh(&self, mesh: usize) -> Result<Option<Geom>> {
        let source = self.meshes.get(mesh).ok_or(Raw3dError::IndexOutOfRange {
            what: "mesh",
            index: mesh,
            value: mesh,
            len: self.meshes.len(),
        })?;

        let mut isolated = Geom {
            bones: self.bones.clone(),
            materials: self.materials.clone(),
            meshes: vec![source.clone()],
            ..Geom::default()
        };
        for (i, facet) in self.facets.iter().enumerate() {
            if facet.mesh != mesh {
                continue;
            }
            let mut copy = *facet;
            copy.mesh = 0;
            for index in copy.indices_mut() {
                let vertex = self.vertices.get(*index).ok_or(Raw3dError::IndexOutOfRange {
                    what: "facet vertex",
                    index: i,
                    value: *index,
                    len: self.vertices.len(),
                })?;
                *index = isolated.vertices.len();
                isolated.vertices.push(vertex.clone());
            }
            isolated.facets.push(copy);
        }

        if isolated.facets.is_empty() {
            log::debug!("Mesh {} '{}' has no facets to isolate", mesh, source.name);
            return Ok(None);
        }
        isolated.clean_mesh(&CleanOptions::default())?;
        Ok(Some(isolated))
    }

    /// Isolate a mesh by name, ignoring ASCII case
    ///
    /// Returns `None` when no mesh has that name or it has no facets.
    pub fn isolate_mesh_by_name(&self, name: &str) -> Result<Option<Geom>> {
        match self.mesh_index_by_name(name) {
            Some(mesh) => self.isolate_mesh(mesh),
            None => Ok(None),
        }
    }

    /// Isolate a mesh and remove it from this geometry
    ///
    /// This geometry is cleaned with the mesh's facets removed.
    pub fn extract_mesh(&mut self, mesh: usize) -> Result<Option<Geom>> {
        let Some(isolated) = self.isolate_mesh(mesh)? else {
            return Ok(None);
        };
        self.clean_mesh(&CleanOptions::removing_mesh(mesh))?;
        Ok(Some(isolated))
    }
}
