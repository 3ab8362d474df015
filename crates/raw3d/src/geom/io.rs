//! Geometry records
//!
//! Vertex channels are stored in their own records keyed by vertex and
//! slot, and only the slots a vertex actually uses are written. On read the
//! per-vertex counts of the `Vertices` record decide which slots exist.

use super::{
    Btn, Color, Facet, Geom, GeomBone, Mesh, Vertex, Weight, MAX_COLORS, MAX_FACET_VERTICES,
    MAX_NORMALS, MAX_UVS, MAX_WEIGHTS, MIN_FACET_VERTICES,
};
use crate::error::{Raw3dError, Result};
use crate::hierarchy;
use crate::material::{MaterialInstance, MaterialParam};
use crate::math::{Plane, Transform3};
use crate::records::{Record, RecordItem, RecordReader, RecordWriter};
use glam::Vec4;
use raw3d_utils::text;

const HIERARCHY: &str = "Hierarchy";
const MATERIAL_INSTANCE: &str = "MaterialInstance";
const MATERIAL_INSTANCE_PARAMS: &str = "MaterialInstanceParams";
const VERTICES: &str = "Vertices";
const COLORS: &str = "Colors";
const BTNS: &str = "BTNs";
const UVS: &str = "UVs";
const SKIN: &str = "Skin";
const POLYGONS: &str = "Polygons";
const FACET_INDEX: &str = "FacetIndex";
const MESH: &str = "Mesh";

fn color_to_floats(color: Color) -> Vec4 {
    Vec4::from_array(color.map(|c| f32::from(c) / 255.0))
}

fn color_from_floats(color: Vec4) -> Color {
    // Saturating float to int cast
    color.to_array().map(|c| (c * 255.0).round() as u8)
}

/// Items of `(owner, slot)` for every used slot of a per-vertex channel
fn channel_items<'a, T: 'a, F>(
    vertices: &'a [Vertex],
    slots: impl Fn(&'a Vertex) -> &'a [T],
    fields: F,
) -> Vec<RecordItem>
where
    F: Fn(RecordItem, &'a T) -> RecordItem,
{
    vertices
        .iter()
        .enumerate()
        .flat_map(|(i, vertex)| {
            slots(vertex).iter().enumerate().map(move |(slot, value)| (i, slot, value))
        })
        .map(|(i, slot, value)| {
            fields(RecordItem::new().with("iVertex", i).with("Index", slot), value)
        })
        .collect()
}

impl Geom {
    /// Write every array of the geometry as records
    pub fn write_records<W: RecordWriter>(&self, writer: &mut W) -> Result<()> {
        let bones = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| {
                RecordItem::new()
                    .with("Index", i)
                    .with("Name", bone.name.as_str())
                    .with("nChildren", bone.child_count)
                    .with("iParent", bone.parent)
                    .with("Scale", bone.scale)
                    .with("Rotate", bone.rotation)
                    .with("Pos", bone.translation)
            })
            .collect();
        writer.write_record(Record::new(HIERARCHY, bones))?;

        let materials = self
            .materials
            .iter()
            .enumerate()
            .map(|(i, material)| {
                RecordItem::new()
                    .with("Index", i)
                    .with("Name", material.name.as_str())
                    .with("Shader", material.shader.as_str())
                    .with("Technique", material.technique.as_str())
                    .with("nParams", material.params.len())
            })
            .collect();
        writer.write_record(Record::new(MATERIAL_INSTANCE, materials))?;

        let params = self
            .materials
            .iter()
            .enumerate()
            .flat_map(|(i, material)| {
                material.params.iter().enumerate().map(move |(j, param)| {
                    RecordItem::new()
                        .with("iMaterialInstance", i)
                        .with("iParam", j)
                        .with("Name", param.name.as_str())
                        .with("Type", param.kind.as_str())
                        .with("Value", param.value.as_str())
                })
            })
            .collect();
        writer.write_record(Record::new(MATERIAL_INSTANCE_PARAMS, params))?;

        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, vertex)| {
                RecordItem::new()
                    .with("Index", i)
                    .with("Pos", vertex.position)
                    .with("iFrame", vertex.frame)
                    .with("nBinormals", vertex.binormal_count)
                    .with("nTangents", vertex.tangent_count)
                    .with("nNormals", vertex.normal_count)
                    .with("nUVSets", vertex.uv_count)
                    .with("nColors", vertex.color_count)
                    .with("nWeights", vertex.weight_count)
            })
            .collect();
        writer.write_record(Record::new(VERTICES, vertices))?;

        let colors = channel_items(&self.vertices, Vertex::colors, |item, color| {
            item.with("Color", color_to_floats(*color))
        });
        writer.write_record(Record::new(COLORS, colors))?;

        let btns = channel_items(&self.vertices, Vertex::btns, |item, btn| {
            item.with("Binormals", btn.binormal)
                .with("Tangents", btn.tangent)
                .with("Normals", btn.normal)
        });
        writer.write_record(Record::new(BTNS, btns))?;

        let uvs = channel_items(&self.vertices, Vertex::uvs, |item, uv| item.with("UV", *uv));
        writer.write_record(Record::new(UVS, uvs))?;

        let skin = channel_items(&self.vertices, Vertex::weights, |item, weight| {
            item.with("iBone", weight.bone).with("Weight", weight.weight)
        });
        writer.write_record(Record::new(SKIN, skin))?;

        let polygons = self
            .facets
            .iter()
            .map(|facet| {
                let plane = facet.plane.normal.extend(facet.plane.distance);
                RecordItem::new()
                    .with("iMesh", facet.mesh)
                    .with("nVerts", facet.vertex_count)
                    .with("Plane", plane)
                    .with("iMaterialInstance", facet.material)
            })
            .collect();
        writer.write_record(Record::new(POLYGONS, polygons))?;

        let facet_indices = self
            .facets
            .iter()
            .enumerate()
            .flat_map(|(i, facet)| {
                facet.indices().iter().enumerate().map(move |(slot, &vertex)| {
                    RecordItem::new()
                        .with("iFacet", i)
                        .with("Index", slot)
                        .with("iVertex", vertex)
                })
            })
            .collect();
        writer.write_record(Record::new(FACET_INDEX, facet_indices))?;

        let meshes = self
            .meshes
            .iter()
            .map(|mesh| RecordItem::new().with("Name", mesh.name.as_str()))
            .collect();
        writer.write_record(Record::new(MESH, meshes))?;

        log::debug!(
            "Wrote geometry: {} bones, {} vertices, {} facets, {} meshes",
            self.bones.len(),
            self.vertices.len(),
            self.facets.len(),
            self.meshes.len()
        );
        Ok(())
    }

    /// Rebuild a geometry from its records
    ///
    /// Channel records may be absent when no vertex uses the channel.
    /// Meshes whose names repeat an earlier one get a `__N` suffix, and bone
    /// bounds and mesh bone counts are recomputed.
    pub fn read_records<R: RecordReader>(reader: &mut R) -> Result<Self> {
        let mut geom = Geom::default();

        for item in &reader.read_required_record(HIERARCHY)?.items {
            let bind = Transform3::new(item.vec3("Scale")?, item.quat("Rotate")?, item.vec3("Pos")?);
            geom.bones.push(GeomBone::new(
                item.string("Name")?,
                item.optional_index("iParent")?,
                bind,
            ));
        }
        hierarchy::refresh_child_counts(&mut geom.bones);

        read_materials(reader, &mut geom.materials)?;

        for item in &reader.read_required_record(VERTICES)?.items {
            geom.vertices.push(read_vertex(item)?);
        }
        read_channels(reader, &mut geom.vertices)?;

        for item in &reader.read_required_record(POLYGONS)?.items {
            let count = item.index("nVerts")?;
            if !(MIN_FACET_VERTICES..=MAX_FACET_VERTICES).contains(&count) {
                return Err(Raw3dError::Record(format!(
                    "facet {} has {} vertices",
                    geom.facets.len(),
                    count
                )));
            }
            let plane = item.vec4("Plane")?;
            geom.facets.push(Facet {
                mesh: item.index("iMesh")?,
                vertex_count: count,
                material: item.index("iMaterialInstance")?,
                plane: Plane {
                    normal: plane.truncate(),
                    distance: plane.w,
                },
                ..Facet::default()
            });
        }
        for item in &reader.read_required_record(FACET_INDEX)?.items {
            let (facet, slot) = (item.index("iFacet")?, item.index("Index")?);
            let target = geom
                .facets
                .get_mut(facet)
                .and_then(|f| f.indices_mut().get_mut(slot))
                .ok_or_else(|| {
                    Raw3dError::Record(format!("facet index {} of facet {} does not exist", slot, facet))
                })?;
            *target = item.index("iVertex")?;
        }

        for item in &reader.read_required_record(MESH)?.items {
            geom.meshes.push(Mesh::new(item.string("Name")?));
        }
        rename_duplicate_meshes(&mut geom.meshes);

        geom.compute_bone_info()?;
        log::debug!(
            "Read geometry: {} bones, {} vertices, {} facets, {} meshes",
            geom.bones.len(),
            geom.vertices.len(),
            geom.facets.len(),
            geom.meshes.len()
        );
        Ok(geom)
    }
}

fn read_materials<R: RecordReader>(reader: &mut R, materials: &mut Vec<MaterialInstance>) -> Result<()> {
    let Some(record) = reader.read_record(MATERIAL_INSTANCE)? else {
        return Ok(());
    };
    for item in &record.items {
        let mut material = MaterialInstance::new(item.string("Name")?);
        material.shader = item.string("Shader")?.to_string();
        material.technique = item.string("Technique")?.to_string();
        material.params = vec![MaterialParam::default(); item.index("nParams")?];
        materials.push(material);
    }

    let Some(params) = reader.read_record(MATERIAL_INSTANCE_PARAMS)? else {
        return Ok(());
    };
    for item in &params.items {
        let (material, slot) = (item.index("iMaterialInstance")?, item.index("iParam")?);
        let param = materials
            .get_mut(material)
            .and_then(|m| m.params.get_mut(slot))
            .ok_or_else(|| {
                Raw3dError::Record(format!("parameter {} of material {} does not exist", slot, material))
            })?;
        *param = MaterialParam::new(
            item.string("Type")?.parse()?,
            item.string("Name")?,
            item.string("Value")?,
        );
    }
    Ok(())
}

fn read_count(item: &RecordItem, name: &str, max: usize) -> Result<usize> {
    let count = item.index(name)?;
    if count > max {
        return Err(Raw3dError::Record(format!(
            "field '{}' is {}, at most {} are supported",
            name, count, max
        )));
    }
    Ok(count)
}

fn read_vertex(item: &RecordItem) -> Result<Vertex> {
    let mut vertex = Vertex::at(item.vec3("Pos")?);
    if item.has("iFrame") {
        vertex.frame = i32::try_from(item.int("iFrame")?)
            .map_err(|_| Raw3dError::Record("field 'iFrame' does not fit in 32 bits".to_string()))?;
    }
    vertex.binormal_count = read_count(item, "nBinormals", MAX_NORMALS)?;
    vertex.tangent_count = read_count(item, "nTangents", MAX_NORMALS)?;
    vertex.normal_count = read_count(item, "nNormals", MAX_NORMALS)?;
    vertex.uv_count = read_count(item, "nUVSets", MAX_UVS)?;
    vertex.color_count = read_count(item, "nColors", MAX_COLORS)?;
    vertex.weight_count = read_count(item, "nWeights", MAX_WEIGHTS)?;
    Ok(vertex)
}

/// Place `(iVertex, Index)` items of one channel into the declared slots
fn place_channel<F>(
    reader: &mut impl RecordReader,
    name: &str,
    vertices: &mut [Vertex],
    mut place: F,
) -> Result<()>
where
    F: FnMut(&mut Vertex, usize, &RecordItem) -> Result<bool>,
{
    let Some(record) = reader.read_record(name)? else {
        return Ok(());
    };
    for item in &record.items {
        let (index, slot) = (item.index("iVertex")?, item.index("Index")?);
        let vertex = vertices.get_mut(index).ok_or_else(|| {
            Raw3dError::Record(format!("{} entry for missing vertex {}", name, index))
        })?;
        if !place(vertex, slot, item)? {
            return Err(Raw3dError::Record(format!(
                "{} entry {} of vertex {} exceeds its declared count",
                name, slot, index
            )));
        }
    }
    Ok(())
}

fn read_channels<R: RecordReader>(reader: &mut R, vertices: &mut [Vertex]) -> Result<()> {
    place_channel(reader, COLORS, vertices, |vertex, slot, item| {
        if slot >= vertex.color_count {
            return Ok(false);
        }
        vertex.colors[slot] = color_from_floats(item.vec4("Color")?);
        Ok(true)
    })?;
    place_channel(reader, BTNS, vertices, |vertex, slot, item| {
        if slot >= vertex.btn_count() {
            return Ok(false);
        }
        vertex.btns[slot] = Btn {
            binormal: item.vec3("Binormals")?,
            tangent: item.vec3("Tangents")?,
            normal: item.vec3("Normals")?,
        };
        Ok(true)
    })?;
    place_channel(reader, UVS, vertices, |vertex, slot, item| {
        if slot >= vertex.uv_count {
            return Ok(false);
        }
        vertex.uvs[slot] = item.vec2("UV")?;
        Ok(true)
    })?;
    place_channel(reader, SKIN, vertices, |vertex, slot, item| {
        if slot >= vertex.weight_count {
            return Ok(false);
        }
        vertex.weights[slot] = Weight::new(item.index("iBone")?, item.float("Weight")?);
        Ok(true)
    })
}

/// Suffix repeated mesh names with `__N`, counting repeats of each name
fn rename_duplicate_meshes(meshes: &mut [Mesh]) {
    for i in 0..meshes.len() {
        let mut repeats = 0;
        for j in i + 1..meshes.len() {
            if text::names_match(&meshes[i].name, &meshes[j].name) {
                let renamed = format!("{}__{}", meshes[j].name, repeats);
                log::warn!("Duplicate mesh name '{}' renamed to '{}'", meshes[j].name, renamed);
                meshes[j].name = renamed;
                repeats += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::tests::create_test_quad;
    use crate::material::ParamType;
    use crate::records::MemoryRecords;
    use glam::{Vec2, Vec3};
    use pretty_assertions::assert_eq;

    fn decorated_quad() -> Geom {
        let mut geom = create_test_quad();
        geom.bones.push(GeomBone::new("Tail", Some(0), Transform3::IDENTITY));
        hierarchy::refresh_child_counts(&mut geom.bones);
        geom.vertices[1].push_weight(1, 0.25).unwrap();
        geom.vertices[2].push_uv(Vec2::new(0.5, 0.25)).unwrap();
        geom.vertices[3].push_color([10, 20, 30, 255]).unwrap();
        geom.vertices[3].frame = 7;
        geom.vertices[0]
            .push_btn(Btn {
                binormal: Vec3::X,
                tangent: Vec3::Z,
                normal: Vec3::Y,
            })
            .unwrap();
        geom.materials[0].shader = "skinned".into();
        geom.materials[0].params = vec![
            MaterialParam::new(ParamType::Texture, "diffuse", "body.dds"),
            MaterialParam::new(ParamType::F1, "gloss", "0.5"),
        ];
        geom.compute_bone_info().unwrap();
        geom
    }

    #[test]
    fn test_records_restore_geometry() {
        let geom = decorated_quad();
        let mut store = MemoryRecords::new();
        geom.write_records(&mut store).unwrap();

        let names: Vec<_> = store.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Hierarchy",
                "MaterialInstance",
                "MaterialInstanceParams",
                "Vertices",
                "Colors",
                "BTNs",
                "UVs",
                "Skin",
                "Polygons",
                "FacetIndex",
                "Mesh"
            ]
        );
        // Only used slots are written
        assert_eq!(store.record("UVs").unwrap().items.len(), 1);
        assert_eq!(store.record("Skin").unwrap().items.len(), 5);
        assert_eq!(store.record("FacetIndex").unwrap().items.len(), 6);

        let restored = Geom::read_records(&mut store).unwrap();
        assert_eq!(restored, geom);
    }

    #[test]
    fn test_duplicate_mesh_names_are_renamed() {
        let mut meshes = vec![
            Mesh::new("Body"),
            Mesh::new("body"),
            Mesh::new("Head"),
            Mesh::new("BODY"),
        ];
        rename_duplicate_meshes(&mut meshes);

        let names: Vec<_> = meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Body", "body__0", "Head", "BODY__1"]);
    }

    #[test]
    fn test_channel_entry_beyond_count_is_rejected() {
        let geom = create_test_quad();
        let mut store = MemoryRecords::new();
        geom.write_records(&mut store).unwrap();

        let mut records = store.into_records();
        let uvs = records.iter_mut().find(|r| r.name == "UVs").unwrap();
        uvs.items.push(
            RecordItem::new()
                .with("iVertex", 0usize)
                .with("Index", 0usize)
                .with("UV", Vec2::ZERO),
        );
        let mut store = MemoryRecords::from_records(records);

        assert!(matches!(
            Geom::read_records(&mut store),
            Err(Raw3dError::Record(_))
        ));
    }

    #[test]
    fn test_color_conversion() {
        let color = [0, 128, 255, 17];
        assert_eq!(color_from_floats(color_to_floats(color)), color);
    }
}
