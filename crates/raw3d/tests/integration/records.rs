//! Integration tests for reading and writing aggregates as records

use super::{bone_chain, triangle_soup};
use pretty_assertions::assert_eq;
use raw3d::anim::Anim;
use raw3d::geom::{CleanOptions, Geom};
use raw3d::hierarchy;
use raw3d::records::{MemoryRecords, Record, RecordReader, RecordWriter};
use raw3d::{Raw3dError, Result};
use std::collections::BTreeMap;

/// Store keyed by record name that remembers how often each record was read
#[derive(Default)]
struct KeyedStore {
    records: BTreeMap<String, Record>,
    reads: BTreeMap<String, usize>,
}

impl RecordWriter for KeyedStore {
    fn write_record(&mut self, record: Record) -> Result<()> {
        if self.records.contains_key(&record.name) {
            return Err(Raw3dError::Record(format!("record '{}' written twice", record.name)));
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }
}

impl RecordReader for KeyedStore {
    fn read_record(&mut self, name: &str) -> Result<Option<Record>> {
        *self.reads.entry(name.to_string()).or_default() += 1;
        Ok(self.records.get(name).cloned())
    }
}

fn cleaned_soup() -> Geom {
    let mut geom = triangle_soup(3);
    geom.clean_mesh(&CleanOptions::default()).unwrap();
    hierarchy::refresh_child_counts(&mut geom.bones);
    geom.compute_bone_info().unwrap();
    geom
}

#[test]
fn test_geom_through_custom_store() {
    let geom = cleaned_soup();
    let mut store = KeyedStore::default();
    geom.write_records(&mut store).unwrap();

    let restored = Geom::read_records(&mut store).unwrap();

    assert_eq!(restored, geom);
    assert!(store.reads.values().all(|&count| count == 1));
    assert_eq!(store.reads.get("Hierarchy"), Some(&1));
}

#[test]
fn test_anim_through_custom_store() {
    let anim = bone_chain(3, 4);
    let mut store = KeyedStore::default();
    anim.write_records(&mut store).unwrap();

    let restored = Anim::read_records(&mut store).unwrap();

    assert_eq!(restored.name, anim.name);
    assert_eq!(restored.frame_count, 4);
    assert_eq!(restored.keys, anim.keys);
    for (restored, original) in restored.bones.iter().zip(&anim.bones) {
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.parent, original.parent);
        assert_eq!(restored.bind(), original.bind());
    }
}

#[test]
fn test_missing_required_record() {
    let mut store = MemoryRecords::new();
    cleaned_soup().write_records(&mut store).unwrap();
    let records = store
        .into_records()
        .into_iter()
        .filter(|r| r.name != "Polygons")
        .collect();
    let mut store = MemoryRecords::from_records(records);

    match Geom::read_records(&mut store) {
        Err(Raw3dError::Record(message)) => assert!(message.contains("Polygons"), "{}", message),
        other => panic!("expected a record error, got {:?}", other),
    }

    let mut empty = MemoryRecords::new();
    assert!(matches!(Anim::read_records(&mut empty), Err(Raw3dError::Record(_))));
}

#[test]
fn test_keys_are_placed_by_grid_fields() {
    let anim = bone_chain(2, 3);
    let mut store = MemoryRecords::new();
    anim.write_records(&mut store).unwrap();

    let mut records = store.into_records();
    let keys = records.iter_mut().find(|r| r.name == "KeyFrames").unwrap();
    keys.items.reverse();
    let mut store = MemoryRecords::from_records(records);

    let restored = Anim::read_records(&mut store).unwrap();
    assert_eq!(restored.keys, anim.keys);
}

#[cfg(feature = "serde-support")]
#[test]
fn test_records_survive_json() {
    let geom = cleaned_soup();
    let mut store = MemoryRecords::new();
    geom.write_records(&mut store).unwrap();

    let json = serde_json::to_string(&store).unwrap();
    let mut decoded: MemoryRecords = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded, store);
    assert_eq!(Geom::read_records(&mut decoded).unwrap(), geom);
}

#[cfg(feature = "serde-support")]
#[test]
fn test_anim_serializes_directly() {
    let anim = bone_chain(2, 2);
    let json = serde_json::to_value(&anim).unwrap();
    assert_eq!(json["frame_count"], 2);

    let decoded: Anim = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, anim);
}
