//! Record-oriented serialization contract
//!
//! Aggregates are written as a sequence of named records. Each record holds
//! a list of items and each item is an ordered list of named, typed fields,
//! for example a `Skeleton` record with one item per bone carrying `Name`,
//! `iParent`, `Scale` and so on. The concrete storage format lives behind
//! [`RecordWriter`] and [`RecordReader`]; [`MemoryRecords`] keeps records in
//! memory and is what the tests use.
//!
//! # Example
//!
//! ```rust
//! use raw3d::records::{MemoryRecords, Record, RecordItem, RecordReader, RecordWriter};
//!
//! let mut store = MemoryRecords::new();
//! store.write_record(Record::new(
//!     "AnimInfo",
//!     vec![RecordItem::new().with("Name", "walk").with("FPS", 30_i64)],
//! ))?;
//!
//! let info = store.read_record("AnimInfo")?.expect("written above");
//! assert_eq!(info.items[0].string("Name")?, "walk");
//! assert_eq!(info.items[0].int("FPS")?, 30);
//! # Ok::<(), raw3d::Raw3dError>(())
//! ```

use crate::error::{Raw3dError, Result};
use glam::{Quat, Vec2, Vec3, Vec4};

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum FieldValue {
    Int(i64),
    Float(f32),
    Floats(Vec<f32>),
    Str(String),
    Bool(bool),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

/// Indices that may be absent are stored as `-1`
impl From<Option<usize>> for FieldValue {
    fn from(value: Option<usize>) -> Self {
        Self::Int(value.map_or(-1, |v| v as i64))
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec2> for FieldValue {
    fn from(value: Vec2) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

impl From<Vec3> for FieldValue {
    fn from(value: Vec3) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

impl From<Vec4> for FieldValue {
    fn from(value: Vec4) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

/// Stored as `x, y, z, w`
impl From<Quat> for FieldValue {
    fn from(value: Quat) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One element of a record: ordered, named fields
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RecordItem {
    fields: Vec<(String, FieldValue)>,
}

impl RecordItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, builder style
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.push((name.to_string(), value.into()));
    }

    /// Fields in the order they were written
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
            .ok_or_else(|| Raw3dError::Record(format!("missing field '{}'", name)))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            FieldValue::Int(value) => Ok(*value),
            other => Err(type_error(name, "an integer", other)),
        }
    }

    /// A non-negative integer
    pub fn index(&self, name: &str) -> Result<usize> {
        let value = self.int(name)?;
        usize::try_from(value)
            .map_err(|_| Raw3dError::Record(format!("field '{}' is negative: {}", name, value)))
    }

    /// An index where `-1` means none
    pub fn optional_index(&self, name: &str) -> Result<Option<usize>> {
        match self.int(name)? {
            -1 => Ok(None),
            _ => self.index(name).map(Some),
        }
    }

    pub fn float(&self, name: &str) -> Result<f32> {
        match self.get(name)? {
            FieldValue::Float(value) => Ok(*value),
            other => Err(type_error(name, "a float", other)),
        }
    }

    /// Exactly `N` floats
    pub fn floats<const N: usize>(&self, name: &str) -> Result<[f32; N]> {
        match self.get(name)? {
            FieldValue::Floats(values) => <[f32; N]>::try_from(values.as_slice()).map_err(|_| {
                Raw3dError::Record(format!(
                    "field '{}' holds {} floats, expected {}",
                    name,
                    values.len(),
                    N
                ))
            }),
            other => Err(type_error(name, "a float tuple", other)),
        }
    }

    pub fn vec2(&self, name: &str) -> Result<Vec2> {
        self.floats::<2>(name).map(Vec2::from_array)
    }

    pub fn vec3(&self, name: &str) -> Result<Vec3> {
        self.floats::<3>(name).map(Vec3::from_array)
    }

    pub fn vec4(&self, name: &str) -> Result<Vec4> {
        self.floats::<4>(name).map(Vec4::from_array)
    }

    pub fn quat(&self, name: &str) -> Result<Quat> {
        self.floats::<4>(name).map(Quat::from_array)
    }

    pub fn string(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            FieldValue::Str(value) => Ok(value),
            other => Err(type_error(name, "a string", other)),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            FieldValue::Bool(value) => Ok(*value),
            other => Err(type_error(name, "a boolean", other)),
        }
    }
}

fn type_error(name: &str, expected: &str, found: &FieldValue) -> Raw3dError {
    Raw3dError::Record(format!("field '{}' should be {}, found {:?}", name, expected, found))
}

/// A named list of items
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Record {
    pub name: String,
    pub items: Vec<RecordItem>,
}

impl Record {
    pub fn new(name: impl Into<String>, items: Vec<RecordItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

/// Sink for records
pub trait RecordWriter {
    fn write_record(&mut self, record: Record) -> Result<()>;
}

/// Source of records, looked up by name
pub trait RecordReader {
    /// The record called `name`, or `None` when the source has none
    fn read_record(&mut self, name: &str) -> Result<Option<Record>>;

    /// Like [`RecordReader::read_record`], failing when the record is absent
    fn read_required_record(&mut self, name: &str) -> Result<Record> {
        self.read_record(name)?
            .ok_or_else(|| Raw3dError::Record(format!("missing record '{}'", name)))
    }
}

/// Records kept in memory, in write order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MemoryRecords {
    records: Vec<Record>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl RecordWriter for MemoryRecords {
    fn write_record(&mut self, record: Record) -> Result<()> {
        log::trace!("Writing record '{}' with {} items", record.name, record.items.len());
        self.records.push(record);
        Ok(())
    }
}

impl RecordReader for MemoryRecords {
    fn read_record(&mut self, name: &str) -> Result<Option<Record>> {
        Ok(self.record(name).cloned())
    }
}
