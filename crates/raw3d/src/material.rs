//! Material instances and their typed shader parameters

use crate::error::{Raw3dError, Result};
use std::fmt;
use std::str::FromStr;

/// Type of a material parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ParamType {
    #[default]
    Invalid,
    Bool,
    F1,
    F2,
    F3,
    F4,
    Texture,
}

impl ParamType {
    pub const ALL: [Self; 6] = [
        Self::Bool,
        Self::F1,
        Self::F2,
        Self::F3,
        Self::F4,
        Self::Texture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "NULL",
            Self::Bool => "BOOL",
            Self::F1 => "F1",
            Self::F2 => "F2",
            Self::F3 => "F3",
            Self::F4 => "F4",
            Self::Texture => "TEXTURE",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = Raw3dError;

    /// Case-insensitive; `NULL` is not accepted
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Raw3dError::Record(format!("invalid material parameter type '{}'", s)))
    }
}

/// Named parameter; the value is kept in its textual form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MaterialParam {
    pub kind: ParamType,
    pub name: String,
    pub value: String,
}

impl MaterialParam {
    pub fn new(kind: ParamType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An instance of a material shader with its parameter values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MaterialInstance {
    pub name: String,
    pub shader: String,
    pub technique: String,
    pub params: Vec<MaterialParam>,
}

impl MaterialInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn param(&self, name: &str) -> Option<&MaterialParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Order parameters by name, keeping the order of equal names
    pub fn sort_params(&mut self) {
        self.params.sort_by(|a, b| a.name.cmp(&b.name));
    }
}
