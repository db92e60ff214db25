//! Archive schema: the dimensions, variables and attributes of an output file.
//!
//! The schema is plain data. It is assembled by the caller from its
//! configuration and resolved grid, then consumed once by
//! [`write_archive`](crate::write_archive).

use std::fmt;

use crate::error::{NetCdfError, NetCdfResult};

/// Size of a declared dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSize {
    Fixed(usize),
    /// Declared unlimited; `final_len` records are written once.
    Unlimited { final_len: usize },
}

impl DimensionSize {
    pub fn len(&self) -> usize {
        match self {
            DimensionSize::Fixed(n) => *n,
            DimensionSize::Unlimited { final_len } => *final_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, DimensionSize::Unlimited { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSpec {
    pub name: String,
    pub size: DimensionSize,
}

/// Storage type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericType {
    F32,
    F64,
}

/// Attribute value as given by configuration.
///
/// Numeric values are coerced to the variable's storage type on write.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

/// Variable attribute keys the writer knows how to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    Units,
    LongName,
    TimeOrigin,
    MissingValue,
    AddOffset,
    Calendar,
    /// Applied as the variable's fill value at declaration time.
    FillValue,
}

impl AttributeKey {
    /// Recognize an attribute name. Returns `None` for keys the writer skips.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "units" => Some(AttributeKey::Units),
            "long_name" => Some(AttributeKey::LongName),
            "time_origin" => Some(AttributeKey::TimeOrigin),
            "missing_value" => Some(AttributeKey::MissingValue),
            "add_offset" => Some(AttributeKey::AddOffset),
            "calendar" => Some(AttributeKey::Calendar),
            "_FillValue" => Some(AttributeKey::FillValue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKey::Units => "units",
            AttributeKey::LongName => "long_name",
            AttributeKey::TimeOrigin => "time_origin",
            AttributeKey::MissingValue => "missing_value",
            AttributeKey::AddOffset => "add_offset",
            AttributeKey::Calendar => "calendar",
            AttributeKey::FillValue => "_FillValue",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One variable of the archive (coordinate or data).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub dimensions: Vec<String>,
    pub dtype: NumericType,
    /// Attributes in declaration order. Unknown keys are skipped by the writer.
    pub attributes: Vec<(String, AttrValue)>,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, dimensions: &[&str], dtype: NumericType) -> Self {
        Self {
            name: name.into(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            dtype,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Dimensions and variables of one archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveSchema {
    pub dimensions: Vec<DimensionSpec>,
    pub variables: Vec<VariableDecl>,
    pub global_attributes: Vec<(String, String)>,
}

impl ArchiveSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(mut self, name: impl Into<String>, size: DimensionSize) -> Self {
        self.dimensions.push(DimensionSpec {
            name: name.into(),
            size,
        });
        self
    }

    pub fn variable(mut self, decl: VariableDecl) -> Self {
        self.variables.push(decl);
        self
    }

    pub fn global_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_attributes.push((name.into(), value.into()));
        self
    }

    pub fn dimension_size(&self, name: &str) -> Option<DimensionSize> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.size)
    }

    /// Shape of a variable, resolved through the declared dimensions.
    pub fn shape_of(&self, decl: &VariableDecl) -> NetCdfResult<Vec<usize>> {
        decl.dimensions
            .iter()
            .map(|dim| {
                self.dimension_size(dim).map(|s| s.len()).ok_or_else(|| {
                    NetCdfError::declaration(
                        &decl.name,
                        format!("dimension '{}' is not declared", dim),
                    )
                })
            })
            .collect()
    }

    /// Structural checks performed before anything touches disk.
    pub fn validate(&self) -> NetCdfResult<()> {
        let unlimited = self
            .dimensions
            .iter()
            .filter(|d| d.size.is_unlimited())
            .count();
        if unlimited > 1 {
            return Err(NetCdfError::InvalidFormat(format!(
                "{} unlimited dimensions declared, at most one is allowed",
                unlimited
            )));
        }

        for (i, dim) in self.dimensions.iter().enumerate() {
            if self.dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(NetCdfError::InvalidFormat(format!(
                    "dimension '{}' declared twice",
                    dim.name
                )));
            }
        }

        for (i, var) in self.variables.iter().enumerate() {
            if self.variables[..i].iter().any(|v| v.name == var.name) {
                return Err(NetCdfError::InvalidFormat(format!(
                    "variable '{}' declared twice",
                    var.name
                )));
            }
            self.shape_of(var)?;
        }

        Ok(())
    }
}

/// In-memory contents of one variable, row-major in its declared shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> NumericType {
        match self {
            ArrayData::F32(_) => NumericType::F32,
            ArrayData::F64(_) => NumericType::F64,
        }
    }
}

impl From<Vec<f32>> for ArrayData {
    fn from(v: Vec<f32>) -> Self {
        ArrayData::F32(v)
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(v: Vec<f64>) -> Self {
        ArrayData::F64(v)
    }
}
