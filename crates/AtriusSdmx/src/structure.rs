//! # Dataflow Structure
//!
//! Structural metadata of SDMX dataflows: the catalog entry ([`Dataflow`]),
//! its ordered dimensions ([`Dimension`]) and their code lists
//! ([`CodeList`]).
//!
//! Dimension order is significant. It fixes both the column order of the
//! derived feature schema and the slot order of constraint expressions, and
//! it never changes for the lifetime of a [`DataflowStructure`].

use serde::{Deserialize, Serialize};

use crate::{MEASURE_DIMENSION, Result, SdmxError};

/// A statistical series catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataflow {
    /// Dataflow identifier, also used as the logical type name
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Identifier of the data structure definition describing this dataflow
    #[serde(rename = "dsdId", alias = "dsd_id")]
    pub dsd_id: String,
}

impl Dataflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>, dsd_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            dsd_id: dsd_id.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One code of a code list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub code: String,
    #[serde(default)]
    pub label: String,
}

/// The enumerated values a dimension can take, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeList {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    codes: Vec<Code>,
}

impl CodeList {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            codes: Vec::new(),
        }
    }

    /// Builds a code list from `(code, label)` pairs, keeping their order.
    pub fn from_pairs<I, C, L>(id: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        let mut list = Self::new(id);
        for (code, label) in pairs {
            list.insert(code, label);
        }
        list
    }

    /// Adds a code, replacing the label in place if the code already exists.
    pub fn insert(&mut self, code: impl Into<String>, label: impl Into<String>) {
        let code = code.into();
        let label = label.into();
        match self.codes.iter_mut().find(|c| c.code == code) {
            Some(existing) => existing.label = label,
            None => self.codes.push(Code { code, label }),
        }
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.codes
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.label.as_str())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.code == code)
    }

    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Code> {
        self.codes.iter()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// One classificatory axis of a dataflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    /// Zero-based slot of this dimension in constraint expressions
    #[serde(default)]
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "codeList", alias = "code_list", skip_serializing_if = "Option::is_none")]
    pub code_list: Option<CodeList>,
}

impl Dimension {
    pub fn new(id: impl Into<String>, code_list: CodeList) -> Self {
        Self {
            id: id.into(),
            position: 0,
            name: None,
            code_list: Some(code_list),
        }
    }

    /// A dimension whose code list has not been resolved.
    pub fn without_codes(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position: 0,
            name: None,
            code_list: None,
        }
    }

    /// True for the reserved `MEASURE` dimension, compared case-insensitively.
    pub fn is_measure(&self) -> bool {
        self.id.eq_ignore_ascii_case(MEASURE_DIMENSION)
    }

    pub fn code_list(&self) -> Option<&CodeList> {
        self.code_list.as_ref()
    }
}

/// The ordered dimension structure of one dataflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StructureRepr")]
pub struct DataflowStructure {
    /// Identifier of the data structure definition
    pub id: String,
    dimensions: Vec<Dimension>,
}

#[derive(Deserialize)]
struct StructureRepr {
    id: String,
    #[serde(default)]
    dimensions: Vec<Dimension>,
}

// Positions in serialized documents are advisory; order wins.
impl From<StructureRepr> for DataflowStructure {
    fn from(repr: StructureRepr) -> Self {
        DataflowStructure::new(repr.id, repr.dimensions)
    }
}

impl DataflowStructure {
    /// Creates a structure, renumbering dimension positions to match their order.
    pub fn new(id: impl Into<String>, dimensions: Vec<Dimension>) -> Self {
        let mut structure = Self {
            id: id.into(),
            dimensions,
        };
        structure.renumber();
        structure
    }

    fn renumber(&mut self) {
        for (position, dimension) in self.dimensions.iter_mut().enumerate() {
            dimension.position = position;
        }
    }

    /// The dimensions in structure order.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Looks up a dimension by its exact identifier.
    pub fn dimension(&self, id: &str) -> Result<&Dimension> {
        self.dimensions
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| {
                SdmxError::DimensionNotFound(format!(
                    "'{}' is not a dimension of structure '{}'",
                    id, self.id
                ))
            })
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.id == id)
    }

    pub fn measure_dimension(&self) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.is_measure())
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}
