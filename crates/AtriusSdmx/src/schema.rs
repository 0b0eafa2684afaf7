//! # Feature Schema Generation
//!
//! Derives the flat attribute schema of a dataflow from its dimension
//! structure.
//!
//! ## Column Layout
//!
//! - `geometry`: placeholder, always null
//! - `TIME_PERIOD`: observation period label (string)
//! - one string column per non-measure dimension, named after the dimension
//! - one double column per code of the `MEASURE` dimension, named
//!   `MEASURE_<code>`, in code-list order
//! - `OBS_VALUE` (double) when the structure has no `MEASURE` dimension
//!
//! Building is idempotent: the same structure always yields the same
//! columns.

use serde::Serialize;
use tracing::debug;

use crate::{
    CODE_ATTR, DESCRIPTION_ATTR, DataflowStructure, GEOMETRY_ATTR, MEASURE_DIMENSION,
    MEASURE_SEPARATOR, OBS_VALUE_ATTR, Result, SdmxError, TIME_ATTR,
};

/// Value type bound to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    Geometry,
    String,
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub binding: AttributeType,
}

impl AttributeDescriptor {
    fn new(name: impl Into<String>, binding: AttributeType) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }
}

/// Ordered attribute schema of one logical feature type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    name: String,
    attributes: Vec<AttributeDescriptor>,
}

impl FeatureSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> Option<&AttributeDescriptor> {
        self.attributes.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn geometry_attribute(&self) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.binding == AttributeType::Geometry)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Column name of a measure code.
pub fn measure_column_name(code: &str) -> String {
    format!("{}{}{}", MEASURE_DIMENSION, MEASURE_SEPARATOR, code)
}

/// Builds the feature schema of `type_name` from a dimension structure.
///
/// # Errors
///
/// [`SdmxError::SchemaBuildFailed`] when the `MEASURE` dimension has no
/// resolvable code list, since its codes define the numeric columns.
pub fn build_schema(type_name: &str, structure: &DataflowStructure) -> Result<FeatureSchema> {
    let mut attributes = vec![
        AttributeDescriptor::new(GEOMETRY_ATTR, AttributeType::Geometry),
        AttributeDescriptor::new(TIME_ATTR, AttributeType::String),
    ];

    for dimension in structure.dimensions() {
        if dimension.is_measure() {
            let codes = dimension
                .code_list()
                .filter(|list| !list.is_empty())
                .ok_or_else(|| {
                    SdmxError::SchemaBuildFailed(format!(
                        "code list of dimension '{}' in '{}' could not be resolved",
                        dimension.id, type_name
                    ))
                })?;
            for code in codes.iter() {
                attributes.push(AttributeDescriptor::new(
                    measure_column_name(&code.code),
                    AttributeType::Double,
                ));
            }
        } else {
            attributes.push(AttributeDescriptor::new(&dimension.id, AttributeType::String));
        }
    }

    if structure.measure_dimension().is_none() {
        attributes.push(AttributeDescriptor::new(OBS_VALUE_ATTR, AttributeType::Double));
    }

    debug!(
        "Built schema for '{}' with {} attributes",
        type_name,
        attributes.len()
    );

    Ok(FeatureSchema {
        name: type_name.to_string(),
        attributes,
    })
}

/// The fixed schema of dimension code-list features: geometry, code, label.
pub fn code_list_schema(type_name: &str) -> FeatureSchema {
    FeatureSchema {
        name: type_name.to_string(),
        attributes: vec![
            AttributeDescriptor::new(GEOMETRY_ATTR, AttributeType::Geometry),
            AttributeDescriptor::new(CODE_ATTR, AttributeType::String),
            AttributeDescriptor::new(DESCRIPTION_ATTR, AttributeType::String),
        ],
    }
}
