//! # Constraint Translation
//!
//! Rewrites an attribute [`Filter`] into the provider's positional
//! constraint key: one slot per dimension in structure order, slots joined by
//! `.`, alternative codes within a slot joined by `+`, and `*` for a
//! dimension no predicate targets.
//!
//! ```text
//! MSTP = 'TOT' AND AGE = 'TOT' AND STATE = '1' AND REGIONTYPE = 'STE'
//!     AND REGION IN ('1', '2', '3', '4') AND FREQUENCY = 'A'
//!
//! => *.TOT.TOT.1.STE.1+2+3+4.A
//! ```
//!
//! Only conjunctions of per-dimension selections are expressible. Anything
//! else fails with [`SdmxError::UnsupportedFilter`] before the provider is
//! contacted, so a filter is never silently widened.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::{
    ALL_CODES, DIMENSION_SEPARATOR, DataflowStructure, Filter, OR_SEPARATOR, Result, SdmxError,
};

/// A positional constraint key, one slot per dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintExpression {
    slots: Vec<String>,
}

impl ConstraintExpression {
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when no slot constrains its dimension.
    pub fn is_unconstrained(&self) -> bool {
        self.slots.iter().all(|slot| slot == ALL_CODES)
    }
}

impl fmt::Display for ConstraintExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", DIMENSION_SEPARATOR)?;
            }
            write!(f, "{}", slot)?;
        }
        Ok(())
    }
}

/// The constraint selecting every series: one `*` per dimension.
pub fn all_constraint(structure: &DataflowStructure) -> ConstraintExpression {
    ConstraintExpression {
        slots: vec![ALL_CODES.to_string(); structure.len()],
    }
}

/// Translates `filter` into a constraint key for `structure`.
///
/// # Errors
///
/// [`SdmxError::UnsupportedFilter`] for negations, comparisons, `LIKE`,
/// `BETWEEN`, `EXCLUDE`, nested conjunctions, an `OR` across different
/// dimensions, a predicate on an attribute that is not a dimension, or a
/// dimension constrained twice.
///
/// # Examples
///
/// ```rust
/// use atrius_sdmx::{CodeList, DataflowStructure, Dimension, Filter, translate};
///
/// let structure = DataflowStructure::new(
///     "DSD",
///     vec![
///         Dimension::new("AGE", CodeList::new("CL_AGE")),
///         Dimension::new("STATE", CodeList::new("CL_STATE")),
///         Dimension::new("FREQUENCY", CodeList::new("CL_FREQ")),
///     ],
/// );
/// let filter = Filter::and([Filter::equals("FREQUENCY", "A"), Filter::is_in("STATE", ["1", "2"])]);
/// assert_eq!(translate(&filter, &structure).unwrap().to_string(), "*.1+2.A");
/// ```
pub fn translate(filter: &Filter, structure: &DataflowStructure) -> Result<ConstraintExpression> {
    let mut selections: Vec<Selection> = Vec::new();
    match filter {
        Filter::Include => {}
        Filter::And(items) => {
            for item in items {
                if let Some(selection) = selection_of(item)? {
                    selections.push(selection);
                }
            }
        }
        other => {
            if let Some(selection) = selection_of(other)? {
                selections.push(selection);
            }
        }
    }

    let mut by_dimension: HashMap<&str, Vec<&str>> = HashMap::new();
    for selection in &selections {
        if structure.position(selection.attribute).is_none() {
            return Err(SdmxError::UnsupportedFilter(format!(
                "'{}' is not a dimension of structure '{}'",
                selection.attribute, structure.id
            )));
        }
        for code in &selection.codes {
            validate_code(selection.attribute, code)?;
        }
        if by_dimension
            .insert(selection.attribute, selection.codes.clone())
            .is_some()
        {
            return Err(SdmxError::UnsupportedFilter(format!(
                "dimension '{}' is constrained by more than one predicate",
                selection.attribute
            )));
        }
    }

    let slots = structure
        .dimensions()
        .iter()
        .map(|dimension| match by_dimension.get(dimension.id.as_str()) {
            Some(codes) => codes.join(&OR_SEPARATOR.to_string()),
            None => ALL_CODES.to_string(),
        })
        .collect();

    let constraint = ConstraintExpression { slots };
    debug!("Translated filter [{}] into constraint {}", filter, constraint);
    Ok(constraint)
}

// Codes one predicate selects for one dimension.
struct Selection<'a> {
    attribute: &'a str,
    codes: Vec<&'a str>,
}

impl<'a> Selection<'a> {
    fn push(&mut self, code: &'a str) {
        if !self.codes.contains(&code) {
            self.codes.push(code);
        }
    }
}

fn selection_of(filter: &Filter) -> Result<Option<Selection<'_>>> {
    match filter {
        Filter::Include => Ok(None),
        Filter::Equals { attribute, value } => Ok(Some(Selection {
            attribute,
            codes: vec![value.as_str()],
        })),
        Filter::In { attribute, values } => {
            let mut selection = Selection {
                attribute,
                codes: Vec::new(),
            };
            for value in values {
                selection.push(value);
            }
            if selection.codes.is_empty() {
                return Err(unsupported(filter, "empty IN list"));
            }
            Ok(Some(selection))
        }
        Filter::Or(items) => {
            let mut selection: Option<Selection<'_>> = None;
            for item in items {
                let (attribute, codes): (&str, Vec<&str>) = match item {
                    Filter::Equals { attribute, value } => {
                        (attribute.as_str(), vec![value.as_str()])
                    }
                    Filter::In { attribute, values } => {
                        (attribute.as_str(), values.iter().map(String::as_str).collect())
                    }
                    _ => {
                        return Err(unsupported(
                            filter,
                            "OR may only combine equality predicates",
                        ));
                    }
                };
                let current = selection.get_or_insert_with(|| Selection {
                    attribute,
                    codes: Vec::new(),
                });
                if current.attribute != attribute {
                    return Err(unsupported(filter, "OR across different dimensions"));
                }
                for code in codes {
                    current.push(code);
                }
            }
            match selection {
                Some(selection) if !selection.codes.is_empty() => Ok(Some(selection)),
                _ => Err(unsupported(filter, "empty OR")),
            }
        }
        Filter::And(_) => Err(unsupported(filter, "nested AND")),
        Filter::Exclude => Err(unsupported(filter, "EXCLUDE selects nothing")),
        Filter::Not(_) => Err(unsupported(filter, "negation")),
        Filter::Compare { .. } => Err(unsupported(filter, "ordered comparison")),
        Filter::Like { .. } => Err(unsupported(filter, "pattern match")),
        Filter::Between { .. } => Err(unsupported(filter, "range")),
    }
}

fn validate_code(attribute: &str, code: &str) -> Result<()> {
    if code.is_empty()
        || code == ALL_CODES
        || code.contains(DIMENSION_SEPARATOR)
        || code.contains(OR_SEPARATOR)
    {
        return Err(SdmxError::UnsupportedFilter(format!(
            "code '{}' of dimension '{}' cannot appear in a constraint key",
            code, attribute
        )));
    }
    Ok(())
}

fn unsupported(filter: &Filter, reason: &str) -> SdmxError {
    SdmxError::UnsupportedFilter(format!("{} in [{}]", reason, filter))
}
