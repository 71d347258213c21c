use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::{
    expectation::{FormatError, RawResourceAttribute, ResourceDescription, normalize},
    plan::PlanTree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    MissingKey,
    TypeMismatch,
    LengthMismatch,
    ValueMismatch,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingKey => "missing key",
            Self::TypeMismatch => "type mismatch",
            Self::LengthMismatch => "length mismatch",
            Self::ValueMismatch => "value mismatch",
        };
        f.write_str(text)
    }
}

/// The first place where the plan disagrees with an expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub path: String,
    pub kind: MismatchKind,
    /// `None` when the key is absent from the plan.
    pub actual: Option<Value>,
    pub expected: Value,
}

impl Mismatch {
    fn new(path: &str, kind: MismatchKind, actual: Option<&Value>, expected: &Value) -> Self {
        Self {
            path: path.to_string(),
            kind,
            actual: actual.cloned(),
            expected: expected.clone(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "{} at {}: actual={}, expected={}",
                self.kind, self.path, actual, self.expected
            ),
            None => write!(
                f,
                "{} at {}: actual=<absent>, expected={}",
                self.kind, self.path, self.expected
            ),
        }
    }
}

impl std::error::Error for Mismatch {}

#[derive(Debug, Error)]
pub enum SubsetError {
    #[error(transparent)]
    Mismatch(#[from] Mismatch),
    #[error("{path}: raw attribute must be a string in the plan, found {found}")]
    NotAString { path: String, found: Value },
    #[error("{path}: could not decode {format} document: {source}")]
    Format {
        path: String,
        format: String,
        source: FormatError,
    },
}

/// Checks that `expected` is a structural subset of `actual`.
///
/// Mappings may carry extra keys in `actual`; sequences are compared
/// position by position and must have the same length; numbers compare by
/// value. Only the paths present in `expected` are visited. Returns the first
/// mismatch found, depth first.
pub fn matches(actual: &Value, expected: &Value, path: &str) -> Option<Mismatch> {
    match expected {
        Value::Object(expected_map) => {
            let Value::Object(actual_map) = actual else {
                return Some(Mismatch::new(
                    path,
                    MismatchKind::TypeMismatch,
                    Some(actual),
                    expected,
                ));
            };

            for (key, expected_value) in expected_map {
                let child = join_key(path, key);
                let Some(actual_value) = actual_map.get(key) else {
                    return Some(Mismatch::new(
                        &child,
                        MismatchKind::MissingKey,
                        None,
                        expected_value,
                    ));
                };
                if let Some(mismatch) = matches(actual_value, expected_value, &child) {
                    return Some(mismatch);
                }
            }
            None
        }
        Value::Array(expected_items) => {
            let Value::Array(actual_items) = actual else {
                return Some(Mismatch::new(
                    path,
                    MismatchKind::TypeMismatch,
                    Some(actual),
                    expected,
                ));
            };

            if actual_items.len() != expected_items.len() {
                return Some(Mismatch::new(
                    path,
                    MismatchKind::LengthMismatch,
                    Some(actual),
                    expected,
                ));
            }

            actual_items
                .iter()
                .zip(expected_items)
                .enumerate()
                .find_map(|(index, (actual_item, expected_item))| {
                    matches(actual_item, expected_item, &format!("{path}[{index}]"))
                })
        }
        Value::Number(expected_number) => match actual {
            Value::Number(actual_number) if numbers_equal(actual_number, expected_number) => None,
            Value::Number(_) => Some(Mismatch::new(
                path,
                MismatchKind::ValueMismatch,
                Some(actual),
                expected,
            )),
            _ => Some(Mismatch::new(
                path,
                MismatchKind::TypeMismatch,
                Some(actual),
                expected,
            )),
        },
        Value::String(_) | Value::Bool(_) | Value::Null => {
            if value_kind(actual) != value_kind(expected) {
                Some(Mismatch::new(
                    path,
                    MismatchKind::TypeMismatch,
                    Some(actual),
                    expected,
                ))
            } else if actual != expected {
                Some(Mismatch::new(
                    path,
                    MismatchKind::ValueMismatch,
                    Some(actual),
                    expected,
                ))
            } else {
                None
            }
        }
    }
}

/// Matches every expected resource against the plan, in address order.
pub fn match_plan_tree(actual: &PlanTree, expected: &PlanTree) -> Result<(), Mismatch> {
    for (address, expected_value) in expected {
        let Some(actual_value) = actual.get(address) else {
            return Err(Mismatch::new(
                address,
                MismatchKind::MissingKey,
                None,
                expected_value,
            ));
        };
        if let Some(mismatch) = matches(actual_value, expected_value, address) {
            return Err(mismatch);
        }
    }
    Ok(())
}

pub fn match_raw_attribute(
    actual: &PlanTree,
    raw: &RawResourceAttribute,
) -> Result<(), SubsetError> {
    let path = raw.path();

    let Some(resource) = actual.get(&raw.resource_address) else {
        return Err(Mismatch::new(
            &raw.resource_address,
            MismatchKind::MissingKey,
            None,
            &raw.value,
        )
        .into());
    };
    let Some(attribute) = resource.get(&raw.resource_attribute) else {
        return Err(Mismatch::new(&path, MismatchKind::MissingKey, None, &raw.value).into());
    };
    let Value::String(encoded) = attribute else {
        return Err(SubsetError::NotAString {
            path,
            found: attribute.clone(),
        });
    };

    let decoded = raw
        .attribute_format
        .decode(encoded)
        .map_err(|source| SubsetError::Format {
            path: path.clone(),
            format: raw.attribute_format.to_string(),
            source,
        })?;

    match matches(&decoded, &raw.value, &path) {
        Some(mismatch) => Err(mismatch.into()),
        None => Ok(()),
    }
}

/// Attribute values first, then raw attributes in declaration order.
pub fn verify_expectations(
    actual: &PlanTree,
    description: &ResourceDescription,
    raw_attributes: &[RawResourceAttribute],
) -> Result<(), SubsetError> {
    match_plan_tree(actual, &normalize(description))?;
    for raw in raw_attributes {
        match_raw_attribute(actual, raw)?;
    }
    Ok(())
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        return key.to_string();
    }
    format!("{path}.{key}")
}

fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        return left == right;
    }
    if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
        return left == right;
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
