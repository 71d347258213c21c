use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::plan::PlanTree;

/// Resource address -> the attributes a test cares about. Attributes left out
/// are not checked.
pub type ResourceDescription = BTreeMap<String, Map<String, Value>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for AttributeFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!("invalid attribute format: {input}")),
        }
    }
}

impl fmt::Display for AttributeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("expected a mapping, found {0}")]
    NotAMapping(String),
}

impl AttributeFormat {
    pub fn decode(self, text: &str) -> Result<Value, FormatError> {
        match self {
            Self::Json => Ok(serde_json::from_str(text)?),
            Self::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }
}

/// An attribute whose plan value is a serialized document. The plan string is
/// decoded under `attribute_format` and compared structurally against `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResourceAttribute {
    pub resource_address: String,
    pub resource_attribute: String,
    #[serde(default)]
    pub attribute_format: AttributeFormat,
    pub value: Value,
}

impl RawResourceAttribute {
    pub fn new(
        resource_address: &str,
        resource_attribute: &str,
        attribute_format: AttributeFormat,
        value: Value,
    ) -> Self {
        Self {
            resource_address: resource_address.to_string(),
            resource_attribute: resource_attribute.to_string(),
            attribute_format,
            value,
        }
    }

    pub fn from_encoded(
        resource_address: &str,
        resource_attribute: &str,
        attribute_format: AttributeFormat,
        encoded: &str,
    ) -> Result<Self, FormatError> {
        let value = attribute_format.decode(encoded)?;
        Ok(Self::new(
            resource_address,
            resource_attribute,
            attribute_format,
            value,
        ))
    }

    pub fn path(&self) -> String {
        format!("{}.{}", self.resource_address, self.resource_attribute)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expectations {
    /// `None` leaves the resource count unchecked, so a fixture without a
    /// count passes whatever the plan size.
    pub expected_resource_count: Option<usize>,
    pub expected_attribute_values: ResourceDescription,
    pub expected_raw_attributes: Vec<RawResourceAttribute>,
}

impl Expectations {
    pub fn with_resource_count(mut self, count: usize) -> Self {
        self.expected_resource_count = Some(count);
        self
    }

    pub fn with_attributes(mut self, address: &str, attributes: Map<String, Value>) -> Self {
        self.expected_attribute_values
            .insert(address.to_string(), attributes);
        self
    }

    pub fn with_raw_attribute(mut self, raw: RawResourceAttribute) -> Self {
        self.expected_raw_attributes.push(raw);
        self
    }
}

pub fn normalize(description: &ResourceDescription) -> PlanTree {
    description
        .iter()
        .map(|(address, attributes)| (address.clone(), Value::Object(attributes.clone())))
        .collect()
}

/// Parses a JSON object literal into an attribute mapping.
pub fn parse_attributes(json: &str) -> Result<Map<String, Value>, FormatError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        other => Err(FormatError::NotAMapping(other.to_string())),
    }
}
