use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    expectation::{
        AttributeFormat, Expectations, FormatError, RawResourceAttribute, ResourceDescription,
    },
    fixture::UnitTestFixture,
};

/// How terraform is invoked for one fixture. Built once and shared by
/// reference with every command of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfOptions {
    pub terraform_binary: String,
    pub terraform_dir: PathBuf,
    pub vars: BTreeMap<String, Value>,
    pub var_files: Vec<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub upgrade: bool,
    pub no_color: bool,
}

impl Default for TfOptions {
    fn default() -> Self {
        Self {
            terraform_binary: "terraform".to_string(),
            terraform_dir: PathBuf::from("."),
            vars: BTreeMap::new(),
            var_files: Vec::new(),
            env: BTreeMap::new(),
            upgrade: false,
            no_color: true,
        }
    }
}

impl TfOptions {
    pub fn new(terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            terraform_dir: terraform_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json parse: {0}")]
    Json(#[from] serde_json::Error),
    #[error("raw attribute {address}.{attribute}: {source}")]
    Format {
        address: String,
        attribute: String,
        source: FormatError,
    },
    #[error("raw attribute {address}.{attribute} needs either `value` or `encoded`")]
    MissingRawValue { address: String, attribute: String },
}

/// A raw attribute as written in a config file: either an inline `value` or
/// an `encoded` document in `attribute_format`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAttributeConfig {
    pub resource_address: String,
    pub resource_attribute: String,
    #[serde(default)]
    pub attribute_format: AttributeFormat,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub encoded: Option<String>,
}

impl RawAttributeConfig {
    pub fn into_raw_attribute(self) -> Result<RawResourceAttribute, ConfigError> {
        if let Some(encoded) = &self.encoded {
            return RawResourceAttribute::from_encoded(
                &self.resource_address,
                &self.resource_attribute,
                self.attribute_format,
                encoded,
            )
            .map_err(|source| ConfigError::Format {
                address: self.resource_address.clone(),
                attribute: self.resource_attribute.clone(),
                source,
            });
        }

        match self.value {
            Some(value) => Ok(RawResourceAttribute::new(
                &self.resource_address,
                &self.resource_attribute,
                self.attribute_format,
                value,
            )),
            None => Err(ConfigError::MissingRawValue {
                address: self.resource_address,
                attribute: self.resource_attribute,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectationsConfig {
    pub expected_resource_count: Option<usize>,
    pub expected_attribute_values: ResourceDescription,
    pub expected_raw_attributes: Vec<RawAttributeConfig>,
}

impl ExpectationsConfig {
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn into_expectations(self) -> Result<Expectations, ConfigError> {
        let expected_raw_attributes = self
            .expected_raw_attributes
            .into_iter()
            .map(RawAttributeConfig::into_raw_attribute)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Expectations {
            expected_resource_count: self.expected_resource_count,
            expected_attribute_values: self.expected_attribute_values,
            expected_raw_attributes,
        })
    }
}

/// A unit fixture described in TOML, as run by `tfcheck run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub workspace: Option<String>,
    pub options: TfOptions,
    pub expected_resource_count: Option<usize>,
    pub expected_attribute_values: ResourceDescription,
    pub expected_raw_attributes: Vec<RawAttributeConfig>,
}

impl FixtureConfig {
    /// Loads a fixture file. A relative `terraform_dir` is resolved against
    /// the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        if config.options.terraform_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.options.terraform_dir = parent.join(&config.options.terraform_dir);
            }
        }

        Ok(config)
    }

    pub fn into_fixture(self) -> Result<UnitTestFixture, ConfigError> {
        let expectations = ExpectationsConfig {
            expected_resource_count: self.expected_resource_count,
            expected_attribute_values: self.expected_attribute_values,
            expected_raw_attributes: self.expected_raw_attributes,
        }
        .into_expectations()?;

        let mut fixture = UnitTestFixture::new(self.options).with_expectations(expectations);
        if let Some(workspace) = &self.workspace {
            fixture = fixture.with_workspace(workspace);
        }
        Ok(fixture)
    }
}
