use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Resource address -> attribute tree after the proposed change.
pub type PlanTree = BTreeMap<String, Value>;

/// Output name -> planned output value.
pub type TerraformOutput = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    NoOp,
    Forget,
    /// Any action string this crate does not know yet.
    #[serde(other)]
    Unknown,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "no-op" => Ok(Self::NoOp),
            "forget" => Ok(Self::Forget),
            _ => Err(format!("invalid action: {input}")),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(action_to_str(*self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub actions: Vec<Action>,
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
    #[serde(default)]
    pub after_unknown: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider_name: String,
    pub change: Change,
}

/// The subset of the `terraform show -json <planfile>` document the checks
/// rely on. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub terraform_version: String,
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    #[serde(default)]
    pub output_changes: BTreeMap<String, Change>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate resource address in plan: {0}")]
    DuplicateAddress(String),
}

pub fn decode_plan(raw: &str) -> Result<Plan, DecodeError> {
    let plan: Plan = serde_json::from_str(raw)?;

    let mut seen = BTreeSet::new();
    for resource in &plan.resource_changes {
        if !seen.insert(resource.address.as_str()) {
            return Err(DecodeError::DuplicateAddress(resource.address.clone()));
        }
    }

    Ok(plan)
}

impl Plan {
    pub fn tree(&self) -> PlanTree {
        self.resource_changes
            .iter()
            .map(|resource| (resource.address.clone(), resource.change.after.clone()))
            .collect()
    }

    pub fn output_values(&self) -> TerraformOutput {
        self.output_changes
            .iter()
            .map(|(name, change)| (name.clone(), change.after.clone()))
            .collect()
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceChange> {
        self.resource_changes
            .iter()
            .find(|resource| resource.address == address)
    }

    pub fn resource_count(&self) -> usize {
        self.resource_changes.len()
    }
}

pub fn action_to_str(action: Action) -> &'static str {
    match action {
        Action::Create => "create",
        Action::Read => "read",
        Action::Update => "update",
        Action::Delete => "delete",
        Action::NoOp => "no-op",
        Action::Forget => "forget",
        Action::Unknown => "unknown",
    }
}
