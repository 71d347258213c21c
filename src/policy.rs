use thiserror::Error;

use crate::plan::{Action, Plan};

/// Unit tests run against fresh infrastructure, so anything beyond creating
/// or reading resources means the template would touch existing state.
pub const ALLOWED_ACTIONS: [Action; 2] = [Action::Create, Action::Read];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("plan diff was unexpectedly empty")]
    EmptyPlan,
    #[error("plan unexpectedly had {actual} resources instead of {expected}")]
    CountMismatch { actual: usize, expected: usize },
    #[error("plan unexpectedly has action `{action}` for {address}; only create and read are allowed")]
    DestructiveAction { address: String, action: Action },
}

pub fn check_not_empty(plan: &Plan) -> Result<(), PolicyError> {
    if plan.resource_changes.is_empty() {
        return Err(PolicyError::EmptyPlan);
    }
    Ok(())
}

pub fn check_resource_count(plan: &Plan, expected: usize) -> Result<(), PolicyError> {
    let actual = plan.resource_count();
    if actual != expected {
        return Err(PolicyError::CountMismatch { actual, expected });
    }
    Ok(())
}

pub fn check_no_deletes(plan: &Plan) -> Result<(), PolicyError> {
    for resource in &plan.resource_changes {
        if let Some(action) = resource
            .change
            .actions
            .iter()
            .find(|action| !ALLOWED_ACTIONS.contains(action))
        {
            return Err(PolicyError::DestructiveAction {
                address: resource.address.clone(),
                action: *action,
            });
        }
    }
    Ok(())
}
