use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::TfOptions,
    terraform::{CommandError, TerraformRunner, format_args},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStage {
    Initial,
    Switched,
    Cleaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub starting: String,
    pub target: String,
}

impl WorkspaceState {
    /// Terraform refuses to delete the selected workspace, so a run that
    /// started in its own target workspace leaves it in place.
    pub fn deletes_target(&self) -> bool {
        self.starting != self.target
    }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace show: {0}")]
    Show(CommandError),
    #[error("workspace list: {0}")]
    List(CommandError),
    #[error("workspace select {name}: {source}")]
    Select { name: String, source: CommandError },
    #[error("workspace new {name}: {source}")]
    Create { name: String, source: CommandError },
    #[error("workspace delete {name}: {source}")]
    Delete { name: String, source: CommandError },
}

/// Moves terraform into an isolated workspace for the duration of a run.
///
/// `switch` records the active workspace and selects (or creates) the
/// target. `close` selects the starting workspace again and deletes the
/// target unless it is the starting one. Dropping a switched session closes
/// it, so every exit path restores the workspace.
pub struct WorkspaceSession<'a, R: TerraformRunner> {
    runner: &'a mut R,
    options: &'a TfOptions,
    target: String,
    starting: Option<String>,
    stage: WorkspaceStage,
}

impl<'a, R: TerraformRunner> WorkspaceSession<'a, R> {
    pub fn new(runner: &'a mut R, options: &'a TfOptions, target: &str) -> Self {
        Self {
            runner,
            options,
            target: target.to_string(),
            starting: None,
            stage: WorkspaceStage::Initial,
        }
    }

    pub fn enter(
        runner: &'a mut R,
        options: &'a TfOptions,
        target: &str,
    ) -> Result<Self, WorkspaceError> {
        let mut session = Self::new(runner, options, target);
        session.switch()?;
        Ok(session)
    }

    pub fn switch(&mut self) -> Result<(), WorkspaceError> {
        if self.stage != WorkspaceStage::Initial {
            return Ok(());
        }

        let shown = self
            .runner
            .run(self.options, &format_args(self.options, &["workspace", "show"]))
            .map_err(WorkspaceError::Show)?;
        let starting = shown.trim().to_string();

        select_or_create(&mut *self.runner, self.options, &self.target)?;

        info!(starting = %starting, target = %self.target, "switched terraform workspace");
        self.starting = Some(starting);
        self.stage = WorkspaceStage::Switched;
        Ok(())
    }

    /// Restores the starting workspace and deletes the target. Runs once;
    /// failures are logged and returned without stopping the remaining step.
    pub fn close(&mut self) -> Vec<WorkspaceError> {
        if self.stage != WorkspaceStage::Switched {
            return Vec::new();
        }
        self.stage = WorkspaceStage::Cleaned;

        let Some(state) = self.state() else {
            return Vec::new();
        };

        let mut failures = Vec::new();
        if let Err(error) = select_or_create(&mut *self.runner, self.options, &state.starting) {
            failures.push(error);
        }

        if state.deletes_target() {
            let args = format_args(self.options, &["workspace", "delete", &state.target]);
            if let Err(source) = self.runner.run(self.options, &args) {
                failures.push(WorkspaceError::Delete {
                    name: state.target.clone(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            info!(restored = %state.starting, "terraform workspace cleaned up");
        }
        for failure in &failures {
            warn!(error = %failure, "workspace cleanup failed");
        }
        failures
    }

    pub fn stage(&self) -> WorkspaceStage {
        self.stage
    }

    pub fn state(&self) -> Option<WorkspaceState> {
        self.starting.as_ref().map(|starting| WorkspaceState {
            starting: starting.clone(),
            target: self.target.clone(),
        })
    }

    pub fn runner(&mut self) -> &mut R {
        &mut *self.runner
    }
}

impl<R: TerraformRunner> Drop for WorkspaceSession<'_, R> {
    fn drop(&mut self) {
        self.close();
    }
}

pub fn parse_workspace_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn select_or_create<R: TerraformRunner>(
    runner: &mut R,
    options: &TfOptions,
    name: &str,
) -> Result<(), WorkspaceError> {
    let listing = runner
        .run(options, &format_args(options, &["workspace", "list"]))
        .map_err(WorkspaceError::List)?;

    if parse_workspace_list(&listing).iter().any(|listed| listed == name) {
        runner
            .run(options, &format_args(options, &["workspace", "select", name]))
            .map_err(|source| WorkspaceError::Select {
                name: name.to_string(),
                source,
            })?;
    } else {
        runner
            .run(options, &format_args(options, &["workspace", "new", name]))
            .map_err(|source| WorkspaceError::Create {
                name: name.to_string(),
                source,
            })?;
    }
    Ok(())
}
