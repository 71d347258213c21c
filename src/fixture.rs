use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::TfOptions,
    expectation::Expectations,
    matcher::verify_expectations,
    plan::{DecodeError, Plan, decode_plan},
    policy::{check_no_deletes, check_not_empty, check_resource_count},
    terraform::{CommandError, TerraformRunner, format_args},
    workspace::{WorkspaceError, WorkspaceSession, WorkspaceState},
};

pub const DEFAULT_WORKSPACE: &str = "default-unit-testing";

pub const CHECK_NOT_EMPTY: &str = "Terraform Plan Is Not Empty";
pub const CHECK_RESOURCE_COUNT: &str = "Terraform Plan Output Count";
pub const CHECK_NOT_DESTRUCTIVE: &str = "Terraform Plan Is Not Destructive";
pub const CHECK_KEY_VALUES: &str = "Terraform Plan Key Values";

pub type PlanAssertion = Box<dyn Fn(&Plan) -> Result<(), String>>;

/// Receives the plan command's output and, when it failed, its error.
pub type CommandOutputAssertion = Box<dyn Fn(&str, Option<&CommandError>) -> Result<(), String>>;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("terraform init: {0}")]
    Init(CommandError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("terraform plan: {0}")]
    Command(CommandError),
    #[error("plan file: {0}")]
    PlanFile(std::io::Error),
    #[error("terraform show: {0}")]
    Show(CommandError),
    #[error("decode plan: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub status: CheckStatus,
}

impl CheckOutcome {
    pub fn from_result<E: fmt::Display>(name: &str, result: Result<(), E>) -> Self {
        let status = match result {
            Ok(()) => CheckStatus::Passed,
            Err(error) => {
                warn!(check = name, error = %error, "check failed");
                CheckStatus::Failed(error.to_string())
            }
        };
        Self {
            name: name.to_string(),
            status,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTestReport {
    pub workspace: Option<WorkspaceState>,
    pub checks: Vec<CheckOutcome>,
    pub cleanup_warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureFailure {
    pub failures: Vec<CheckOutcome>,
}

impl fmt::Display for FixtureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} check(s) failed", self.failures.len())?;
        for outcome in &self.failures {
            if let CheckStatus::Failed(message) = &outcome.status {
                write!(f, "\n- {}: {}", outcome.name, message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FixtureFailure {}

impl UnitTestReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }

    pub fn failures(&self) -> Vec<&CheckOutcome> {
        self.checks.iter().filter(|check| !check.passed()).collect()
    }

    pub fn check(&self, name: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn into_result(self) -> Result<(), FixtureFailure> {
        let failures = self
            .checks
            .into_iter()
            .filter(|check| !check.passed())
            .collect::<Vec<_>>();
        if failures.is_empty() {
            return Ok(());
        }
        Err(FixtureFailure { failures })
    }

    /// Panics listing every failed check. Meant to be the last line of a
    /// `#[test]`.
    #[track_caller]
    pub fn assert_passed(&self) {
        if let Err(failure) = self.clone().into_result() {
            panic!("{failure}");
        }
    }

    fn record<E: fmt::Display>(&mut self, name: &str, result: Result<(), E>) {
        self.checks.push(CheckOutcome::from_result(name, result));
    }
}

/// Everything needed to unit test one template directory. Consumed by
/// [`UnitTestFixture::run`].
pub struct UnitTestFixture {
    pub options: TfOptions,
    pub workspace: Option<String>,
    pub expectations: Expectations,
    pub plan_assertions: Vec<PlanAssertion>,
    pub command_output_assertions: Vec<CommandOutputAssertion>,
}

impl UnitTestFixture {
    pub fn new(options: TfOptions) -> Self {
        Self {
            options,
            workspace: None,
            expectations: Expectations::default(),
            plan_assertions: Vec::new(),
            command_output_assertions: Vec::new(),
        }
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }

    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.expectations = expectations;
        self
    }

    pub fn with_plan_assertion(
        mut self,
        assertion: impl Fn(&Plan) -> Result<(), String> + 'static,
    ) -> Self {
        self.plan_assertions.push(Box::new(assertion));
        self
    }

    pub fn with_command_output_assertion(
        mut self,
        assertion: impl Fn(&str, Option<&CommandError>) -> Result<(), String> + 'static,
    ) -> Self {
        self.command_output_assertions.push(Box::new(assertion));
        self
    }

    pub fn target_workspace(&self) -> &str {
        self.workspace.as_deref().unwrap_or(DEFAULT_WORKSPACE)
    }

    /// Runs `init`, switches to the target workspace, plans and verifies.
    ///
    /// Setup failures (init, workspace switch, a failing plan without output
    /// assertions, show/decode) are returned as errors. Check failures are
    /// recorded in the report. The starting workspace is restored on every
    /// path. Workspace cleanup failures land in `cleanup_warnings`; when the
    /// run itself returns an error they are only logged.
    pub fn run<R: TerraformRunner>(self, runner: &mut R) -> Result<UnitTestReport, FixtureError> {
        let options = &self.options;

        info!(dir = %options.terraform_dir.display(), "terraform init");
        runner
            .run(options, &format_args(options, &["init", "-input=false"]))
            .map_err(FixtureError::Init)?;

        let mut session = WorkspaceSession::enter(runner, options, self.target_workspace())?;
        let outcome = self.plan_and_verify(&mut session);
        let cleanup = session.close();

        let mut report = outcome?;
        report.workspace = session.state();
        report.cleanup_warnings = cleanup.iter().map(ToString::to_string).collect();
        Ok(report)
    }

    fn plan_and_verify<R: TerraformRunner>(
        &self,
        session: &mut WorkspaceSession<'_, R>,
    ) -> Result<UnitTestReport, FixtureError> {
        let options = &self.options;
        let plan_dir = tempfile::Builder::new()
            .prefix("tfcheck-")
            .tempdir()
            .map_err(FixtureError::PlanFile)?;
        let plan_path = plan_dir.path().join(format!("{}.plan", Uuid::new_v4()));
        let plan_path = plan_path.to_string_lossy().into_owned();

        let planned = session.runner().run(
            options,
            &format_args(options, &["plan", "-input=false", "-out", &plan_path]),
        );
        let (output, error) = match planned {
            Ok(output) => (output, None),
            Err(error) => (error.output().to_string(), Some(error)),
        };

        let mut report = UnitTestReport::default();
        if self.command_output_assertions.is_empty() {
            if let Some(error) = error {
                return Err(FixtureError::Command(error));
            }
        } else {
            for (index, assertion) in self.command_output_assertions.iter().enumerate() {
                let name = format!("Command Output Validation ({index})");
                report.record(&name, assertion(&output, error.as_ref()));
            }
            if error.is_some() {
                info!("plan failed; skipping plan checks");
                return Ok(report);
            }
        }

        let shown = session
            .runner()
            .run(options, &format_args(options, &["show", "-json", &plan_path]))
            .map_err(FixtureError::Show)?;
        let plan = decode_plan(&shown)?;
        info!(resources = plan.resource_count(), "plan decoded");

        report.checks.extend(verify_plan(&plan, &self.expectations));
        for (index, assertion) in self.plan_assertions.iter().enumerate() {
            let name = format!("Custom Validation Function ({index})");
            report.record(&name, assertion(&plan));
        }

        Ok(report)
    }
}

/// Runs the built-in checks against a decoded plan. Each check is reported
/// on its own; a failure never hides the others.
pub fn verify_plan(plan: &Plan, expectations: &Expectations) -> Vec<CheckOutcome> {
    let mut checks = vec![CheckOutcome::from_result(
        CHECK_NOT_EMPTY,
        check_not_empty(plan),
    )];

    if let Some(expected) = expectations.expected_resource_count {
        checks.push(CheckOutcome::from_result(
            CHECK_RESOURCE_COUNT,
            check_resource_count(plan, expected),
        ));
    }

    checks.push(CheckOutcome::from_result(
        CHECK_NOT_DESTRUCTIVE,
        check_no_deletes(plan),
    ));
    checks.push(CheckOutcome::from_result(
        CHECK_KEY_VALUES,
        verify_expectations(
            &plan.tree(),
            &expectations.expected_attribute_values,
            &expectations.expected_raw_attributes,
        ),
    ));

    checks
}
