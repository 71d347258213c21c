use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::config::TfOptions;

/// Subcommands that accept `-var` / `-var-file`.
const VAR_COMMANDS: [&str; 6] = ["plan", "apply", "destroy", "refresh", "import", "console"];

const NO_COLOR_COMMANDS: [&str; 5] = ["init", "plan", "apply", "destroy", "show"];

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("`{command}` failed ({status}): {output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },
}

impl CommandError {
    /// Whatever the command printed before failing.
    pub fn output(&self) -> &str {
        match self {
            Self::Spawn { .. } => "",
            Self::Failed { output, .. } => output,
        }
    }
}

/// Runs one terraform invocation and returns its stdout.
///
/// Arguments arrive fully formatted (see [`format_args`]); implementations
/// must run in `options.terraform_dir` and wait for the process to exit.
pub trait TerraformRunner {
    fn run(&mut self, options: &TfOptions, args: &[String]) -> Result<String, CommandError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTerraform;

impl TerraformRunner for SystemTerraform {
    fn run(&mut self, options: &TfOptions, args: &[String]) -> Result<String, CommandError> {
        let command = render_command(&options.terraform_binary, args);
        debug!(
            command = %command,
            dir = %options.terraform_dir.display(),
            "running terraform"
        );

        let output = Command::new(&options.terraform_binary)
            .args(args)
            .current_dir(&options.terraform_dir)
            .envs(&options.env)
            .env("TF_IN_AUTOMATION", "1")
            .output()
            .map_err(|source| CommandError::Spawn {
                binary: options.terraform_binary.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CommandError::Failed {
            command,
            status: output.status.to_string(),
            output: format!("{stdout}{stderr}"),
        })
    }
}

/// Adds the option-driven flags to a subcommand. Flags go right after the
/// subcommand so trailing positional arguments stay last.
pub fn format_args(options: &TfOptions, args: &[&str]) -> Vec<String> {
    let Some((command, rest)) = args.split_first() else {
        return Vec::new();
    };

    let mut formatted = vec![command.to_string()];

    if *command == "init" && options.upgrade {
        formatted.push("-upgrade=true".to_string());
    }

    if VAR_COMMANDS.contains(command) {
        for file in &options.var_files {
            formatted.push(format!("-var-file={}", file.display()));
        }
        for (name, value) in &options.vars {
            formatted.push("-var".to_string());
            formatted.push(format!("{name}={}", render_var(value)));
        }
    }

    if options.no_color && NO_COLOR_COMMANDS.contains(command) {
        formatted.push("-no-color".to_string());
    }

    formatted.extend(rest.iter().map(ToString::to_string));
    formatted
}

fn render_var(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn render_command(binary: &str, args: &[String]) -> String {
    let mut parts = vec![binary.to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}
