//! External executable runner
//!
//! The cutter and tagger are opaque command-line tools. They run on the
//! blocking pool so a long cut does not stall the async workers.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// Failure of an external tool invocation
#[derive(Debug, Error)]
pub enum ToolError {
    /// Executable not found in PATH
    #[error("{0} not found in PATH")]
    BinaryNotFound(String),

    /// Process could not be spawned or joined
    #[error("failed to execute {program}: {detail}")]
    ExecutionError { program: String, detail: String },

    /// Process ran but exited unsuccessfully
    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ToolError {
    pub fn program(&self) -> &str {
        match self {
            ToolError::BinaryNotFound(program) => program,
            ToolError::ExecutionError { program, .. } => program,
            ToolError::Failed { program, .. } => program,
        }
    }
}

impl From<ToolError> for mixcut_common::Error {
    fn from(err: ToolError) -> Self {
        mixcut_common::Error::Subprocess {
            program: err.program().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Run `program args..` in `cwd` and wait for it
///
/// Stdout is discarded; stderr is returned in the error on failure.
pub async fn run_tool(program: &str, args: Vec<String>, cwd: Option<&Path>) -> Result<(), ToolError> {
    let cwd: Option<PathBuf> = cwd.map(Path::to_path_buf);

    tracing::debug!(program, ?args, cwd = ?cwd, "Running external tool");

    let output = tokio::task::spawn_blocking({
        let program = program.to_string();
        move || {
            let mut command = Command::new(&program);
            command.args(&args);
            if let Some(dir) = &cwd {
                command.current_dir(dir);
            }
            command.output()
        }
    })
    .await
    .map_err(|e| ToolError::ExecutionError {
        program: program.to_string(),
        detail: format!("Task join error: {}", e),
    })?
    .map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ToolError::BinaryNotFound(program.to_string()),
        _ => ToolError::ExecutionError {
            program: program.to_string(),
            detail: e.to_string(),
        },
    })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
