// Child process helper.
// Runs an external tool to completion, feeding stdin and honouring cancellation.

use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GhpickError, Result};

fn program_name(command: &Command) -> String {
    command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned()
}

/// Spawn `command`, write `input` to its stdin and wait for it to exit.
///
/// Stdout is always captured. The child is killed if `cancel` fires first.
pub async fn run(
    mut command: Command,
    input: Option<String>,
    cancel: &CancellationToken,
) -> Result<Output> {
    let program = program_name(&command);
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .kill_on_drop(true);

    debug!(%program, "spawning");
    let mut child = command.spawn().map_err(|e| GhpickError::Command {
        program: program.clone(),
        message: e.to_string(),
    })?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        // The child may exit before reading everything; a broken pipe is fine.
        tokio::spawn(async move {
            let _ = stdin.write_all(input.as_bytes()).await;
        });
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(GhpickError::Cancelled),
        output = child.wait_with_output() => output.map_err(|e| GhpickError::Command {
            program,
            message: e.to_string(),
        }),
    }
}

/// Stdout of a successful run, trimmed; a failed run becomes `Command`.
pub fn stdout_of(program: &str, output: Output) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or("no output");
        return Err(GhpickError::Command {
            program: program.to_string(),
            message: format!("{}: {}", output.status, detail),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
