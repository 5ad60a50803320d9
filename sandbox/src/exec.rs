//! Exec plumbing: run one command inside the container, optionally feeding
//! bytes to its stdin, and collect demultiplexed stdout/stderr.

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default)]
pub(crate) struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
}

/// Creates an exec instance for `sh -c <command>` and returns its id.
pub(crate) async fn create(
    docker: &Docker,
    container_id: &str,
    command: &str,
    attach_stdin: bool,
) -> Result<String, bollard::errors::Error> {
    let exec = docker
        .create_exec(
            container_id,
            CreateExecOptions {
                cmd: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    command.to_string(),
                ]),
                attach_stdin: Some(attach_stdin),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                ..Default::default()
            },
        )
        .await?;
    Ok(exec.id)
}

/// Starts a created exec, writes `stdin` (then closes it), drains both output
/// streams and reads the exit code.
pub(crate) async fn attach_and_collect(
    docker: &Docker,
    exec_id: &str,
    stdin: Option<&[u8]>,
) -> Result<ExecOutput, bollard::errors::Error> {
    let mut collected = ExecOutput::default();
    match docker.start_exec(exec_id, None).await? {
        StartExecResults::Attached { mut output, mut input } => {
            if let Some(bytes) = stdin {
                // The command may exit without reading its input; a broken
                // pipe here is not an execution failure.
                let _ = input.write_all(bytes).await;
                let _ = input.shutdown().await;
            }
            drop(input);
            while let Some(chunk) = output.next().await {
                match chunk? {
                    LogOutput::StdOut { message } => {
                        collected.stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    LogOutput::StdErr { message } => {
                        collected.stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    _ => {}
                }
            }
        }
        StartExecResults::Detached => {}
    }
    let inspect = docker.inspect_exec(exec_id).await?;
    collected.exit_code = inspect.exit_code;
    Ok(collected)
}

/// Convenience wrapper: create, run to completion, collect.
pub(crate) async fn run(
    docker: &Docker,
    container_id: &str,
    command: &str,
    stdin: Option<&[u8]>,
) -> Result<ExecOutput, bollard::errors::Error> {
    let exec_id = create(docker, container_id, command, stdin.is_some()).await?;
    attach_and_collect(docker, &exec_id, stdin).await
}
