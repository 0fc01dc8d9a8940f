//! Child process supervision
//!
//! One supervisor task per launched process: it creates the output sinks,
//! spawns the child, pipes stdout/stderr into the sinks, and waits for
//! natural exit or a cancellation signal. Whatever happens, it finishes by
//! recording the stop time on the registry entry; completion is the sole
//! writer of that field.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::fs;
use tokio::io;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::registry::{ProcessRecord, Registry};

/// How a cancellation request is delivered to a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Send one interrupt (SIGINT, the Ctrl-C signal) and stop waiting.
    /// Never escalates to a kill: a process that ignores the interrupt
    /// keeps running.
    #[default]
    CooperativeOnly,
}

/// Launch parameters carried from a decoded request to the supervisor
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    pub executable: String,
    pub working_directory: String,
    pub arguments: Vec<String>,
}

/// Supervise one external process from spawn to completion.
///
/// Long-lived background task; the connection server spawns it and never
/// awaits it. A spawn failure is not reported to the requesting client (the
/// launch response has already been sent); it shows up as a record whose
/// stop time is set almost immediately.
pub async fn supervise(
    registry: Registry,
    record: ProcessRecord,
    command: LaunchCommand,
    output_dir: PathBuf,
    policy: CancelPolicy,
) {
    let id = record.id;
    if let Err(e) = run(&record, &command, &output_dir, policy).await {
        warn!(
            "Process {} ({}) failed before completion: {}",
            id, command.executable, e
        );
    }
    registry.mark_stopped(id);
}

async fn run(
    record: &ProcessRecord,
    command: &LaunchCommand,
    output_dir: &Path,
    policy: CancelPolicy,
) -> io::Result<()> {
    fs::create_dir_all(output_dir).await?;
    // Timestamp plus id keeps concurrent runs from colliding
    let stem = format!(
        "{}_{}",
        record.start_time.format("%Y-%m-%d_%H-%M"),
        record.id
    );
    let mut stdout_sink = fs::File::create(output_dir.join(format!("{stem}_output.txt"))).await?;
    let mut stderr_sink = fs::File::create(output_dir.join(format!("{stem}_error.txt"))).await?;

    let mut child = Command::new(&command.executable)
        .args(&command.arguments)
        .current_dir(&command.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    info!("Launched process {} ({})", record.id, command.executable);

    let stdout_pipe = child.stdout.take();
    let stdout_task = tokio::spawn(async move {
        if let Some(mut pipe) = stdout_pipe {
            let _ = io::copy(&mut pipe, &mut stdout_sink).await;
        }
    });
    let stderr_pipe = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        if let Some(mut pipe) = stderr_pipe {
            let _ = io::copy(&mut pipe, &mut stderr_sink).await;
        }
    });

    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => info!("Process {} exited with {}", record.id, status),
                Err(e) => warn!("Failed to wait on process {}: {}", record.id, e),
            }
            // Drain whatever is left in the pipes before finishing
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        }
        _ = record.cancel.cancelled() => {
            interrupt(&child, record.id, policy);
            // Stop waiting here: the interrupt is a request, not a guarantee,
            // and the pipe tasks keep draining until the process closes them.
        }
    }

    Ok(())
}

/// Deliver a cancellation request to a running child according to `policy`
fn interrupt(child: &Child, id: u32, policy: CancelPolicy) {
    match policy {
        CancelPolicy::CooperativeOnly => match child.id() {
            Some(pid) => match signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
                Ok(()) => info!("Sent interrupt to process {}", id),
                Err(e) => warn!("Failed to interrupt process {}: {}", id, e),
            },
            None => info!("Process {} already exited before the interrupt", id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn echo_command(message: &str) -> LaunchCommand {
        LaunchCommand {
            executable: "echo".to_string(),
            working_directory: "/tmp".to_string(),
            arguments: vec![message.to_string()],
        }
    }

    #[tokio::test]
    async fn test_natural_exit_sets_stop_time_and_captures_output() {
        let registry = Registry::new();
        let record = registry.insert_new();
        let output_dir = TempDir::new().unwrap();

        supervise(
            registry.clone(),
            record.clone(),
            echo_command("hello"),
            output_dir.path().to_path_buf(),
            CancelPolicy::CooperativeOnly,
        )
        .await;

        let finished = registry.get(record.id).unwrap();
        assert!(finished.stop_time.is_some());
        assert!(finished.stop_time.unwrap() >= finished.start_time);

        let stem = format!(
            "{}_{}",
            record.start_time.format("%Y-%m-%d_%H-%M"),
            record.id
        );
        let stdout_path = output_dir.path().join(format!("{stem}_output.txt"));
        let contents = std::fs::read_to_string(stdout_path).unwrap();
        assert_eq!(contents.trim(), "hello");
    }

    #[tokio::test]
    async fn test_stderr_is_captured_separately() {
        let registry = Registry::new();
        let record = registry.insert_new();
        let output_dir = TempDir::new().unwrap();

        let command = LaunchCommand {
            executable: "sh".to_string(),
            working_directory: "/tmp".to_string(),
            arguments: vec!["-c".to_string(), "echo oops >&2".to_string()],
        };
        supervise(
            registry.clone(),
            record.clone(),
            command,
            output_dir.path().to_path_buf(),
            CancelPolicy::CooperativeOnly,
        )
        .await;

        let stem = format!(
            "{}_{}",
            record.start_time.format("%Y-%m-%d_%H-%M"),
            record.id
        );
        let stderr_path = output_dir.path().join(format!("{stem}_error.txt"));
        let contents = std::fs::read_to_string(stderr_path).unwrap();
        assert_eq!(contents.trim(), "oops");
    }

    #[tokio::test]
    async fn test_spawn_failure_still_records_completion() {
        let registry = Registry::new();
        let record = registry.insert_new();
        let output_dir = TempDir::new().unwrap();

        let command = LaunchCommand {
            executable: "/nonexistent/binary".to_string(),
            working_directory: "/tmp".to_string(),
            arguments: vec![],
        };
        supervise(
            registry.clone(),
            record.clone(),
            command,
            output_dir.path().to_path_buf(),
            CancelPolicy::CooperativeOnly,
        )
        .await;

        assert!(registry.get(record.id).unwrap().stop_time.is_some());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_long_running_process() {
        let registry = Registry::new();
        let record = registry.insert_new();
        let output_dir = TempDir::new().unwrap();

        let command = LaunchCommand {
            executable: "sleep".to_string(),
            working_directory: "/tmp".to_string(),
            arguments: vec!["30".to_string()],
        };
        let task = tokio::spawn(supervise(
            registry.clone(),
            record.clone(),
            command,
            output_dir.path().to_path_buf(),
            CancelPolicy::CooperativeOnly,
        ));

        // Give the child a moment to start, then request cancellation
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(registry.signal_cancel(record.id));

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor should finish promptly after cancellation")
            .unwrap();
        assert!(registry.get(record.id).unwrap().stop_time.is_some());
    }
}
