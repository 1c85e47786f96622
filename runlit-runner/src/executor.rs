// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs test scripts and test-binary cases as child processes.

use crate::{
    errors::{ExecuteError, ExecutorBuildError},
    outcome::{AbortStatus, ExecutionResult, TestOutcome},
    paths::PathContext,
};
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    env,
    ffi::OsString,
    io,
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
};
use tracing::debug;

/// The connective placed between script lines, so a line only runs if every earlier line
/// succeeded.
const SCRIPT_SEPARATOR: &str = " &&\n";

/// How long to keep draining output after a timed-out process group was killed.
const LEAK_TIMEOUT: Duration = Duration::from_millis(100);

/// Launches test processes with a fixed working directory, environment and timeout.
#[derive(Clone, Debug)]
pub struct ShellExecutor {
    shell: Utf8PathBuf,
    exec_root: Utf8PathBuf,
    path_var: Option<OsString>,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    /// Creates a new executor that runs scripts through `shell` inside `exec_root`.
    pub fn new(shell: impl Into<Utf8PathBuf>, exec_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            exec_root: exec_root.into(),
            path_var: None,
            timeout: None,
        }
    }

    /// Prepends `bin_dir` to the inherited `PATH` of every launched process.
    pub fn set_bin_dir(&mut self, bin_dir: &Utf8Path) -> Result<&mut Self, ExecutorBuildError> {
        let mut paths = vec![bin_dir.as_std_path().to_owned()];
        if let Some(existing) = env::var_os("PATH") {
            paths.extend(env::split_paths(&existing));
        }
        let path_var = env::join_paths(paths).map_err(|err| ExecutorBuildError::InvalidBinDir {
            bin_dir: bin_dir.to_owned(),
            err,
        })?;
        self.path_var = Some(path_var);
        Ok(self)
    }

    /// Kills processes that run longer than `timeout`.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Joins `script` into a single shell script next to the test's scratch output, then runs it.
    ///
    /// `paths.tmp_dir` must already exist.
    pub async fn run_script(
        &self,
        script: &[String],
        paths: &PathContext,
    ) -> Result<TestOutcome, ExecuteError> {
        let script_path = paths.script_path();
        let mut contents = script.join(SCRIPT_SEPARATOR);
        contents.push('\n');
        tokio::fs::write(&script_path, contents)
            .await
            .map_err(|err| ExecuteError::WriteScript {
                path: script_path.clone(),
                err,
            })?;

        let mut command = Command::new(&self.shell);
        command.arg(&script_path);
        let command_line = shell_words::join([self.shell.as_str(), script_path.as_str()]);
        self.run(command, command_line).await
    }

    /// Runs a single case of a test binary by passing `filter_arg` to it.
    pub async fn run_binary_case(
        &self,
        binary: &Utf8Path,
        filter_arg: &str,
    ) -> Result<TestOutcome, ExecuteError> {
        let mut command = Command::new(binary);
        command.arg(filter_arg);
        let command_line = shell_words::join([binary.as_str(), filter_arg]);
        self.run(command, command_line).await
    }

    async fn run(
        &self,
        mut command: Command,
        command_line: String,
    ) -> Result<TestOutcome, ExecuteError> {
        command
            .current_dir(&self.exec_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path_var) = &self.path_var {
            command.env("PATH", path_var);
        }
        set_process_group(&mut command);

        debug!(command = %command_line, "launching test process");
        let start = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return Err(ExecuteError::Spawn {
                    command: command_line,
                    err,
                });
            }
        };
        let child_pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let completion = {
            let collect = async {
                let (status, stdout_res, stderr_res) = tokio::join!(
                    child.wait(),
                    read_pipe(stdout, &mut stdout_buf),
                    read_pipe(stderr, &mut stderr_buf),
                );
                stdout_res.and(stderr_res).and(status)
            };
            tokio::pin!(collect);

            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, &mut collect).await {
                    Ok(status) => Completion::Exited(status),
                    Err(_) => {
                        debug!(
                            command = %command_line,
                            timeout = %humantime::format_duration(timeout),
                            "test process timed out, killing its process group"
                        );
                        kill_process_group(child_pid);
                        // Anything the killed processes wrote is still in the pipes.
                        let drained = tokio::time::timeout(LEAK_TIMEOUT, &mut collect)
                            .await
                            .is_ok();
                        Completion::TimedOut { drained }
                    }
                },
                None => Completion::Exited(collect.await),
            }
        };

        let status = match completion {
            Completion::Exited(Ok(status)) => status,
            Completion::Exited(Err(err)) => {
                return Err(ExecuteError::Wait {
                    command: command_line,
                    err,
                });
            }
            Completion::TimedOut { drained } => {
                if !drained {
                    // A process that left the group still holds the pipes open.
                    debug!(command = %command_line, "test process leaked handles after kill");
                    _ = child.start_kill();
                }
                return Ok(TestOutcome {
                    result: ExecutionResult::TimedOut,
                    stdout: Bytes::from(stdout_buf),
                    stderr: Bytes::from(stderr_buf),
                    time_taken: start.elapsed(),
                });
            }
        };

        Ok(TestOutcome {
            result: exit_status_to_result(status),
            stdout: Bytes::from(stdout_buf),
            stderr: Bytes::from(stderr_buf),
            time_taken: start.elapsed(),
        })
    }
}

enum Completion {
    Exited(io::Result<ExitStatus>),
    TimedOut { drained: bool },
}

async fn read_pipe(pipe: Option<impl AsyncRead + Unpin>, buf: &mut Vec<u8>) -> io::Result<()> {
    match pipe {
        Some(mut pipe) => pipe.read_to_end(buf).await.map(|_| ()),
        None => Ok(()),
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Puts the test in its own process group, so a timeout can kill everything it spawned.
        fn set_process_group(command: &mut Command) {
            command.process_group(0);
        }

        fn kill_process_group(child_pid: Option<u32>) {
            let Some(pid) = child_pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
                // The child was already reaped.
                return;
            };
            // A negative pid signals the whole group.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    } else {
        fn set_process_group(_command: &mut Command) {}

        fn kill_process_group(_child_pid: Option<u32>) {
            // Without process groups the child is killed once draining gives up.
        }
    }
}

fn exit_status_to_result(exit_status: ExitStatus) -> ExecutionResult {
    if exit_status.success() {
        return ExecutionResult::Pass;
    }

    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            // On Unix, extract the signal if it's found.
            use std::os::unix::process::ExitStatusExt;
            let abort_status = exit_status.signal().map(AbortStatus::UnixSignal);
        } else {
            let abort_status: Option<AbortStatus> = None;
        }
    }
    ExecutionResult::Fail { abort_status }
}
