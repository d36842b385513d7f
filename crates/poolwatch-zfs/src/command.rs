//! Handles spawning the real `zpool` binary with timeouts and friendly error
//! handling. This is the glue between poolwatch and the host system.

use poolwatch_core::error::{PoolwatchError, PoolwatchResult};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
/// Wraps a concrete binary path and default timeout used to run ZFS CLI
/// commands. No shell interpreter is involved; argv is passed through as-is.
pub struct CommandRunner {
    path: PathBuf,
    default_timeout: Duration,
}

#[derive(Debug)]
/// Collects stdout, stderr, and exit status from a finished command.
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CommandRunner {
    /// Build a new runner targeting the supplied binary and default timeout.
    pub fn new(path: PathBuf, default_timeout: Duration) -> Self {
        Self {
            path,
            default_timeout,
        }
    }

    /// Return the binary path this runner will execute.
    pub fn binary(&self) -> &std::path::Path {
        &self.path
    }

    /// Render the full command line for logs and error messages.
    pub fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.path.display(), args.join(" "))
    }

    /// Execute the binary with arguments and capture the result. A `timeout`
    /// of `None` applies the runner's default.
    pub fn run(&self, args: &[&str], timeout: Option<Duration>) -> PoolwatchResult<Output> {
        let mut command = Command::new(&self.path);
        command.args(args);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn()?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        self.wait_with_timeout(
            child,
            stdout_pipe,
            stderr_pipe,
            args,
            timeout.unwrap_or(self.default_timeout),
        )
    }

    /// Wait for the child process until it finishes or exceeds the timeout.
    fn wait_with_timeout(
        &self,
        mut child: Child,
        stdout_pipe: Option<ChildStdout>,
        stderr_pipe: Option<ChildStderr>,
        args: &[&str],
        timeout: Duration,
    ) -> PoolwatchResult<Output> {
        let start = Instant::now();
        let stdout_handle = Self::spawn_output_reader(stdout_pipe);
        let stderr_handle = Self::spawn_output_reader(stderr_pipe);
        let mut exit_status = None;

        while start.elapsed() <= timeout {
            if let Some(status) = child.try_wait()? {
                exit_status = Some(status);
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }

        if exit_status.is_none() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PoolwatchError::Timeout {
                command: self.describe(args),
                timeout,
            });
        }

        let stdout = stdout_handle
            .join()
            .map_err(|_| PoolwatchError::Parse("stdout reader thread panicked".into()))??;
        let stderr = stderr_handle
            .join()
            .map_err(|_| PoolwatchError::Parse("stderr reader thread panicked".into()))??;

        let status = exit_status.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1);

        Ok(Output {
            stdout,
            stderr,
            status,
        })
    }

    /// Spin up a helper thread to drain a pipe and return the collected text.
    fn spawn_output_reader<R>(pipe: Option<R>) -> thread::JoinHandle<PoolwatchResult<String>>
    where
        R: Read + Send + 'static,
    {
        thread::spawn(move || -> PoolwatchResult<String> {
            if let Some(mut reader) = pipe {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(String::from_utf8_lossy(&buf).to_string())
            } else {
                Ok(String::new())
            }
        })
    }
}
