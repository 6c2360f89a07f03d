//! The "run this command" capability.
//!
//! Call sites depend on `CommandExecutor`; tests hand them a `Player`, the
//! recorder and production code hand them a `SystemExecutor`.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{MockError, Result};
use crate::util::format_command_line;

/// Default wall-clock limit for real command execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An invocation plus execution options; only `args` takes part in matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub input: Option<String>,
}

impl CommandRequest {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn command_line(&self) -> String {
        format_command_line(&self.args)
    }
}

/// Text result of a command, recorded or real.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }
}

pub trait CommandExecutor: Send + Sync {
    fn execute(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        (**self).execute(request)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        (**self).execute(request)
    }
}

/// Runs commands for real, with a timeout.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SystemExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let command_line = request.command_line();
        let Some((program, rest)) = request.args.split_first() else {
            return Err(MockError::Spawn {
                command: command_line,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
            });
        };
        let search_dir = match &request.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().map_err(|err| MockError::io("resolve cwd", err))?,
        };
        let binary = which::which_in(program, std::env::var_os("PATH"), &search_dir).map_err(|err| {
            tracing::warn!(program = %program, "binary not found on PATH");
            MockError::Spawn {
                command: command_line.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, err.to_string()),
            }
        })?;

        let mut cmd = Command::new(&binary);
        cmd.args(rest)
            .stdin(if request.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| MockError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        if let (Some(input), Some(mut stdin)) = (request.input.clone(), child.stdin.take()) {
            thread::spawn(move || {
                let _ = stdin.write_all(input.as_bytes());
            });
        }
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            let polled = child
                .try_wait()
                .map_err(|err| MockError::io(format!("wait for `{command_line}`"), err))?;
            if let Some(status) = polled {
                break status;
            }
            if start.elapsed() > self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(command = %command_line, "command timed out");
                return Err(MockError::Timeout {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
            thread::sleep(Duration::from_millis(25));
        };

        let stdout = join_text(stdout, &command_line, "stdout")?;
        let stderr = join_text(stderr, &command_line, "stderr")?;
        tracing::debug!(
            command = %command_line,
            elapsed_ms = start.elapsed().as_millis(),
            "command finished"
        );
        Ok(CommandOutput {
            returncode: exit_code(&status),
            stdout,
            stderr,
        })
    }
}

/// Exit code, or the negated signal number when the child was killed.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

type Drain = Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            pipe.read_to_end(&mut bytes)?;
            Ok(bytes)
        })
    })
}

fn join_text(handle: Drain, command: &str, stream: &'static str) -> Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| {
            MockError::io(
                format!("collect {stream} of `{command}`"),
                std::io::Error::other("reader thread panicked"),
            )
        })?
        .map_err(|err| MockError::io(format!("collect {stream} of `{command}`"), err))?;
    String::from_utf8(bytes).map_err(|_| MockError::BinaryOutput {
        command: command.to_string(),
        stream,
    })
}
