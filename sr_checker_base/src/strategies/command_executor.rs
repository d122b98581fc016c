//! External tool execution with a whitelist and optional timeout

use std::collections::HashSet;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

/// Variables forwarded from the checker's own environment
const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "PYTHONPATH", "VIRTUAL_ENV"];

/// Runs whitelisted tools with a scrubbed environment
#[derive(Debug, Clone)]
pub struct SystemCommandExecutor {
    default_timeout: Option<Duration>,
    allowed_commands: HashSet<String>,
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCommandExecutor {
    /// Empty whitelist, no timeout
    pub fn new() -> Self {
        Self {
            default_timeout: None,
            allowed_commands: HashSet::new(),
        }
    }

    /// `None` waits for the tool however long it takes
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            default_timeout: timeout,
            allowed_commands: HashSet::new(),
        }
    }

    pub fn allow_command(&mut self, command: impl Into<String>) {
        self.allowed_commands.insert(command.into());
    }

    pub fn allow_commands(&mut self, commands: &[&str]) {
        for cmd in commands {
            self.allowed_commands.insert(cmd.to_string());
        }
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        self.allowed_commands.contains(command)
    }

    pub fn execute<A: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[A],
    ) -> Result<CommandOutput, CommandError> {
        self.execute_in(program, args, None)
    }

    /// Run `program` inside `cwd` and capture both output streams
    pub fn execute_in<A: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[A],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        if !self.allowed_commands.contains(program) {
            return Err(CommandError::SecurityViolation {
                reason: format!("Command '{}' not in whitelist", program),
            });
        }

        let start = Instant::now();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for key in PASSTHROUGH_ENV {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        if std::env::var_os("PATH").is_none() {
            cmd.env("PATH", FALLBACK_PATH);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandError::ProgramNotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => CommandError::PermissionDenied {
                program: program.to_string(),
            },
            _ => CommandError::ExecutionFailed {
                program: program.to_string(),
                reason: e.to_string(),
            },
        })?;

        // Drain both pipes while waiting so a chatty tool cannot block
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.default_timeout {
            Some(timeout) => match wait_timeout::ChildExt::wait_timeout(&mut child, timeout)
                .map_err(|e| failed(program, e))?
            {
                Some(status) => status,
                None => {
                    kill(&mut child);
                    return Err(CommandError::Timeout {
                        program: program.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => child.wait().map_err(|e| failed(program, e))?,
        };

        Ok(CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }
}

fn failed(program: &str, e: std::io::Error) -> CommandError {
    CommandError::ExecutionFailed {
        program: program.to_string(),
        reason: e.to_string(),
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Command execution output
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Both streams, stdout first, as a tool log would interleave them
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Command execution errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Program not found: {program}")]
    ProgramNotFound { program: String },

    #[error("Execution failed for '{program}': {reason}")]
    ExecutionFailed { program: String, reason: String },

    #[error("'{program}' timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("Permission denied: {program}")]
    PermissionDenied { program: String },

    #[error("Security violation: {reason}")]
    SecurityViolation { reason: String },
}

/// Resolve a tool name against PATH the way a shell would
pub fn which(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH").unwrap_or_else(|| FALLBACK_PATH.into());
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}
