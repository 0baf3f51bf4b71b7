//! Privileged command execution through `sudo -S`.
//!
//! The runner owns the [`CredentialCache`]: it resolves the password from
//! the cache or an interactive prompt, pipes it to sudo on stdin (never
//! the argument list, which would leak it to process listings), and
//! classifies the outcome. An authentication failure invalidates the
//! cache so the next invocation re-prompts.

use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cache::CredentialCache;

/// Reported instead of stdout when a successful command printed nothing.
pub const SUCCESS_MESSAGE: &str = "Command executed successfully.";

/// Substrings (matched case-insensitively) that mark a sudo
/// authentication failure. Only matches sudo's English messages; see
/// the known-limitation note in DESIGN.md.
const AUTH_FAILURE_PATTERNS: [&str; 2] = ["incorrect password", "sorry, try again"];

/// Captured result of one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code (`None` when killed by a signal).
    pub exit_code: Option<i32>,
    /// Captured stdout text.
    pub stdout: String,
    /// Captured stderr text.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Outcome of one privileged run, surfaced to the UI as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Command exited 0; carries stdout or [`SUCCESS_MESSAGE`].
    Success(String),
    /// The password prompt was dismissed; nothing was executed.
    Cancelled,
    /// Command failed to launch or exited non-zero; carries error text.
    Failed(String),
}

/// Source of a sudo password when none is cached.
///
/// Returning `None` means the user cancelled; the pending command must
/// not execute.
pub trait PasswordPrompt {
    /// Ask for the password once.
    fn request(&mut self) -> Option<Zeroizing<String>>;
}

impl<F> PasswordPrompt for F
where
    F: FnMut() -> Option<Zeroizing<String>>,
{
    fn request(&mut self) -> Option<Zeroizing<String>> {
        self()
    }
}

/// Executes a shell command with elevated privileges.
///
/// Split out from [`PrivilegedRunner`] so tests can script command
/// outcomes without a real `sudo` on the path.
pub trait SudoExecutor {
    /// Run `command` under the privilege-elevation mechanism, feeding
    /// `password` over a non-echoing channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the child process cannot be spawned or its
    /// output cannot be collected.
    fn execute(&self, command: &str, password: &str) -> io::Result<CommandOutput>;
}

/// Production executor: `sudo -S -p '' sh -c <command>` with the
/// password written to stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SudoShell;

impl SudoExecutor for SudoShell {
    fn execute(&self, command: &str, password: &str) -> io::Result<CommandOutput> {
        debug!(command, "running privileged command");
        let mut child = Command::new("sudo")
            .args(["-S", "-p", "", "sh", "-c", command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // sudo skips the password read while its own timestamp is still
        // valid; the write then fails with a broken pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let written = stdin
                .write_all(password.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"));
            if let Err(err) = written {
                debug!(error = %err, "password not consumed by sudo");
            }
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs privileged commands with password acquisition and caching.
pub struct PrivilegedRunner {
    cache: CredentialCache,
    executor: Box<dyn SudoExecutor>,
}

impl PrivilegedRunner {
    /// Create a runner backed by the real [`SudoShell`].
    pub fn new(cache: CredentialCache) -> Self {
        Self::with_executor(cache, Box::new(SudoShell))
    }

    /// Create a runner with a custom executor (used by tests).
    pub fn with_executor(cache: CredentialCache, executor: Box<dyn SudoExecutor>) -> Self {
        Self { cache, executor }
    }

    /// Shared view of the credential cache.
    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Mutable view of the credential cache (observer registration,
    /// shutdown clear).
    pub fn cache_mut(&mut self) -> &mut CredentialCache {
        &mut self.cache
    }

    /// Run one privileged command.
    ///
    /// Resolves the password from the cache first; a still-valid cache
    /// means `prompt` is never invoked. A freshly prompted password is
    /// cached before execution. When stderr matches an authentication
    /// failure the cache is cleared so the next call re-prompts.
    pub fn run(&mut self, command: &str, prompt: &mut dyn PasswordPrompt) -> RunOutcome {
        let password = match self.cache.get() {
            Some(password) => password,
            None => match prompt.request() {
                Some(password) => {
                    self.cache.cache(&password);
                    password
                }
                None => {
                    info!("password prompt cancelled, nothing executed");
                    return RunOutcome::Cancelled;
                }
            },
        };

        match self.executor.execute(command, &password) {
            Ok(output) if output.success() => {
                let text = if output.stdout.is_empty() {
                    SUCCESS_MESSAGE.to_owned()
                } else {
                    output.stdout
                };
                RunOutcome::Success(text)
            }
            Ok(output) => {
                warn!(exit_code = ?output.exit_code, "privileged command failed");
                if is_auth_failure(&output.stderr) {
                    self.cache.clear();
                }
                RunOutcome::Failed(output.stderr)
            }
            Err(err) => {
                warn!(error = %err, "failed to launch privileged command");
                RunOutcome::Failed(format!("failed to launch sudo: {err}"))
            }
        }
    }
}

impl std::fmt::Debug for PrivilegedRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedRunner")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Run an unprivileged command and capture its output.
///
/// Used for probes that need no elevation (`ls -l`, `getent`, `groups`).
///
/// # Errors
///
/// Returns an error when the program cannot be spawned.
pub fn capture(program: &str, args: &[&str]) -> io::Result<CommandOutput> {
    let output = Command::new(program).args(args).output()?;
    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn is_auth_failure(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    AUTH_FAILURE_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}
