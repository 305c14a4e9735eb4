// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Running external tools and scoping auxiliary background processes.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use cq_crypto_config::ToolCommand;
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use crate::error::{CryptoError, Result};

/// How long an auxiliary process gets to exit after SIGINT before it is
/// killed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Captured output of a tool that exited successfully.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
	pub stdout: String,
	pub stderr: String,
}

/// Build the command for `tool` with `args` appended after its prefix args.
pub(crate) fn command<I, S>(tool: &ToolCommand, args: I, cwd: Option<&Path>) -> Command
where
	I: IntoIterator<Item = S>,
	S: AsRef<OsStr>,
{
	let mut cmd = Command::new(&tool.program);
	cmd.args(&tool.args).args(args).stdin(Stdio::null());
	if let Some(dir) = cwd {
		cmd.current_dir(dir);
	}
	cmd
}

/// Run `tool` to completion and return its raw output, whatever the exit
/// status. Only a failure to launch is an error.
pub(crate) async fn run_raw<I, S>(tool: &ToolCommand, args: I, cwd: Option<&Path>) -> std::io::Result<Output>
where
	I: IntoIterator<Item = S>,
	S: AsRef<OsStr>,
{
	let args: Vec<S> = args.into_iter().collect();
	trace!(
		program = %tool.program,
		args = %describe_args(tool, &args),
		cwd = ?cwd,
		"running tool"
	);
	command(tool, &args, cwd).output().await
}

/// Run `tool` and require a zero exit status.
///
/// A non-zero exit becomes [`CryptoError::ToolFailed`] carrying the captured
/// stderr and stdout.
pub async fn run_tool<I, S>(tool: &ToolCommand, args: I, cwd: Option<&Path>) -> Result<ToolOutput>
where
	I: IntoIterator<Item = S>,
	S: AsRef<OsStr>,
{
	let args: Vec<S> = args.into_iter().collect();
	let output = run_raw(tool, &args, cwd)
		.await
		.map_err(|source| CryptoError::ToolLaunch {
			program: tool.program.clone(),
			source,
		})?;

	let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
	let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

	if output.status.success() {
		debug!(program = %tool.program, stdout_len = stdout.len(), "tool finished");
		return Ok(ToolOutput { stdout, stderr });
	}

	let captured = [stderr.trim(), stdout.trim()]
		.iter()
		.filter(|s| !s.is_empty())
		.copied()
		.collect::<Vec<_>>()
		.join("\n");

	Err(CryptoError::ToolFailed {
		program: tool.program.clone(),
		args: tool
			.args
			.iter()
			.cloned()
			.chain(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()))
			.collect(),
		status: output.status.to_string(),
		output: captured,
	})
}

fn describe_args<S: AsRef<OsStr>>(tool: &ToolCommand, args: &[S]) -> String {
	tool.args
		.iter()
		.map(String::as_str)
		.map(std::borrow::Cow::Borrowed)
		.chain(args.iter().map(|a| a.as_ref().to_string_lossy()))
		.collect::<Vec<_>>()
		.join(" ")
}

/// A background process that lives exactly as long as a foreground
/// operation.
///
/// [`AuxiliaryProcess::release`] interrupts the process and waits for it,
/// escalating to SIGKILL after the grace period. If the guard is dropped
/// without being released (early return, cancellation, panic) the process is
/// still sent SIGINT.
#[derive(Debug)]
pub struct AuxiliaryProcess {
	program: String,
	child: Option<Child>,
	grace: Duration,
}

impl AuxiliaryProcess {
	pub fn spawn(tool: &ToolCommand) -> Result<Self> {
		Self::spawn_with_grace(tool, DEFAULT_GRACE)
	}

	pub fn spawn_with_grace(tool: &ToolCommand, grace: Duration) -> Result<Self> {
		let mut cmd = command(tool, std::iter::empty::<&str>(), None);
		cmd.stdout(Stdio::null()).stderr(Stdio::null());

		let child = cmd.spawn().map_err(|source| CryptoError::ToolLaunch {
			program: tool.program.clone(),
			source,
		})?;

		debug!(program = %tool.program, pid = ?child.id(), "started auxiliary process");
		Ok(Self {
			program: tool.program.clone(),
			child: Some(child),
			grace,
		})
	}

	pub fn id(&self) -> Option<u32> {
		self.child.as_ref().and_then(Child::id)
	}

	/// Stop the process and reap it.
	///
	/// Failures are logged; the foreground result matters more than how the
	/// auxiliary process went away.
	pub async fn release(mut self) {
		let Some(mut child) = self.child.take() else {
			return;
		};

		match child.try_wait() {
			Ok(Some(status)) => {
				debug!(program = %self.program, %status, "auxiliary process had already exited");
				return;
			}
			Ok(None) => {}
			Err(e) => warn!(program = %self.program, error = %e, "failed to poll auxiliary process"),
		}

		interrupt(&mut child, &self.program);

		match tokio::time::timeout(self.grace, child.wait()).await {
			Ok(Ok(status)) => {
				debug!(program = %self.program, %status, "auxiliary process stopped");
			}
			Ok(Err(e)) => {
				warn!(program = %self.program, error = %e, "failed to wait for auxiliary process");
			}
			Err(_) => {
				warn!(
					program = %self.program,
					grace_ms = self.grace.as_millis() as u64,
					"auxiliary process ignored SIGINT, killing"
				);
				if let Err(e) = child.kill().await {
					warn!(program = %self.program, error = %e, "failed to kill auxiliary process");
				}
			}
		}
	}
}

impl Drop for AuxiliaryProcess {
	fn drop(&mut self) {
		if let Some(child) = self.child.as_mut() {
			warn!(program = %self.program, "auxiliary process dropped without release");
			interrupt(child, &self.program);
		}
	}
}

#[cfg(unix)]
fn interrupt(child: &mut Child, program: &str) {
	let Some(pid) = child.id() else {
		return;
	};
	let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
	if rc != 0 {
		warn!(
			program,
			pid,
			error = %std::io::Error::last_os_error(),
			"failed to interrupt auxiliary process"
		);
	}
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child, program: &str) {
	if let Err(e) = child.start_kill() {
		warn!(program, error = %e, "failed to stop auxiliary process");
	}
}
