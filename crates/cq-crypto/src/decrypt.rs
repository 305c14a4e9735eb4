// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Running the compiled decrypt helper.
//!
//! The helper signals its result through the exit code:
//!
//! | Code | Meaning                          | Outcome     |
//! | ---- | -------------------------------- | ----------- |
//! | 0    | plaintext on stdout              | Success     |
//! | 1    | wrong number of arguments        | Fatal       |
//! | 2    | master key unreadable            | Fatal       |
//! | 3    | this value failed to decrypt     | Recoverable |
//! | 4    | cipher initialization failed     | Fatal       |
//! | 5    | master key file missing          | Fatal       |
//!
//! Anything else, including death by signal, is fatal as well.

use cq_common_secret::SecretString;
use cq_crypto_config::{CryptoConfig, ToolCommand};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::layout::CryptoLayout;
use crate::master_key::MasterKeyHandle;
use crate::process::{run_raw, AuxiliaryProcess};

/// Why the decrypt helper could not do its job. Every variant means the
/// environment is broken and no further values should be attempted.
#[derive(Debug, Error)]
pub enum DecryptFailure {
	#[error("wrong number of arguments: {stderr}")]
	WrongArguments { stderr: String },

	#[error("error while reading master key: {stderr}")]
	MasterKeyUnreadable { stderr: String },

	#[error("error while initializing cipher with master key: {stderr}")]
	CipherInit { stderr: String },

	#[error("master key file does not exist: {stderr}")]
	MasterKeyMissing { stderr: String },

	#[error("failed to launch decrypt helper: {0}")]
	Launch(#[source] std::io::Error),

	#[error("decrypt helper exited unexpectedly ({}): {stderr}", describe_code(.code))]
	UnexpectedExit { code: Option<i32>, stderr: String },
}

fn describe_code(code: &Option<i32>) -> String {
	match code {
		Some(code) => format!("exit code {code}"),
		None => "terminated by signal".to_string(),
	}
}

/// Result of decrypting one value.
#[derive(Debug)]
pub enum DecryptOutcome {
	/// The trimmed plaintext.
	Success(SecretString),
	/// This value could not be decrypted; treat it as absent and move on.
	Recoverable,
	/// The environment is broken; stop processing.
	Fatal(DecryptFailure),
}

impl DecryptOutcome {
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Fatal(_))
	}

	/// `Ok(Some(plaintext))`, `Ok(None)` for a recoverable failure, or the
	/// fatal failure.
	pub fn into_result(self) -> Result<Option<SecretString>, DecryptFailure> {
		match self {
			Self::Success(plaintext) => Ok(Some(plaintext)),
			Self::Recoverable => Ok(None),
			Self::Fatal(failure) => Err(failure),
		}
	}
}

/// Map the helper's exit code and output onto an outcome.
pub fn classify(code: Option<i32>, stdout: &str, stderr: &str) -> DecryptOutcome {
	let stderr = stderr.trim().to_string();
	match code {
		Some(0) => DecryptOutcome::Success(SecretString::new(stdout.trim().to_string())),
		Some(1) => DecryptOutcome::Fatal(DecryptFailure::WrongArguments { stderr }),
		Some(2) => DecryptOutcome::Fatal(DecryptFailure::MasterKeyUnreadable { stderr }),
		Some(3) => DecryptOutcome::Recoverable,
		Some(4) => DecryptOutcome::Fatal(DecryptFailure::CipherInit { stderr }),
		Some(5) => DecryptOutcome::Fatal(DecryptFailure::MasterKeyMissing { stderr }),
		code => DecryptOutcome::Fatal(DecryptFailure::UnexpectedExit { code, stderr }),
	}
}

pub struct DecryptInvoker {
	layout: CryptoLayout,
	java: ToolCommand,
	class_name: String,
	entropy: Option<ToolCommand>,
}

impl DecryptInvoker {
	pub fn new(config: &CryptoConfig) -> Self {
		Self {
			layout: CryptoLayout::new(&config.cache_root),
			java: config.tools.java.clone(),
			class_name: config.helper.class_name.clone(),
			entropy: config
				.tools
				.entropy_enabled
				.then(|| config.tools.entropy.clone()),
		}
	}

	/// Decrypt `ciphertext` with the master key behind `handle`.
	///
	/// The entropy source runs for the duration of the helper and is stopped
	/// on every path out of this call, including a helper that fails to
	/// launch.
	pub async fn decrypt(&self, handle: &MasterKeyHandle, ciphertext: &str) -> DecryptOutcome {
		let entropy = self.start_entropy();

		let classpath = self.layout.classpath();
		debug!(handle = %handle, ciphertext, "running decrypt helper");
		let result = run_raw(
			&self.java,
			[
				"-cp",
				classpath.as_str(),
				self.class_name.as_str(),
				handle.as_str(),
				ciphertext,
			],
			Some(self.layout.root()),
		)
		.await;

		if let Some(entropy) = entropy {
			entropy.release().await;
		}

		let outcome = match result {
			Ok(output) => {
				let stderr = String::from_utf8_lossy(&output.stderr);
				debug!(
					exit_code = ?output.status.code(),
					stdout_len = output.stdout.len(),
					stderr = %stderr,
					"decrypt helper finished"
				);
				classify(
					output.status.code(),
					&String::from_utf8_lossy(&output.stdout),
					&stderr,
				)
			}
			Err(e) => DecryptOutcome::Fatal(DecryptFailure::Launch(e)),
		};

		match &outcome {
			DecryptOutcome::Success(_) => {}
			DecryptOutcome::Recoverable => error!(ciphertext, "error while decrypting value"),
			DecryptOutcome::Fatal(failure) => error!(handle = %handle, error = %failure, "decrypt helper failed"),
		}
		outcome
	}

	/// The entropy source speeds the helper up but is not required for it to
	/// work, so failing to start it only warns.
	fn start_entropy(&self) -> Option<AuxiliaryProcess> {
		let tool = self.entropy.as_ref()?;
		match AuxiliaryProcess::spawn(tool) {
			Ok(process) => Some(process),
			Err(e) => {
				warn!(error = %e, "entropy source unavailable, decrypting without it");
				None
			}
		}
	}
}
