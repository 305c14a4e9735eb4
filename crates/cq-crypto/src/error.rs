// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use cq_common_http::HttpError;
use cq_crypto_config::ConfigError;
use thiserror::Error;

use crate::decrypt::DecryptFailure;

/// Fatal errors of the crypto subsystem.
///
/// Every variant means the environment is broken (missing or corrupted
/// artifact, bad credentials, failing tool) and the enclosing operation must
/// stop. Per-item decryption failures are not errors; see
/// [`DecryptOutcome`](crate::DecryptOutcome).
#[derive(Debug, Error)]
pub enum CryptoError {
	#[error("failed to launch {program}: {source}")]
	ToolLaunch {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{program} {} failed ({status}): {output}", .args.join(" "))]
	ToolFailed {
		program: String,
		args: Vec<String>,
		status: String,
		/// Captured stderr followed by stdout.
		output: String,
	},

	#[error(
		"expected exactly one {what} in {}, found {}: [{}]",
		.dir.display(),
		.candidates.len(),
		.candidates.join(", ")
	)]
	AmbiguousExtraction {
		what: &'static str,
		dir: PathBuf,
		candidates: Vec<String>,
	},

	#[error("cannot determine bytecode version of {}: {message}", .path.display())]
	BytecodeParse { path: PathBuf, message: String },

	#[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
	ChecksumMismatch {
		path: PathBuf,
		expected: String,
		actual: String,
	},

	#[error("failed to fetch master key: HTTP {status}")]
	MasterKeyFetch { status: u16 },

	#[error("failed to write master key to {}: {source}", .path.display())]
	MasterKeyWrite {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("encryption rejected: HTTP {status}")]
	EncryptRejected { status: u16 },

	#[error("download of {url} failed: HTTP {status}")]
	DownloadFailed { url: String, status: u16 },

	#[error("invalid response: {0}")]
	InvalidResponse(String),

	#[error("no AEM instance configured")]
	NoInstance,

	#[error(transparent)]
	Decrypt(#[from] DecryptFailure),

	#[error(transparent)]
	Http(#[from] HttpError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl CryptoError {
	pub fn bytecode_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
		Self::BytecodeParse {
			path: path.into(),
			message: message.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ambiguous_extraction_names_every_candidate() {
		let err = CryptoError::AmbiguousExtraction {
			what: "standalone archive",
			dir: PathBuf::from("/var/cache/cq/crypto/tmp/extract"),
			candidates: vec!["cq-quickstart-6.1.0-standalone.jar".into(), "README".into()],
		};
		let msg = err.to_string();
		assert!(msg.contains("found 2"));
		assert!(msg.contains("cq-quickstart-6.1.0-standalone.jar"));
		assert!(msg.contains("README"));
	}

	#[test]
	fn tool_failure_includes_captured_output() {
		let err = CryptoError::ToolFailed {
			program: "unzip".into(),
			args: vec!["-o".into(), "aem.jar".into()],
			status: "exit status: 9".into(),
			output: "cannot find zipfile directory".into(),
		};
		let msg = err.to_string();
		assert!(msg.starts_with("unzip -o aem.jar failed"));
		assert!(msg.contains("cannot find zipfile directory"));
	}
}
