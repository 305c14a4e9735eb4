// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment.
//!
//! Supports the `VAR` / `VAR_FILE` convention so the instance password can
//! come from a mounted secret file instead of the process environment.

use std::path::PathBuf;
use std::{env, fs};

use cq_common_secret::SecretString;
use thiserror::Error;

/// Errors that can occur when loading secrets from environment variables.
#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load a secret from `{var}_FILE` (preferred) or `{var}`.
///
/// A single trailing newline is stripped from file content. Returns
/// `Ok(None)` when neither variable is set.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| SecretEnvError::Io {
			path: path.clone(),
			source: e,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(secret)));
	}

	if let Ok(value) = env::var(var) {
		return Ok(Some(SecretString::new(value)));
	}

	Ok(None)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn returns_none_when_not_set() {
		let var = "CQ_CRYPTO_TEST_NONEXISTENT_12345";
		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));

		assert!(load_secret_env(var).unwrap().is_none());
	}

	#[test]
	fn reads_from_direct_env_var() {
		let var = "CQ_CRYPTO_TEST_DIRECT_12345";
		env::set_var(var, "admin");
		env::remove_var(format!("{var}_FILE"));

		assert_eq!(load_secret_env(var).unwrap().unwrap().expose(), "admin");

		env::remove_var(var);
	}

	/// The file variant wins so a mounted secret overrides a stale
	/// environment value.
	#[test]
	fn file_var_takes_precedence_and_strips_newline() {
		let var = "CQ_CRYPTO_TEST_PRECEDENCE_12345";
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();

		env::set_var(var, "from-env");
		env::set_var(format!("{var}_FILE"), file.path().to_str().unwrap());

		assert_eq!(load_secret_env(var).unwrap().unwrap().expose(), "from-file");

		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn returns_error_for_missing_file() {
		let var = "CQ_CRYPTO_TEST_MISSING_FILE_12345";
		env::set_var(format!("{var}_FILE"), "/nonexistent/path/to/password");

		assert!(matches!(
			load_secret_env(var).unwrap_err(),
			SecretEnvError::Io { .. }
		));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn returns_error_for_empty_file_path() {
		let var = "CQ_CRYPTO_TEST_EMPTY_PATH_12345";
		env::set_var(format!("{var}_FILE"), "");

		assert!(matches!(
			load_secret_env(var).unwrap_err(),
			SecretEnvError::EmptyPath { .. }
		));

		env::remove_var(format!("{var}_FILE"));
	}
}
