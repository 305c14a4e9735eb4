// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::archive::ArchiveExtractor;
use crate::error::{CryptoError, Result};

/// Recorded call to the mock extractor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractCall {
	pub archive: PathBuf,
	pub filter: String,
	pub dest: PathBuf,
}

/// Mock extractor for testing.
///
/// Each filter is scripted with the file names it produces; extracting with
/// that filter writes those files into the destination. Unscripted filters
/// extract nothing.
#[derive(Clone, Default)]
pub struct MockExtractor {
	/// File names written per filter.
	pub entries: HashMap<String, Vec<String>>,
	/// Filters that fail with the given diagnostic.
	pub errors: HashMap<String, String>,
	/// Track calls for verification.
	pub calls: Arc<Mutex<Vec<ExtractCall>>>,
}

impl MockExtractor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_entries<I, S>(mut self, filter: impl Into<String>, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.entries
			.insert(filter.into(), names.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_error(mut self, filter: impl Into<String>, diagnostic: impl Into<String>) -> Self {
		self.errors.insert(filter.into(), diagnostic.into());
		self
	}

	/// Returns the recorded calls.
	pub fn get_calls(&self) -> Vec<ExtractCall> {
		self.lock_calls().clone()
	}

	/// Clears recorded calls.
	pub fn clear_calls(&self) {
		self.lock_calls().clear();
	}

	fn lock_calls(&self) -> MutexGuard<'_, Vec<ExtractCall>> {
		self.calls.lock().unwrap_or_else(|e| e.into_inner())
	}
}

#[async_trait]
impl ArchiveExtractor for MockExtractor {
	async fn extract(&self, archive: &Path, filter: &str, dest: &Path) -> Result<()> {
		self.lock_calls().push(ExtractCall {
			archive: archive.to_path_buf(),
			filter: filter.to_string(),
			dest: dest.to_path_buf(),
		});

		if let Some(diagnostic) = self.errors.get(filter) {
			return Err(CryptoError::ToolFailed {
				program: "mock-unzip".to_string(),
				args: vec![archive.display().to_string(), filter.to_string()],
				status: "exit status: 9".to_string(),
				output: diagnostic.clone(),
			});
		}

		tokio::fs::create_dir_all(dest).await?;
		for name in self.entries.get(filter).into_iter().flatten() {
			tokio::fs::write(dest.join(name), name.as_bytes()).await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn writes_scripted_entries_and_records_calls() {
		let dir = tempfile::tempdir().unwrap();
		let mock = MockExtractor::new().with_entries("META-INF/lib/*", ["a.jar", "b.jar"]);

		mock.extract(Path::new("bundle.jar"), "META-INF/lib/*", dir.path())
			.await
			.unwrap();
		mock.extract(Path::new("bundle.jar"), "nothing/*", dir.path())
			.await
			.unwrap();

		assert!(dir.path().join("a.jar").exists());
		assert!(dir.path().join("b.jar").exists());
		let calls = mock.get_calls();
		assert_eq!(calls.len(), 2);
		assert_eq!(calls[1].filter, "nothing/*");

		mock.clear_calls();
		assert!(mock.get_calls().is_empty());
	}

	#[tokio::test]
	async fn scripted_error_is_fatal() {
		let dir = tempfile::tempdir().unwrap();
		let mock = MockExtractor::new().with_error("static/app/*", "zip file is corrupt");

		let err = mock
			.extract(Path::new("aem.jar"), "static/app/*", dir.path())
			.await
			.unwrap_err();
		assert!(err.to_string().contains("zip file is corrupt"));
	}
}
