// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use cq_crypto_config::ToolCommand;
use tracing::debug;

use crate::error::Result;
use crate::process::run_tool;

/// Extracts a filtered set of entries from an archive.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
	/// Unpack every entry of `archive` matching `filter` into `dest`.
	///
	/// Existing files are overwritten and entries are written by file name
	/// only, dropping their directory part. A failing extraction is fatal.
	async fn extract(&self, archive: &Path, filter: &str, dest: &Path) -> Result<()>;
}

/// [`ArchiveExtractor`] driving the `unzip` CLI.
pub struct UnzipExtractor {
	tool: ToolCommand,
}

impl UnzipExtractor {
	pub fn new(tool: ToolCommand) -> Self {
		Self { tool }
	}
}

impl Default for UnzipExtractor {
	fn default() -> Self {
		Self::new(ToolCommand::new("unzip"))
	}
}

#[async_trait]
impl ArchiveExtractor for UnzipExtractor {
	async fn extract(&self, archive: &Path, filter: &str, dest: &Path) -> Result<()> {
		// -o overwrite, -b binary, -j junk paths
		let output = run_tool(
			&self.tool,
			[
				OsStr::new("-o"),
				OsStr::new("-b"),
				OsStr::new("-j"),
				archive.as_os_str(),
				OsStr::new(filter),
				OsStr::new("-d"),
				dest.as_os_str(),
			],
			None,
		)
		.await?;

		debug!(
			archive = %archive.display(),
			filter,
			dest = %dest.display(),
			output_lines = output.stdout.lines().count(),
			"extracted archive entries"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::CryptoError;

	/// Stand-in for `unzip` that records its argv and creates the filtered
	/// entry name inside the destination.
	fn fake_unzip(log: &Path) -> ToolCommand {
		let script = format!(
			"echo \"$@\" >> {log}; [ \"$4\" = missing.jar ] && {{ echo 'cannot find missing.jar' >&2; exit 9; }}; touch \"$7/$(basename \"$5\")\"",
			log = log.display()
		);
		ToolCommand::new("/bin/sh").with_args(["-c".to_string(), script, "unzip".to_string()])
	}

	#[tokio::test]
	async fn passes_overwrite_and_flatten_flags() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("argv");
		let extractor = UnzipExtractor::new(fake_unzip(&log));

		extractor
			.extract(Path::new("aem.jar"), "META-INF/lib/crypto.jar", dir.path())
			.await
			.unwrap();

		let argv = std::fs::read_to_string(&log).unwrap();
		assert_eq!(
			argv.trim(),
			format!(
				"-o -b -j aem.jar META-INF/lib/crypto.jar -d {}",
				dir.path().display()
			)
		);
		assert!(dir.path().join("crypto.jar").exists());
	}

	#[tokio::test]
	async fn failure_is_fatal_and_carries_diagnostics() {
		let dir = tempfile::tempdir().unwrap();
		let extractor = UnzipExtractor::new(fake_unzip(&dir.path().join("argv")));

		let err = extractor
			.extract(Path::new("missing.jar"), "static/app/*", dir.path())
			.await
			.unwrap_err();

		match err {
			CryptoError::ToolFailed { output, .. } => {
				assert!(output.contains("cannot find missing.jar"))
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}
}
