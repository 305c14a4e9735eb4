// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk layout of the crypto root and the classpath derived from it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

const CRYPTO_DIR: &str = "crypto";
const TMP_DIR: &str = "tmp";
const AEM_LIBS_DIR: &str = "libs/aem";
const LOG_LIBS_DIR: &str = "libs/log";
const SCRATCH_DIR: &str = "extract";

/// Paths under `<cache_root>/crypto`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoLayout {
	root: PathBuf,
}

impl CryptoLayout {
	pub fn new(cache_root: impl AsRef<Path>) -> Self {
		Self {
			root: cache_root.as_ref().join(CRYPTO_DIR),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Restricted directory holding master key files.
	pub fn tmp_dir(&self) -> PathBuf {
		self.root.join(TMP_DIR)
	}

	/// Scratch space for the first materialization stage.
	pub fn scratch_dir(&self) -> PathBuf {
		self.tmp_dir().join(SCRATCH_DIR)
	}

	pub fn aem_libs_dir(&self) -> PathBuf {
		self.root.join(AEM_LIBS_DIR)
	}

	pub fn log_libs_dir(&self) -> PathBuf {
		self.root.join(LOG_LIBS_DIR)
	}

	pub fn source_file(&self, class_name: &str) -> PathBuf {
		self.root.join(format!("{class_name}.java"))
	}

	pub fn class_file(&self, class_name: &str) -> PathBuf {
		self.root.join(format!("{class_name}.class"))
	}

	/// The classpath handed to `javac` and `java`, relative to [`Self::root`].
	///
	/// `tmp` must precede the library globs: the helper resolves the master
	/// key file as a classpath resource.
	pub fn classpath(&self) -> String {
		[".", TMP_DIR, "libs/aem/*", "libs/log/*"].join(":")
	}

	/// Create the directory tree. `tmp` is owner-only since key material
	/// lives there.
	pub async fn ensure_dirs(&self) -> Result<()> {
		for dir in [self.aem_libs_dir(), self.log_libs_dir()] {
			tokio::fs::create_dir_all(&dir).await?;
			set_mode(&dir, 0o755).await?;
		}
		tokio::fs::create_dir_all(self.tmp_dir()).await?;
		set_mode(&self.root, 0o755).await?;
		set_mode(&self.tmp_dir(), 0o700).await?;

		debug!(root = %self.root.display(), "crypto directories ready");
		Ok(())
	}
}

#[cfg(unix)]
pub(crate) async fn set_mode(path: &Path, mode: u32) -> Result<()> {
	use std::os::unix::fs::PermissionsExt;
	tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
	Ok(())
}

#[cfg(not(unix))]
pub(crate) async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
	Ok(())
}
