// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Unpacks the AEM crypto libraries out of the quickstart JAR.
//!
//! The libraries sit three archives deep:
//!
//! ```text
//! cq-quickstart.jar
//! `-- static/app/cq-quickstart-<v>-standalone.jar
//!     `-- resources/install/0/com.adobe.granite.crypto-<v>.jar
//!         `-- META-INF/lib/*.jar
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cq_crypto_config::{ConfigError, CryptoConfig, LibrariesConfig};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::archive::ArchiveExtractor;
use crate::error::{CryptoError, Result};
use crate::layout::CryptoLayout;

pub struct DependencyMaterializer {
	layout: CryptoLayout,
	primary_artifact: PathBuf,
	libraries: LibrariesConfig,
	bundle_pattern: Regex,
	extractor: Arc<dyn ArchiveExtractor>,
}

impl DependencyMaterializer {
	pub fn new(config: &CryptoConfig, extractor: Arc<dyn ArchiveExtractor>) -> Result<Self> {
		let bundle_pattern = Regex::new(&config.libraries.bundle_pattern).map_err(|e| {
			ConfigError::invalid_value("libraries.bundle_pattern", e.to_string())
		})?;

		Ok(Self {
			layout: CryptoLayout::new(&config.cache_root),
			primary_artifact: config.primary_artifact.clone(),
			libraries: config.libraries.clone(),
			bundle_pattern,
			extractor,
		})
	}

	/// Make sure `libs/aem` holds the expected set of libraries.
	///
	/// Does nothing when the expected number of files is already present.
	pub async fn ensure_libraries(&self) -> Result<()> {
		let dest = self.layout.aem_libs_dir();
		let existing = list_files(&dest).await?;
		debug!(dir = %dest.display(), libs = ?existing, "existing crypto libraries");

		if existing.len() == self.libraries.expected_count {
			debug!("all crypto libraries are in place");
			return Ok(());
		}

		info!(
			found = existing.len(),
			expected = self.libraries.expected_count,
			"crypto libraries missing, extracting"
		);
		tokio::fs::create_dir_all(&dest).await?;

		let standalone = self.extract_standalone().await?;

		self.extractor
			.extract(&standalone, &self.libraries.bundle_filter, &dest)
			.await?;
		tokio::fs::remove_file(&standalone).await?;
		debug!(path = %standalone.display(), "removed standalone archive");

		let bundles = list_files(&dest)
			.await?
			.into_iter()
			.filter(|name| self.bundle_pattern.is_match(name))
			.collect();
		let bundle = dest.join(exactly_one("crypto bundle", &dest, bundles)?);

		self.extractor
			.extract(&bundle, &self.libraries.embedded_filter, &dest)
			.await?;

		let count = list_files(&dest).await?.len();
		if count == self.libraries.expected_count {
			info!(dir = %dest.display(), count, "crypto libraries materialized");
		} else {
			warn!(
				dir = %dest.display(),
				count,
				expected = self.libraries.expected_count,
				"unexpected number of crypto libraries after extraction"
			);
		}
		Ok(())
	}

	/// Pull the standalone quickstart out of the primary artifact into an
	/// empty scratch directory and return its path.
	async fn extract_standalone(&self) -> Result<PathBuf> {
		let scratch = self.layout.scratch_dir();
		if tokio::fs::try_exists(&scratch).await? {
			tokio::fs::remove_dir_all(&scratch).await?;
		}
		tokio::fs::create_dir_all(&scratch).await?;

		self.extractor
			.extract(
				&self.primary_artifact,
				&self.libraries.standalone_filter,
				&scratch,
			)
			.await?;

		let found = list_files(&scratch).await?;
		let name = exactly_one("standalone archive", &scratch, found)?;
		Ok(scratch.join(name))
	}
}

/// The one candidate, or an error naming all of them.
fn exactly_one(what: &'static str, dir: &Path, mut candidates: Vec<String>) -> Result<String> {
	if candidates.len() == 1 {
		if let Some(name) = candidates.pop() {
			return Ok(name);
		}
	}
	candidates.sort();
	Err(CryptoError::AmbiguousExtraction {
		what,
		dir: dir.to_path_buf(),
		candidates,
	})
}

/// Names of the regular, non-hidden files in `dir`. A missing directory is
/// empty.
async fn list_files(dir: &Path) -> Result<Vec<String>> {
	let mut entries = match tokio::fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(e) => return Err(e.into()),
	};

	let mut names = Vec::new();
	while let Some(entry) = entries.next_entry().await? {
		if !entry.file_type().await?.is_file() {
			continue;
		}
		let name = entry.file_name().to_string_lossy().into_owned();
		if !name.starts_with('.') {
			names.push(name);
		}
	}
	names.sort();
	Ok(names)
}
