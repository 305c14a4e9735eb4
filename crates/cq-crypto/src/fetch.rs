// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Downloads the auxiliary logging libraries listed in the manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cq_common_http::{uri_basename, AemHttpClient};
use cq_crypto_config::{ConfigError, CryptoConfig, LogLibsConfig};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CryptoError, Result};
use crate::layout::{set_mode, CryptoLayout};

pub struct LibraryFetcher {
	layout: CryptoLayout,
	log_libs: LogLibsConfig,
	http: Arc<dyn AemHttpClient>,
}

impl LibraryFetcher {
	pub fn new(config: &CryptoConfig, http: Arc<dyn AemHttpClient>) -> Self {
		Self {
			layout: CryptoLayout::new(&config.cache_root),
			log_libs: config.log_libs.clone(),
			http,
		}
	}

	/// Make sure every manifest entry is present in `libs/log` with the
	/// expected SHA-256. Returns how many files were downloaded.
	pub async fn ensure_log_libs(&self) -> Result<usize> {
		let dir = self.layout.log_libs_dir();
		let mut downloaded = 0;

		for (path, expected) in &self.log_libs.data {
			let url = format!("{}{}", self.log_libs.server, path);
			let name = uri_basename(&url);
			if name.is_empty() {
				return Err(ConfigError::invalid_value(
					format!("log_libs.data.{path}"),
					"path has no file name",
				)
				.into());
			}
			let dest = dir.join(name);

			if let Some(actual) = file_sha256(&dest).await? {
				if actual.eq_ignore_ascii_case(expected) {
					debug!(path = %dest.display(), "log library up to date");
					continue;
				}
				debug!(path = %dest.display(), "log library checksum changed, downloading again");
			}

			self.download(&url, &dest, expected).await?;
			downloaded += 1;
		}

		if downloaded > 0 {
			info!(dir = %dir.display(), downloaded, "log libraries fetched");
		}
		Ok(downloaded)
	}

	async fn download(&self, url: &str, dest: &Path, expected: &str) -> Result<()> {
		let resp = self.http.download(url).await?;
		if !resp.is_ok() {
			return Err(CryptoError::DownloadFailed {
				url: url.to_string(),
				status: resp.status,
			});
		}

		let actual = sha256_hex(&resp.body);
		if !actual.eq_ignore_ascii_case(expected) {
			// Never leave a stale copy around under the expected name.
			remove_if_exists(dest).await?;
			return Err(CryptoError::ChecksumMismatch {
				path: dest.to_path_buf(),
				expected: expected.to_string(),
				actual,
			});
		}

		write_atomically(dest, &resp.body).await?;

		debug!(url, path = %dest.display(), bytes = resp.body.len(), "downloaded log library");
		Ok(())
	}
}

/// Write `bytes` next to `dest` and rename into place. Nothing is left under
/// the partial name when any step fails.
async fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<()> {
	let partial = partial_path(dest);
	let result = async {
		tokio::fs::write(&partial, bytes).await?;
		set_mode(&partial, 0o644).await?;
		tokio::fs::rename(&partial, dest).await?;
		Ok::<_, CryptoError>(())
	}
	.await;

	if result.is_err() {
		if let Err(e) = remove_if_exists(&partial).await {
			warn!(path = %partial.display(), error = %e, "can't delete partial download");
		}
	}
	result
}

fn sha256_hex(bytes: &[u8]) -> String {
	hex::encode(Sha256::digest(bytes))
}

async fn file_sha256(path: &Path) -> Result<Option<String>> {
	match tokio::fs::read(path).await {
		Ok(bytes) => Ok(Some(sha256_hex(&bytes))),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e.into()),
	}
}

async fn remove_if_exists(path: &Path) -> Result<()> {
	match tokio::fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e.into()),
	}
}

fn partial_path(dest: &Path) -> PathBuf {
	let mut name = dest.file_name().unwrap_or_default().to_os_string();
	name.push(".part");
	dest.with_file_name(name)
}
