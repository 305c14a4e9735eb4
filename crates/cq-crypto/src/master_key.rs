// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master key lifecycle.
//!
//! The key is downloaded from the instance, written to `crypto/tmp/<uuid>`
//! for the decrypt helper to pick up from its classpath, and deleted once
//! the caller is done with it. Key bytes are never logged; only the handle
//! and its path are.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cq_common_http::{AemHttpClient, AemInstance};
use cq_common_secret::SecretBytes;
use cq_crypto_config::CryptoConfig;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};
use crate::layout::CryptoLayout;

/// Where AEM serves its master key.
pub const MASTER_KEY_PATH: &str = "/etc/key/master";

/// Opaque name of a stored master key file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MasterKeyHandle(String);

impl MasterKeyHandle {
	pub fn generate() -> Self {
		Self(Uuid::new_v4().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for MasterKeyHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for MasterKeyHandle {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

pub struct MasterKeyManager {
	layout: CryptoLayout,
	http: Arc<dyn AemHttpClient>,
}

impl MasterKeyManager {
	pub fn new(config: &CryptoConfig, http: Arc<dyn AemHttpClient>) -> Self {
		Self {
			layout: CryptoLayout::new(&config.cache_root),
			http,
		}
	}

	pub fn key_path(&self, handle: &MasterKeyHandle) -> PathBuf {
		self.layout.tmp_dir().join(handle.as_str())
	}

	/// Fetch the master key from `instance` and store it under a new handle.
	pub async fn load(&self, instance: &AemInstance) -> Result<MasterKeyHandle> {
		let resp = self.http.get(instance, MASTER_KEY_PATH).await?;
		if !resp.is_ok() {
			return Err(CryptoError::MasterKeyFetch {
				status: resp.status,
			});
		}

		let key = into_secret(resp.body);
		self.store(&key).await
	}

	/// Write `key` to a fresh file in the restricted tmp directory.
	pub async fn store(&self, key: &SecretBytes) -> Result<MasterKeyHandle> {
		let handle = MasterKeyHandle::generate();
		let path = self.key_path(&handle);
		debug!(handle = %handle, path = %path.display(), "storing master key");

		write_new(&path, key.expose())
			.await
			.map_err(|source| CryptoError::MasterKeyWrite {
				path: path.clone(),
				source,
			})?;

		Ok(handle)
	}

	/// Delete the key file behind `handle`.
	///
	/// Failures are logged and swallowed: a key that is already gone cannot
	/// be used anyway.
	pub async fn unload(&self, handle: &MasterKeyHandle) {
		let path = self.key_path(handle);
		info!(handle = %handle, path = %path.display(), "deleting master key");

		match tokio::fs::remove_file(&path).await {
			Ok(()) => info!(handle = %handle, "master key file deleted"),
			Err(e) => error!(path = %path.display(), error = %e, "can't delete master key file"),
		}
	}
}

/// Deletes a stored key file when dropped unless disarmed.
///
/// Covers the exits an async scope cannot observe: the future being dropped
/// mid-flight or a panic unwinding through it.
#[derive(Debug)]
pub(crate) struct KeyFileGuard {
	path: Option<PathBuf>,
}

impl KeyFileGuard {
	pub(crate) fn new(path: PathBuf) -> Self {
		Self { path: Some(path) }
	}

	/// The regular unload path has taken over.
	pub(crate) fn disarm(mut self) {
		self.path = None;
	}
}

impl Drop for KeyFileGuard {
	fn drop(&mut self) {
		let Some(path) = self.path.take() else {
			return;
		};
		match std::fs::remove_file(&path) {
			Ok(()) => info!(path = %path.display(), "master key file deleted after abandoned scope"),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => error!(path = %path.display(), error = %e, "can't delete master key file"),
		}
	}
}

/// Move a response body into a secret, wiping the transport buffer when this
/// is its only owner.
fn into_secret(body: Bytes) -> SecretBytes {
	match body.try_into_mut() {
		Ok(mut buf) => {
			let key = SecretBytes::new(buf.to_vec());
			let wiped: &mut [u8] = &mut buf;
			wiped.zeroize();
			key
		}
		Err(shared) => {
			debug!(len = shared.len(), "response buffer is shared, copying key without wiping it");
			SecretBytes::new(shared.to_vec())
		}
	}
}

async fn write_new(path: &Path, content: &[u8]) -> io::Result<()> {
	let mut options = tokio::fs::OpenOptions::new();
	options.write(true).create_new(true);
	#[cfg(unix)]
	options.mode(0o600);

	let file = options.open(path).await?;
	write_or_discard(path, file, content).await
}

/// Write `content` to the file at `path` through `writer`. On failure the
/// partially written file is deleted before the error is returned.
async fn write_or_discard<W>(path: &Path, mut writer: W, content: &[u8]) -> io::Result<()>
where
	W: AsyncWrite + Unpin,
{
	let written = match writer.write_all(content).await {
		Ok(()) => writer.flush().await,
		Err(e) => Err(e),
	};
	let Err(e) = written else {
		return Ok(());
	};

	drop(writer);
	match tokio::fs::remove_file(path).await {
		Ok(()) => warn!(path = %path.display(), "removed partially written master key file"),
		Err(remove) => error!(path = %path.display(), error = %remove, "can't delete partial master key file"),
	}
	Err(e)
}
