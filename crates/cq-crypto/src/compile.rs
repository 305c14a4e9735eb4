// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deployment and conditional compilation of the decrypt helper.

use std::path::PathBuf;
use std::sync::Arc;

use cq_crypto_config::{CryptoConfig, HelperConfig, ToolCommand};
use tracing::{debug, info};

use crate::bytecode::BytecodeInspector;
use crate::error::Result;
use crate::layout::{set_mode, CryptoLayout};
use crate::process::run_tool;

/// Keeps `crypto/<Helper>.class` in line with its source and the desired
/// target release.
pub struct CompiledArtifactCache {
	layout: CryptoLayout,
	helper: HelperConfig,
	javac: ToolCommand,
	inspector: Arc<dyn BytecodeInspector>,
}

impl CompiledArtifactCache {
	pub fn new(config: &CryptoConfig, inspector: Arc<dyn BytecodeInspector>) -> Self {
		Self {
			layout: CryptoLayout::new(&config.cache_root),
			helper: config.helper.clone(),
			javac: config.tools.javac.clone(),
			inspector,
		}
	}

	pub fn source_path(&self) -> PathBuf {
		self.layout.source_file(&self.helper.class_name)
	}

	pub fn class_path(&self) -> PathBuf {
		self.layout.class_file(&self.helper.class_name)
	}

	/// Copy the configured helper source into the crypto root.
	///
	/// Returns `true` when the deployed file changed. Without a configured
	/// source the already deployed file is used as is.
	pub async fn deploy_source(&self) -> Result<bool> {
		let Some(source) = &self.helper.source else {
			debug!(path = %self.source_path().display(), "no helper source configured");
			return Ok(false);
		};

		let content = tokio::fs::read(source).await?;
		let dest = self.source_path();
		match tokio::fs::read(&dest).await {
			Ok(existing) if existing == content => {
				debug!(path = %dest.display(), "helper source up to date");
				return Ok(false);
			}
			Ok(_) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}

		tokio::fs::write(&dest, &content).await?;
		set_mode(&dest, 0o644).await?;
		info!(from = %source.display(), to = %dest.display(), "deployed helper source");
		Ok(true)
	}

	/// Whether the compiled helper is missing, older than its deployed source
	/// or targets another release than `desired_label`.
	pub async fn needs_rebuild(&self, desired_label: &str) -> Result<bool> {
		let class = self.class_path();
		let class_modified = match tokio::fs::metadata(&class).await {
			Ok(meta) => meta.modified()?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = %class.display(), "compiled helper missing");
				return Ok(true);
			}
			Err(e) => return Err(e.into()),
		};

		let source = self.source_path();
		match tokio::fs::metadata(&source).await {
			Ok(meta) if meta.modified()? > class_modified => {
				info!(path = %class.display(), source = %source.display(), "compiled helper is older than its source");
				return Ok(true);
			}
			Ok(_) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}

		let version = self.inspector.inspect(&class).await?;
		match version.target_label() {
			Some(label) if label == desired_label => Ok(false),
			found => {
				info!(
					path = %class.display(),
					%version,
					found = found.unwrap_or("unknown"),
					desired = desired_label,
					"compiled helper targets a different release"
				);
				Ok(true)
			}
		}
	}

	/// Rebuild the helper when it is missing, targets another release, or
	/// its source was just redeployed. Returns whether it was compiled.
	pub async fn ensure_compiled(&self, desired_label: &str, source_updated: bool) -> Result<bool> {
		if !source_updated && !self.needs_rebuild(desired_label).await? {
			debug!(path = %self.class_path().display(), "compiled helper up to date");
			return Ok(false);
		}

		self.compile().await?;
		Ok(true)
	}

	/// Run the compiler from the crypto root against the crypto classpath.
	pub async fn compile(&self) -> Result<()> {
		let source = format!("{}.java", self.helper.class_name);
		let classpath = self.layout.classpath();

		run_tool(
			&self.javac,
			["-cp", classpath.as_str(), source.as_str()],
			Some(self.layout.root()),
		)
		.await?;

		info!(path = %self.class_path().display(), "compiled decrypt helper");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bytecode::ClassFileInspector;
	use crate::error::CryptoError;
	use cq_crypto_config::ConfigLayer;
	use std::path::Path;

	/// Fake `javac` emitting a Java 8 class header for `$3` and logging each
	/// run to `javac.log` in the working directory.
	const FAKE_JAVAC: &str = r#"
[ "$1" = -cp ] || exit 2
[ -f "$3" ] || { echo "error: file not found: $3" >&2; exit 2; }
echo "$2" >> javac.log
printf '\312\376\272\276\000\000\000\064' > "$(basename "$3" .java).class"
"#;

	fn setup(root: &Path) -> (CryptoConfig, PathBuf) {
		let script = root.join("javac.sh");
		std::fs::write(&script, FAKE_JAVAC).unwrap();
		let helper = root.join("Decrypt.java.src");
		std::fs::write(&helper, "public class Decrypt {}\n").unwrap();

		let mut config = CryptoConfig::from_layer(ConfigLayer {
			cache_root: Some(root.to_path_buf()),
			artifact_url: Some("https://repo.example.com/aem.jar".into()),
			..Default::default()
		})
		.unwrap();
		config.tools.javac = ToolCommand::new("/bin/sh").with_args([script.display().to_string()]);
		config.helper.source = Some(helper.clone());
		std::fs::create_dir_all(root.join("crypto")).unwrap();
		(config, helper)
	}

	fn compilations(root: &Path) -> Vec<String> {
		std::fs::read_to_string(root.join("crypto/javac.log"))
			.unwrap_or_default()
			.lines()
			.map(String::from)
			.collect()
	}

	#[tokio::test]
	async fn deploy_source_reports_updates_only() {
		let dir = tempfile::tempdir().unwrap();
		let (config, helper) = setup(dir.path());
		let cache = CompiledArtifactCache::new(&config, Arc::new(ClassFileInspector));

		assert!(cache.deploy_source().await.unwrap());
		assert!(!cache.deploy_source().await.unwrap());

		std::fs::write(&helper, "public class Decrypt { /* v2 */ }\n").unwrap();
		assert!(cache.deploy_source().await.unwrap());
		assert_eq!(
			std::fs::read_to_string(cache.source_path()).unwrap(),
			"public class Decrypt { /* v2 */ }\n"
		);
	}

	#[tokio::test]
	async fn compiles_when_missing_then_caches() {
		let dir = tempfile::tempdir().unwrap();
		let (config, _) = setup(dir.path());
		let cache = CompiledArtifactCache::new(&config, Arc::new(ClassFileInspector));
		cache.deploy_source().await.unwrap();

		assert!(cache.ensure_compiled("8", false).await.unwrap());
		assert!(cache.class_path().exists());
		assert!(!cache.ensure_compiled("8", false).await.unwrap());

		let runs = compilations(dir.path());
		assert_eq!(runs, vec![".:tmp:libs/aem/*:libs/log/*"]);
	}

	#[tokio::test]
	async fn version_mismatch_triggers_rebuild() {
		let dir = tempfile::tempdir().unwrap();
		let (config, _) = setup(dir.path());
		let cache = CompiledArtifactCache::new(&config, Arc::new(ClassFileInspector));
		cache.deploy_source().await.unwrap();
		cache.ensure_compiled("8", false).await.unwrap();

		assert!(cache.needs_rebuild("11").await.unwrap());
		assert!(cache.ensure_compiled("11", false).await.unwrap());
		assert_eq!(compilations(dir.path()).len(), 2);
	}

	#[tokio::test]
	async fn redeployed_source_triggers_rebuild() {
		let dir = tempfile::tempdir().unwrap();
		let (config, _) = setup(dir.path());
		let cache = CompiledArtifactCache::new(&config, Arc::new(ClassFileInspector));
		cache.deploy_source().await.unwrap();
		cache.ensure_compiled("8", false).await.unwrap();

		assert!(cache.ensure_compiled("8", true).await.unwrap());
		assert_eq!(compilations(dir.path()).len(), 2);
	}

	#[tokio::test]
	async fn source_left_behind_by_failed_compile_is_rebuilt() {
		let dir = tempfile::tempdir().unwrap();
		let (config, helper) = setup(dir.path());
		let cache = CompiledArtifactCache::new(&config, Arc::new(ClassFileInspector));
		cache.deploy_source().await.unwrap();
		cache.ensure_compiled("8", false).await.unwrap();

		// Keep the new source's mtime clear of the class file's.
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		std::fs::write(&helper, "public class Decrypt { /* v2 */ }\n").unwrap();
		let mut broken = config.clone();
		broken.tools.javac = ToolCommand::new("/bin/sh").with_args(["-c", "echo 'error: ; expected' >&2; exit 1"]);
		let broken = CompiledArtifactCache::new(&broken, Arc::new(ClassFileInspector));
		assert!(broken.deploy_source().await.unwrap());
		assert!(broken.ensure_compiled("8", true).await.is_err());

		assert!(!cache.deploy_source().await.unwrap());
		assert!(cache.needs_rebuild("8").await.unwrap());
		assert!(cache.ensure_compiled("8", false).await.unwrap());
		assert!(!cache.ensure_compiled("8", false).await.unwrap());
		assert_eq!(compilations(dir.path()).len(), 2);
	}

	#[tokio::test]
	async fn compiler_failure_is_fatal() {
		let dir = tempfile::tempdir().unwrap();
		let (config, _) = setup(dir.path());
		let cache = CompiledArtifactCache::new(&config, Arc::new(ClassFileInspector));

		// Source never deployed, so the fake compiler cannot find it.
		let err = cache.ensure_compiled("8", false).await.unwrap_err();
		match err {
			CryptoError::ToolFailed { output, .. } => {
				assert!(output.contains("file not found: Decrypt.java"))
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}
}
