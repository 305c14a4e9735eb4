// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The entry point used by the orchestration layer.

use std::future::Future;
use std::sync::Arc;

use cq_common_http::{AemHttpClient, AemInstance, ReqwestAemClient};
use cq_common_secret::SecretString;
use cq_crypto_config::{CryptoConfig, InspectorKind};
use tracing::{info, instrument};

use crate::archive::{ArchiveExtractor, UnzipExtractor};
use crate::bytecode::{BytecodeInspector, ClassFileInspector, JavapInspector};
use crate::compile::CompiledArtifactCache;
use crate::decrypt::{DecryptInvoker, DecryptOutcome};
use crate::encrypt::EncryptGateway;
use crate::error::{CryptoError, Result};
use crate::fetch::LibraryFetcher;
use crate::layout::CryptoLayout;
use crate::master_key::{KeyFileGuard, MasterKeyHandle, MasterKeyManager};
use crate::materialize::DependencyMaterializer;

/// All crypto components wired to one configuration.
pub struct CryptoFacility {
	config: CryptoConfig,
	layout: CryptoLayout,
	materializer: DependencyMaterializer,
	fetcher: LibraryFetcher,
	compiled: CompiledArtifactCache,
	keys: MasterKeyManager,
	invoker: DecryptInvoker,
	gateway: EncryptGateway,
}

impl CryptoFacility {
	/// Build the facility with the real tools and a reqwest HTTP client.
	pub fn new(config: CryptoConfig) -> Result<Self> {
		let extractor = Arc::new(UnzipExtractor::new(config.tools.unzip.clone()));
		let inspector = inspector_for(&config);
		let http = Arc::new(ReqwestAemClient::new()?);
		Self::with_collaborators(config, extractor, inspector, http)
	}

	pub fn with_collaborators(
		config: CryptoConfig,
		extractor: Arc<dyn ArchiveExtractor>,
		inspector: Arc<dyn BytecodeInspector>,
		http: Arc<dyn AemHttpClient>,
	) -> Result<Self> {
		Ok(Self {
			layout: CryptoLayout::new(&config.cache_root),
			materializer: DependencyMaterializer::new(&config, extractor)?,
			fetcher: LibraryFetcher::new(&config, http.clone()),
			compiled: CompiledArtifactCache::new(&config, inspector),
			keys: MasterKeyManager::new(&config, http.clone()),
			invoker: DecryptInvoker::new(&config),
			gateway: EncryptGateway::new(http),
			config,
		})
	}

	pub fn config(&self) -> &CryptoConfig {
		&self.config
	}

	pub fn layout(&self) -> &CryptoLayout {
		&self.layout
	}

	pub fn materializer(&self) -> &DependencyMaterializer {
		&self.materializer
	}

	pub fn compiled(&self) -> &CompiledArtifactCache {
		&self.compiled
	}

	pub fn master_keys(&self) -> &MasterKeyManager {
		&self.keys
	}

	/// The configured instance, if any.
	pub fn instance(&self) -> Result<&AemInstance> {
		self.config.instance.as_ref().ok_or(CryptoError::NoInstance)
	}

	/// Get the decrypt helper ready to run: directories, AEM libraries, log
	/// libraries, helper source and its compiled form, in that order.
	#[instrument(skip(self), fields(root = %self.layout.root().display()))]
	pub async fn prepare(&self) -> Result<()> {
		self.layout.ensure_dirs().await?;
		self.materializer.ensure_libraries().await?;
		self.fetcher.ensure_log_libs().await?;
		let source_updated = self.compiled.deploy_source().await?;
		self.compiled
			.ensure_compiled(&self.config.jdk_version, source_updated)
			.await?;

		info!("decrypt helper ready");
		Ok(())
	}

	pub async fn load_master_key(&self, instance: &AemInstance) -> Result<MasterKeyHandle> {
		self.keys.load(instance).await
	}

	pub async fn unload_master_key(&self, handle: &MasterKeyHandle) {
		self.keys.unload(handle).await
	}

	/// Load the master key, run `f` with it and delete it again.
	///
	/// The key file is removed on every exit: whatever `f` returns, and also
	/// when this future is dropped before completing or `f` panics.
	pub async fn with_master_key<F, Fut, T>(&self, instance: &AemInstance, f: F) -> Result<T>
	where
		F: FnOnce(MasterKeyHandle) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let handle = self.keys.load(instance).await?;
		let guard = KeyFileGuard::new(self.keys.key_path(&handle));
		let result = f(handle.clone()).await;
		guard.disarm();
		self.keys.unload(&handle).await;
		result
	}

	/// The raw outcome, for callers that want to match on it.
	pub async fn decrypt_outcome(&self, handle: &MasterKeyHandle, ciphertext: &str) -> DecryptOutcome {
		self.invoker.decrypt(handle, ciphertext).await
	}

	/// `Ok(None)` when this value could not be decrypted; `Err` when nothing
	/// else should be attempted.
	pub async fn decrypt(&self, handle: &MasterKeyHandle, ciphertext: &str) -> Result<Option<SecretString>> {
		Ok(self.invoker.decrypt(handle, ciphertext).await.into_result()?)
	}

	/// Decrypt a batch in order, stopping at the first fatal failure.
	pub async fn decrypt_all<I, S>(&self, handle: &MasterKeyHandle, ciphertexts: I) -> Result<Vec<Option<SecretString>>>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut values = Vec::new();
		for ciphertext in ciphertexts {
			values.push(self.decrypt(handle, ciphertext.as_ref()).await?);
		}
		Ok(values)
	}

	pub async fn encrypt(&self, instance: &AemInstance, plaintext: &SecretString) -> Result<String> {
		self.gateway.encrypt(instance, plaintext).await
	}
}

/// The inspector selected by `tools.inspector`.
pub fn inspector_for(config: &CryptoConfig) -> Arc<dyn BytecodeInspector> {
	match config.tools.inspector {
		InspectorKind::ClassFile => Arc::new(ClassFileInspector),
		InspectorKind::Javap => Arc::new(JavapInspector::new(config.tools.javap.clone())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock_extractor::MockExtractor;
	use cq_crypto_config::ConfigLayer;

	fn config() -> CryptoConfig {
		CryptoConfig::from_layer(ConfigLayer {
			artifact_url: Some("https://repo.example.com/aem.jar".into()),
			..Default::default()
		})
		.unwrap()
	}

	#[test]
	fn missing_instance_is_reported() {
		let facility = CryptoFacility::with_collaborators(
			config(),
			Arc::new(MockExtractor::new()),
			Arc::new(ClassFileInspector),
			Arc::new(ReqwestAemClient::new().unwrap()),
		)
		.unwrap();
		assert!(matches!(facility.instance(), Err(CryptoError::NoInstance)));
	}

	#[test]
	fn invalid_bundle_pattern_fails_construction() {
		let mut config = config();
		config.libraries.bundle_pattern = "(".into();
		assert!(matches!(
			CryptoFacility::new(config),
			Err(CryptoError::Config(_))
		));
	}
}
