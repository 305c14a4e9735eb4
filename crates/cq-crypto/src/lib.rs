// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decrypting AEM protected values on a provisioned host.
//!
//! AEM only decrypts `{...}` values inside the instance. To read them during
//! provisioning this crate assembles a small Java helper next to the
//! instance:
//!
//! 1. [`DependencyMaterializer`] digs the Granite crypto libraries out of the
//!    quickstart JAR, and [`LibraryFetcher`] downloads the logging libraries
//!    they need.
//! 2. [`CompiledArtifactCache`] deploys `Decrypt.java` and recompiles it when
//!    it is missing, stale or built for another Java release.
//! 3. [`MasterKeyManager`] fetches the instance master key into a scratch
//!    file named by a [`MasterKeyHandle`].
//! 4. [`DecryptInvoker`] runs the helper per value with an entropy source in
//!    the background, reporting a [`DecryptOutcome`].
//!
//! [`EncryptGateway`] is the opposite direction and only talks HTTP.
//! [`CryptoFacility`] wires all of it to one [`CryptoConfig`].
//!
//! ```no_run
//! # async fn run() -> cq_crypto::Result<()> {
//! use cq_crypto::CryptoFacility;
//!
//! let config = cq_crypto_config::load_config(None)?;
//! let facility = &CryptoFacility::new(config)?;
//! facility.prepare().await?;
//!
//! let instance = facility.instance()?.clone();
//! let values = facility
//! 	.with_master_key(&instance, |key| async move {
//! 		facility.decrypt_all(&key, ["{a1b2c3}", "{d4e5f6}"]).await
//! 	})
//! 	.await?;
//! # let _ = values;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod bytecode;
pub mod compile;
pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod facility;
pub mod fetch;
pub mod layout;
pub mod logging;
pub mod master_key;
pub mod materialize;
pub mod mock_extractor;
pub mod process;

pub use archive::{ArchiveExtractor, UnzipExtractor};
pub use bytecode::{BytecodeInspector, BytecodeVersion, ClassFileInspector, JavapInspector};
pub use compile::CompiledArtifactCache;
pub use cq_crypto_config::CryptoConfig;
pub use decrypt::{DecryptFailure, DecryptInvoker, DecryptOutcome};
pub use encrypt::EncryptGateway;
pub use error::{CryptoError, Result};
pub use facility::{inspector_for, CryptoFacility};
pub use fetch::LibraryFetcher;
pub use layout::CryptoLayout;
pub use master_key::{MasterKeyHandle, MasterKeyManager};
pub use materialize::DependencyMaterializer;
pub use mock_extractor::{ExtractCall, MockExtractor};
pub use process::{run_tool, AuxiliaryProcess, ToolOutput};
