// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the AEM crypto subsystem.
//!
//! This crate provides:
//! - Layered configuration: defaults, system file, explicit file, environment
//! - TOML configuration file parsing
//! - `CQ_CRYPTO_*` environment overrides, with `VAR_FILE` support for the
//!   instance password
//! - Validation of the resolved [`CryptoConfig`]

pub mod env;
pub mod error;
pub mod layer;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod validation;

use std::path::Path;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use registry::ConfigRegistry;
pub use runtime::{
	CryptoConfig, HelperConfig, InspectorKind, LibrariesConfig, LogFormat, LogLevel, LogLibsConfig,
	LoggingConfig, ToolCommand, ToolsConfig,
};
pub use sources::{ConfigSource, Precedence};

/// Load configuration from the default sources: built-in defaults,
/// `/etc/cq-crypto/config.toml`, an optional explicit file, then the
/// environment.
pub fn load_config(file: Option<&Path>) -> Result<CryptoConfig, ConfigError> {
	let mut registry = ConfigRegistry::new();

	registry.register(Box::new(sources::DefaultsSource));
	registry.register(Box::new(sources::FileSource::system()));
	if let Some(path) = file {
		registry.register(Box::new(sources::FileSource::custom(path)));
	}
	registry.register(Box::new(sources::EnvSource));

	registry.load()
}
