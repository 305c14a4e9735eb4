// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files, environment.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::env::load_secret_env;
use crate::layer::*;
use crate::ConfigError;

/// Prefix for every environment variable read by [`EnvSource`].
pub const ENV_PREFIX: &str = "CQ_CRYPTO_";

/// Environment variable holding the instance password (`_FILE` supported).
pub const PASSWORD_ENV: &str = "CQ_CRYPTO_INSTANCE_PASSWORD";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	SystemFile = 20,
	File = 30,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	/// Precedence level
	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		// Defaults are applied while resolving the runtime config.
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
}

impl FileSource {
	/// System config: /etc/cq-crypto/config.toml
	pub fn system() -> Self {
		Self {
			path: PathBuf::from("/etc/cq-crypto/config.toml"),
			precedence: Precedence::SystemFile,
			name: "system-config",
		}
	}

	/// Explicit config file handed over by the caller.
	pub fn custom(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			precedence: Precedence::File,
			name: "file-config",
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `CQ_CRYPTO_<FIELD>` for top-level fields and
/// `CQ_CRYPTO_<SECTION>_<FIELD>` for sections. The password is loaded through
/// [`load_secret_env`] so `CQ_CRYPTO_INSTANCE_PASSWORD_FILE` works too.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let mut layer = layer_from_vars(std::env::vars())?;

		if let Some(secret) = load_secret_env(PASSWORD_ENV)? {
			trace!("loaded instance password from environment");
			layer
				.instance
				.get_or_insert_with(InstanceLayer::default)
				.password = Some(secret);
		}

		Ok(layer)
	}
}

/// Build a layer from `CQ_CRYPTO_*` variables. Secrets are not read here.
pub fn layer_from_vars<I>(vars: I) -> Result<ConfigLayer, ConfigError>
where
	I: IntoIterator<Item = (String, String)>,
{
	let mut layer = ConfigLayer::default();

	for (key, value) in vars {
		if !key.starts_with(ENV_PREFIX) {
			continue;
		}

		let value = value.trim().to_string();
		if value.is_empty() {
			continue;
		}

		trace!(key = %key, "processing env var");

		match key.as_str() {
			"CQ_CRYPTO_CACHE_ROOT" => layer.cache_root = Some(PathBuf::from(value)),
			"CQ_CRYPTO_PRIMARY_ARTIFACT" => layer.primary_artifact = Some(PathBuf::from(value)),
			"CQ_CRYPTO_ARTIFACT_URL" => layer.artifact_url = Some(value),
			"CQ_CRYPTO_JDK_VERSION" => layer.jdk_version = Some(value),

			"CQ_CRYPTO_LIBRARIES_EXPECTED_COUNT" => {
				let count = value.parse().map_err(|_| {
					ConfigError::invalid_value(key.clone(), "expected a non-negative integer")
				})?;
				layer
					.libraries
					.get_or_insert_with(LibrariesLayer::default)
					.expected_count = Some(count);
			}

			"CQ_CRYPTO_LOG_LIBS_SERVER" => {
				layer
					.log_libs
					.get_or_insert_with(LogLibsLayer::default)
					.server = Some(value);
			}

			"CQ_CRYPTO_HELPER_SOURCE" => {
				layer.helper.get_or_insert_with(HelperLayer::default).source =
					Some(PathBuf::from(value));
			}

			"CQ_CRYPTO_UNZIP" => tool_program(&mut layer, |t| &mut t.unzip, value),
			"CQ_CRYPTO_JAVAP" => tool_program(&mut layer, |t| &mut t.javap, value),
			"CQ_CRYPTO_JAVAC" => tool_program(&mut layer, |t| &mut t.javac, value),
			"CQ_CRYPTO_JAVA" => tool_program(&mut layer, |t| &mut t.java, value),
			"CQ_CRYPTO_ENTROPY" => tool_program(&mut layer, |t| &mut t.entropy, value),
			"CQ_CRYPTO_ENTROPY_ENABLED" => {
				let enabled = parse_bool(&value)
					.ok_or_else(|| ConfigError::invalid_value(key.clone(), "expected true or false"))?;
				layer
					.tools
					.get_or_insert_with(ToolsLayer::default)
					.entropy_enabled = Some(enabled);
			}
			"CQ_CRYPTO_INSPECTOR" => {
				layer.tools.get_or_insert_with(ToolsLayer::default).inspector = Some(value);
			}

			"CQ_CRYPTO_INSTANCE_URL" => {
				layer.instance.get_or_insert_with(InstanceLayer::default).url = Some(value);
			}
			"CQ_CRYPTO_INSTANCE_USERNAME" => {
				layer
					.instance
					.get_or_insert_with(InstanceLayer::default)
					.username = Some(value);
			}

			"CQ_CRYPTO_LOG_LEVEL" => {
				layer.logging.get_or_insert_with(LoggingLayer::default).level = Some(value);
			}
			"CQ_CRYPTO_LOG_FORMAT" => {
				layer.logging.get_or_insert_with(LoggingLayer::default).format = Some(value);
			}

			_ => {}
		}
	}

	Ok(layer)
}

fn tool_program<F>(layer: &mut ConfigLayer, select: F, program: String)
where
	F: FnOnce(&mut ToolsLayer) -> &mut Option<ToolCommandLayer>,
{
	let tools = layer.tools.get_or_insert_with(ToolsLayer::default);
	select(tools)
		.get_or_insert_with(ToolCommandLayer::default)
		.program = Some(program);
}

fn parse_bool(value: &str) -> Option<bool> {
	match value.to_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::File);
		assert!(Precedence::File > Precedence::SystemFile);
		assert!(Precedence::SystemFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.cache_root.is_none());
		assert!(layer.tools.is_none());
	}

	#[test]
	fn test_file_source_missing_file_returns_empty() {
		let layer = FileSource::custom("/nonexistent/cq-crypto.toml")
			.load()
			.unwrap();
		assert!(layer.cache_root.is_none());
	}

	#[test]
	fn test_file_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "cache_root = [not toml").unwrap();

		let err = FileSource::custom(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_vars_map_onto_layer() {
		let layer = layer_from_vars(vars(&[
			("CQ_CRYPTO_CACHE_ROOT", "/var/chef/cache"),
			("CQ_CRYPTO_JDK_VERSION", " 8 "),
			("CQ_CRYPTO_JAVA", "/opt/jdk/bin/java"),
			("CQ_CRYPTO_ENTROPY_ENABLED", "false"),
			("CQ_CRYPTO_INSTANCE_URL", "http://localhost:4502"),
			("CQ_CRYPTO_INSTANCE_USERNAME", "admin"),
			("CQ_CRYPTO_LIBRARIES_EXPECTED_COUNT", "6"),
			("PATH", "/usr/bin"),
		]))
		.unwrap();

		assert_eq!(layer.cache_root, Some(PathBuf::from("/var/chef/cache")));
		assert_eq!(layer.jdk_version.as_deref(), Some("8"));
		let tools = layer.tools.unwrap();
		assert_eq!(
			tools.java.unwrap().program.as_deref(),
			Some("/opt/jdk/bin/java")
		);
		assert_eq!(tools.entropy_enabled, Some(false));
		assert_eq!(layer.libraries.unwrap().expected_count, Some(6));
		let instance = layer.instance.unwrap();
		assert_eq!(instance.url.as_deref(), Some("http://localhost:4502"));
		assert!(instance.password.is_none());
	}

	#[test]
	fn test_empty_env_values_are_ignored() {
		let layer = layer_from_vars(vars(&[("CQ_CRYPTO_JDK_VERSION", "   ")])).unwrap();
		assert!(layer.jdk_version.is_none());
	}

	#[test]
	fn test_invalid_env_values_are_rejected() {
		assert!(layer_from_vars(vars(&[("CQ_CRYPTO_ENTROPY_ENABLED", "maybe")])).is_err());
		assert!(layer_from_vars(vars(&[("CQ_CRYPTO_LIBRARIES_EXPECTED_COUNT", "-1")])).is_err());
	}
}
