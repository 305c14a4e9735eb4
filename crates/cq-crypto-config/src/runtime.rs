// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use cq_common_http::{uri_basename, AemInstance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::layer::*;
use crate::ConfigError;

pub const DEFAULT_CACHE_ROOT: &str = "/var/cache/cq";
pub const DEFAULT_JDK_VERSION: &str = "8";
pub const DEFAULT_EXPECTED_LIBRARIES: usize = 5;
pub const DEFAULT_STANDALONE_FILTER: &str = "static/app/*";
pub const DEFAULT_BUNDLE_FILTER: &str = "resources/install/0/com.adobe.granite.crypto*.jar";
pub const DEFAULT_BUNDLE_PATTERN: &str = r"com\.adobe\.granite\.crypto.+";
pub const DEFAULT_EMBEDDED_FILTER: &str = "META-INF/lib/*";
pub const DEFAULT_LOG_LIBS_SERVER: &str = "https://repo1.maven.org/maven2";
pub const DEFAULT_HELPER_CLASS: &str = "Decrypt";

/// The final, validated configuration of the crypto subsystem.
///
/// Built once and handed to each component at construction.
#[derive(Debug, Clone, Serialize)]
pub struct CryptoConfig {
	/// Root under which `crypto/` is laid out.
	pub cache_root: PathBuf,
	/// The AEM quickstart JAR the crypto libraries are unpacked from.
	pub primary_artifact: PathBuf,
	/// Target label the decrypt helper must be compiled for, e.g. `"8"`.
	pub jdk_version: String,
	pub libraries: LibrariesConfig,
	pub log_libs: LogLibsConfig,
	pub helper: HelperConfig,
	pub tools: ToolsConfig,
	pub instance: Option<AemInstance>,
	pub logging: LoggingConfig,
}

/// How the AEM crypto libraries are dug out of the primary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrariesConfig {
	/// Number of files `libs/aem` holds once materialization is complete.
	pub expected_count: usize,
	/// Entry filter for the standalone quickstart inside the primary JAR.
	pub standalone_filter: String,
	/// Entry filter for the crypto bundle inside the standalone JAR.
	pub bundle_filter: String,
	/// Regex locating the extracted bundle; its version differs per release.
	pub bundle_pattern: String,
	/// Entry filter for the libraries embedded in the crypto bundle.
	pub embedded_filter: String,
}

impl Default for LibrariesConfig {
	fn default() -> Self {
		Self {
			expected_count: DEFAULT_EXPECTED_LIBRARIES,
			standalone_filter: DEFAULT_STANDALONE_FILTER.to_string(),
			bundle_filter: DEFAULT_BUNDLE_FILTER.to_string(),
			bundle_pattern: DEFAULT_BUNDLE_PATTERN.to_string(),
			embedded_filter: DEFAULT_EMBEDDED_FILTER.to_string(),
		}
	}
}

/// Auxiliary logging libraries fetched from a Maven-style server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLibsConfig {
	pub server: String,
	/// Relative path -> expected SHA-256 (hex).
	pub data: BTreeMap<String, String>,
}

impl Default for LogLibsConfig {
	fn default() -> Self {
		Self {
			server: DEFAULT_LOG_LIBS_SERVER.to_string(),
			data: BTreeMap::new(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
	/// Source file deployed as `crypto/<class_name>.java`.
	pub source: Option<PathBuf>,
	pub class_name: String,
}

impl Default for HelperConfig {
	fn default() -> Self {
		Self {
			source: None,
			class_name: DEFAULT_HELPER_CLASS.to_string(),
		}
	}
}

/// An external program plus the arguments placed before any call-specific
/// ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
	pub program: String,
	#[serde(default)]
	pub args: Vec<String>,
}

impl ToolCommand {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
		}
	}

	pub fn with_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	fn from_layer(layer: Option<ToolCommandLayer>, default: ToolCommand) -> Self {
		match layer {
			Some(l) => Self {
				program: l.program.unwrap_or(default.program),
				args: l.args.unwrap_or(default.args),
			},
			None => default,
		}
	}
}

/// Which strategy reads the target version of a compiled helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InspectorKind {
	/// Read the class file header directly.
	#[default]
	ClassFile,
	/// Parse `javap -verbose` output.
	Javap,
}

impl FromStr for InspectorKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"class-file" | "classfile" => Ok(Self::ClassFile),
			"javap" => Ok(Self::Javap),
			other => Err(ConfigError::invalid_value(
				"tools.inspector",
				format!("unknown inspector '{other}', expected 'class-file' or 'javap'"),
			)),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
	pub unzip: ToolCommand,
	pub javap: ToolCommand,
	pub javac: ToolCommand,
	pub java: ToolCommand,
	/// Background process topping up the kernel entropy pool while the
	/// decrypt helper runs.
	pub entropy: ToolCommand,
	pub entropy_enabled: bool,
	pub inspector: InspectorKind,
}

impl Default for ToolsConfig {
	fn default() -> Self {
		Self {
			unzip: ToolCommand::new("unzip"),
			javap: ToolCommand::new("javap"),
			javac: ToolCommand::new("javac"),
			java: ToolCommand::new("java"),
			entropy: ToolCommand::new("rngd").with_args(["-r", "/dev/urandom", "-o", "/dev/random", "-f"]),
			entropy_enabled: true,
			inspector: InspectorKind::default(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Error,
	Warn,
	#[default]
	Info,
	Debug,
	Trace,
}

impl FromStr for LogLevel {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"error" => Ok(Self::Error),
			"warn" | "warning" => Ok(Self::Warn),
			"info" => Ok(Self::Info),
			"debug" => Ok(Self::Debug),
			"trace" => Ok(Self::Trace),
			other => Err(ConfigError::invalid_value(
				"logging.level",
				format!("unknown level '{other}'"),
			)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
	Compact,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"pretty" => Ok(Self::Pretty),
			"json" => Ok(Self::Json),
			"compact" => Ok(Self::Compact),
			other => Err(ConfigError::invalid_value(
				"logging.format",
				format!("unknown format '{other}'"),
			)),
		}
	}
}

impl CryptoConfig {
	/// Resolve a merged layer into a runtime configuration.
	///
	/// The primary artifact is the explicit `primary_artifact` when given,
	/// otherwise `<cache_root>/<basename(artifact_url)>`.
	pub fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
		let cache_root = layer
			.cache_root
			.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_ROOT));

		let primary_artifact = match (layer.primary_artifact, layer.artifact_url) {
			(Some(path), _) => path,
			(None, Some(url)) => {
				let name = uri_basename(&url);
				if name.is_empty() {
					return Err(ConfigError::invalid_value(
						"artifact_url",
						"URL has no file name",
					));
				}
				cache_root.join(name)
			}
			(None, None) => return Err(ConfigError::missing_field("primary_artifact or artifact_url")),
		};

		let libraries = {
			let defaults = LibrariesConfig::default();
			let l = layer.libraries.unwrap_or_default();
			LibrariesConfig {
				expected_count: l.expected_count.unwrap_or(defaults.expected_count),
				standalone_filter: l.standalone_filter.unwrap_or(defaults.standalone_filter),
				bundle_filter: l.bundle_filter.unwrap_or(defaults.bundle_filter),
				bundle_pattern: l.bundle_pattern.unwrap_or(defaults.bundle_pattern),
				embedded_filter: l.embedded_filter.unwrap_or(defaults.embedded_filter),
			}
		};

		let log_libs = {
			let defaults = LogLibsConfig::default();
			let l = layer.log_libs.unwrap_or_default();
			LogLibsConfig {
				server: l.server.unwrap_or(defaults.server),
				data: l.data.unwrap_or(defaults.data),
			}
		};

		let helper = {
			let defaults = HelperConfig::default();
			let h = layer.helper.unwrap_or_default();
			HelperConfig {
				source: h.source.or(defaults.source),
				class_name: h.class_name.unwrap_or(defaults.class_name),
			}
		};

		let tools = {
			let defaults = ToolsConfig::default();
			let t = layer.tools.unwrap_or_default();
			ToolsConfig {
				unzip: ToolCommand::from_layer(t.unzip, defaults.unzip),
				javap: ToolCommand::from_layer(t.javap, defaults.javap),
				javac: ToolCommand::from_layer(t.javac, defaults.javac),
				java: ToolCommand::from_layer(t.java, defaults.java),
				entropy: ToolCommand::from_layer(t.entropy, defaults.entropy),
				entropy_enabled: t.entropy_enabled.unwrap_or(defaults.entropy_enabled),
				inspector: match t.inspector {
					Some(s) => s.parse()?,
					None => defaults.inspector,
				},
			}
		};

		let instance = match layer.instance {
			None => None,
			Some(i) => match (i.url, i.username, i.password) {
				(None, None, None) => None,
				(Some(url), Some(username), Some(password)) => {
					Some(AemInstance::new(url, username, password))
				}
				(None, _, _) => return Err(ConfigError::missing_field("instance.url")),
				(_, None, _) => return Err(ConfigError::missing_field("instance.username")),
				(_, _, None) => return Err(ConfigError::missing_field("instance.password")),
			},
		};

		let logging = {
			let l = layer.logging.unwrap_or_default();
			LoggingConfig {
				level: match l.level {
					Some(s) => s.parse()?,
					None => LogLevel::default(),
				},
				format: match l.format {
					Some(s) => s.parse()?,
					None => LogFormat::default(),
				},
			}
		};

		Ok(Self {
			cache_root,
			primary_artifact,
			jdk_version: layer
				.jdk_version
				.unwrap_or_else(|| DEFAULT_JDK_VERSION.to_string()),
			libraries,
			log_libs,
			helper,
			tools,
			instance,
			logging,
		})
	}
}
