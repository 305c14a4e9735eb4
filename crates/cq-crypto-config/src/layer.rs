// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.

use cq_common_secret::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Partial configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub cache_root: Option<PathBuf>,
	#[serde(default)]
	pub primary_artifact: Option<PathBuf>,
	#[serde(default)]
	pub artifact_url: Option<String>,
	#[serde(default)]
	pub jdk_version: Option<String>,
	#[serde(default)]
	pub libraries: Option<LibrariesLayer>,
	#[serde(default)]
	pub log_libs: Option<LogLibsLayer>,
	#[serde(default)]
	pub helper: Option<HelperLayer>,
	#[serde(default)]
	pub tools: Option<ToolsLayer>,
	#[serde(default)]
	pub instance: Option<InstanceLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibrariesLayer {
	#[serde(default)]
	pub expected_count: Option<usize>,
	#[serde(default)]
	pub standalone_filter: Option<String>,
	#[serde(default)]
	pub bundle_filter: Option<String>,
	#[serde(default)]
	pub bundle_pattern: Option<String>,
	#[serde(default)]
	pub embedded_filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogLibsLayer {
	#[serde(default)]
	pub server: Option<String>,
	/// Relative path -> SHA-256. Entries from higher layers are added on top.
	#[serde(default)]
	pub data: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelperLayer {
	#[serde(default)]
	pub source: Option<PathBuf>,
	#[serde(default)]
	pub class_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCommandLayer {
	#[serde(default)]
	pub program: Option<String>,
	#[serde(default)]
	pub args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsLayer {
	#[serde(default)]
	pub unzip: Option<ToolCommandLayer>,
	#[serde(default)]
	pub javap: Option<ToolCommandLayer>,
	#[serde(default)]
	pub javac: Option<ToolCommandLayer>,
	#[serde(default)]
	pub java: Option<ToolCommandLayer>,
	#[serde(default)]
	pub entropy: Option<ToolCommandLayer>,
	#[serde(default)]
	pub entropy_enabled: Option<bool>,
	#[serde(default)]
	pub inspector: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
pub struct InstanceLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<SecretString>,
}

impl std::fmt::Debug for InstanceLayer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstanceLayer")
			.field("url", &self.url)
			.field("username", &self.username)
			.field("password", &self.password)
			.finish()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ConfigLayer) {
		overwrite(&mut self.cache_root, other.cache_root);
		overwrite(&mut self.primary_artifact, other.primary_artifact);
		overwrite(&mut self.artifact_url, other.artifact_url);
		overwrite(&mut self.jdk_version, other.jdk_version);
		merge_option(&mut self.libraries, other.libraries, LibrariesLayer::merge);
		merge_option(&mut self.log_libs, other.log_libs, LogLibsLayer::merge);
		merge_option(&mut self.helper, other.helper, HelperLayer::merge);
		merge_option(&mut self.tools, other.tools, ToolsLayer::merge);
		merge_option(&mut self.instance, other.instance, InstanceLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
	}
}

fn overwrite<T>(target: &mut Option<T>, source: Option<T>) {
	if source.is_some() {
		*target = source;
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

impl LibrariesLayer {
	fn merge(&mut self, other: LibrariesLayer) {
		overwrite(&mut self.expected_count, other.expected_count);
		overwrite(&mut self.standalone_filter, other.standalone_filter);
		overwrite(&mut self.bundle_filter, other.bundle_filter);
		overwrite(&mut self.bundle_pattern, other.bundle_pattern);
		overwrite(&mut self.embedded_filter, other.embedded_filter);
	}
}

impl LogLibsLayer {
	fn merge(&mut self, other: LogLibsLayer) {
		overwrite(&mut self.server, other.server);
		merge_option(&mut self.data, other.data, |t, s| t.extend(s));
	}
}

impl HelperLayer {
	fn merge(&mut self, other: HelperLayer) {
		overwrite(&mut self.source, other.source);
		overwrite(&mut self.class_name, other.class_name);
	}
}

impl ToolCommandLayer {
	fn merge(&mut self, other: ToolCommandLayer) {
		overwrite(&mut self.program, other.program);
		overwrite(&mut self.args, other.args);
	}
}

impl ToolsLayer {
	fn merge(&mut self, other: ToolsLayer) {
		merge_option(&mut self.unzip, other.unzip, ToolCommandLayer::merge);
		merge_option(&mut self.javap, other.javap, ToolCommandLayer::merge);
		merge_option(&mut self.javac, other.javac, ToolCommandLayer::merge);
		merge_option(&mut self.java, other.java, ToolCommandLayer::merge);
		merge_option(&mut self.entropy, other.entropy, ToolCommandLayer::merge);
		overwrite(&mut self.entropy_enabled, other.entropy_enabled);
		overwrite(&mut self.inspector, other.inspector);
	}
}

impl InstanceLayer {
	fn merge(&mut self, other: InstanceLayer) {
		overwrite(&mut self.url, other.url);
		overwrite(&mut self.username, other.username);
		overwrite(&mut self.password, other.password);
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		overwrite(&mut self.level, other.level);
		overwrite(&mut self.format, other.format);
	}
}
