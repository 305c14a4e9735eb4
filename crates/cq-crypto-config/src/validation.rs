// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use regex::Regex;
use tracing::warn;

use crate::runtime::CryptoConfig;
use crate::ConfigError;

/// Validate the configuration.
pub fn validate_config(config: &CryptoConfig) -> Result<(), ConfigError> {
	validate_libraries(config)?;
	validate_log_libs(config)?;
	validate_tools(config)?;
	validate_instance(config)?;

	if config.jdk_version.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"jdk_version",
			"jdk_version cannot be empty",
		));
	}

	Ok(())
}

fn validate_libraries(config: &CryptoConfig) -> Result<(), ConfigError> {
	let libs = &config.libraries;

	if libs.expected_count == 0 {
		return Err(ConfigError::invalid_value(
			"libraries.expected_count",
			"must be greater than zero",
		));
	}

	for (field, filter) in [
		("libraries.standalone_filter", &libs.standalone_filter),
		("libraries.bundle_filter", &libs.bundle_filter),
		("libraries.embedded_filter", &libs.embedded_filter),
	] {
		if filter.trim().is_empty() {
			return Err(ConfigError::invalid_value(field, "filter cannot be empty"));
		}
	}

	Regex::new(&libs.bundle_pattern)
		.map_err(|e| ConfigError::invalid_value("libraries.bundle_pattern", e.to_string()))?;

	Ok(())
}

fn validate_log_libs(config: &CryptoConfig) -> Result<(), ConfigError> {
	if config.log_libs.data.is_empty() {
		warn!("log_libs.data is empty; no auxiliary libraries will be fetched");
		return Ok(());
	}

	if config.log_libs.server.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"log_libs.server",
			"server cannot be empty when log_libs.data is set",
		));
	}

	for (path, checksum) in &config.log_libs.data {
		if !is_sha256_hex(checksum) {
			return Err(ConfigError::invalid_value(
				format!("log_libs.data.{path}"),
				"checksum must be 64 hex characters (SHA-256)",
			));
		}
	}

	Ok(())
}

fn validate_tools(config: &CryptoConfig) -> Result<(), ConfigError> {
	let tools = &config.tools;
	for (field, tool) in [
		("tools.unzip", &tools.unzip),
		("tools.javap", &tools.javap),
		("tools.javac", &tools.javac),
		("tools.java", &tools.java),
		("tools.entropy", &tools.entropy),
	] {
		if tool.program.trim().is_empty() {
			return Err(ConfigError::invalid_value(
				format!("{field}.program"),
				"program cannot be empty",
			));
		}
	}

	if config.helper.class_name.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"helper.class_name",
			"class_name cannot be empty",
		));
	}

	Ok(())
}

fn validate_instance(config: &CryptoConfig) -> Result<(), ConfigError> {
	if let Some(instance) = &config.instance {
		if instance.url.trim().is_empty() {
			return Err(ConfigError::invalid_value("instance.url", "url cannot be empty"));
		}
		if !instance.url.starts_with("http://") && !instance.url.starts_with("https://") {
			return Err(ConfigError::invalid_value(
				"instance.url",
				"url must start with http:// or https://",
			));
		}
		if instance.password.is_empty() {
			warn!(url = %instance.url, "instance password is empty");
		}
	}

	Ok(())
}

fn is_sha256_hex(value: &str) -> bool {
	value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
