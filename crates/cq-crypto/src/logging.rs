// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use cq_crypto_config::{LogFormat, LogLevel, LoggingConfig};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber for the orchestration layer.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("cq_crypto={}", level_directive(logging.level))));

	let result = match logging.format {
		LogFormat::Json => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.try_init(),
		LogFormat::Compact => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.try_init(),
		LogFormat::Pretty => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().with_writer(std::io::stderr))
			.try_init(),
	};

	result.is_ok()
}

fn level_directive(level: LogLevel) -> &'static str {
	match level {
		LogLevel::Error => "error",
		LogLevel::Warn => "warn",
		LogLevel::Info => "info",
		LogLevel::Debug => "debug",
		LogLevel::Trace => "trace",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_init_is_harmless() {
		let config = LoggingConfig {
			level: LogLevel::Debug,
			format: LogFormat::Compact,
		};
		init_tracing(&config);
		assert!(!init_tracing(&config));
	}

	#[test]
	fn levels_map_to_directives() {
		assert_eq!(level_directive(LogLevel::Warn), "warn");
		assert_eq!(level_directive(LogLevel::Trace), "trace");
	}
}
