// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use cq_common_secret::SecretString;
use serde::{Deserialize, Serialize};

/// One AEM instance: where it lives and how to authenticate against it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AemInstance {
	pub url: String,
	pub username: String,
	pub password: SecretString,
}

impl AemInstance {
	pub fn new(
		url: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<SecretString>,
	) -> Self {
		Self {
			url: url.into(),
			username: username.into(),
			password: password.into(),
		}
	}

	/// Absolute URL of `path` on this instance.
	pub fn endpoint(&self, path: &str) -> String {
		format!(
			"{}/{}",
			self.url.trim_end_matches('/'),
			path.trim_start_matches('/')
		)
	}
}

/// Last path segment of a URL, ignoring any query string or fragment.
///
/// `https://repo/a/b/cq-quickstart-6.1.0.jar?x=1` -> `cq-quickstart-6.1.0.jar`
pub fn uri_basename(url: &str) -> &str {
	let end = url.find(&['?', '#'][..]).unwrap_or(url.len());
	let path = url[..end].trim_end_matches('/');
	path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn endpoint_joins_without_double_slash() {
		let instance = AemInstance::new("http://localhost:4502/", "admin", "admin");
		assert_eq!(
			instance.endpoint("/etc/key/master"),
			"http://localhost:4502/etc/key/master"
		);

		let instance = AemInstance::new("http://localhost:4502", "admin", "admin");
		assert_eq!(
			instance.endpoint("system/console/crypto/.json"),
			"http://localhost:4502/system/console/crypto/.json"
		);
	}

	#[test]
	fn debug_does_not_leak_password() {
		let instance = AemInstance::new("http://localhost:4502", "admin", "topsecret");
		assert!(!format!("{instance:?}").contains("topsecret"));
	}

	#[test]
	fn uri_basename_strips_query_and_fragment() {
		assert_eq!(
			uri_basename("https://repo.example.com/aem/cq-quickstart-6.1.0.jar"),
			"cq-quickstart-6.1.0.jar"
		);
		assert_eq!(
			uri_basename("https://repo.example.com/aem/aem.jar?token=abc#frag"),
			"aem.jar"
		);
		assert_eq!(
			uri_basename("/org/slf4j/slf4j-api/1.7.12/slf4j-api-1.7.12.jar"),
			"slf4j-api-1.7.12.jar"
		);
		assert_eq!(uri_basename("plain.jar"), "plain.jar");
	}
}
