// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use cq_common_http::{AemHttpClient, AemInstance};
use cq_common_secret::SecretString;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CryptoError, Result};

/// The Felix crypto console endpoint.
pub const CRYPTO_CONSOLE_PATH: &str = "/system/console/crypto/.json";

#[derive(Deserialize)]
struct ConsoleResponse {
	protected: String,
}

/// Encrypts values through the instance's crypto console. Keeps no local
/// state.
pub struct EncryptGateway {
	http: Arc<dyn AemHttpClient>,
}

impl EncryptGateway {
	pub fn new(http: Arc<dyn AemHttpClient>) -> Self {
		Self { http }
	}

	/// Returns the protected form of `plaintext`, e.g. `{a1b2...}`.
	pub async fn encrypt(&self, instance: &AemInstance, plaintext: &SecretString) -> Result<String> {
		let resp = self
			.http
			.post_form(
				instance,
				CRYPTO_CONSOLE_PATH,
				&[("datum", plaintext.expose().as_str())],
			)
			.await?;

		if !resp.is_ok() {
			return Err(CryptoError::EncryptRejected {
				status: resp.status,
			});
		}

		let parsed: ConsoleResponse = serde_json::from_slice(&resp.body)
			.map_err(|e| CryptoError::InvalidResponse(format!("crypto console: {e}")))?;

		debug!(instance = %instance.url, protected = %parsed.protected, "value encrypted");
		Ok(parsed.protected)
	}
}
