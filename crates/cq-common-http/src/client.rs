// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

use crate::error::HttpError;

/// Creates a new HTTP client with the standard User-Agent header.
///
/// The User-Agent format is: `cq-crypto/{version} ({os}-{arch})`
/// Example: `cq-crypto/0.1.0 (linux-x86_64)`
pub(crate) fn new_client() -> Result<Client, HttpError> {
	builder().build().map_err(HttpError::Client)
}

fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

fn user_agent() -> String {
	format!(
		"cq-crypto/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
