// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::HttpError;
use crate::instance::AemInstance;

/// Status and raw body of a completed request.
///
/// Non-2xx statuses are not errors at this layer; callers decide which codes
/// they accept.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	pub status: u16,
	pub body: Bytes,
}

impl HttpResponse {
	pub fn is_ok(&self) -> bool {
		self.status == 200
	}
}

/// The HTTP operations the crypto subsystem performs.
///
/// Abstracted so the core can be exercised against recorded responses.
#[async_trait]
pub trait AemHttpClient: Send + Sync {
	/// Authenticated GET of `path` on `instance`.
	async fn get(&self, instance: &AemInstance, path: &str) -> Result<HttpResponse, HttpError>;

	/// Authenticated POST of an url-encoded form to `path` on `instance`.
	async fn post_form(
		&self,
		instance: &AemInstance,
		path: &str,
		form: &[(&str, &str)],
	) -> Result<HttpResponse, HttpError>;

	/// Anonymous GET of an absolute URL (auxiliary library downloads).
	async fn download(&self, url: &str) -> Result<HttpResponse, HttpError>;
}

/// [`AemHttpClient`] backed by a shared reqwest client.
#[derive(Clone, Debug)]
pub struct ReqwestAemClient {
	client: Client,
}

impl ReqwestAemClient {
	pub fn new() -> Result<Self, HttpError> {
		Ok(Self {
			client: crate::client::new_client()?,
		})
	}

	async fn finish(url: String, resp: reqwest::Response) -> Result<HttpResponse, HttpError> {
		let status = resp.status().as_u16();
		let body = resp
			.bytes()
			.await
			.map_err(|source| HttpError::Body { url: url.clone(), source })?;

		debug!(url = %url, status, body_len = body.len(), "received response");
		Ok(HttpResponse { status, body })
	}
}

#[async_trait]
impl AemHttpClient for ReqwestAemClient {
	async fn get(&self, instance: &AemInstance, path: &str) -> Result<HttpResponse, HttpError> {
		let url = instance.endpoint(path);
		trace!(url = %url, username = %instance.username, "GET");

		let resp = self
			.client
			.get(&url)
			.basic_auth(&instance.username, Some(instance.password.expose()))
			.send()
			.await
			.map_err(|source| HttpError::Request { url: url.clone(), source })?;

		Self::finish(url, resp).await
	}

	async fn post_form(
		&self,
		instance: &AemInstance,
		path: &str,
		form: &[(&str, &str)],
	) -> Result<HttpResponse, HttpError> {
		let url = instance.endpoint(path);
		trace!(url = %url, username = %instance.username, fields = form.len(), "POST form");

		let resp = self
			.client
			.post(&url)
			.basic_auth(&instance.username, Some(instance.password.expose()))
			.form(form)
			.send()
			.await
			.map_err(|source| HttpError::Request { url: url.clone(), source })?;

		Self::finish(url, resp).await
	}

	async fn download(&self, url: &str) -> Result<HttpResponse, HttpError> {
		trace!(url = %url, "download");

		let resp = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|source| HttpError::Request {
				url: url.to_string(),
				source,
			})?;

		Self::finish(url.to_string(), resp).await
	}
}
