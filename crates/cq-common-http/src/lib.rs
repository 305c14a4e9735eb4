// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the crypto subsystem.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header
//! - [`AemInstance`]: base URL plus basic-auth credentials of one instance
//! - [`AemHttpClient`]: the narrow GET / form POST / download surface the
//!   crypto core needs, with a reqwest-backed implementation

mod aem;
mod client;
mod error;
mod instance;

pub use aem::{AemHttpClient, HttpResponse, ReqwestAemClient};
pub use error::HttpError;
pub use instance::{uri_basename, AemInstance};
