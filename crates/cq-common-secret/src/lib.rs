// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for the sensitive values that flow through the crypto subsystem.
//!
//! Three kinds of material pass through here: the instance password used for
//! basic auth, the raw master key bytes downloaded from `/etc/key/master`, and
//! plaintext going into or coming out of the crypto console / decrypt helper.
//! [`Secret<T>`] keeps all of them out of logs:
//!
//! - `Debug`/`Display` print `[REDACTED]`, so `tracing` fields are safe
//! - `Serialize` writes `[REDACTED]`, so config dumps are safe
//! - the inner value is zeroized on drop
//! - reading it requires an explicit `.expose()`
//!
//! ```
//! use cq_common_secret::{SecretBytes, SecretString};
//!
//! let password = SecretString::new("admin".to_string());
//! assert_eq!(format!("{password}"), "[REDACTED]");
//! assert_eq!(password.expose(), "admin");
//!
//! let key = SecretBytes::new(vec![0xde, 0xad]);
//! assert_eq!(format!("{key:?}"), "Secret(\"[REDACTED]\")");
//! assert_eq!(key.expose().len(), 2);
//! ```

use std::fmt;
use zeroize::Zeroize;

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

/// A wrapper for sensitive values that prevents accidental exposure.
///
/// There is deliberately no `Deref`; call sites must opt in with
/// [`Secret::expose`], which keeps secret access visible in review.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Secret text: passwords, plaintext values, decrypted values.
pub type SecretString = Secret<String>;

/// Secret binary material: master key bytes.
pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Explicitly access the inner value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Consume the wrapper and return a copy of the inner value.
	///
	/// The original memory is still zeroized when `self` drops.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	/// Length in bytes, safe to log.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl SecretBytes {
	/// Length in bytes, safe to log.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl From<Vec<u8>> for SecretBytes {
	fn from(value: Vec<u8>) -> Self {
		Self::new(value)
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

// `tracing::Value` is sealed, so structured logging relies on the redacted
// Display (`%secret`) and Debug (`?secret`) impls above.

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			let inner = T::deserialize(deserializer)?;
			Ok(Secret::new(inner))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	/// The instance password is routinely attached to request spans; Debug
	/// must never reveal it.
	#[test]
	fn password_debug_is_redacted() {
		let password = SecretString::new("admin-password".to_string());
		let debug_output = format!("{password:?}");

		assert!(!debug_output.contains("admin-password"));
		assert!(debug_output.contains(REDACTED));
	}

	#[test]
	fn master_key_bytes_display_is_redacted() {
		let key = SecretBytes::new(b"\x01\x02master".to_vec());
		assert_eq!(format!("{key}"), REDACTED);
		assert_eq!(key.len(), 8);
		assert!(!key.is_empty());
	}

	#[test]
	fn expose_returns_inner_value() {
		let plaintext: SecretString = "s3cr3t".into();
		assert_eq!(plaintext.expose(), "s3cr3t");
		assert_eq!(plaintext.len(), 6);
	}

	#[test]
	fn into_inner_returns_owned_copy() {
		let key = SecretBytes::from(vec![7, 7, 7]);
		assert_eq!(key.into_inner(), vec![7, 7, 7]);
	}

	#[test]
	fn equality_compares_inner_values() {
		let a = SecretString::from("key");
		let b = SecretString::from("key");
		let c = SecretString::from("other");

		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn option_secret_debug_is_redacted() {
		let password: Option<SecretString> = Some("hunter2".into());
		let debug = format!("{password:?}");
		assert!(debug.contains(REDACTED));
		assert!(!debug.contains("hunter2"));
	}

	#[cfg(feature = "serde")]
	mod serde_tests {
		use super::*;

		/// Dumping a resolved configuration must not leak the instance
		/// password.
		#[test]
		fn serialize_is_redacted() {
			let secret = SecretString::new("admin-password".to_string());
			let json = serde_json::to_string(&secret).unwrap();

			assert!(!json.contains("admin-password"));
			assert!(json.contains(REDACTED));
		}

		#[test]
		fn deserialize_populates_secret() {
			let secret: SecretString = serde_json::from_str(r#""admin""#).unwrap();
			assert_eq!(secret.expose(), "admin");
		}
	}

	proptest! {
		#[test]
		fn debug_never_contains_secret(inner in "[a-zA-Z0-9!@#$%^&*_+=;:,.<>?/-]{3,50}") {
			prop_assume!(!inner.contains("REDACTED"));
			prop_assume!(!inner.contains("Secret"));

			let secret = SecretString::new(inner.clone());
			let debug = format!("{:?}", secret);
			prop_assert!(!debug.contains(&inner), "debug output leaked the secret");
		}

		#[test]
		fn expose_roundtrips_bytes(inner in proptest::collection::vec(any::<u8>(), 0..64)) {
			let secret = SecretBytes::new(inner.clone());
			prop_assert_eq!(secret.expose(), &inner);
		}
	}
}
