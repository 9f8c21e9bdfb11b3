// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper type for values that must never reach a log line.
//!
//! Keyward moves three kinds of sensitive material around: master key
//! encodings loaded from the environment, decrypted secret values handed back
//! to internal callers, and freshly issued API tokens. All of them travel
//! inside [`Secret<T>`]:
//!
//! - `Debug` and `Display` print `[REDACTED]`
//! - serializing writes `"[REDACTED]"` (deserializing reads the real value)
//! - the inner value is zeroized when the wrapper is dropped
//! - reading the value requires an explicit [`Secret::expose`] call
//!
//! ```
//! use keyward_common_secret::SecretString;
//!
//! let value = SecretString::new("sk-abc123".to_string());
//! assert_eq!(format!("{value}"), "[REDACTED]");
//! assert_eq!(value.expose(), "sk-abc123");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

/// A sensitive value with redacted formatting and zeroize-on-drop.
///
/// There is intentionally no `Deref`; call [`Secret::expose`] at the point of
/// use so reads of secret material stand out in review.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Secret UTF-8 text: decrypted values, tokens, encoded keys.
pub type SecretString = Secret<String>;

/// Secret raw bytes.
pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the protected value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Return a copy of the protected value.
	///
	/// The wrapper still zeroizes its own copy when dropped; the caller owns
	/// the lifetime of the returned clone.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Length in bytes, safe to log.
	pub fn len(&self) -> usize {
		self.inner.len()
	}
}

impl<T> From<T> for Secret<T>
where
	T: Zeroize,
{
	fn from(inner: T) -> Self {
		Self::new(inner)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
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
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
