//! Session token values: generation, redaction, and storage digests.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Characters a generated token is drawn from.
pub const TOKEN_ALPHABET: &[u8] =
	b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
/// Length of every generated token.
pub const TOKEN_LEN: usize = 40;

/// Redacted session token wrapper keeping bearer values out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps an existing token value (e.g. one presented by a client).
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Draws a fresh [`TOKEN_LEN`]-character token from [`TOKEN_ALPHABET`] using the thread-local
	/// CSPRNG.
	pub fn generate() -> Self {
		let mut rng = rand::rng();
		let value = (0..TOKEN_LEN)
			.map(|_| char::from(TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]))
			.collect();

		Self(value)
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns the storage digest of the token: URL-safe base64 of its SHA-256.
	///
	/// Records are keyed by this digest so the store never holds a replayable bearer value.
	pub fn digest(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.0.as_bytes());

		URL_SAFE_NO_PAD.encode(hasher.finalize())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
