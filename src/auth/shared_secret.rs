//! The single shared login secret and its constant-time comparison.

// crates.io
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

/// Configured login secret. Redacted in formatters and compared in constant time.
#[derive(Clone)]
pub struct SharedSecret(String);
impl SharedSecret {
	/// Wraps the configured secret value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns `true` when the secret is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Compares `candidate` against the secret without leaking timing information.
	///
	/// Both sides are hashed first so the comparison runs over equal-length digests regardless
	/// of the candidate's length.
	pub fn verify(&self, candidate: &str) -> bool {
		let expected = Sha256::digest(self.0.as_bytes());
		let presented = Sha256::digest(candidate.as_bytes());

		expected.as_slice().ct_eq(presented.as_slice()).into()
	}
}
impl Debug for SharedSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SharedSecret").field(&"<redacted>").finish()
	}
}
