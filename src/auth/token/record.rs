//! Persisted session token records and lifecycle helpers.

// self
use crate::{_prelude::*, auth::UserId};

/// Lifecycle status of a token record at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is within its lifetime.
	Active,
	/// Token outlived its lifetime and must be discarded.
	Expired,
}

/// Record stored for every issued session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
	/// User the token was issued to.
	pub user_id: UserId,
	/// Instant the token was issued.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
}
impl TokenRecord {
	/// Creates a record issued to `user_id` at `issued_at`.
	pub fn new(user_id: UserId, issued_at: OffsetDateTime) -> Self {
		Self { user_id, issued_at }
	}

	/// Computes the lifecycle status for a token living `ttl` past issuance.
	///
	/// The boundary instant `issued_at + ttl` is still active.
	pub fn status_at(&self, instant: OffsetDateTime, ttl: Duration) -> TokenStatus {
		if instant - self.issued_at > ttl { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime, ttl: Duration) -> bool {
		matches!(self.status_at(instant, ttl), TokenStatus::Expired)
	}
}
