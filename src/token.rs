//! Session token issuance, validation with lazy expiry, and revocation.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, UserId},
	clock::Clock,
	store::{KeySpace, KeyValueStore, KeyValueStoreExt},
};

/// Token handed back to a caller after a successful login.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// Bearer value; only ever shown to the client that logged in.
	pub secret: TokenSecret,
	/// Record persisted for the token.
	pub record: TokenRecord,
}

/// Issues, validates, and revokes opaque session tokens.
///
/// Expiry is lazy: an expired record is removed the next time someone presents it, never by a
/// background sweep.
#[derive(Clone)]
pub struct TokenManager {
	store: Arc<dyn KeyValueStore>,
	clock: Arc<dyn Clock>,
	ttl: Duration,
}
impl TokenManager {
	/// Lifetime of a token when none is configured.
	pub const DEFAULT_TTL: Duration = Duration::hours(24);

	/// Creates a manager persisting through `store`.
	pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
		Self { store, clock, ttl }
	}

	/// Returns the store key for `secret`.
	pub fn key_for(secret: &TokenSecret) -> String {
		KeySpace::Token.key([secret.digest()])
	}

	/// Generates a new token for `user_id` and persists its record.
	pub async fn issue(&self, user_id: UserId) -> Result<IssuedToken> {
		let secret = TokenSecret::generate();
		let record = TokenRecord::new(user_id, self.clock.now());

		self.store.set_json(&Self::key_for(&secret), &record).await?;

		tracing::debug!(user_id = %record.user_id, "issued session token");

		Ok(IssuedToken { secret, record })
	}

	/// Resolves `secret` to the user it was issued to.
	///
	/// Absent and expired tokens yield [`Error::InvalidToken`]; an expired record is deleted
	/// first. Store failures surface as [`Error::Storage`] so callers can tell them apart.
	pub async fn validate(&self, secret: &TokenSecret) -> Result<UserId> {
		let key = Self::key_for(secret);
		let Some(record) = self.store.get_json::<TokenRecord>(&key).await? else {
			return Err(Error::InvalidToken);
		};

		if record.is_expired_at(self.clock.now(), self.ttl) {
			self.store.delete(&key).await?;

			tracing::debug!(user_id = %record.user_id, "discarded expired session token");

			return Err(Error::InvalidToken);
		}

		Ok(record.user_id)
	}

	/// Deletes the record for `secret`; unknown tokens are a no-op.
	pub async fn revoke(&self, secret: &TokenSecret) -> Result<()> {
		self.store.delete(&Self::key_for(secret)).await?;

		Ok(())
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager").field("ttl", &self.ttl).finish()
	}
}
