//! Login, validation, and logout orchestration over the rate limiter and token manager.
//!
//! [`AuthService::login`] consults the client's attempt window before looking at the secret, so
//! a throttled client learns nothing about whether its code was right. Mismatches leave an audit
//! entry; a match resets the client's window and issues a token for the configured admin
//! identity.

// self
use crate::{
	_prelude::*,
	admin::AdminDataStore,
	auth::{ClientKey, TokenSecret, UserId},
	clock::Clock,
	config::AuthConfig,
	obs::{self, OpKind, OpOutcome, OpSpan},
	rate_limit::{RateLimitDecision, RateLimiter},
	store::{KeySpace, KeyValueStore, KeyValueStoreExt},
	token::{IssuedToken, TokenManager},
};

/// Reason recorded for a secret mismatch.
pub const INVALID_SECRET_REASON: &str = "Invalid secret code";

/// Audit entry written for every rejected secret code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLoginEntry {
	/// Client the attempt came from.
	pub ip: ClientKey,
	/// Instant of the attempt.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Why the attempt failed.
	pub reason: String,
}
impl FailedLoginEntry {
	/// Returns the store key for the entry; one key per client per instant.
	pub fn key(&self) -> String {
		let nanos = self.timestamp.unix_timestamp_nanos().to_string();

		KeySpace::FailedLogin.key([self.ip.as_str(), nanos.as_str()])
	}
}

/// Entry point for every authentication operation.
#[derive(Clone)]
pub struct AuthService {
	store: Arc<dyn KeyValueStore>,
	clock: Arc<dyn Clock>,
	config: Arc<AuthConfig>,
	limiter: RateLimiter,
	tokens: TokenManager,
}
impl AuthService {
	/// Wires the service over `store`, reading time from `clock`.
	pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
		let limiter = RateLimiter::new(store.clone());
		let tokens = TokenManager::new(store.clone(), clock.clone(), config.token_ttl);

		Self { store, clock, config: Arc::new(config), limiter, tokens }
	}

	/// Returns the active configuration.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Returns the login rate limiter.
	pub fn limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Returns the current instant according to the service clock.
	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	/// Returns an admin document store sharing this service's backend and clock.
	pub fn admin_store(&self) -> AdminDataStore {
		AdminDataStore::new(self.store.clone(), self.clock.clone())
	}

	/// Exchanges the shared secret for a session token.
	pub async fn login(&self, secret_code: &str, client: &ClientKey) -> Result<IssuedToken> {
		self.login_decoded(Ok(secret_code.to_owned()), client).await
	}

	/// Like [`Self::login`], for a secret code taken from a request body that may have failed to
	/// decode.
	///
	/// The attempt is evaluated against the client's window first; a decode error surfaces only
	/// when the attempt is allowed, so a throttled client always sees
	/// [`Error::TooManyAttempts`]. Undecodable attempts still count against the window.
	pub async fn login_decoded(
		&self,
		secret_code: Result<String>,
		client: &ClientKey,
	) -> Result<IssuedToken> {
		const KIND: OpKind = OpKind::Login;

		let span = OpSpan::new(KIND, "login");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let now = self.clock.now();
				let decision = self
					.limiter
					.check_and_record_attempt(client, self.config.rate_limit, now)
					.await?;

				if let RateLimitDecision::Limited(directive) = decision {
					tracing::warn!(client = %client, "login refused: attempt budget exhausted");

					return Err(Error::TooManyAttempts { retry_after: directive.retry_after });
				}

				let secret_code = secret_code?;

				if !self.config.secret.verify(&secret_code) {
					self.record_failed_login(client, now).await?;

					tracing::warn!(client = %client, "login refused: invalid secret code");

					return Err(Error::InvalidCredentials);
				}

				self.limiter.reset(client, now).await?;

				let issued = self.tokens.issue(self.config.admin_user_id.clone()).await?;

				tracing::info!(client = %client, user_id = %issued.record.user_id, "login succeeded");

				Ok(issued)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Resolves a presented token to its user.
	pub async fn validate(&self, secret: &TokenSecret) -> Result<UserId> {
		const KIND: OpKind = OpKind::Validate;

		let span = OpSpan::new(KIND, "validate");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.tokens.validate(secret)).await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Revokes the presented token; a missing or unknown token is a successful no-op.
	pub async fn logout(&self, secret: Option<&TokenSecret>) -> Result<()> {
		const KIND: OpKind = OpKind::Logout;

		let span = OpSpan::new(KIND, "logout");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = match secret {
			Some(secret) => span.instrument(self.tokens.revoke(secret)).await,
			None => Ok(()),
		};

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	async fn record_failed_login(&self, client: &ClientKey, now: OffsetDateTime) -> Result<()> {
		let entry = FailedLoginEntry {
			ip: client.clone(),
			timestamp: now,
			reason: INVALID_SECRET_REASON.into(),
		};

		self.store.set_json(&entry.key(), &entry).await?;

		Ok(())
	}
}
impl Debug for AuthService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthService")
			.field("config", &self.config)
			.field("tokens", &self.tokens)
			.finish()
	}
}
