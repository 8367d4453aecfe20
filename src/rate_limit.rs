//! Per-client login attempt windows persisted in the key-value store.
//!
//! Each client key owns one [`RateLimitRecord`]. A window opens at the first attempt and stays
//! fixed until it is older than the policy window, at which point the next attempt starts a new
//! one. Blocked attempts neither count nor extend the window. Increments go through
//! [`KeyValueStore::compare_and_swap`] so concurrent attempts from one client cannot overwrite
//! each other's increments; resets after a successful login are last-write-wins.

// self
use crate::{
	_prelude::*,
	auth::ClientKey,
	store::{self, CompareAndSwapOutcome, KeySpace, KeyValueStore, StoreError},
};

/// Attempt budget applied to each client key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	/// Length of an attempt window.
	pub window: Duration,
	/// Attempts allowed per window.
	pub max_attempts: u32,
}
impl RateLimitPolicy {
	/// Window used by the login endpoint.
	pub const DEFAULT_WINDOW: Duration = Duration::minutes(10);
	/// Attempts allowed by the login endpoint.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

	/// Creates a policy with the provided window and budget.
	pub const fn new(window: Duration, max_attempts: u32) -> Self {
		Self { window, max_attempts }
	}
}
impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_WINDOW, Self::DEFAULT_MAX_ATTEMPTS)
	}
}

/// Attempt counter persisted per client key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
	/// Attempts counted in the current window.
	pub count: u32,
	/// Instant the current window opened.
	#[serde(with = "time::serde::rfc3339")]
	pub window_start: OffsetDateTime,
}
impl RateLimitRecord {
	/// Empty window opening at `now`.
	pub fn fresh(now: OffsetDateTime) -> Self {
		Self { count: 0, window_start: now }
	}

	/// Returns `true` once the window is older than `window`.
	pub fn is_stale_at(&self, now: OffsetDateTime, window: Duration) -> bool {
		now - self.window_start > window
	}

	/// Returns the record to evaluate at `now`: itself, or a fresh window if stale.
	pub fn current(self, now: OffsetDateTime, window: Duration) -> Self {
		if self.is_stale_at(now, window) { Self::fresh(now) } else { self }
	}
}

/// Result emitted by [`RateLimiter::check_and_record_attempt`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The attempt was counted and may proceed.
	Allowed {
		/// Attempts left in the window after this one.
		remaining: u32,
	},
	/// The attempt was refused and not counted.
	Limited(RetryDirective),
}

/// Advises callers when to retry after a [`RateLimitDecision::Limited`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when the window resets.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until `earliest_retry_at`.
	pub retry_after: Duration,
}
impl RetryDirective {
	fn for_record(record: &RateLimitRecord, window: Duration, now: OffsetDateTime) -> Self {
		let earliest_retry_at = record.window_start + window;
		let retry_after = (earliest_retry_at - now).max(Duration::ZERO);

		Self { earliest_retry_at, retry_after }
	}
}

/// Stateless rate limiter; all state lives in the store.
#[derive(Clone)]
pub struct RateLimiter {
	store: Arc<dyn KeyValueStore>,
}
impl RateLimiter {
	/// Compare-and-swap rounds attempted before giving up on a contended key.
	pub const MAX_CAS_ROUNDS: usize = 4;

	/// Creates a limiter persisting through `store`.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	/// Returns the store key holding `client`'s record.
	pub fn key_for(client: &ClientKey) -> String {
		KeySpace::LoginAttempts.key([client.as_str()])
	}

	/// Evaluates one attempt from `client` at `now` and counts it when allowed.
	pub async fn check_and_record_attempt(
		&self,
		client: &ClientKey,
		policy: RateLimitPolicy,
		now: OffsetDateTime,
	) -> Result<RateLimitDecision, StoreError> {
		let key = Self::key_for(client);

		for round in 1..=Self::MAX_CAS_ROUNDS {
			let stored = self.store.get(&key).await?;
			let record = match &stored {
				Some(value) => store::decode::<RateLimitRecord>(&key, value.clone())?
					.current(now, policy.window),
				None => RateLimitRecord::fresh(now),
			};

			if record.count >= policy.max_attempts {
				tracing::debug!(client = %client, count = record.count, "login attempt limited");

				return Ok(RateLimitDecision::Limited(RetryDirective::for_record(
					&record,
					policy.window,
					now,
				)));
			}

			let next = RateLimitRecord { count: record.count + 1, ..record };
			let outcome = self
				.store
				.compare_and_swap(&key, stored.as_ref(), Some(store::encode(&next)?))
				.await?;

			match outcome {
				CompareAndSwapOutcome::Updated =>
					return Ok(RateLimitDecision::Allowed {
						remaining: policy.max_attempts - next.count,
					}),
				CompareAndSwapOutcome::Mismatch => {
					tracing::debug!(client = %client, round, "attempt counter changed concurrently");
				},
			}
		}

		Err(StoreError::Backend {
			message: format!(
				"Attempt counter `{key}` stayed contended for {} rounds",
				Self::MAX_CAS_ROUNDS
			),
		})
	}

	/// Opens a fresh, empty window for `client` at `now`.
	pub async fn reset(&self, client: &ClientKey, now: OffsetDateTime) -> Result<(), StoreError> {
		let key = Self::key_for(client);

		self.store.set(&key, store::encode(&RateLimitRecord::fresh(now))?).await
	}

	/// Fetches the current record for `client`, if any.
	pub async fn record(&self, client: &ClientKey) -> Result<Option<RateLimitRecord>, StoreError> {
		let key = Self::key_for(client);

		match self.store.get(&key).await? {
			Some(value) => store::decode(&key, value).map(Some),
			None => Ok(None),
		}
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RateLimiter(..)")
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::store::{MemoryStore, StoreFuture};

	const T0: OffsetDateTime = macros::datetime!(2025-03-01 09:00 UTC);

	fn limiter() -> (RateLimiter, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());

		(RateLimiter::new(store.clone()), store)
	}

	fn client() -> ClientKey {
		ClientKey::new("198.51.100.4").expect("Client fixture should be valid.")
	}

	#[tokio::test]
	async fn blocks_after_budget_without_extending_window() {
		let (limiter, _) = limiter();
		let policy = RateLimitPolicy::default();

		for i in 0..5 {
			let decision = limiter
				.check_and_record_attempt(&client(), policy, T0 + Duration::minutes(i))
				.await
				.expect("Attempt within budget should evaluate.");

			assert_eq!(decision, RateLimitDecision::Allowed { remaining: 4 - i as u32 });
		}

		let blocked = limiter
			.check_and_record_attempt(&client(), policy, T0 + Duration::minutes(6))
			.await
			.expect("Blocked attempt should evaluate.");

		assert_eq!(
			blocked,
			RateLimitDecision::Limited(RetryDirective {
				earliest_retry_at: T0 + Duration::minutes(10),
				retry_after: Duration::minutes(4),
			})
		);

		let record = limiter
			.record(&client())
			.await
			.expect("Record lookup should succeed.")
			.expect("Record should exist.");

		assert_eq!(record, RateLimitRecord { count: 5, window_start: T0 });
	}

	#[tokio::test]
	async fn stale_window_resets_before_evaluation() {
		let (limiter, _) = limiter();
		let policy = RateLimitPolicy::default();

		for _ in 0..5 {
			limiter
				.check_and_record_attempt(&client(), policy, T0)
				.await
				.expect("Attempt should evaluate.");
		}

		let at_boundary = limiter
			.check_and_record_attempt(&client(), policy, T0 + Duration::minutes(10))
			.await
			.expect("Boundary attempt should evaluate.");

		assert!(matches!(at_boundary, RateLimitDecision::Limited(_)));

		let later = T0 + Duration::minutes(10) + Duration::seconds(1);
		let after = limiter
			.check_and_record_attempt(&client(), policy, later)
			.await
			.expect("Post-window attempt should evaluate.");

		assert_eq!(after, RateLimitDecision::Allowed { remaining: 4 });
		assert_eq!(
			limiter.record(&client()).await.expect("Record lookup should succeed."),
			Some(RateLimitRecord { count: 1, window_start: later })
		);
	}

	#[tokio::test]
	async fn reset_clears_counter_and_buckets_are_independent() {
		let (limiter, store) = limiter();
		let policy = RateLimitPolicy::new(Duration::minutes(10), 2);
		let other = ClientKey::new("198.51.100.5").expect("Client fixture should be valid.");

		for _ in 0..2 {
			limiter
				.check_and_record_attempt(&client(), policy, T0)
				.await
				.expect("Attempt should evaluate.");
		}

		assert!(matches!(
			limiter.check_and_record_attempt(&client(), policy, T0).await,
			Ok(RateLimitDecision::Limited(_))
		));
		assert!(matches!(
			limiter.check_and_record_attempt(&other, policy, T0).await,
			Ok(RateLimitDecision::Allowed { remaining: 1 })
		));

		limiter.reset(&client(), T0 + Duration::minutes(1)).await.expect("Reset should succeed.");

		assert!(matches!(
			limiter.check_and_record_attempt(&client(), policy, T0 + Duration::minutes(1)).await,
			Ok(RateLimitDecision::Allowed { remaining: 1 })
		));
		assert_eq!(
			store.keys_with_prefix("login_attempts:"),
			vec!["login_attempts:198.51.100.4", "login_attempts:198.51.100.5"]
		);
	}

	/// Store whose compare-and-swap never wins.
	struct ContendedStore(MemoryStore);
	impl KeyValueStore for ContendedStore {
		fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
			self.0.get(key)
		}

		fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
			self.0.set(key, value)
		}

		fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
			self.0.delete(key)
		}

		fn compare_and_swap<'a>(
			&'a self,
			_key: &'a str,
			_expected: Option<&'a Value>,
			_replacement: Option<Value>,
		) -> StoreFuture<'a, CompareAndSwapOutcome> {
			Box::pin(async { Ok(CompareAndSwapOutcome::Mismatch) })
		}
	}

	#[tokio::test]
	async fn persistent_contention_surfaces_as_store_failure() {
		let limiter = RateLimiter::new(Arc::new(ContendedStore(MemoryStore::default())));
		let err = limiter
			.check_and_record_attempt(&client(), RateLimitPolicy::default(), T0)
			.await
			.expect_err("Contended counter should fail.");

		assert!(matches!(err, StoreError::Backend { ref message } if message.contains("contended")));
	}
}
