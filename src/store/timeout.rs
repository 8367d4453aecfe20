//! Decorator that bounds every call on an inner [`KeyValueStore`].

// self
use crate::{
	_prelude::*,
	store::{CompareAndSwapOutcome, KeyValueStore, StoreError, StoreFuture},
};

/// Wraps a store so that a slow backend surfaces as [`StoreError::Timeout`] instead of hanging
/// the request.
#[derive(Clone, Debug)]
pub struct TimeoutStore<S>
where
	S: ?Sized,
{
	timeout: Duration,
	inner: Arc<S>,
}
impl<S> TimeoutStore<S>
where
	S: ?Sized + KeyValueStore,
{
	/// Default bound applied per store call.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(5);

	/// Wraps `inner` with [`Self::DEFAULT_TIMEOUT`].
	pub fn new(inner: Arc<S>) -> Self {
		Self { timeout: Self::DEFAULT_TIMEOUT, inner }
	}

	/// Overrides the per-call bound.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Returns the per-call bound.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	fn bounded<'a, T>(
		&'a self,
		operation: &'static str,
		fut: StoreFuture<'a, T>,
	) -> StoreFuture<'a, T>
	where
		T: 'a + Send,
	{
		let timeout = self.timeout;
		let bound = std::time::Duration::try_from(timeout).unwrap_or_default();

		Box::pin(async move {
			match tokio::time::timeout(bound, fut).await {
				Ok(result) => result,
				Err(_) => {
					tracing::warn!(operation, %timeout, "store call timed out");

					Err(StoreError::Timeout { operation, timeout })
				},
			}
		})
	}
}
impl<S> KeyValueStore for TimeoutStore<S>
where
	S: ?Sized + KeyValueStore,
{
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
		self.bounded("get", self.inner.get(key))
	}

	fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
		self.bounded("set", self.inner.set(key, value))
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		self.bounded("delete", self.inner.delete(key))
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a Value>,
		replacement: Option<Value>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		self.bounded("compare_and_swap", self.inner.compare_and_swap(key, expected, replacement))
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::future;
	// self
	use super::*;
	use crate::store::MemoryStore;

	/// Backend whose reads never complete.
	struct StalledStore;
	impl KeyValueStore for StalledStore {
		fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<Value>> {
			Box::pin(future::pending())
		}

		fn set<'a>(&'a self, _key: &'a str, _value: Value) -> StoreFuture<'a, ()> {
			Box::pin(async { Ok(()) })
		}

		fn delete<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
			Box::pin(async { Ok(()) })
		}

		fn compare_and_swap<'a>(
			&'a self,
			_key: &'a str,
			_expected: Option<&'a Value>,
			_replacement: Option<Value>,
		) -> StoreFuture<'a, CompareAndSwapOutcome> {
			Box::pin(future::pending())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_backend_times_out() {
		let store = TimeoutStore::new(Arc::new(StalledStore)).with_timeout(Duration::seconds(5));
		let err = store.get("token:abc").await.expect_err("Stalled read should time out.");

		assert_eq!(err, StoreError::Timeout { operation: "get", timeout: Duration::seconds(5) });
		store.set("token:abc", json!(1)).await.expect("Responsive writes should pass through.");
	}

	#[tokio::test]
	async fn responsive_backend_passes_through() {
		let store = TimeoutStore::new(Arc::new(MemoryStore::default()));

		assert_eq!(store.timeout(), TimeoutStore::<MemoryStore>::DEFAULT_TIMEOUT);

		store.set("k", json!("v")).await.expect("Write should pass through.");

		assert_eq!(store.get("k").await.expect("Read should pass through."), Some(json!("v")));
	}
}
