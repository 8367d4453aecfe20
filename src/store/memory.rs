//! Thread-safe in-memory [`KeyValueStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CompareAndSwapOutcome, KeyValueStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, Value>>>;

/// Thread-safe storage backend that keeps values in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of stored keys.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Lists stored keys that start with `prefix`, sorted.
	pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
		let mut keys: Vec<_> =
			self.0.read().keys().filter(|key| key.starts_with(prefix)).cloned().collect();

		keys.sort();

		keys
	}

	fn cas_now(
		map: StoreMap,
		key: &str,
		expected: Option<&Value>,
		replacement: Option<Value>,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();

		if guard.get(key) != expected {
			return CompareAndSwapOutcome::Mismatch;
		}

		match replacement {
			Some(value) => guard.insert(key.to_owned(), value),
			None => guard.remove(key),
		};

		CompareAndSwapOutcome::Updated
	}
}
impl KeyValueStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a Value>,
		replacement: Option<Value>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, key, expected, replacement)) })
	}
}
