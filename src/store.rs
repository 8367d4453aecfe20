//! Key-value storage contract and built-in backends that every other component persists through.

pub mod file;
pub mod memory;
pub mod timeout;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use timeout::TimeoutStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract: string keys mapped to JSON values.
///
/// No multi-key transaction is offered. Single-key read-modify-write sequences that must not
/// lose updates go through [`KeyValueStore::compare_and_swap`]; everything else is
/// last-write-wins.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>>;

	/// Persists or replaces the value stored under `key`.
	fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()>;

	/// Removes `key`; removing an absent key succeeds.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Atomically replaces the value under `key` if it still equals `expected`.
	///
	/// `expected = None` requires the key to be absent; `replacement = None` deletes it.
	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a Value>,
		replacement: Option<Value>,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;
}

/// Typed helpers layered over any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
	/// Fetches and decodes the value stored under `key`.
	fn get_json<'a, T>(&'a self, key: &'a str) -> StoreFuture<'a, Option<T>>
	where
		T: 'a + Send + serde::de::DeserializeOwned,
	{
		Box::pin(async move {
			match self.get(key).await? {
				Some(value) => decode(key, value).map(Some),
				None => Ok(None),
			}
		})
	}

	/// Encodes `value` and stores it under `key`.
	fn set_json<'a, T>(&'a self, key: &'a str, value: &'a T) -> StoreFuture<'a, ()>
	where
		T: ?Sized + Sync + Serialize,
	{
		Box::pin(async move {
			let encoded = encode(value)?;

			self.set(key, encoded).await
		})
	}
}
impl<S> KeyValueStoreExt for S where S: ?Sized + KeyValueStore {}

/// Result of a compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored value matched the expectation and was replaced.
	Updated,
	/// The stored value changed since it was read; nothing was written.
	Mismatch,
}

/// Error type produced by [`KeyValueStore`] implementations.
///
/// Every variant is treated as "store unavailable" by callers: the service cannot tell whether
/// the operation took effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or the typed helpers.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend did not answer within the configured bound.
	#[error("Store operation `{operation}` timed out after {timeout}.")]
	Timeout {
		/// Operation label.
		operation: &'static str,
		/// Bound that elapsed.
		timeout: Duration,
	},
}

/// Key namespaces used by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeySpace {
	/// Session token records, keyed by token digest.
	Token,
	/// Per-client login attempt windows.
	LoginAttempts,
	/// Failed-login audit entries.
	FailedLogin,
	/// Per-user admin documents.
	Admin,
}
impl KeySpace {
	/// Returns the key prefix for the namespace.
	pub const fn as_str(self) -> &'static str {
		match self {
			KeySpace::Token => "token",
			KeySpace::LoginAttempts => "login_attempts",
			KeySpace::FailedLogin => "failed_login",
			KeySpace::Admin => "admin",
		}
	}

	/// Builds a namespaced key from one or more parts joined by `:`.
	pub fn key<I, P>(self, parts: I) -> String
	where
		I: IntoIterator<Item = P>,
		P: AsRef<str>,
	{
		let mut buf = String::from(self.as_str());

		for part in parts {
			buf.push(':');
			buf.push_str(part.as_ref());
		}

		buf
	}
}
impl Display for KeySpace {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Decodes a stored JSON value, tagging failures with the key.
pub(crate) fn decode<T>(key: &str, value: Value) -> Result<T, StoreError>
where
	T: serde::de::DeserializeOwned,
{
	serde_json::from_value(value).map_err(|e| StoreError::Serialization {
		message: format!("Failed to decode `{key}`: {e}"),
	})
}

/// Encodes a record into a JSON value.
pub(crate) fn encode<T>(value: &T) -> Result<Value, StoreError>
where
	T: ?Sized + Serialize,
{
	serde_json::to_value(value)
		.map_err(|e| StoreError::Serialization { message: format!("Failed to encode record: {e}") })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Sample {
		count: u32,
	}

	#[test]
	fn key_space_joins_parts() {
		assert_eq!(KeySpace::Admin.key(["admin_user"]), "admin:admin_user");
		assert_eq!(KeySpace::FailedLogin.key(["10.0.0.1", "42"]), "failed_login:10.0.0.1:42");
		assert_eq!(KeySpace::LoginAttempts.to_string(), "login_attempts");
	}

	#[tokio::test]
	async fn typed_helpers_report_decode_failures() {
		let store = MemoryStore::default();

		store.set_json("sample", &Sample { count: 3 }).await.expect("Encoding sample should work.");

		let fetched: Option<Sample> =
			store.get_json("sample").await.expect("Decoding sample should work.");

		assert_eq!(fetched, Some(Sample { count: 3 }));

		store.set("sample", json!("not a sample")).await.expect("Raw set should succeed.");

		let err = store
			.get_json::<Sample>("sample")
			.await
			.expect_err("Decoding a string as Sample should fail.");

		assert!(matches!(err, StoreError::Serialization { ref message } if message.contains("`sample`")));
	}

	#[test]
	fn compare_and_swap_outcome_can_be_serialized() {
		let payload = serde_json::to_string(&CompareAndSwapOutcome::Updated)
			.expect("CompareAndSwapOutcome should serialize to JSON.");

		assert_eq!(payload, "\"Updated\"");
	}
}
