//! Simple file-backed [`KeyValueStore`] for single-node deployments.
//!
//! Every mutation rewrites the whole snapshot. The rewrite is staged on a copy of the map and runs
//! on the blocking pool; readers keep seeing the previous state until the file is replaced, and a
//! failed write leaves both the file and the in-memory view untouched.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{CompareAndSwapOutcome, KeyValueStore, StoreError, StoreFuture},
};

type Snapshot = BTreeMap<String, Value>;

/// Persists the whole key space to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
	writer: Arc<tokio::sync::Mutex<()>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self {
			path,
			inner: Arc::new(RwLock::new(snapshot)),
			writer: Arc::new(tokio::sync::Mutex::new(())),
		})
	}

	/// Returns the snapshot path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(BTreeMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(path: &Path, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = path.to_path_buf();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}

	/// Applies `apply` to a copy of the snapshot and commits the copy once it is on disk.
	///
	/// `apply` returns the operation outcome and whether it changed the map; unchanged maps skip
	/// the write. Mutations are serialized by the writer gate.
	async fn mutate<T, F>(&self, apply: F) -> Result<T, StoreError>
	where
		F: FnOnce(&mut Snapshot) -> (T, bool),
	{
		let _writer = self.writer.lock().await;
		let mut staged = self.inner.read().clone();
		let (outcome, changed) = apply(&mut staged);

		if !changed {
			return Ok(outcome);
		}

		let path = self.path.clone();
		let staged = tokio::task::spawn_blocking(move || {
			Self::persist(&path, &staged).map(|()| staged)
		})
		.await
		.map_err(|e| StoreError::Backend { message: format!("Snapshot writer task failed: {e}") })??;

		*self.inner.write() = staged;

		Ok(outcome)
	}
}
impl KeyValueStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
		Box::pin(self.mutate(move |map| {
			map.insert(key.to_owned(), value);

			((), true)
		}))
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(self.mutate(move |map| ((), map.remove(key).is_some())))
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a Value>,
		replacement: Option<Value>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(self.mutate(move |map| {
			if map.get(key) != expected {
				return (CompareAndSwapOutcome::Mismatch, false);
			}

			match replacement {
				Some(value) => map.insert(key.to_owned(), value),
				None => map.remove(key),
			};

			(CompareAndSwapOutcome::Updated, true)
		}))
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"tears_auth_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set("admin:admin_user", json!({ "systemStats": {} })))
			.expect("Failed to save fixture value to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.get("admin:admin_user"))
			.expect("Failed to fetch fixture value from file store.")
			.expect("File store lost value after reopen.");

		assert_eq!(fetched, json!({ "systemStats": {} }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn compare_and_swap_persists_only_on_match() {
		let path = temp_path("cas");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let first = json!({ "count": 1 });
		let created = rt
			.block_on(store.compare_and_swap("login_attempts:ip", None, Some(first.clone())))
			.expect("CAS on an absent key should succeed.");

		assert_eq!(created, CompareAndSwapOutcome::Updated);

		let stale = rt
			.block_on(store.compare_and_swap("login_attempts:ip", None, Some(json!({ "count": 9 }))))
			.expect("CAS with a stale expectation should not error.");

		assert_eq!(stale, CompareAndSwapOutcome::Mismatch);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.get("login_attempts:ip"))
			.expect("Failed to fetch CAS value from file store.");

		assert_eq!(fetched, Some(first));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_write_leaves_previous_state_visible() {
		let path = temp_path("failed_write");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let mut tmp_path = path.clone();

		tmp_path.set_extension("tmp");
		rt.block_on(store.set("admin:admin_user", json!({ "v": 1 })))
			.expect("Initial save should succeed.");
		fs::create_dir(&tmp_path).expect("Failed to block the staging file with a directory.");

		let err = rt
			.block_on(store.set("admin:admin_user", json!({ "v": 2 })))
			.expect_err("Save should fail while the staging path is a directory.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert!(rt.block_on(store.delete("admin:admin_user")).is_err());
		assert!(
			rt.block_on(store.compare_and_swap("admin:admin_user", Some(&json!({ "v": 1 })), None))
				.is_err()
		);
		assert_eq!(
			rt.block_on(store.get("admin:admin_user")).expect("Lookup should succeed."),
			Some(json!({ "v": 1 })),
			"a failed mutation must not become visible"
		);

		fs::remove_dir(&tmp_path).expect("Failed to remove the blocking directory.");

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert_eq!(
			rt.block_on(reopened.get("admin:admin_user")).expect("Lookup should succeed."),
			Some(json!({ "v": 1 }))
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn concurrent_writers_are_all_persisted() {
		let path = temp_path("concurrent");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(async {
			let tasks = (0..8)
				.map(|i| {
					let store = store.clone();

					tokio::spawn(async move {
						store
							.set(&format!("admin:user_{i}"), json!({ "i": i }))
							.await
							.expect("Concurrent save should succeed.");
					})
				})
				.collect::<Vec<_>>();

			for task in tasks {
				task.await.expect("Writer task should not panic.");
			}
		});

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		for i in 0..8 {
			assert_eq!(
				rt.block_on(reopened.get(&format!("admin:user_{i}"))).expect("Lookup should succeed."),
				Some(json!({ "i": i }))
			);
		}

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn empty_file_opens_as_empty_store() {
		let path = temp_path("empty");

		File::create(&path).expect("Failed to create empty snapshot file.");

		let store = FileStore::open(&path).expect("Empty snapshot should open.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		assert_eq!(rt.block_on(store.get("anything")).expect("Lookup should succeed."), None);
		assert_eq!(store.path(), path.as_path());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
