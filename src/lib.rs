//! Shared-secret login service with opaque session tokens, per-client attempt windows, and a
//! token-gated admin document store, served over a small JSON HTTP surface.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod admin;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod rate_limit;
pub mod service;
pub mod store;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::SharedSecret,
		clock::{Clock, ManualClock},
		config::AuthConfig,
		service::AuthService,
		store::{KeyValueStore, MemoryStore},
	};

	/// Secret code accepted by services built through [`build_test_service`].
	pub const TEST_SECRET: &str = "tears2024";

	/// Fixed instant every test clock starts from.
	pub const TEST_EPOCH: OffsetDateTime = time::macros::datetime!(2025-06-01 12:00 UTC);

	/// Constructs an [`AuthService`] backed by an in-memory store and a manual clock so tests can
	/// inspect persisted records and move time forward.
	pub fn build_test_service() -> (AuthService, Arc<MemoryStore>, Arc<ManualClock>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn KeyValueStore> = store_backend.clone();
		let clock_backend = Arc::new(ManualClock::new(TEST_EPOCH));
		let clock: Arc<dyn Clock> = clock_backend.clone();
		let config = AuthConfig::builder(SharedSecret::new(TEST_SECRET))
			.build()
			.expect("Default test configuration should be valid.");
		let service = AuthService::new(store, clock, config);

		(service, store_backend, clock_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Value, json};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}
