//! Per-user admin documents gated by session validation.
//!
//! Documents are opaque JSON apart from two shape markers checked on save: a truthy
//! `systemStats` field and an array-typed `recentActivity` field. A user without a stored
//! document reads a placeholder instead of an error so dashboards always have something to
//! render.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	clock::{self, Clock},
	error::ValidationError,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::{KeySpace, KeyValueStore},
};

/// Field that must be present and truthy in every saved document.
pub const SYSTEM_STATS_FIELD: &str = "systemStats";
/// Field that must be an array in every saved document.
pub const RECENT_ACTIVITY_FIELD: &str = "recentActivity";

/// Stores and retrieves admin documents keyed by user.
#[derive(Clone)]
pub struct AdminDataStore {
	store: Arc<dyn KeyValueStore>,
	clock: Arc<dyn Clock>,
}
impl AdminDataStore {
	/// Creates a document store persisting through `store`.
	pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
		Self { store, clock }
	}

	/// Returns the store key for `user_id`'s document.
	pub fn key_for(user_id: &UserId) -> String {
		KeySpace::Admin.key([user_id.as_str()])
	}

	/// Checks that the user named in a request path is the user the token was issued to.
	///
	/// Any mismatch (including a path that is not a valid identifier) is [`Error::Forbidden`].
	pub fn authorize(authenticated: &UserId, requested: &str) -> Result<UserId> {
		if authenticated.as_str() == requested {
			Ok(authenticated.clone())
		} else {
			tracing::warn!(
				authenticated = %authenticated,
				requested,
				"admin request for another user refused"
			);

			Err(Error::Forbidden { requested: requested.into() })
		}
	}

	/// Validates and persists `document` as `user_id`'s admin document, replacing any previous
	/// one. Invalid documents are rejected before anything is written.
	pub async fn save(&self, user_id: &UserId, document: Value) -> Result<()> {
		const KIND: OpKind = OpKind::AdminSave;

		let span = OpSpan::new(KIND, "save");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				validate_document(&document)?;

				self.store.set(&Self::key_for(user_id), document).await?;

				tracing::info!(user_id = %user_id, "admin document saved");

				Ok(())
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Returns `user_id`'s stored document, or [`placeholder_document`] when none exists.
	pub async fn fetch(&self, user_id: &UserId) -> Result<Value> {
		const KIND: OpKind = OpKind::AdminFetch;

		let span = OpSpan::new(KIND, "fetch");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				match self.store.get(&Self::key_for(user_id)).await? {
					Some(document) => Ok(document),
					None => {
						tracing::debug!(user_id = %user_id, "serving placeholder admin document");

						Ok(placeholder_document(self.clock.now()))
					},
				}
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}
}
impl Debug for AdminDataStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AdminDataStore(..)")
	}
}

/// Checks the top-level shape markers of an admin document.
pub fn validate_document(document: &Value) -> Result<(), ValidationError> {
	let object = document.as_object().ok_or(ValidationError::NotAnObject)?;

	if !object.get(SYSTEM_STATS_FIELD).is_some_and(is_truthy) {
		return Err(ValidationError::MissingField { field: SYSTEM_STATS_FIELD });
	}

	match object.get(RECENT_ACTIVITY_FIELD) {
		Some(Value::Array(_)) => Ok(()),
		None | Some(Value::Null) =>
			Err(ValidationError::MissingField { field: RECENT_ACTIVITY_FIELD }),
		Some(_) =>
			Err(ValidationError::WrongType { field: RECENT_ACTIVITY_FIELD, expected: "an array" }),
	}
}

fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

/// Builds the document served to users who never saved one.
///
/// The content is fixed apart from timestamps, which are derived from `now`.
pub fn placeholder_document(now: OffsetDateTime) -> Value {
	let at = |ago: Duration| clock::rfc3339(now - ago);

	json!({
		"systemStats": {
			"totalUsers": 1247,
			"activeScripts": 89,
			"systemUptime": "7d 14h 32m",
			"memoryUsage": 68.4
		},
		"recentActivity": [
			{
				"id": "1",
				"timestamp": at(Duration::ZERO),
				"type": "login",
				"description": "Admin login successful",
				"severity": "low"
			},
			{
				"id": "2",
				"timestamp": at(Duration::minutes(10)),
				"type": "script_executed",
				"description": "Speed hack script executed by user_942",
				"severity": "medium"
			}
		],
		"serverLogs": [
			{
				"id": "1",
				"timestamp": at(Duration::ZERO),
				"level": "info",
				"message": "Server startup completed",
				"source": "System"
			},
			{
				"id": "2",
				"timestamp": at(Duration::minutes(2)),
				"level": "warning",
				"message": "High memory usage detected",
				"source": "Monitor"
			}
		],
		"userManagement": [
			{
				"id": "1",
				"username": "admin",
				"email": "admin@tears.local",
				"role": "admin",
				"lastActive": at(Duration::ZERO),
				"status": "online"
			},
			{
				"id": "2",
				"username": "darkgamer2024",
				"email": "gamer@example.com",
				"role": "user",
				"lastActive": at(Duration::minutes(5)),
				"status": "online"
			}
		]
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{clock::ManualClock, store::MemoryStore};

	const NOW: OffsetDateTime = macros::datetime!(2025-04-01 10:00 UTC);

	fn admin_store() -> (AdminDataStore, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());

		(AdminDataStore::new(store.clone(), Arc::new(ManualClock::new(NOW))), store)
	}

	fn admin() -> UserId {
		UserId::new(UserId::ADMIN).expect("Admin identifier should be valid.")
	}

	fn valid_document() -> Value {
		json!({ "systemStats": { "totalUsers": 3 }, "recentActivity": [] })
	}

	#[test]
	fn document_shape_is_checked() {
		validate_document(&valid_document()).expect("Valid document should pass.");

		assert_eq!(validate_document(&json!([])), Err(ValidationError::NotAnObject));
		assert_eq!(
			validate_document(&json!({ "recentActivity": [] })),
			Err(ValidationError::MissingField { field: "systemStats" })
		);
		assert_eq!(
			validate_document(&json!({ "systemStats": null, "recentActivity": [] })),
			Err(ValidationError::MissingField { field: "systemStats" })
		);
		assert_eq!(
			validate_document(&json!({ "systemStats": {} })),
			Err(ValidationError::MissingField { field: "recentActivity" })
		);
		assert_eq!(
			validate_document(&json!({ "systemStats": {}, "recentActivity": {} })),
			Err(ValidationError::WrongType { field: "recentActivity", expected: "an array" })
		);
	}

	#[tokio::test]
	async fn invalid_save_keeps_previous_document() {
		let (admin_store, _) = admin_store();

		admin_store.save(&admin(), valid_document()).await.expect("Valid save should succeed.");

		let err = admin_store
			.save(&admin(), json!({ "recentActivity": [] }))
			.await
			.expect_err("Document without systemStats should be rejected.");

		assert!(matches!(err, Error::Validation(ValidationError::MissingField { .. })));
		assert_eq!(
			admin_store.fetch(&admin()).await.expect("Fetch should succeed."),
			valid_document()
		);
	}

	#[tokio::test]
	async fn missing_document_yields_placeholder() {
		let (admin_store, store) = admin_store();
		let document = admin_store.fetch(&admin()).await.expect("Fetch should succeed.");

		validate_document(&document).expect("Placeholder should satisfy the save contract.");

		assert_eq!(document, placeholder_document(NOW));
		assert_eq!(document["recentActivity"][1]["timestamp"], "2025-04-01T09:50:00Z");
		assert!(store.is_empty(), "Serving the placeholder must not persist it.");
	}

	#[test]
	fn authorize_requires_matching_user() {
		assert_eq!(
			AdminDataStore::authorize(&admin(), "admin_user").expect("Own path is allowed."),
			admin()
		);
		assert!(matches!(
			AdminDataStore::authorize(&admin(), "someone_else"),
			Err(Error::Forbidden { requested }) if requested == "someone_else"
		));
	}
}
