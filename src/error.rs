//! Service-level error types shared across the store, token, rate-limit, and admin layers.

// self
use crate::_prelude::*;

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical service error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure or timeout; the outcome of the operation is unknown.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Request payload or admin document has the wrong shape.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Presented secret code does not match the configured secret.
	#[error("Invalid secret code.")]
	InvalidCredentials,
	/// Client exhausted its login attempts for the current window.
	#[error("Too many login attempts; retry in {retry_after}.")]
	TooManyAttempts {
		/// Time left until the attempt window resets.
		retry_after: Duration,
	},
	/// Session token is absent, expired, or revoked.
	#[error("Invalid token.")]
	InvalidToken,
	/// Session token is valid but does not cover the requested user.
	#[error("Token does not grant access to user `{requested}`.")]
	Forbidden {
		/// User identifier named by the request.
		requested: String,
	},
}

/// Configuration failures raised while assembling the service.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Shared secret is empty.
	#[error("Shared secret must not be empty.")]
	EmptySecret,
	/// A duration setting is zero or negative.
	#[error("The {field} setting must be positive.")]
	NonPositiveDuration {
		/// Setting name.
		field: &'static str,
	},
	/// Rate-limit policy allows no attempts at all.
	#[error("The rate limit must allow at least one attempt per window.")]
	ZeroAttempts,
	/// Identifier supplied through configuration is invalid.
	#[error("Configured identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Route prefix does not start with `/` or ends with one.
	#[error("Route prefix `{prefix}` must start with `/` and must not end with `/`.")]
	InvalidRoutePrefix {
		/// Offending prefix.
		prefix: String,
	},
	/// Store backend could not be opened.
	#[error("Store backend could not be opened.")]
	StoreOpen(#[source] crate::store::StoreError),
}

/// Shape failures for request bodies and admin documents.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Admin document is not a JSON object.
	#[error("Admin document must be a JSON object.")]
	NotAnObject,
	/// Required field is absent or null.
	#[error("Admin document is missing the `{field}` field.")]
	MissingField {
		/// Field name.
		field: &'static str,
	},
	/// Field is present but has the wrong JSON type.
	#[error("Admin document field `{field}` must be {expected}.")]
	WrongType {
		/// Field name.
		field: &'static str,
		/// Expected JSON type label.
		expected: &'static str,
	},
	/// Request body could not be decoded.
	#[error("Request body is malformed at `{path}`: {message}.")]
	MalformedBody {
		/// JSON path of the failing element.
		path: String,
		/// Decoder message.
		message: String,
	},
}
impl ValidationError {
	/// Builds a [`ValidationError::MalformedBody`] from a path-aware decoding failure.
	pub fn malformed_body(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = err.path().to_string();

		Self::MalformedBody { path, message: err.into_inner().to_string() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_into_service_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Service error should expose the underlying store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn malformed_body_reports_json_path() {
		#[derive(Debug, Deserialize)]
		struct Body {
			#[allow(dead_code)]
			inner: Inner,
		}
		#[derive(Debug, Deserialize)]
		struct Inner {
			#[allow(dead_code)]
			count: u32,
		}

		let de = &mut serde_json::Deserializer::from_str(r#"{"inner":{"count":"many"}}"#);
		let err = serde_path_to_error::deserialize::<_, Body>(de)
			.expect_err("String count should fail to decode.");
		let validation = ValidationError::malformed_body(err);

		assert!(
			matches!(&validation, ValidationError::MalformedBody { path, .. } if path == "inner.count")
		);
	}
}
