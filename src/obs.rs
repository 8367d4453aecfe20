//! Observability helpers: operation spans, outcome counters, and subscriber setup.
//!
//! # Feature Flags
//!
//! - Spans named `tears_auth.op` carry the `op` (operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `tears_auth_op_total` counter for every
//!   attempt/success/rejection/failure, labeled by `op` + `outcome`.

mod metrics;
mod subscriber;
mod tracing;

pub use metrics::*;
pub use subscriber::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Service operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Shared-secret login.
	Login,
	/// Token validation.
	Validate,
	/// Token revocation.
	Logout,
	/// Admin document read.
	AdminFetch,
	/// Admin document write.
	AdminSave,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Login => "login",
			OpKind::Validate => "validate",
			OpKind::Logout => "logout",
			OpKind::AdminFetch => "admin_fetch",
			OpKind::AdminSave => "admin_save",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a service operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Caller-facing refusal (bad secret, rate limit, invalid token, bad document).
	Rejected,
	/// Storage failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Rejected => "rejected",
			OpOutcome::Failure => "failure",
		}
	}

	/// Classifies a finished operation.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => OpOutcome::Success,
			Err(Error::Storage(_) | Error::Config(_)) => OpOutcome::Failure,
			Err(_) => OpOutcome::Rejected,
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
