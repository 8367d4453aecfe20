//! Service configuration: the validated [`AuthConfig`] plus the process-level [`ServerArgs`].

// std
use std::{net::SocketAddr, path::PathBuf};
// crates.io
use clap::Parser;
// self
use crate::{
	_prelude::*,
	auth::{SharedSecret, UserId},
	error::ConfigError,
	obs::LogFormat,
	rate_limit::RateLimitPolicy,
	token::TokenManager,
};

/// Validated settings consumed by [`crate::service::AuthService`].
#[derive(Clone, Debug)]
pub struct AuthConfig {
	/// Secret code accepted by the login endpoint.
	pub secret: SharedSecret,
	/// Lifetime of issued tokens.
	pub token_ttl: Duration,
	/// Attempt budget for the login endpoint.
	pub rate_limit: RateLimitPolicy,
	/// Identity every successful login is issued to.
	pub admin_user_id: UserId,
}
impl AuthConfig {
	/// Returns a builder seeded with the default TTL, rate-limit policy, and admin identity.
	pub fn builder(secret: SharedSecret) -> AuthConfigBuilder {
		AuthConfigBuilder::new(secret)
	}
}

/// Builder for [`AuthConfig`].
#[derive(Clone, Debug)]
pub struct AuthConfigBuilder {
	secret: SharedSecret,
	token_ttl: Duration,
	rate_limit: RateLimitPolicy,
	admin_user_id: String,
}
impl AuthConfigBuilder {
	fn new(secret: SharedSecret) -> Self {
		Self {
			secret,
			token_ttl: TokenManager::DEFAULT_TTL,
			rate_limit: RateLimitPolicy::default(),
			admin_user_id: UserId::ADMIN.into(),
		}
	}

	/// Overrides the token lifetime.
	pub fn token_ttl(mut self, ttl: Duration) -> Self {
		self.token_ttl = ttl;

		self
	}

	/// Overrides the login attempt policy.
	pub fn rate_limit(mut self, policy: RateLimitPolicy) -> Self {
		self.rate_limit = policy;

		self
	}

	/// Overrides the identity issued on login.
	pub fn admin_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.admin_user_id = user_id.into();

		self
	}

	/// Validates the settings and produces an [`AuthConfig`].
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		if self.secret.is_empty() {
			return Err(ConfigError::EmptySecret);
		}
		if !self.token_ttl.is_positive() {
			return Err(ConfigError::NonPositiveDuration { field: "token_ttl" });
		}
		if !self.rate_limit.window.is_positive() {
			return Err(ConfigError::NonPositiveDuration { field: "rate_limit.window" });
		}
		if self.rate_limit.max_attempts == 0 {
			return Err(ConfigError::ZeroAttempts);
		}

		Ok(AuthConfig {
			secret: self.secret,
			token_ttl: self.token_ttl,
			rate_limit: self.rate_limit,
			admin_user_id: UserId::new(&self.admin_user_id)?,
		})
	}
}

/// Where the key-value data lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
	/// Process memory; lost on restart.
	Memory,
	/// JSON snapshot file at the given path.
	File(PathBuf),
}
impl FromStr for StoreLocation {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(if s.eq_ignore_ascii_case("memory") { Self::Memory } else { Self::File(s.into()) })
	}
}

/// Command-line and environment configuration for the `tears-auth` binary.
#[derive(Clone, Debug, Parser)]
#[command(name = "tears-auth", version, about)]
pub struct ServerArgs {
	/// Shared secret code accepted by `POST /login`.
	#[arg(long, env = "TEARS_SECRET_CODE", hide_env_values = true)]
	pub secret_code: String,
	/// Socket address to listen on.
	#[arg(long, env = "TEARS_BIND", default_value = "0.0.0.0:8080")]
	pub bind: SocketAddr,
	/// `memory`, or a path to a JSON snapshot file.
	#[arg(long, env = "TEARS_STORE", default_value = "memory")]
	pub store: StoreLocation,
	/// Upper bound for a single store call, in seconds.
	#[arg(long, env = "TEARS_STORE_TIMEOUT_SECS", default_value_t = 5)]
	pub store_timeout_secs: u64,
	/// Prefix every route is mounted under (e.g. `/make-server-d6af8885`).
	#[arg(long, env = "TEARS_ROUTE_PREFIX")]
	pub route_prefix: Option<String>,
	/// Lifetime of issued tokens, in seconds.
	#[arg(long, env = "TEARS_TOKEN_TTL_SECS", default_value_t = 86_400)]
	pub token_ttl_secs: u64,
	/// Length of a login attempt window, in seconds.
	#[arg(long, env = "TEARS_RATE_WINDOW_SECS", default_value_t = 600)]
	pub rate_window_secs: u64,
	/// Login attempts allowed per window.
	#[arg(long, env = "TEARS_RATE_MAX_ATTEMPTS", default_value_t = 5)]
	pub rate_max_attempts: u32,
	/// Identity issued on successful login.
	#[arg(long, env = "TEARS_ADMIN_USER_ID", default_value = UserId::ADMIN)]
	pub admin_user_id: String,
	/// Emit logs as JSON objects.
	#[arg(long, env = "TEARS_LOG_JSON")]
	pub log_json: bool,
}
impl ServerArgs {
	/// Builds the validated [`AuthConfig`] described by the arguments.
	pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
		AuthConfig::builder(SharedSecret::new(self.secret_code.as_str()))
			.token_ttl(seconds(self.token_ttl_secs))
			.rate_limit(RateLimitPolicy::new(seconds(self.rate_window_secs), self.rate_max_attempts))
			.admin_user_id(self.admin_user_id.as_str())
			.build()
	}

	/// Returns the per-call store bound.
	pub fn store_timeout(&self) -> Result<Duration, ConfigError> {
		let timeout = seconds(self.store_timeout_secs);

		if timeout.is_positive() {
			Ok(timeout)
		} else {
			Err(ConfigError::NonPositiveDuration { field: "store_timeout" })
		}
	}

	/// Returns the validated route prefix, if any.
	pub fn route_prefix(&self) -> Result<Option<&str>, ConfigError> {
		match self.route_prefix.as_deref() {
			None | Some("") => Ok(None),
			Some(prefix) if prefix.starts_with('/') && !prefix.ends_with('/') => Ok(Some(prefix)),
			Some(prefix) => Err(ConfigError::InvalidRoutePrefix { prefix: prefix.into() }),
		}
	}

	/// Returns the requested log format.
	pub fn log_format(&self) -> LogFormat {
		if self.log_json { LogFormat::Json } else { LogFormat::Pretty }
	}
}

fn seconds(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
