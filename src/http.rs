//! JSON HTTP surface over [`AuthService`].
//!
//! Every body carries a boolean `success` (health excepted). The session token travels in the
//! `X-Custom-Token` header; a platform `Authorization` header is accepted by CORS but never read.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{ConnectInfo, Path, State},
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
	},
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
// self
use crate::{
	_prelude::*,
	admin::AdminDataStore,
	auth::{ClientKey, TokenSecret},
	clock,
	error::ValidationError,
	service::AuthService,
};

/// Header carrying the session token on authenticated endpoints.
pub const TOKEN_HEADER: &str = "x-custom-token";
/// Proxy header whose first entry names the requesting client.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Proxy header naming the requesting client.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
	service: AuthService,
	admin: AdminDataStore,
}
impl AppState {
	/// Builds handler state around `service`.
	pub fn new(service: AuthService) -> Self {
		let admin = service.admin_store();

		Self { service, admin }
	}
}

/// Builds the router with every route mounted at the root.
pub fn router(service: AuthService) -> Router {
	routes()
		.with_state(AppState::new(service))
		.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors_layer()))
}

/// Builds the router, optionally nesting every route under `prefix` (e.g. `/make-server`).
pub fn router_with_prefix(service: AuthService, prefix: Option<&str>) -> Router {
	match prefix {
		Some(prefix) => Router::new().nest(prefix, router(service)),
		None => router(service),
	}
}

fn routes() -> Router<AppState> {
	Router::new()
		.route("/login", post(login))
		.route("/validate", post(validate))
		.route("/admin/:user_id", get(fetch_admin).post(save_admin))
		.route("/logout", delete(logout))
		.route("/health", get(health))
}

fn cors_layer() -> CorsLayer {
	CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
		.allow_headers([CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static(TOKEN_HEADER)])
}

/// `POST /login` body.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
	/// Shared secret code.
	pub secret_code: String,
}

/// `POST /login` success body.
#[derive(Clone, Debug, Serialize)]
pub struct LoginResponse {
	/// Always `true`.
	pub success: bool,
	/// Issued session token.
	pub token: String,
	/// Human-readable status.
	pub message: String,
}

/// `POST /validate` body.
#[derive(Clone, Debug, Deserialize)]
pub struct ValidateRequest {
	/// Token to check; absent tokens are simply invalid.
	#[serde(default)]
	pub token: Option<String>,
}

/// `POST /validate` success body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
	/// Always `true`.
	pub success: bool,
	/// User the token was issued to.
	pub user_id: String,
	/// Human-readable status.
	pub message: String,
}

/// `GET /admin/:userId` success body.
#[derive(Clone, Debug, Serialize)]
pub struct AdminDataResponse {
	/// Always `true`.
	pub success: bool,
	/// Stored or placeholder admin document.
	pub data: Value,
}

/// Body for endpoints that only report a status, and for every failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
	/// Whether the request succeeded.
	pub success: bool,
	/// Human-readable status.
	pub message: String,
}
impl MessageResponse {
	fn ok(message: impl Into<String>) -> Self {
		Self { success: true, message: message.into() }
	}

	fn failed(message: impl Into<String>) -> Self {
		Self { success: false, message: message.into() }
	}
}

/// `GET /health` body.
#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
	/// Always `healthy` while the process answers.
	pub status: &'static str,
	/// RFC 3339 response instant.
	pub timestamp: String,
}

async fn login(
	State(state): State<AppState>,
	peer: Option<ConnectInfo<SocketAddr>>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<LoginResponse>, Error> {
	let client = client_key(&headers, peer.map(|ConnectInfo(addr)| addr));
	let secret_code = decode_body::<LoginRequest>(&body).map(|request| request.secret_code);
	let issued = state.service.login_decoded(secret_code, &client).await?;

	Ok(Json(LoginResponse {
		success: true,
		token: issued.secret.expose().to_owned(),
		message: "Login successful".into(),
	}))
}

async fn validate(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<ValidateResponse>, Error> {
	let request: ValidateRequest = decode_body(&body)?;
	let secret = request.token.map(TokenSecret::new).ok_or(Error::InvalidToken)?;
	let user_id = state.service.validate(&secret).await?;

	Ok(Json(ValidateResponse {
		success: true,
		user_id: user_id.into(),
		message: "Token valid".into(),
	}))
}

async fn fetch_admin(
	State(state): State<AppState>,
	Path(user_id): Path<String>,
	headers: HeaderMap,
) -> Result<Json<AdminDataResponse>, Error> {
	let secret = session_token(&headers).ok_or(Error::InvalidToken)?;
	let authenticated = state.service.validate(&secret).await?;
	let user_id = AdminDataStore::authorize(&authenticated, &user_id)?;
	let data = state.admin.fetch(&user_id).await?;

	Ok(Json(AdminDataResponse { success: true, data }))
}

async fn save_admin(
	State(state): State<AppState>,
	Path(user_id): Path<String>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<MessageResponse>, Error> {
	let secret = session_token(&headers).ok_or(Error::InvalidToken)?;
	let authenticated = state.service.validate(&secret).await?;
	let user_id = AdminDataStore::authorize(&authenticated, &user_id)?;
	let document: Value = decode_body(&body)?;

	state.admin.save(&user_id, document).await?;

	Ok(Json(MessageResponse::ok("Admin data saved successfully")))
}

async fn logout(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<MessageResponse>, Error> {
	state.service.logout(session_token(&headers).as_ref()).await?;

	Ok(Json(MessageResponse::ok("Logged out successfully")))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse { status: "healthy", timestamp: clock::rfc3339(state.service.now()) })
}

/// Derives the rate-limit bucket for a request.
///
/// Sources are tried in order: the first `X-Forwarded-For` entry, `X-Real-IP`, the socket peer
/// address, then the shared [`ClientKey::UNKNOWN`] bucket. Proxy headers are trusted as sent.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey {
	let usable = |raw: &str| {
		let raw = raw.trim();

		ClientKey::new(raw).is_ok().then(|| raw.to_owned())
	};
	let candidate = header_str(headers, FORWARDED_FOR_HEADER)
		.and_then(|value| value.split(',').next())
		.and_then(usable)
		.or_else(|| header_str(headers, REAL_IP_HEADER).and_then(usable))
		.or_else(|| peer.map(|addr| addr.ip().to_string()));

	ClientKey::or_unknown(candidate.as_deref())
}

fn session_token(headers: &HeaderMap) -> Option<TokenSecret> {
	header_str(headers, TOKEN_HEADER).filter(|value| !value.is_empty()).map(TokenSecret::new)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok())
}

fn decode_body<T>(body: &[u8]) -> Result<T, Error>
where
	T: serde::de::DeserializeOwned,
{
	let de = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(de)
		.map_err(|e| Error::Validation(ValidationError::malformed_body(e)))
}

/// Maps an error to the status code returned to HTTP callers.
pub fn status_for(error: &Error) -> StatusCode {
	match error {
		Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
		Error::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
		Error::Forbidden { .. } => StatusCode::FORBIDDEN,
		Error::Validation(_) => StatusCode::BAD_REQUEST,
		Error::Storage(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = status_for(&self);
		let message = match &self {
			Error::InvalidCredentials => "Invalid secret code".to_owned(),
			Error::InvalidToken => "Invalid token".to_owned(),
			Error::TooManyAttempts { .. } =>
				"Too many login attempts. Please wait before trying again.".to_owned(),
			Error::Storage(_) | Error::Config(_) => {
				tracing::error!(error = %self, "request failed on the storage layer");

				"Service temporarily unavailable".to_owned()
			},
			other => other.to_string(),
		};
		let mut response = (status, Json(MessageResponse::failed(message))).into_response();

		if let Error::TooManyAttempts { retry_after } = self {
			let secs = retry_after.whole_seconds()
				+ i64::from(retry_after.subsec_nanoseconds() > 0);

			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs.max(0)));
		}

		response
	}
}
