//! `tears-auth` server: parses flags and environment, wires the store, then serves HTTP until
//! interrupted.

// std
use std::{net::SocketAddr, process::ExitCode, sync::Arc};
// crates.io
use clap::Parser;
// self
use tears_auth::{
	clock::{Clock, SystemClock},
	config::{ServerArgs, StoreLocation},
	error::ConfigError,
	http, obs,
	service::AuthService,
	store::{FileStore, KeyValueStore, MemoryStore, TimeoutStore},
};

#[tokio::main]
async fn main() -> ExitCode {
	let args = ServerArgs::parse();

	obs::init_tracing(args.log_format());

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "tears-auth exited with an error");

			ExitCode::FAILURE
		},
	}
}

async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
	let config = args.auth_config()?;
	let prefix = args.route_prefix()?.map(str::to_owned);
	let backend: Arc<dyn KeyValueStore> = match &args.store {
		StoreLocation::Memory => Arc::new(MemoryStore::default()),
		StoreLocation::File(path) =>
			Arc::new(FileStore::open(path.as_path()).map_err(ConfigError::StoreOpen)?),
	};
	let store: Arc<dyn KeyValueStore> =
		Arc::new(TimeoutStore::new(backend).with_timeout(args.store_timeout()?));
	let clock: Arc<dyn Clock> = Arc::new(SystemClock);
	let service = AuthService::new(store, clock, config);
	let app = http::router_with_prefix(service, prefix.as_deref());
	let listener = tokio::net::TcpListener::bind(args.bind).await?;

	tracing::info!(
		addr = %listener.local_addr()?,
		store = ?args.store,
		prefix = prefix.as_deref().unwrap_or("/"),
		"tears-auth listening"
	);

	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("tears-auth stopped");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %e, "failed to listen for ctrl-c; shutting down");
	}
}
