pub(crate) mod api;
pub(crate) mod archive;
pub(crate) mod config;
pub(crate) mod types;

use crate::archive::{Archive, ArchiveClient};
use crate::config::{AppConfig, HttpServerConfig, TelemetryConfig};
use axum::extract::Request;
use axum::http::header::SERVER;
use axum::http::HeaderValue;
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace;
use tracing::{error, info, level_filters::LevelFilter, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Value of the `Server` header on every response and the user agent towards the archive.
pub(crate) const SERVER_NAME: &str = concat!("dicom-image-proxy/", env!("CARGO_PKG_VERSION"));

fn init_logger(telemetry: &TelemetryConfig) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(telemetry.level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

#[derive(Clone)]
pub struct AppState {
	pub config: AppConfig,
	pub archive: Arc<dyn Archive>,
}

/// Returns `None` when no DSN is configured, in which case events go nowhere.
fn init_sentry(telemetry: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
	let dsn = telemetry.sentry.as_deref().filter(|dsn| !dsn.is_empty())?;
	let guard = sentry::init((
		dsn,
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));
	info!("Reporting archive and request errors to Sentry");
	Some(guard)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = AppConfig::new()?;
	init_logger(&config.telemetry);

	// Sentry has to be initialized before the runtime starts its worker threads.
	let _sentry = init_sentry(&config.telemetry);

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(async move {
			if let Err(error) = run(config).await {
				error!("Failed to start application due to error: {error}");
			}
		});
	Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
	let archive = ArchiveClient::new(&config.archive)?;

	let app_state = AppState {
		config: config.clone(),
		archive: Arc::new(archive),
	};

	let router = app(app_state);

	let HttpServerConfig {
		interface: host,
		port,
		..
	} = config.server.http;
	let addr = SocketAddr::from((host, port));
	let listener = TcpListener::bind(addr).await?;

	info!("Started image proxy on http://{addr}");
	if config.server.http.graceful_shutdown {
		axum::serve(listener, router)
			.with_graceful_shutdown(shutdown_signal())
			.await?;
	} else {
		axum::serve(listener, router).await?;
	}

	Ok(())
}

/// The API routes wrapped in the HTTP middleware stack.
fn app(state: AppState) -> Router {
	let http = &state.config.server.http;

	api::routes(&http.base_path)
		.layer(
			ServiceBuilder::new()
				.layer(
					trace::TraceLayer::new_for_http()
						.make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
						.on_request(trace::DefaultOnRequest::new().level(Level::INFO))
						.on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
				)
				.layer(TimeoutLayer::new(Duration::from_secs(http.request_timeout)))
				.layer(CorsLayer::permissive())
				.layer(axum::middleware::from_fn(add_common_headers)),
		)
		.with_state(state)
}

/// Completes on Ctrl+C or SIGTERM. A signal whose handler cannot be installed is logged and
/// then never fires.
async fn shutdown_signal() {
	let ctrl_c = async {
		match signal::ctrl_c().await {
			Ok(()) => info!("Received Ctrl+C, shutting down"),
			Err(err) => {
				error!("Cannot listen for Ctrl+C: {err}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
				info!("Received SIGTERM, shutting down");
			}
			Err(err) => {
				error!("Cannot listen for SIGTERM: {err}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}

async fn add_common_headers(req: Request, next: axum::middleware::Next) -> Response {
	let mut response = next.run(req).await;
	response
		.headers_mut()
		.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
	response
}
