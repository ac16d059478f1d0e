//! HTTP front end for the script playground
//!
//! Serves the playground page, runs submitted content through the sandboxed
//! script and answers with either the re-rendered page or the raw artifact.
//! Anything outside the root path is looked up in the embedded static assets.
//! All shared state is built once at startup and only read afterwards, so
//! requests are handled concurrently without any locking.

pub mod assets;
pub mod composer;
pub mod error;
pub mod form;
pub mod runner;
pub mod view;

pub use composer::Outcome;
pub use error::{Result, ServerError};
pub use runner::{SandboxRunner, ScriptRunner};
pub use view::{PageData, Templates};

use axum::extract::rejection::FormRejection;
use axum::extract::{DefaultBodyLimit, Form, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use form::Submission;
use playground_engine::{derive_schema, Config, Sandbox};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Response header carrying the error message of a failed submission.
pub const ERROR_HEADER: &str = "x-error-message";

/// Body allowance on top of the encoded content for the other form fields.
const FORM_OVERHEAD: usize = 16 * 1024;

/// Configuration for the playground server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Maximum submitted content size in bytes
    pub max_content_size: usize,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// File name offered for downloaded artifacts
    pub artifact_name: String,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_content_size: form::DEFAULT_MAX_CONTENT_SIZE,
            max_body_size: 64 * 1024, // 64KB
            artifact_name: "chart.svg".to_string(),
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address '{}': {}", addr, e)))?;
        Ok(self)
    }

    /// Set the content size ceiling. The body limit is raised to fit the
    /// content at its worst-case urlencoded size (three bytes per byte).
    pub fn with_max_content_size(mut self, size: usize) -> Self {
        self.max_content_size = size;
        self.max_body_size = self
            .max_body_size
            .max(size.saturating_mul(3).saturating_add(FORM_OVERHEAD));
        self
    }

    /// Set maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the download file name. It ends up inside a quoted header
    /// parameter, so quotes and control characters are rejected.
    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
            return Err(ServerError::config_error(format!(
                "Invalid artifact name '{}'",
                name.escape_debug()
            )));
        }
        self.artifact_name = name;
        Ok(self)
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState<T: ScriptRunner> {
    pub runner: T,
    pub schema: Arc<Config>,
    pub templates: Arc<Templates>,
    pub config: ServerConfig,
}

/// Handler for `GET /`.
async fn index_handler<T: ScriptRunner>(State(app_state): State<AppState<T>>) -> Response {
    respond(&app_state, composer::index(&app_state.schema))
}

/// Handler for `POST /`.
async fn submit_handler<T: ScriptRunner>(
    State(app_state): State<AppState<T>>,
    form: std::result::Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let submission = match form {
        Ok(Form(fields)) => Submission::from_fields(fields),
        // Not a urlencoded body: there are no form fields to read.
        Err(FormRejection::InvalidFormContentType(_)) => Submission::default(),
        Err(e) => {
            log::warn!("Failed reading submitted form: {}", e);
            return respond(&app_state, composer::read_failure(&app_state.schema));
        }
    };

    let outcome = composer::compose(
        &app_state.runner,
        &app_state.schema,
        submission,
        app_state.config.max_content_size,
    )
    .await;

    respond(&app_state, outcome)
}

/// Fallback handler serving embedded assets by exact path.
async fn asset_handler(method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path().strip_prefix('/').unwrap_or(uri.path());
    match assets::lookup(path) {
        Some(bytes) => {
            log::debug!("Serving asset {}", path);
            ([(header::CONTENT_TYPE, assets::content_type(path, bytes))], bytes).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Turn an [`Outcome`] into the HTTP response.
fn respond<T: ScriptRunner>(app_state: &AppState<T>, outcome: Outcome) -> Response {
    match outcome {
        Outcome::Download(body) => {
            let content_type = assets::content_type(&app_state.config.artifact_name, &body);
            let disposition = format!("attachment; filename=\"{}\"", app_state.config.artifact_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Outcome::Page(data) => {
            let html = match app_state.templates.render_index(&data) {
                Ok(html) => html,
                Err(e) => {
                    log::error!("error rendering template: {}", e);
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Error rendering page").into_response();
                }
            };

            if !data.has_error() {
                return Html(html).into_response();
            }

            let mut response = (StatusCode::BAD_REQUEST, Html(html)).into_response();
            if let Some(value) = error_header_value(&data.error) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(ERROR_HEADER), value);
            }
            response
        }
    }
}

/// Header-safe form of an error message. Line breaks and other control
/// characters become spaces.
fn error_header_value(message: &str) -> Option<HeaderValue> {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    HeaderValue::from_bytes(cleaned.trim_end().as_bytes()).ok()
}

/// The playground HTTP server.
pub struct PlaygroundServer<T: ScriptRunner> {
    runner: T,
    schema: Arc<Config>,
    templates: Arc<Templates>,
    config: ServerConfig,
}

impl<T: ScriptRunner> PlaygroundServer<T> {
    /// Create a new server with default configuration.
    pub fn new(runner: T, schema: Config, templates: Templates) -> Self {
        Self::with_config(runner, schema, templates, ServerConfig::default())
    }

    /// Create a new server with custom configuration.
    pub fn with_config(runner: T, schema: Config, templates: Templates, config: ServerConfig) -> Self {
        Self {
            runner,
            schema: Arc::new(schema),
            templates: Arc::new(templates),
            config,
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The default option schema served on `GET /`.
    pub fn schema(&self) -> &Config {
        &self.schema
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        // Create shared state
        let state = AppState {
            runner: self.runner.clone(),
            schema: Arc::clone(&self.schema),
            templates: Arc::clone(&self.templates),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route("/", get(index_handler::<T>).post(submit_handler::<T>))
            .fallback(asset_handler)
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    log::info!("Request {} {} {}", request_id, method, uri);

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    log::info!(
                        "Response {} {} completed in {:?}",
                        request_id,
                        response.status(),
                        duration
                    );

                    response
                },
            ));
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            ServerError::config_error(format!(
                "Failed listening on address '{}': {}",
                self.config.bind_addr, e
            ))
        })?;

        self.serve_on_listener(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let local_addr = listener.local_addr()?;

        log::info!("Listening on {}...", local_addr);
        log::info!("{} configurable option(s) available", self.schema.len());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Playground server shut down gracefully");
        Ok(())
    }
}

impl PlaygroundServer<SandboxRunner> {
    /// Derive the option schema from `sandbox` and serve it through a
    /// restricted [`SandboxRunner`].
    pub fn from_sandbox(sandbox: Sandbox, templates: Templates, config: ServerConfig) -> Result<Self> {
        let schema = derive_schema(&sandbox)?;
        Ok(Self::with_config(SandboxRunner::new(sandbox), schema, templates, config))
    }
}

/// Utility function to create a shutdown signal from Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down listener...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down listener...");
        },
    }
}
