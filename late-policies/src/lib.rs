//! Late Policy Service
//!
//! CRUD management of late submission penalty policies over HTTP, with
//! role and ownership checks on every action.

pub mod auth;
pub mod authorization;
pub mod config;
pub mod flash;
pub mod manager;
pub mod model;
pub mod penalty;
pub mod routes;
pub mod store;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tera::Tera;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::JwtConfig;
use crate::config::{Config, StoreBackend};
use crate::manager::{LatePolicyManager, ManagerError};
use crate::store::{KvPolicyStore, MemoryStore, PolicyStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: LatePolicyManager,
    pub tera: Tera,
    pub jwt_config: JwtConfig,
}

impl AppState {
    /// Build state from configuration, connecting to storage as needed
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn PolicyStore> = match config.store {
            StoreBackend::Memory => {
                info!("Using in-memory late policy store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Jetstream => Arc::new(
                KvPolicyStore::connect(
                    &config.nats_url,
                    config.nats_creds_path.as_deref(),
                    &config.kv_bucket,
                )
                .await?,
            ),
        };

        let algorithm = JwtConfig::parse_algorithm(&config.jwt_algorithm).with_context(|| {
            format!("Unsupported JWT algorithm: {}", config.jwt_algorithm)
        })?;
        let tera = load_templates(&config.templates_glob())?;

        info!("Successfully initialized late policy application state");
        Ok(Self::from_parts(
            store,
            tera,
            JwtConfig::new(config.jwt_secret.clone(), algorithm),
        ))
    }

    pub fn from_parts(store: Arc<dyn PolicyStore>, tera: Tera, jwt_config: JwtConfig) -> Self {
        Self {
            manager: LatePolicyManager::new(store),
            tera,
            jwt_config,
        }
    }
}

/// Compile every template matching `glob`
pub fn load_templates(glob: &str) -> Result<Tera> {
    let tera = Tera::new(glob)
        .with_context(|| format!("Parsing error for Tera templates ({})", glob))?;
    info!("Loaded {} templates from {}", tera.get_template_names().count(), glob);
    Ok(tera)
}

/// Custom error type for HTTP responses
#[derive(Debug)]
pub struct AppError {
    pub status_code: StatusCode,
    pub message: String,
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        let status_code = match &err {
            ManagerError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            ManagerError::NotFound { .. } => StatusCode::NOT_FOUND,
            ManagerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status_code,
            message: err.to_string(),
        }
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Template rendering error: {}", err),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code, self.message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Health check endpoint
async fn health() -> impl IntoResponse {
    "OK"
}

// Fallback handler for 404s
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(
            r#"
<!DOCTYPE html>
<html>
<head>
    <title>404 - Not Found</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        .error { color: #d32f2f; }
    </style>
</head>
<body>
    <h1 class="error">404 - Page Not Found</h1>
    <p><a href="/late_policies">&larr; Back to Late Policies</a></p>
</body>
</html>
    "#,
        ),
    )
}

/// Create the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/late_policies",
            get(routes::list_policies_html).post(routes::create_policy),
        )
        .route("/late_policies/new", get(routes::new_policy_html))
        .route(
            "/late_policies/:id",
            get(routes::show_policy_html)
                .post(routes::update_policy)
                .put(routes::update_policy)
                .patch(routes::update_policy)
                .delete(routes::destroy_policy),
        )
        .route("/late_policies/:id/edit", get(routes::edit_policy_html))
        .route("/late_policies/:id/delete", post(routes::destroy_policy))
        .route("/api/late_policies", get(routes::list_policies_api))
        .route("/api/late_policies/:id", get(routes::show_policy_api))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_middleware,
        ))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
