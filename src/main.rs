//! Property Uploader - Bulk CSV property upload service.
//!
//! Serves CSV templates, owns upload sessions, and drives the two-phase
//! validate-then-commit flow against the listings API.

mod config;
mod errors;
mod parser;
mod remote;
mod schema;
mod session;
mod template;
mod uploader;
mod validator;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use config::AppConfig;
use errors::UploadError;
use remote::ListingsApiClient;
use schema::TransactionType;
use serde_json::json;
use session::SessionSnapshot;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uploader::Uploader;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    uploader: Arc<Uploader>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "property_uploader=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let api = ListingsApiClient::new(
        config.api_base_url.clone(),
        config.api_token.clone(),
        config.remote_timeout,
    )?;
    info!("Listings API client ready ({})", config.api_base_url);

    let state = AppState {
        uploader: Arc::new(Uploader::new(Arc::new(api))),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/schemas", get(list_schemas))
        .route("/templates/{transaction_type}", get(download_template))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/file", post(replace_file))
        .route("/sessions/{id}/validate", post(validate_session))
        .route("/sessions/{id}/commit", post(commit_session))
        .route("/sessions/{id}/reset", post(reset_session))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024)) // 25MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SchemaInfo {
    transaction_type: &'static str,
    label: &'static str,
    fields: &'static [&'static str],
}

/// List the transaction types and their required CSV columns.
async fn list_schemas() -> Json<Vec<SchemaInfo>> {
    Json(
        TransactionType::ALL
            .iter()
            .map(|tt| SchemaInfo {
                transaction_type: tt.slug(),
                label: tt.api_label(),
                fields: tt.fields(),
            })
            .collect(),
    )
}

/// Serve the CSV template for a transaction type as a download.
async fn download_template(
    Path(transaction_type): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tt = TransactionType::from_slug(&transaction_type);
    let template = template::build_template(tt).map_err(internal_error)?;

    info!("Serving template {}", template.filename);
    let headers = [
        (header::CONTENT_TYPE, "text/csv;charset=utf-8;".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", template.filename),
        ),
    ];
    Ok((headers, template.contents))
}

#[derive(serde::Deserialize)]
struct CreateSessionQuery {
    #[serde(rename = "type")]
    transaction_type: Option<String>,
}

/// Open an upload session. An optional multipart `file` part selects the
/// upload file in the same request.
async fn create_session(
    State(state): State<AppState>,
    Query(query): Query<CreateSessionQuery>,
    multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let tt = TransactionType::from_slug(query.transaction_type.as_deref().unwrap_or("lease"));
    let file = read_file_part(multipart).await?;

    let snapshot = state.uploader.create_session(tt);
    let Some((filename, contents)) = file else {
        return Ok(Json(snapshot));
    };

    match state.uploader.select_file(&snapshot.id, &filename, contents) {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            // Don't leave a just-opened session behind on a rejected file
            let _ = state.uploader.drop_session(&snapshot.id);
            Err(error_response(e))
        }
    }
}

/// Get a session snapshot.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .uploader
        .snapshot(&id)
        .map(Json)
        .map_err(error_response)
}

/// Discard a session.
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .uploader
        .drop_session(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// Replace the session's selected file. Clears prior validation results and
/// any pending commit.
async fn replace_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let Some((filename, contents)) = read_file_part(multipart).await? else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No file uploaded" })),
        ));
    };

    state
        .uploader
        .select_file(&id, &filename, contents)
        .map(Json)
        .map_err(error_response)
}

/// Run the validate-only pass for a session.
async fn validate_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .uploader
        .validate(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Commit the rows confirmed valid by the last validate pass.
async fn commit_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .uploader
        .commit(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Return a session to idle, clearing file, results and pending commit.
async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state.uploader.reset(&id).map(Json).map_err(error_response)
}

// ============================================================================
// Helper functions
// ============================================================================

/// Read the `file` part of a multipart body into memory as text.
async fn read_file_part(mut multipart: Multipart) -> Result<Option<(String, String)>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Multipart error: {}", e) })),
        )
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("Failed to read file: {}", e) })),
                )
            })?;
            let contents = String::from_utf8_lossy(&bytes).to_string();
            return Ok(Some((filename, contents)));
        }
    }
    Ok(None)
}

fn error_response(err: UploadError) -> ApiError {
    let status = match &err {
        UploadError::InvalidFileType(_) => StatusCode::BAD_REQUEST,
        UploadError::TemplateMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        UploadError::SessionNotFound => StatusCode::NOT_FOUND,
        UploadError::Remote(_) => StatusCode::BAD_GATEWAY,
        UploadError::NoFileSelected
        | UploadError::NothingToCommit
        | UploadError::OperationInFlight
        | UploadError::AlreadyCommitted => StatusCode::CONFLICT,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

fn internal_error(err: anyhow::Error) -> ApiError {
    tracing::error!("Internal error: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
}
