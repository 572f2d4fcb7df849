//! HTTP surface of the consent service.
//!
//! Every `/api/v1` request carries the calling organization in the `org-id`
//! header; consent creation also needs `client-id`.
use crate::errors::AssentError;
use crate::models::{
    AttributeSearchResponse, AuthorizationResponse, AuthorizationUpdateRequest,
    ConsentCreateRequest, ConsentResponse, ConsentSearchFilter, ConsentSummary,
    ConsentUpdateRequest, Page, PurposeCreateRequest, PurposeResponse, PurposeUpdateRequest,
    RevokeRequest, RevokeResponse, StatusAuditResponse, ValidateRequest, ValidateResponse,
};
use crate::service::ConsentService;
use crate::settings::Settings;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const ORG_ID_HEADER: &str = "org-id";
pub const CLIENT_ID_HEADER: &str = "client-id";

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub service: ConsentService,
}

impl AppState {
    pub fn new(settings: Settings, db: DatabaseConnection) -> Self {
        let service = ConsentService::new(db, settings.consent.clone());
        Self {
            settings: Arc::new(settings),
            service,
        }
    }
}

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    // JSON API: nothing should ever be loaded from a response
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store"),
    );

    response
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.server.cors_allowed_origins);

    let api = Router::new()
        .route("/consents", post(create_consent).get(list_consents))
        .route("/consents/search", get(search_consents))
        .route("/consents/search/detailed", get(search_consents_detailed))
        .route("/consents/attributes", get(search_by_attribute))
        .route("/consents/validate", post(validate_consent))
        .route(
            "/consents/{id}",
            get(get_consent).put(update_consent).delete(delete_consent),
        )
        .route("/consents/{id}/revoke", post(revoke_consent))
        .route("/consents/{id}/history", get(status_history))
        .route(
            "/consents/{id}/authorizations/{auth_id}",
            get(get_authorization).put(update_authorization),
        )
        .route("/purposes", post(create_purpose).get(list_purposes))
        .route(
            "/purposes/{id}",
            get(get_purpose).put(update_purpose).delete(delete_purpose),
        );

    Router::new()
        .route("/healthz", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let state = AppState::new(settings, db);

    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let app = router(state);

    tracing::info!(%addr, "Consent API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// ============================================================================
// Request helpers
// ============================================================================

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, AssentError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AssentError::validation(format!("missing '{name}' header")))
}

fn org_id(headers: &HeaderMap) -> Result<String, AssentError> {
    required_header(headers, ORG_ID_HEADER)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AssentError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AssentError::validation(format!("invalid request body: {}", e.body_text())))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AssentError> {
    params
        .map(|Query(v)| v)
        .map_err(|e| AssentError::validation(format!("invalid query string: {}", e.body_text())))
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Query string of the search endpoints. List filters are comma separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    consent_types: Option<String>,
    consent_statuses: Option<String>,
    client_ids: Option<String>,
    user_ids: Option<String>,
    from_time: Option<i64>,
    to_time: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SearchParams {
    fn into_parts(self) -> (ConsentSearchFilter, Option<i64>, Option<i64>) {
        let filter = ConsentSearchFilter {
            consent_types: split_list(self.consent_types),
            consent_statuses: split_list(self.consent_statuses),
            client_ids: split_list(self.client_ids),
            user_ids: split_list(self.user_ids),
            from_time: self.from_time,
            to_time: self.to_time,
        };
        (filter, self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
struct AttributeParams {
    key: Option<String>,
    value: Option<String>,
}

// ============================================================================
// Consent handlers
// ============================================================================

async fn create_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ConsentCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConsentResponse>), AssentError> {
    let org_id = org_id(&headers)?;
    let client_id = required_header(&headers, CLIENT_ID_HEADER)?;
    let req = body(payload)?;
    let consent = state
        .service
        .create_consent(&org_id, &client_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(consent)))
}

async fn list_consents(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<ConsentSummary>>, AssentError> {
    let org_id = org_id(&headers)?;
    let params = query(params)?;
    let page = state
        .service
        .list_consents(&org_id, params.limit, params.offset)
        .await?;
    Ok(Json(page))
}

async fn search_consents(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Page<ConsentSummary>>, AssentError> {
    let org_id = org_id(&headers)?;
    let params = query(params)?;
    let (filter, limit, offset) = params.into_parts();
    let page = state
        .service
        .search_consents(&org_id, &filter, limit, offset)
        .await?;
    Ok(Json(page))
}

async fn search_consents_detailed(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Page<ConsentResponse>>, AssentError> {
    let org_id = org_id(&headers)?;
    let params = query(params)?;
    let (filter, limit, offset) = params.into_parts();
    let page = state
        .service
        .search_consents_detailed(&org_id, &filter, limit, offset)
        .await?;
    Ok(Json(page))
}

async fn search_by_attribute(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<AttributeParams>, QueryRejection>,
) -> Result<Json<AttributeSearchResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let params = query(params)?;
    let found = state
        .service
        .search_consents_by_attribute(&org_id, params.key.as_deref(), params.value.as_deref())
        .await?;
    Ok(Json(found))
}

async fn validate_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let req = body(payload)?;
    let outcome = state.service.validate_consent(&org_id, &req).await?;
    Ok(Json(outcome))
}

async fn get_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ConsentResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    Ok(Json(state.service.get_consent(&org_id, &id).await?))
}

async fn update_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ConsentUpdateRequest>, JsonRejection>,
) -> Result<Json<ConsentResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let req = body(payload)?;
    Ok(Json(state.service.update_consent(&org_id, &id, req).await?))
}

async fn delete_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AssentError> {
    let org_id = org_id(&headers)?;
    state.service.delete_consent(&org_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_consent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<RevokeResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let req = body(payload)?;
    Ok(Json(state.service.revoke_consent(&org_id, &id, req).await?))
}

async fn status_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<StatusAuditResponse>>, AssentError> {
    let org_id = org_id(&headers)?;
    Ok(Json(state.service.get_status_history(&org_id, &id).await?))
}

async fn get_authorization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, auth_id)): Path<(String, String)>,
) -> Result<Json<AuthorizationResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let auth = state
        .service
        .get_authorization(&org_id, &id, &auth_id)
        .await?;
    Ok(Json(auth))
}

async fn update_authorization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, auth_id)): Path<(String, String)>,
    payload: Result<Json<AuthorizationUpdateRequest>, JsonRejection>,
) -> Result<Json<AuthorizationResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let req = body(payload)?;
    let auth = state
        .service
        .update_authorization(&org_id, &id, &auth_id, req)
        .await?;
    Ok(Json(auth))
}

// ============================================================================
// Purpose handlers
// ============================================================================

async fn create_purpose(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PurposeCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PurposeResponse>), AssentError> {
    let org_id = org_id(&headers)?;
    let req = body(payload)?;
    let purpose = state.service.create_purpose(&org_id, req).await?;
    Ok((StatusCode::CREATED, Json(purpose)))
}

async fn list_purposes(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<PurposeResponse>>, AssentError> {
    let org_id = org_id(&headers)?;
    let params = query(params)?;
    let page = state
        .service
        .list_purposes(&org_id, params.limit, params.offset)
        .await?;
    Ok(Json(page))
}

async fn get_purpose(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurposeResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    Ok(Json(state.service.get_purpose(&org_id, &id).await?))
}

async fn update_purpose(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<PurposeUpdateRequest>, JsonRejection>,
) -> Result<Json<PurposeResponse>, AssentError> {
    let org_id = org_id(&headers)?;
    let req = body(payload)?;
    Ok(Json(state.service.update_purpose(&org_id, &id, req).await?))
}

async fn delete_purpose(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AssentError> {
    let org_id = org_id(&headers)?;
    state.service.delete_purpose(&org_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
