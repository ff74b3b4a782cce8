//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::catalog::{self, TechnologyFilter, TechnologyListing};
use crate::lifecycle::LifecycleManager;
use crate::technology::{NewTechnology, Technology, TechnologyUpdate};

/// Name reported by `GET /app-name`.
pub const APP_NAME: &str = "tech-radar";

type ApiResult<T> = Result<T, ApiError>;

/// `GET /ping`
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /app-name`
pub async fn app_name() -> Json<Value> {
    Json(json!({ "name": APP_NAME }))
}

/// `GET /technologies`
///
/// Query parameters may repeat (`?categories=Tools&categories=Platforms`);
/// unknown parameters are ignored.
pub async fn list_technologies(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<TechnologyListing>> {
    let filter = TechnologyFilter::from_pairs(pairs);
    let listing = state
        .with_storage(move |storage, _| catalog::list(storage, &filter))
        .await?;
    Ok(Json(listing))
}

/// `PUT /technologies`
pub async fn create_technology(
    State(state): State<AppState>,
    payload: Result<Json<NewTechnology>, JsonRejection>,
) -> ApiResult<Json<Technology>> {
    let Json(request) = payload?;
    let created = state
        .with_storage(move |storage, attempts| {
            LifecycleManager::with_max_update_attempts(storage, attempts).create(request)
        })
        .await?;
    Ok(Json(created))
}

/// `POST /technologies/:name`
pub async fn update_technology(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<TechnologyUpdate>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(update) = payload?;
    state
        .with_storage(move |storage, attempts| {
            LifecycleManager::with_max_update_attempts(storage, attempts).update(&name, update)
        })
        .await?;
    Ok(StatusCode::OK)
}

/// `DELETE /technologies/:name`
pub async fn delete_technology(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .with_storage(move |storage, attempts| {
            LifecycleManager::with_max_update_attempts(storage, attempts).delete(&name)
        })
        .await?;
    Ok(StatusCode::OK)
}
