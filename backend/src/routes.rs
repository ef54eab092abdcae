use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::{
    error::AppError,
    models::{Birthday, BirthdayInput, ImportEntry, ImportRequest},
    service::BirthdayService,
};

pub type AppState = Arc<AppData>;

pub struct AppData {
    pub birthdays: Arc<BirthdayService>,
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/birthdays", post(add_birthday))
        .route("/api/birthdays/import", post(import_birthdays))
        .route("/api/birthdays/export/:fingerprint", get(export_birthdays))
        // One parameter name per segment: a fingerprint for GET, a numeric id for PUT/DELETE.
        .route(
            "/api/birthdays/:key",
            get(list_birthdays)
                .put(update_birthday)
                .delete(delete_birthday),
        )
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)) // 2MB limit
        .layer(cors)
        .with_state(state)
}

fn parse_id(raw: &str) -> Result<i32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid birthday id".to_string()))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text())))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_birthdays(
    Path(fingerprint): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Birthday>>, AppError> {
    let birthdays = state
        .birthdays
        .list(&fingerprint)
        .await
        .map_err(|e| AppError::from_service(e, "Error fetching birthdays"))?;

    Ok(Json(birthdays))
}

async fn export_birthdays(
    Path(fingerprint): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Birthday>>, AppError> {
    let birthdays = state
        .birthdays
        .list(&fingerprint)
        .await
        .map_err(|e| AppError::from_service(e, "Error exporting birthdays"))?;

    log::info!("Exported {} birthdays", birthdays.len());
    Ok(Json(birthdays))
}

async fn add_birthday(
    State(state): State<AppState>,
    payload: Result<Json<BirthdayInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let input = json_body(payload)?;

    let id = state
        .birthdays
        .add(&input)
        .await
        .map_err(|e| AppError::from_service(e, "Error adding birthday"))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Birthday added", "id": id })),
    ))
}

async fn update_birthday(
    Path(key): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<BirthdayInput>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&key)?;
    let input = json_body(payload)?;

    state
        .birthdays
        .update(id, &input)
        .await
        .map_err(|e| AppError::from_service(e, "Error updating birthday"))?;

    Ok(Json(json!({ "message": "Birthday updated successfully" })))
}

async fn delete_birthday(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&key)?;

    state
        .birthdays
        .remove(id)
        .await
        .map_err(|e| AppError::from_service(e, "Error deleting birthday"))?;

    Ok(Json(json!({ "message": "Birthday deleted successfully" })))
}

async fn import_birthdays(
    State(state): State<AppState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let invalid = || AppError::BadRequest("Invalid import data format".to_string());

    let request = json_body(payload).map_err(|_| invalid())?;
    let fingerprint = match request.fingerprint.as_deref() {
        Some(fp) if !fp.trim().is_empty() => fp.to_string(),
        _ => return Err(invalid()),
    };
    if !request.birthdays.is_array() {
        return Err(invalid());
    }

    let entries: Vec<ImportEntry> = serde_json::from_value(request.birthdays).map_err(|e| {
        AppError::BadRequest(format!("Invalid import data format: {}", e))
    })?;

    let imported = state
        .birthdays
        .import(&entries, &fingerprint)
        .await
        .map_err(|e| AppError::from_service(e, "Error importing birthdays"))?;

    log::info!("Imported {} birthdays", imported);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Birthdays imported successfully", "imported": imported })),
    ))
}
