use axum::{
    Extension,
    extract::{Json, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    proximity::SubscriptionUpdate,
    utils::{Claims, success_to_api_response},
};

use super::model::{CreateAlertRequest, UpdateAlertRequest};

fn parse_alert_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::validation("无效的提醒ID"))
}

#[axum::debug_handler]
pub async fn create_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let (group_id, target_user_id, threshold) = req.required()?;

    let alert = state
        .alerts
        .create(&group_id, &target_user_id, threshold, &claims.sub)
        .await?;
    Ok((StatusCode::CREATED, success_to_api_response(alert)))
}

#[axum::debug_handler]
pub async fn list_group_alerts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = state.alerts.list(&group_id, &claims.sub).await?;
    Ok(success_to_api_response(alerts))
}

#[axum::debug_handler]
pub async fn update_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(alert_id): Path<String>,
    payload: Result<Json<UpdateAlertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_alert_id(&alert_id)?;
    let Json(req) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let update = SubscriptionUpdate::try_from(req)?;

    let alert = state.alerts.update(id, update, &claims.sub).await?;
    Ok(success_to_api_response(alert))
}

#[axum::debug_handler]
pub async fn delete_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(alert_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_alert_id(&alert_id)?;
    state.alerts.delete(id, &claims.sub).await?;
    Ok(success_to_api_response(serde_json::json!({ "alert_id": id })))
}
