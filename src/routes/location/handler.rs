use axum::{
    Extension,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    error::AppError,
    location::PrivacyLevel,
    utils::{Claims, success_to_api_response},
};

use super::model::{HistoryQuery, PrivacyResponse, SetPrivacyRequest, UpdateLocationRequest, UpdateLocationResponse};

#[axum::debug_handler]
pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateLocationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let (coordinates, device) = req.into_parts()?;

    // 后台任务已派发，这里不等待
    let ingested = state.locations.ingest(&claims.sub, coordinates, device).await?;

    Ok((
        StatusCode::CREATED,
        success_to_api_response(UpdateLocationResponse {
            location: ingested.sample,
        }),
    ))
}

#[axum::debug_handler]
pub async fn get_user_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let location = state.locations.current_location(&user_id, &claims.sub).await?;
    Ok(success_to_api_response(location))
}

#[axum::debug_handler]
pub async fn get_group_locations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let locations = state.locations.group_locations(&group_id, &claims.sub).await?;
    Ok(success_to_api_response(locations))
}

#[axum::debug_handler]
pub async fn get_location_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::validation(e.body_text()))?;

    // 默认查询最近24小时
    let end = query.end_date.unwrap_or_else(Utc::now);
    let start = query.start_date.unwrap_or_else(|| end - Duration::hours(24));

    let history = state
        .locations
        .location_history(&user_id, start, end, query.group_id.as_deref(), &claims.sub)
        .await?;
    Ok(success_to_api_response(history))
}

#[axum::debug_handler]
pub async fn set_privacy(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SetPrivacyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let level = PrivacyLevel::parse(&req.privacy_level)
        .ok_or_else(|| AppError::validation("无效的隐私级别"))?;

    let privacy_level = state.locations.set_privacy(&claims.sub, level).await?;
    Ok(success_to_api_response(PrivacyResponse { privacy_level }))
}
