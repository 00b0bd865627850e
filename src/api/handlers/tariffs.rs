use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{CreateTariffRequest, Tariff, UpdateTariffRequest},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub include_inactive: Option<bool>,
}

/// Active tariffs, cheapest first.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Tariff>>> {
    let tariffs = state.service_context.tariff_service.list(false).await?;
    Ok(Json(tariffs))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tariff>> {
    let tariff = state.service_context.tariff_service.get(id).await?;

    if !tariff.is_active {
        return Err(AppError::NotFound("Tariff not found".to_string()));
    }

    Ok(Json(tariff))
}

pub async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Tariff>>> {
    let include_inactive = query.include_inactive.unwrap_or(true);
    let tariffs = state.service_context.tariff_service.list(include_inactive).await?;
    Ok(Json(tariffs))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateTariffRequest>,
) -> Result<(StatusCode, Json<Tariff>)> {
    let tariff = state.service_context.tariff_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(tariff)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTariffRequest>,
) -> Result<Json<Tariff>> {
    let tariff = state.service_context.tariff_service.update(id, req).await?;
    Ok(Json(tariff))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.tariff_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
