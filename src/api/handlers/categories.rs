use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Card, Category, CreateCategoryRequest, UpdateCategoryRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.service_context.listing_service.list_categories().await?;
    Ok(Json(categories))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>> {
    let category = state.service_context.listing_service.get_category(id).await?;
    Ok(Json(category))
}

pub async fn list_cards(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Card>>> {
    let cards = state
        .service_context
        .listing_service
        .list_category_cards(id, query.page.unwrap_or(1), query.per_page.unwrap_or(20))
        .await?;

    Ok(Json(cards))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.service_context.listing_service.create_category(req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>> {
    let category = state.service_context.listing_service.update_category(id, req).await?;
    Ok(Json(category))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.listing_service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
