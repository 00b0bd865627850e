use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Account, AccountPage, UpdateRoleRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct AccountListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AccountListQuery>,
) -> Result<Json<AccountPage>> {
    let page = state
        .service_context
        .account_service
        .list_accounts(query.page.unwrap_or(1), query.per_page.unwrap_or(20))
        .await?;

    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>> {
    let account = state.service_context.account_service.get_account(id).await?;
    Ok(Json(account))
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<Account>> {
    let account = state
        .service_context
        .account_service
        .set_role(&user.account, id, req.role)
        .await?;

    Ok(Json(account))
}

pub async fn assign_tariff(
    State(state): State<AppState>,
    Path((id, tariff_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Account>> {
    let account = state
        .service_context
        .account_service
        .assign_tariff(id, tariff_id)
        .await?;

    Ok(Json(account))
}
