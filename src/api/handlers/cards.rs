use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Card, CreateCardRequest, LikeState, Review, ReviewRequest, UpdateCardRequest},
    error::Result,
    service::Viewer,
};

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub counted: bool,
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Card>> {
    let card = state.service_context.listing_service.get_card(id).await?;
    Ok(Json(card))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Card>>> {
    let cards = state
        .service_context
        .listing_service
        .list_owner_cards(user.account.id)
        .await?;

    Ok(Json(cards))
}

pub async fn list_liked(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Card>>> {
    let cards = state
        .service_context
        .listing_service
        .list_liked_cards(&user.account)
        .await?;

    Ok(Json(cards))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<Card>)> {
    let card = state
        .service_context
        .listing_service
        .create_card(&user.account, req)
        .await?;

    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCardRequest>,
) -> Result<Json<Card>> {
    let card = state
        .service_context
        .listing_service
        .update_card(&user.account, id, req)
        .await?;

    Ok(Json(card))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .service_context
        .listing_service
        .delete_card(&user.account, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_featured(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Card>> {
    let card = state.service_context.listing_service.toggle_featured(id).await?;
    Ok(Json(card))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Review>>> {
    let reviews = state.service_context.listing_service.list_reviews(id).await?;
    Ok(Json(reviews))
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state
        .service_context
        .listing_service
        .create_review(&user.account, id, req)
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Review>> {
    let review = state
        .service_context
        .listing_service
        .update_review(&user.account, id, req)
        .await?;

    Ok(Json(review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .service_context
        .listing_service
        .delete_review(&user.account, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn like(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeState>> {
    let like_state = state
        .service_context
        .listing_service
        .toggle_like(&user.account, id)
        .await?;

    Ok(Json(like_state))
}

pub async fn view(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewResponse>> {
    let viewer = match user {
        Some(Extension(user)) => Viewer::Account(user.account.id),
        None => Viewer::Anonymous(client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr))),
    };

    let counted = state
        .service_context
        .listing_service
        .record_view(id, viewer)
        .await?;

    Ok(Json(ViewResponse { counted }))
}

/// First `X-Forwarded-For` hop when behind a proxy, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
