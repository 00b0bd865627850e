use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use axum_extra::extract::CookieJar;
use serde::Serialize;

use crate::{
    api::{
        middleware::auth::{session_token, CurrentUser},
        state::AppState,
    },
    auth::AuthService,
    domain::{Account, LoginRequest, RegisterAccountRequest, Tariff},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: Account,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: Account,
    /// Active plan, or the free plan once nothing is active.
    pub plan: Tariff,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<Account>)> {
    let account = state.service_context.auth_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let auth_service = &state.service_context.auth_service;
    let (account, token) = auth_service.login(req).await?;

    let secure = state.settings.server.base_url.starts_with("https://");
    let cookie = auth_service.create_session_cookie(&token, secure);

    Ok((jar.add(cookie), Json(LoginResponse { token, account })))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(token) = session_token(&jar, &headers) {
        state.service_context.auth_service.logout(&token).await?;
    }

    Ok((jar.add(AuthService::create_logout_cookie()), StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MeResponse>> {
    let plan = state
        .service_context
        .subscription_service
        .effective_plan(&user.account)
        .await?;

    Ok(Json(MeResponse {
        account: user.account,
        plan,
    }))
}
