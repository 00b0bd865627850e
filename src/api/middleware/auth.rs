use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::Account,
    error::AppError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub account: Account,
}

/// Session token from the `session` cookie, or from `Authorization: Bearer`.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

async fn current_account(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Result<Account, AppError> {
    let token = session_token(jar, headers).ok_or(AppError::Unauthorized)?;

    state
        .service_context
        .auth_service
        .authenticate(&token)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = current_account(&state, &jar, request.headers()).await?;

    request.extensions_mut().insert(CurrentUser { account });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = current_account(&state, &jar, request.headers()).await?;

    if !account.is_admin() {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { account });

    Ok(next.run(request).await)
}

/// Attaches the caller when a valid session is presented; never rejects.
pub async fn optional_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(account) = current_account(&state, &jar, request.headers()).await {
        request.extensions_mut().insert(CurrentUser { account });
    }

    next.run(request).await
}
