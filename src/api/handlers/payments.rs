use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{PaymentStatistics, PaymentTransaction},
    error::{AppError, Result},
    payments::{gateway::RemoteStatus, orchestrator::DEFAULT_CANCEL_REASON, PurchaseOutcome},
};

pub const SIGNATURE_HEADER: &str = "x-auth-signature";
const MY_PAYMENTS_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub tariff_id: Uuid,
    /// Defaults to the caller. Only administrators may buy for someone else.
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub payment: PaymentTransaction,
}

pub async fn purchase(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseOutcome>> {
    let account_id = req.account_id.unwrap_or(user.account.id);
    if account_id != user.account.id && !user.account.is_admin() {
        return Err(AppError::Forbidden);
    }

    let outcome = state
        .orchestrator()?
        .initiate_purchase(account_id, req.tariff_id)
        .await?;

    Ok(Json(outcome))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<PaymentTransaction>>> {
    let payments = state
        .service_context
        .payment_repo
        .list_by_owner(user.account.id, MY_PAYMENTS_LIMIT)
        .await?;

    Ok(Json(payments))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(transaction_id): Path<String>,
) -> Result<Json<RemoteStatus>> {
    let status = state
        .orchestrator()?
        .check_status(&user.account, &transaction_id)
        .await?;

    Ok(Json(status))
}

/// Provider callback. The raw body is kept as received so the signature is
/// checked over exactly what was signed.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = state.orchestrator()?.process_webhook(&body, signature).await?;
    tracing::debug!("Webhook processed: {:?}", ack);

    Ok(Json(json!({ "result": "ok" })))
}

pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<PaymentStatistics>> {
    let stats = state
        .service_context
        .payment_repo
        .statistics(query.owner_id)
        .await?;

    Ok(Json(stats))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<CancelResponse>> {
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or(DEFAULT_CANCEL_REASON);

    let payment = state.orchestrator()?.cancel(&transaction_id, reason).await?;

    Ok(Json(CancelResponse {
        success: true,
        payment,
    }))
}
