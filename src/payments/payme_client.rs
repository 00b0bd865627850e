use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    config::PaymeConfig,
    error::{AppError, Result},
    payments::{
        gateway::{
            CancelOutcome, GatewayFailure, GatewayFailureKind, GatewayResult, PaymentGateway,
            RemoteStatus, RemoteTransaction, SUBUNITS_PER_UNIT,
        },
        signer::{canonical_json, RequestSigner},
    },
};

/// JSON-RPC client for the Payme merchant API.
pub struct PaymeClient {
    http: reqwest::Client,
    endpoint: String,
    signer: RequestSigner,
}

impl PaymeClient {
    pub fn new(config: &PaymeConfig) -> Result<Self> {
        let (Some(merchant_id), Some(secret_key)) =
            (config.merchant_id.clone(), config.secret_key.clone())
        else {
            return Err(AppError::Internal(
                "Payme merchant id and secret key are required".to_string(),
            ));
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            "Payme client initialized in {} mode",
            if config.test_mode { "TEST" } else { "PRODUCTION" }
        );

        Ok(Self {
            http,
            endpoint: format!("{}/api", config.api_base().trim_end_matches('/')),
            signer: RequestSigner::new(merchant_id, secret_key),
        })
    }

    /// Sends one signed RPC call and returns the `result` member of the reply.
    async fn call(&self, method: &str, params: Value) -> GatewayResult<Value> {
        let body = json!({ "method": method, "params": params });
        let canonical = canonical_json(&body);

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Auth", self.signer.auth_header(&body))
            .body(canonical)
            .send()
            .await
            .map_err(normalize_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayFailure::new(
                GatewayFailureKind::HttpStatus(status.as_u16()),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let reply: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                normalize_transport_error(e)
            } else {
                GatewayFailure::new(
                    GatewayFailureKind::InvalidResponse,
                    format!("Invalid JSON response: {}", e),
                )
            }
        })?;

        unwrap_envelope(reply)
    }
}

#[async_trait]
impl PaymentGateway for PaymeClient {
    async fn create_remote_transaction(
        &self,
        amount: i64,
        order_id: &str,
    ) -> GatewayResult<RemoteTransaction> {
        if amount <= 0 {
            return Err(GatewayFailure::new(
                GatewayFailureKind::InvalidRequest,
                "Amount must be greater than 0",
            ));
        }
        if order_id.trim().is_empty() {
            return Err(GatewayFailure::new(
                GatewayFailureKind::InvalidRequest,
                "Order ID is required",
            ));
        }
        let subunits = amount.checked_mul(SUBUNITS_PER_UNIT).ok_or_else(|| {
            GatewayFailure::new(GatewayFailureKind::InvalidRequest, "Amount is too large")
        })?;

        let params = json!({
            "id": Uuid::new_v4().to_string(),
            "time": Utc::now().timestamp_millis(),
            "amount": subunits,
            "account": { "order_id": order_id },
        });

        let result = self.call("CreateTransaction", params).await?;
        let transaction = parse_created_transaction(&result)?;

        tracing::info!(
            order_id,
            transaction_id = %transaction.transaction_id,
            "Remote transaction created"
        );
        Ok(transaction)
    }

    async fn query_remote_transaction(&self, transaction_id: &str) -> GatewayResult<RemoteStatus> {
        require_transaction_id(transaction_id)?;

        let result = self
            .call("CheckTransaction", json!({ "id": transaction_id }))
            .await?;

        Ok(RemoteStatus {
            transaction_id: string_field(&result, "transaction"),
            state: result.get("state").and_then(Value::as_i64),
            create_time: result.get("create_time").and_then(Value::as_i64),
            perform_time: result.get("perform_time").and_then(Value::as_i64),
            cancel_time: result.get("cancel_time").and_then(Value::as_i64),
            reason: result.get("reason").and_then(Value::as_i64),
            raw: result,
        })
    }

    async fn cancel_remote_transaction(
        &self,
        transaction_id: &str,
        reason: i32,
    ) -> GatewayResult<CancelOutcome> {
        require_transaction_id(transaction_id)?;

        let result = self
            .call(
                "CancelTransaction",
                json!({ "id": transaction_id, "reason": reason }),
            )
            .await?;

        Ok(CancelOutcome {
            transaction_id: string_field(&result, "transaction"),
            state: result.get("state").and_then(Value::as_i64),
            cancel_time: result.get("cancel_time").and_then(Value::as_i64),
            raw: result,
        })
    }

    fn verify_webhook_signature(&self, raw_payload: &[u8], supplied_signature: &str) -> bool {
        self.signer.verify_webhook(raw_payload, supplied_signature)
    }
}

fn require_transaction_id(transaction_id: &str) -> GatewayResult<()> {
    if transaction_id.trim().is_empty() {
        return Err(GatewayFailure::new(
            GatewayFailureKind::InvalidRequest,
            "Transaction ID is required",
        ));
    }
    Ok(())
}

fn normalize_transport_error(err: reqwest::Error) -> GatewayFailure {
    if err.is_timeout() {
        GatewayFailure::new(GatewayFailureKind::Timeout, "Request timeout")
    } else if err.is_connect() {
        GatewayFailure::new(GatewayFailureKind::Connection, "Connection error")
    } else {
        GatewayFailure::new(
            GatewayFailureKind::Connection,
            format!("Request failed: {}", err),
        )
    }
}

/// Splits a provider reply into its `result` or a provider failure.
pub(crate) fn unwrap_envelope(reply: Value) -> GatewayResult<Value> {
    if let Some(error) = reply.get("error").filter(|e| !e.is_null()) {
        let message = provider_message(error.get("message"));
        let mut failure = GatewayFailure::new(GatewayFailureKind::Provider, message);
        match error.get("code") {
            Some(Value::String(code)) => failure = failure.with_code(code.clone()),
            Some(Value::Number(code)) => failure = failure.with_code(code.to_string()),
            _ => {}
        }
        return Err(failure);
    }

    match reply.get("result") {
        Some(result) if !result.is_null() => Ok(result.clone()),
        _ => Err(GatewayFailure::new(
            GatewayFailureKind::InvalidResponse,
            "Reply carries neither result nor error",
        )),
    }
}

/// Provider messages are either plain strings or objects keyed by locale.
fn provider_message(message: Option<&Value>) -> String {
    match message {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(localized)) => localized
            .get("en")
            .or_else(|| localized.values().next())
            .and_then(Value::as_str)
            .unwrap_or("Unknown provider error")
            .to_string(),
        _ => "Unknown provider error".to_string(),
    }
}

pub(crate) fn parse_created_transaction(result: &Value) -> GatewayResult<RemoteTransaction> {
    let transaction = result.get("transaction");

    let transaction_id = match transaction {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Object(_)) => transaction.and_then(|t| string_field(t, "id")),
        _ => None,
    }
    .filter(|id| !id.is_empty())
    .ok_or_else(|| {
        GatewayFailure::new(
            GatewayFailureKind::InvalidResponse,
            "No transaction data received",
        )
    })?;

    let receipt_id = transaction
        .and_then(|t| string_field(t, "receipt_id").or_else(|| string_field(t, "cheque_id")))
        .or_else(|| string_field(result, "receipt_id"));
    let pay_url = transaction
        .and_then(|t| string_field(t, "pay_url"))
        .or_else(|| string_field(result, "pay_url"));

    Ok(RemoteTransaction {
        transaction_id,
        receipt_id,
        pay_url,
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
