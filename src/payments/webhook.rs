use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

pub const METHOD_RECEIPT_PAID: &str = "receipts.pay";
pub const METHOD_RECEIPT_CANCELLED: &str = "receipts.cancel";

/// A provider callback, decoded. Every variant must be handled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    PaymentSucceeded {
        transaction_id: String,
        receipt_id: Option<String>,
        /// Provider subunits, as sent.
        amount: Option<i64>,
        paid_at: Option<DateTime<Utc>>,
    },
    PaymentCancelled {
        transaction_id: String,
    },
    Unrecognized {
        method: String,
    },
    Malformed {
        reason: String,
    },
}

pub fn parse_webhook_event(raw_payload: &[u8]) -> WebhookEvent {
    let body: Value = match serde_json::from_slice(raw_payload) {
        Ok(body) => body,
        Err(e) => return malformed(format!("payload is not valid JSON: {}", e)),
    };

    if !body.is_object() {
        return malformed("payload must be a JSON object");
    }

    let method = match body.get("method") {
        Some(Value::String(method)) if !method.is_empty() => method.as_str(),
        _ => return malformed("method is required"),
    };

    let params = match body.get("params") {
        Some(Value::Object(params)) => params,
        None | Some(Value::Null) => {
            return match method {
                METHOD_RECEIPT_PAID | METHOD_RECEIPT_CANCELLED => malformed("params are required"),
                other => WebhookEvent::Unrecognized {
                    method: other.to_string(),
                },
            };
        }
        Some(_) => return malformed("params must be an object"),
    };

    match method {
        METHOD_RECEIPT_PAID => {
            let Some(transaction_id) = non_empty_string(params.get("id")) else {
                return malformed("params.id is required");
            };

            let amount = match params.get("amount") {
                None | Some(Value::Null) => None,
                Some(value) => match value.as_i64() {
                    Some(amount) if amount > 0 => Some(amount),
                    _ => return malformed("params.amount must be a positive integer"),
                },
            };

            let paid_at = match params.get("paid_at") {
                None | Some(Value::Null) => None,
                Some(value) => match parse_timestamp(value) {
                    Some(ts) => Some(ts),
                    None => return malformed("params.paid_at is not a valid timestamp"),
                },
            };

            WebhookEvent::PaymentSucceeded {
                transaction_id,
                receipt_id: non_empty_string(params.get("cheque_id"))
                    .or_else(|| non_empty_string(params.get("receipt_id"))),
                amount,
                paid_at,
            }
        }
        METHOD_RECEIPT_CANCELLED => match non_empty_string(params.get("id")) {
            Some(transaction_id) => WebhookEvent::PaymentCancelled { transaction_id },
            None => malformed("params.id is required"),
        },
        other => WebhookEvent::Unrecognized {
            method: other.to_string(),
        },
    }
}

fn malformed(reason: impl Into<String>) -> WebhookEvent {
    WebhookEvent::Malformed {
        reason: reason.into(),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Epoch milliseconds or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
