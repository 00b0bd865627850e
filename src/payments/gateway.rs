use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Subunits per currency unit. Ledger amounts are whole units; the provider
/// works in subunits.
pub const SUBUNITS_PER_UNIT: i64 = 100;

pub type GatewayResult<T> = std::result::Result<T, GatewayFailure>;

/// Why a provider call did not produce a usable reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayFailureKind {
    /// Rejected locally before anything was sent.
    InvalidRequest,
    /// No reply within the configured timeout. The remote outcome is unknown.
    Timeout,
    Connection,
    HttpStatus(u16),
    /// The provider answered with an `error` envelope.
    Provider,
    InvalidResponse,
}

/// Uniform failure value for every provider call. Network and decoding errors
/// are normalized into this type; nothing else escapes the client.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct GatewayFailure {
    pub kind: GatewayFailureKind,
    pub message: String,
    pub code: Option<String>,
}

impl GatewayFailure {
    pub fn new(kind: GatewayFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == GatewayFailureKind::Timeout
    }
}

/// Identifiers the provider assigned to a newly created transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteTransaction {
    pub transaction_id: String,
    pub receipt_id: Option<String>,
    pub pay_url: Option<String>,
}

/// Provider-side view of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteStatus {
    pub transaction_id: Option<String>,
    pub state: Option<i64>,
    pub create_time: Option<i64>,
    pub perform_time: Option<i64>,
    pub cancel_time: Option<i64>,
    pub reason: Option<i64>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelOutcome {
    pub transaction_id: Option<String>,
    pub state: Option<i64>,
    pub cancel_time: Option<i64>,
    pub raw: Value,
}

/// Outbound calls to the payment provider plus callback authentication.
///
/// Every network method is a single attempt bounded by the client timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in whole currency units; the provider receives subunits.
    async fn create_remote_transaction(
        &self,
        amount: i64,
        order_id: &str,
    ) -> GatewayResult<RemoteTransaction>;

    async fn query_remote_transaction(&self, transaction_id: &str) -> GatewayResult<RemoteStatus>;

    async fn cancel_remote_transaction(
        &self,
        transaction_id: &str,
        reason: i32,
    ) -> GatewayResult<CancelOutcome>;

    fn verify_webhook_signature(&self, raw_payload: &[u8], supplied_signature: &str) -> bool;
}
