//! In-process gateway with scripted replies, for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::payments::{
    gateway::{
        CancelOutcome, GatewayFailure, GatewayFailureKind, GatewayResult, PaymentGateway,
        RemoteStatus, RemoteTransaction,
    },
    signer::{canonical_json, RequestSigner},
};

/// A call the fake received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Create { amount: i64, order_id: String },
    Query { transaction_id: String },
    Cancel { transaction_id: String, reason: i32 },
}

/// Answers from a queue of scripted replies. With nothing queued, creates
/// succeed with a fresh transaction id and queries report a paid state.
pub struct FakePaymentGateway {
    signer: RequestSigner,
    create_replies: Mutex<VecDeque<GatewayResult<RemoteTransaction>>>,
    query_replies: Mutex<VecDeque<GatewayResult<RemoteStatus>>>,
    cancel_replies: Mutex<VecDeque<GatewayResult<CancelOutcome>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakePaymentGateway {
    pub fn new(merchant_id: &str, secret: &str) -> Self {
        Self {
            signer: RequestSigner::new(merchant_id, secret),
            create_replies: Mutex::new(VecDeque::new()),
            query_replies: Mutex::new(VecDeque::new()),
            cancel_replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    pub async fn push_create_reply(&self, reply: GatewayResult<RemoteTransaction>) {
        self.create_replies.lock().await.push_back(reply);
    }

    pub async fn push_query_reply(&self, reply: GatewayResult<RemoteStatus>) {
        self.query_replies.lock().await.push_back(reply);
    }

    pub async fn push_cancel_reply(&self, reply: GatewayResult<CancelOutcome>) {
        self.cancel_replies.lock().await.push_back(reply);
    }

    /// The next create gets a successful reply with this transaction id.
    pub async fn succeed_next_create(&self, transaction_id: &str) {
        self.push_create_reply(Ok(RemoteTransaction {
            transaction_id: transaction_id.to_string(),
            receipt_id: Some(format!("receipt-{}", transaction_id)),
            pay_url: Some(format!("https://checkout.test/{}", transaction_id)),
        }))
        .await;
    }

    pub async fn fail_next_create(&self, kind: GatewayFailureKind, message: &str, code: Option<&str>) {
        let mut failure = GatewayFailure::new(kind, message);
        if let Some(code) = code {
            failure = failure.with_code(code);
        }
        self.push_create_reply(Err(failure)).await;
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    /// Serializes `payload` the way the provider would send it and returns the
    /// body with a valid `X-Auth-Signature` value.
    pub fn signed_webhook(&self, payload: &Value) -> (Vec<u8>, String) {
        (canonical_json(payload).into_bytes(), self.signer.sign(payload))
    }

    async fn record(&self, call: GatewayCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_remote_transaction(
        &self,
        amount: i64,
        order_id: &str,
    ) -> GatewayResult<RemoteTransaction> {
        self.record(GatewayCall::Create {
            amount,
            order_id: order_id.to_string(),
        })
        .await;

        if amount <= 0 || order_id.is_empty() {
            return Err(GatewayFailure::new(
                GatewayFailureKind::InvalidRequest,
                "amount must be positive and order id non-empty",
            ));
        }

        if let Some(reply) = self.create_replies.lock().await.pop_front() {
            return reply;
        }

        let transaction_id = format!("fake-{}", uuid::Uuid::new_v4().simple());
        Ok(RemoteTransaction {
            pay_url: Some(format!("https://checkout.test/{}", transaction_id)),
            receipt_id: None,
            transaction_id,
        })
    }

    async fn query_remote_transaction(&self, transaction_id: &str) -> GatewayResult<RemoteStatus> {
        self.record(GatewayCall::Query {
            transaction_id: transaction_id.to_string(),
        })
        .await;

        if let Some(reply) = self.query_replies.lock().await.pop_front() {
            return reply;
        }

        let raw = json!({ "transaction": transaction_id, "state": 2 });
        Ok(RemoteStatus {
            transaction_id: Some(transaction_id.to_string()),
            state: Some(2),
            create_time: None,
            perform_time: None,
            cancel_time: None,
            reason: None,
            raw,
        })
    }

    async fn cancel_remote_transaction(
        &self,
        transaction_id: &str,
        reason: i32,
    ) -> GatewayResult<CancelOutcome> {
        self.record(GatewayCall::Cancel {
            transaction_id: transaction_id.to_string(),
            reason,
        })
        .await;

        if let Some(reply) = self.cancel_replies.lock().await.pop_front() {
            return reply;
        }

        Ok(CancelOutcome {
            transaction_id: Some(transaction_id.to_string()),
            state: Some(-1),
            cancel_time: None,
            raw: json!({ "transaction": transaction_id, "state": -1 }),
        })
    }

    fn verify_webhook_signature(&self, raw_payload: &[u8], supplied_signature: &str) -> bool {
        self.signer.verify_webhook(raw_payload, supplied_signature)
    }
}
