use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{Account, PaymentStatus, PaymentTransaction, TransitionOutcome},
    error::{AppError, Result},
    payments::{
        gateway::{GatewayFailure, PaymentGateway, RemoteStatus, SUBUNITS_PER_UNIT},
        webhook::{parse_webhook_event, WebhookEvent},
    },
    repository::{AccountRepository, PaymentRepository, TariffRepository},
    service::{activation_state, subscription_service::SubscriptionService, PurchaseEligibility},
};

/// Error code recorded when the provider refuses a transaction without one.
pub const CREATE_FAILED_CODE: &str = "PAYME_CREATE_FAILED";
/// Provider cancel reason used when an administrator gives none.
pub const DEFAULT_CANCEL_REASON: i32 = 5;

/// Reply to a purchase request. A gateway refusal is a normal outcome, not an
/// error, so it is reported with `success: false`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub success: bool,
    pub payment_id: Option<Uuid>,
    pub transaction_id: Option<String>,
    pub pay_url: Option<String>,
    pub error: Option<String>,
}

impl PurchaseOutcome {
    fn failed(payment_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            success: false,
            payment_id: Some(payment_id),
            transaction_id: None,
            pay_url: None,
            error: Some(error.into()),
        }
    }
}

/// What a verified webhook did to local state.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookAck {
    Paid { payment_id: Uuid, subscription_activated: bool },
    Cancelled { payment_id: Uuid },
    /// Acknowledged with nothing written: unknown method or a conflicting
    /// terminal state.
    Ignored,
}

/// Drives a payment from purchase through provider callbacks. The ledger
/// owns status writes; this type only sequences them.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentRepository>,
    accounts: Arc<dyn AccountRepository>,
    tariffs: Arc<dyn TariffRepository>,
    subscriptions: Arc<SubscriptionService>,
}

impl PaymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentRepository>,
        accounts: Arc<dyn AccountRepository>,
        tariffs: Arc<dyn TariffRepository>,
        subscriptions: Arc<SubscriptionService>,
    ) -> Self {
        Self {
            gateway,
            payments,
            accounts,
            tariffs,
            subscriptions,
        }
    }

    pub async fn initiate_purchase(&self, account_id: Uuid, tariff_id: Uuid) -> Result<PurchaseOutcome> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let tariff = self
            .tariffs
            .find_by_id(tariff_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tariff not found".to_string()))?;

        if !tariff.is_active {
            return Err(AppError::Validation("Tariff is not available for purchase".to_string()));
        }
        if tariff.is_free() {
            return Err(AppError::Validation("The free plan cannot be purchased".to_string()));
        }

        if let PurchaseEligibility::Denied { reason, .. } =
            self.subscriptions.can_purchase(&account, &tariff).await?
        {
            tracing::debug!(account_id = %account.id, tariff_id = %tariff.id, "Purchase denied");
            return Err(AppError::BadRequest(reason));
        }

        let payment = self.payments.open(account.id, tariff.price, Some(tariff.id)).await?;

        let remote = match self
            .gateway
            .create_remote_transaction(payment.amount, &payment.id.to_string())
            .await
        {
            Ok(remote) => remote,
            Err(failure) if failure.is_timeout() => {
                // The provider may still have created it; a webhook or status
                // check settles the record later.
                tracing::warn!(payment_id = %payment.id, "Provider timed out, payment left pending");
                return Ok(PurchaseOutcome::failed(
                    payment.id,
                    "The payment provider did not respond in time. Your payment is pending confirmation.",
                ));
            }
            Err(failure) => {
                let code = failure.code.clone().unwrap_or_else(|| CREATE_FAILED_CODE.to_string());
                tracing::warn!(
                    payment_id = %payment.id,
                    code = %code,
                    "Provider refused transaction: {}",
                    failure.message
                );
                self.payments
                    .transition_to_failed(payment.id, Some(&code), Some(&failure.message))
                    .await?;
                return Ok(PurchaseOutcome::failed(payment.id, failure.message));
            }
        };

        if let Err(e) = self
            .payments
            .attach_external_ids(payment.id, &remote.transaction_id, remote.receipt_id.as_deref())
            .await
        {
            tracing::error!(
                payment_id = %payment.id,
                transaction_id = %remote.transaction_id,
                "Remote transaction created but not linked: {}",
                e
            );
            return Err(e);
        }

        tracing::info!(
            payment_id = %payment.id,
            transaction_id = %remote.transaction_id,
            "Purchase initiated"
        );

        Ok(PurchaseOutcome {
            success: true,
            payment_id: Some(payment.id),
            transaction_id: Some(remote.transaction_id),
            pay_url: remote.pay_url,
            error: None,
        })
    }

    /// Verifies and applies a provider callback.
    ///
    /// `webhook_received_at` is stamped for every verified event that names a
    /// known payment, including events ignored because the payment already
    /// settled. It records the last delivery, not the last applied change.
    pub async fn process_webhook(&self, raw_payload: &[u8], signature: Option<&str>) -> Result<WebhookAck> {
        let signature = signature.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            tracing::warn!("Webhook without signature rejected");
            AppError::InvalidSignature
        })?;

        if !self.gateway.verify_webhook_signature(raw_payload, signature) {
            tracing::warn!("Webhook with invalid signature rejected");
            return Err(AppError::InvalidSignature);
        }

        match parse_webhook_event(raw_payload) {
            WebhookEvent::PaymentSucceeded {
                transaction_id,
                receipt_id,
                amount,
                paid_at,
            } => {
                let payment = self.find_by_transaction_id(&transaction_id).await?;

                if let Some(amount) = amount {
                    if payment.amount.checked_mul(SUBUNITS_PER_UNIT) != Some(amount) {
                        tracing::warn!(
                            payment_id = %payment.id,
                            "Webhook amount {} does not match ledger amount {}",
                            amount,
                            payment.amount
                        );
                        return Err(AppError::BadRequest(
                            "Amount does not match the transaction".to_string(),
                        ));
                    }
                }

                let now = Utc::now();
                self.payments.record_webhook_received(payment.id, now).await?;

                let outcome = self
                    .payments
                    .transition_to_paid(payment.id, paid_at.unwrap_or(now), receipt_id.as_deref())
                    .await?;

                match outcome {
                    TransitionOutcome::Rejected(current) => {
                        tracing::warn!(
                            payment_id = %current.id,
                            status = current.status.as_str(),
                            "Payment webhook ignored, transaction already settled"
                        );
                        Ok(WebhookAck::Ignored)
                    }
                    TransitionOutcome::Applied(paid) | TransitionOutcome::AlreadyApplied(paid) => {
                        // A repeat still tries the claim so a failed activation gets another chance.
                        let subscription_activated = self.apply_subscription(&paid).await?;
                        Ok(WebhookAck::Paid {
                            payment_id: paid.id,
                            subscription_activated,
                        })
                    }
                }
            }
            WebhookEvent::PaymentCancelled { transaction_id } => {
                let payment = self.find_by_transaction_id(&transaction_id).await?;
                self.payments.record_webhook_received(payment.id, Utc::now()).await?;

                match self.payments.transition_to_cancelled(payment.id).await? {
                    TransitionOutcome::Rejected(current) => {
                        tracing::warn!(
                            payment_id = %current.id,
                            status = current.status.as_str(),
                            "Cancel webhook ignored, transaction already settled"
                        );
                        Ok(WebhookAck::Ignored)
                    }
                    outcome => Ok(WebhookAck::Cancelled {
                        payment_id: outcome.payment().id,
                    }),
                }
            }
            WebhookEvent::Unrecognized { method } => {
                tracing::debug!("Ignoring webhook method {}", method);
                Ok(WebhookAck::Ignored)
            }
            WebhookEvent::Malformed { reason } => {
                tracing::warn!("Malformed webhook: {}", reason);
                Err(AppError::BadRequest(reason))
            }
        }
    }

    /// Extends the owner's plan exactly once per paid transaction. Any failure
    /// leaves the payment unmarked, so the provider's redelivery retries it.
    async fn apply_subscription(&self, payment: &PaymentTransaction) -> Result<bool> {
        let Some(tariff_id) = payment.tariff_id else {
            return Ok(false);
        };

        if payment.subscription_applied_at.is_some() {
            tracing::debug!(payment_id = %payment.id, "Subscription already applied");
            return Ok(false);
        }

        let now = Utc::now();
        let applied = match self.tariffs.find_by_id(tariff_id).await {
            Ok(Some(tariff)) => match activation_state(&tariff, now) {
                Ok(state) => self.payments.apply_subscription(payment.id, &state, now).await,
                Err(e) => Err(e),
            },
            Ok(None) => Err(AppError::NotFound(format!("Tariff {} not found", tariff_id))),
            Err(e) => Err(e),
        };

        match applied {
            Ok(applied) => {
                if !applied {
                    tracing::debug!(payment_id = %payment.id, "Subscription applied by a concurrent delivery");
                }
                Ok(applied)
            }
            Err(e) => {
                tracing::error!(payment_id = %payment.id, "Subscription activation failed: {}", e);
                Err(AppError::Internal(format!(
                    "Subscription activation failed for payment {}",
                    payment.id
                )))
            }
        }
    }

    /// Provider view of a transaction. Only its owner or an administrator may ask.
    pub async fn check_status(&self, caller: &Account, transaction_id: &str) -> Result<RemoteStatus> {
        let payment = self.find_by_transaction_id(transaction_id).await?;
        if payment.owner_id != caller.id && !caller.is_admin() {
            return Err(AppError::Forbidden);
        }

        self.gateway
            .query_remote_transaction(transaction_id)
            .await
            .map_err(gateway_error)
    }

    pub async fn cancel(&self, transaction_id: &str, reason: i32) -> Result<PaymentTransaction> {
        let payment = self.find_by_transaction_id(transaction_id).await?;

        match payment.status {
            PaymentStatus::Cancelled => return Ok(payment),
            PaymentStatus::Paid | PaymentStatus::Failed => {
                return Err(AppError::Conflict(format!(
                    "Transaction is already {}",
                    payment.status.as_str().to_lowercase()
                )));
            }
            PaymentStatus::Pending => {}
        }

        self.gateway
            .cancel_remote_transaction(transaction_id, reason)
            .await
            .map_err(gateway_error)?;

        match self.payments.transition_to_cancelled(payment.id).await? {
            TransitionOutcome::Rejected(current) => Err(AppError::Conflict(format!(
                "Transaction is already {}",
                current.status.as_str().to_lowercase()
            ))),
            outcome => {
                tracing::info!(payment_id = %payment.id, reason, "Payment cancelled by administrator");
                Ok(outcome.payment().clone())
            }
        }
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<PaymentTransaction> {
        self.payments
            .find_by_external_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }
}

fn gateway_error(failure: GatewayFailure) -> AppError {
    if failure.is_timeout() {
        AppError::ServiceUnavailable(failure.message)
    } else {
        AppError::External(failure.message)
    }
}
