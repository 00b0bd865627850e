use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local payment attempt. Its `id` is the order id sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tariff_id: Option<Uuid>,
    pub amount: i64,
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub external_receipt_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub webhook_received_at: Option<DateTime<Utc>>,
    pub subscription_applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Paid" => Some(PaymentStatus::Paid),
            "Failed" => Some(PaymentStatus::Failed),
            "Cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Result of a guarded status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The row moved out of PENDING by this call.
    Applied(PaymentTransaction),
    /// The row was already in the requested state; nothing was written.
    AlreadyApplied(PaymentTransaction),
    /// The row sits in a different terminal state and was left untouched.
    Rejected(PaymentTransaction),
}

impl TransitionOutcome {
    pub fn payment(&self) -> &PaymentTransaction {
        match self {
            TransitionOutcome::Applied(p)
            | TransitionOutcome::AlreadyApplied(p)
            | TransitionOutcome::Rejected(p) => p,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentStatistics {
    pub count: i64,
    pub total_amount: i64,
    pub paid_count: i64,
    pub failed_count: i64,
    pub pending_count: i64,
    /// Percentage of payments that reached PAID, 0 when there are none.
    pub success_rate: f64,
}

impl PaymentStatistics {
    pub fn from_counts(
        count: i64,
        total_amount: i64,
        paid_count: i64,
        failed_count: i64,
        pending_count: i64,
    ) -> Self {
        let success_rate = if count > 0 {
            paid_count as f64 / count as f64 * 100.0
        } else {
            0.0
        };

        Self {
            count,
            total_amount,
            paid_count,
            failed_count,
            pending_count,
            success_rate,
        }
    }
}
