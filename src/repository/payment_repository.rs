use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{PaymentStatistics, PaymentStatus, PaymentTransaction, SubscriptionState, TransitionOutcome},
    error::{AppError, Result},
    repository::PaymentRepository,
};

const PAYMENT_COLUMNS: &str = r#"
    id, owner_id, tariff_id, amount, status,
    external_transaction_id, external_receipt_id,
    error_code, error_message,
    created_at, updated_at, paid_at, webhook_received_at, subscription_applied_at
"#;

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    owner_id: String,
    tariff_id: Option<String>,
    amount: i64,
    status: String,
    external_transaction_id: Option<String>,
    external_receipt_id: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    paid_at: Option<NaiveDateTime>,
    webhook_received_at: Option<NaiveDateTime>,
    subscription_applied_at: Option<NaiveDateTime>,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<PaymentTransaction> {
        Ok(PaymentTransaction {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            owner_id: Uuid::parse_str(&row.owner_id).map_err(|e| AppError::Database(e.to_string()))?,
            tariff_id: row
                .tariff_id
                .map(|id| Uuid::parse_str(&id))
                .transpose()
                .map_err(|e| AppError::Database(e.to_string()))?,
            amount: row.amount,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            external_transaction_id: row.external_transaction_id,
            external_receipt_id: row.external_receipt_id,
            error_code: row.error_code,
            error_message: row.error_message,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            webhook_received_at: row
                .webhook_received_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            subscription_applied_at: row
                .subscription_applied_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        })
    }

    async fn require(&self, id: Uuid) -> Result<PaymentTransaction> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    /// Interprets the row count of a conditional `... WHERE status = 'Pending'`
    /// update.
    async fn resolve_transition(
        &self,
        id: Uuid,
        target: PaymentStatus,
        rows_affected: u64,
    ) -> Result<TransitionOutcome> {
        let payment = self.require(id).await?;

        if rows_affected == 1 {
            tracing::info!(payment_id = %id, status = target.as_str(), "Payment transitioned");
            return Ok(TransitionOutcome::Applied(payment));
        }

        if payment.status == target {
            tracing::debug!(payment_id = %id, status = target.as_str(), "Payment already in requested state");
            Ok(TransitionOutcome::AlreadyApplied(payment))
        } else {
            tracing::warn!(
                payment_id = %id,
                current = payment.status.as_str(),
                requested = target.as_str(),
                "Payment transition rejected"
            );
            Ok(TransitionOutcome::Rejected(payment))
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn open(&self, owner_id: Uuid, amount: i64, tariff_id: Option<Uuid>) -> Result<PaymentTransaction> {
        if amount <= 0 {
            return Err(AppError::Validation("Amount must be greater than 0".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, owner_id, tariff_id, amount, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(tariff_id.map(|t| t.to_string()))
        .bind(amount)
        .bind(PaymentStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(payment_id = %id, owner_id = %owner_id, amount, "Payment opened");

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_external_transaction_id(&self, external_id: &str) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE external_transaction_id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<PaymentTransaction>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE owner_id = ? ORDER BY created_at DESC LIMIT ?",
            PAYMENT_COLUMNS
        ))
        .bind(owner_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn attach_external_ids(
        &self,
        id: Uuid,
        external_transaction_id: &str,
        external_receipt_id: Option<&str>,
    ) -> Result<PaymentTransaction> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET external_transaction_id = ?,
                external_receipt_id = COALESCE(?, external_receipt_id),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(external_transaction_id)
        .bind(external_receipt_id)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "External transaction {} is already linked to another payment",
                external_transaction_id
            )),
            _ => AppError::Database(e.to_string()),
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Payment not found".to_string()));
        }

        tracing::info!(payment_id = %id, external_transaction_id, "Attached external transaction");
        self.require(id).await
    }

    async fn transition_to_paid(
        &self,
        id: Uuid,
        paid_at: DateTime<Utc>,
        receipt_id: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                paid_at = ?,
                external_receipt_id = COALESCE(?, external_receipt_id),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(PaymentStatus::Paid.as_str())
        .bind(paid_at.naive_utc())
        .bind(receipt_id)
        .bind(now)
        .bind(id.to_string())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.resolve_transition(id, PaymentStatus::Paid, result.rows_affected()).await
    }

    async fn transition_to_failed(
        &self,
        id: Uuid,
        code: Option<&str>,
        message: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                error_code = ?,
                error_message = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(PaymentStatus::Failed.as_str())
        .bind(code)
        .bind(message)
        .bind(now)
        .bind(id.to_string())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.resolve_transition(id, PaymentStatus::Failed, result.rows_affected()).await
    }

    async fn transition_to_cancelled(&self, id: Uuid) -> Result<TransitionOutcome> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE payments SET status = ?, updated_at = ? WHERE id = ? AND status = ?"
        )
        .bind(PaymentStatus::Cancelled.as_str())
        .bind(now)
        .bind(id.to_string())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.resolve_transition(id, PaymentStatus::Cancelled, result.rows_affected()).await
    }

    async fn record_webhook_received(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payments SET webhook_received_at = ?, updated_at = ? WHERE id = ?"
        )
        .bind(at.naive_utc())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Payment not found".to_string()));
        }
        Ok(())
    }

    async fn apply_subscription(&self, id: Uuid, state: &SubscriptionState, at: DateTime<Utc>) -> Result<bool> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE payments
            SET subscription_applied_at = ?
            WHERE id = ? AND status = ? AND subscription_applied_at IS NULL
            "#
        )
        .bind(at.naive_utc())
        .bind(&id_str)
        .bind(PaymentStatus::Paid.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            return Ok(false);
        }

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET plan_id = ?, plan_expires_at = ?, updated_at = ?
            WHERE id = (SELECT owner_id FROM payments WHERE id = ?)
            "#
        )
        .bind(state.plan_id.map(|p| p.to_string()))
        .bind(state.plan_expires_at.map(|dt| dt.naive_utc()))
        .bind(Utc::now().naive_utc())
        .bind(&id_str)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Dropping the transaction rolls the claim back.
        if updated == 0 {
            return Err(AppError::NotFound("Payment owner not found".to_string()));
        }

        tx.commit().await?;

        tracing::info!(payment_id = %id, "Subscription applied");
        Ok(true)
    }

    async fn statistics(&self, owner_id: Option<Uuid>) -> Result<PaymentStatistics> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(amount), 0),
                COALESCE(SUM(CASE WHEN status = 'Paid' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'Failed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'Pending' THEN 1 ELSE 0 END), 0)
            FROM payments
            WHERE (?1 IS NULL OR owner_id = ?1)
            "#
        )
        .bind(owner_id.map(|id| id.to_string()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(PaymentStatistics::from_counts(row.0, row.1, row.2, row.3, row.4))
    }
}
