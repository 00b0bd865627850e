use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    domain::{Account, SubscriptionState, Tariff, MAX_DURATION_DAYS},
    error::{AppError, Result},
    repository::{AccountRepository, TariffRepository},
};

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseEligibility {
    Allowed,
    Denied {
        reason: String,
        current_expires_at: DateTime<Utc>,
    },
}

impl PurchaseEligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PurchaseEligibility::Allowed)
    }
}

/// Upgrade rule: while a plan is active only a strictly more expensive plan
/// may be bought.
pub fn purchase_eligibility(
    current: Option<(&Tariff, DateTime<Utc>)>,
    target: &Tariff,
) -> PurchaseEligibility {
    match current {
        Some((plan, expires_at)) if target.price <= plan.price => PurchaseEligibility::Denied {
            reason: format!(
                "Your {} plan is active until {}. You can switch to {} after it expires.",
                plan.name,
                expires_at.format("%Y-%m-%d %H:%M UTC"),
                target.name
            ),
            current_expires_at: expires_at,
        },
        _ => PurchaseEligibility::Allowed,
    }
}

/// The state an account gets when `plan` starts at `from`. Durations outside
/// `1..=MAX_DURATION_DAYS` are refused instead of overflowing the clock.
pub fn activation_state(plan: &Tariff, from: DateTime<Utc>) -> Result<SubscriptionState> {
    if !(1..=MAX_DURATION_DAYS).contains(&plan.duration_days) {
        return Err(AppError::Validation(format!(
            "Tariff {} has an unusable duration of {} days",
            plan.name, plan.duration_days
        )));
    }

    let expires_at = from
        .checked_add_signed(Duration::days(plan.duration_days))
        .ok_or_else(|| AppError::Internal(format!("Expiry of tariff {} is out of range", plan.name)))?;

    Ok(SubscriptionState {
        plan_id: Some(plan.id),
        plan_expires_at: Some(expires_at),
    })
}

/// Applies plans to accounts and answers which plan an account is on.
pub struct SubscriptionService {
    accounts: Arc<dyn AccountRepository>,
    tariffs: Arc<dyn TariffRepository>,
}

impl SubscriptionService {
    pub fn new(accounts: Arc<dyn AccountRepository>, tariffs: Arc<dyn TariffRepository>) -> Self {
        Self { accounts, tariffs }
    }

    /// The account's unexpired plan with its expiry, if any.
    async fn current_plan(&self, account: &Account) -> Result<Option<(Tariff, DateTime<Utc>)>> {
        let now = Utc::now();
        let (Some(plan_id), Some(expires_at)) = (
            account.subscription.active_plan(now),
            account.subscription.plan_expires_at,
        ) else {
            return Ok(None);
        };

        // A deleted plan leaves the account effectively unsubscribed.
        Ok(self.tariffs.find_by_id(plan_id).await?.map(|t| (t, expires_at)))
    }

    pub async fn can_purchase(&self, account: &Account, target: &Tariff) -> Result<PurchaseEligibility> {
        let current = self.current_plan(account).await?;
        Ok(purchase_eligibility(
            current.as_ref().map(|(plan, expires)| (plan, *expires)),
            target,
        ))
    }

    /// Sets the plan and restarts its validity window from now. Eligibility
    /// is not rechecked here.
    pub async fn activate(&self, account_id: Uuid, plan: &Tariff) -> Result<SubscriptionState> {
        let state = activation_state(plan, Utc::now())?;

        let account = self.accounts.set_subscription(account_id, &state).await?;

        tracing::info!(
            account_id = %account_id,
            plan = %plan.name,
            "Subscription activated until {:?}",
            state.plan_expires_at
        );

        Ok(account.subscription)
    }

    /// The active plan, or the free plan once nothing is active.
    pub async fn effective_plan(&self, account: &Account) -> Result<Tariff> {
        if let Some((plan, _)) = self.current_plan(account).await? {
            return Ok(plan);
        }

        self.tariffs
            .find_free()
            .await?
            .ok_or_else(|| AppError::Internal("Free plan is not configured".to_string()))
    }
}
