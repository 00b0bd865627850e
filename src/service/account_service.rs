use std::sync::Arc;

use uuid::Uuid;

use crate::{
    domain::{Account, AccountPage, AccountRole},
    error::{AppError, Result},
    repository::{AccountRepository, TariffRepository},
    service::{listing_service::page_window, subscription_service::SubscriptionService},
};

/// Administrator operations on accounts.
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    tariffs: Arc<dyn TariffRepository>,
    subscriptions: Arc<SubscriptionService>,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        tariffs: Arc<dyn TariffRepository>,
        subscriptions: Arc<SubscriptionService>,
    ) -> Self {
        Self {
            accounts,
            tariffs,
            subscriptions,
        }
    }

    pub async fn list_accounts(&self, page: i64, per_page: i64) -> Result<AccountPage> {
        let (limit, offset) = page_window(page, per_page)?;
        let total = self.accounts.count().await?;
        let accounts = self.accounts.list(limit, offset).await?;

        Ok(AccountPage {
            total,
            page: page.max(1),
            per_page: limit,
            accounts,
        })
    }

    pub async fn get_account(&self, id: Uuid) -> Result<Account> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    /// An administrator cannot take away their own admin role.
    pub async fn set_role(&self, caller: &Account, id: Uuid, role: AccountRole) -> Result<Account> {
        let account = self.get_account(id).await?;

        if account.id == caller.id && role != AccountRole::Admin {
            return Err(AppError::BadRequest(
                "Administrators cannot remove their own admin role".to_string(),
            ));
        }

        if account.role == role {
            return Ok(account);
        }

        let updated = self.accounts.set_role(id, role).await?;
        tracing::info!(
            account_id = %id,
            changed_by = %caller.id,
            role = role.as_str(),
            "Account role changed"
        );
        Ok(updated)
    }

    /// Puts the account on `tariff_id` from now, without a payment. The
    /// upgrade rule does not apply to administrator assignments.
    pub async fn assign_tariff(&self, id: Uuid, tariff_id: Uuid) -> Result<Account> {
        self.get_account(id).await?;

        let tariff = self
            .tariffs
            .find_by_id(tariff_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tariff not found".to_string()))?;

        self.subscriptions.activate(id, &tariff).await?;
        tracing::info!(account_id = %id, tariff_id = %tariff_id, "Tariff assigned manually");

        self.get_account(id).await
    }
}
