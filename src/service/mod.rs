pub mod subscription_service;
pub mod tariff_service;
pub mod listing_service;
pub mod account_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use crate::config::Settings;
use subscription_service::SubscriptionService;
use tariff_service::TariffService;
use listing_service::ListingService;
use account_service::AccountService;

pub use subscription_service::{activation_state, PurchaseEligibility};
pub use listing_service::Viewer;

pub struct ServiceContext {
    pub account_repo: Arc<dyn AccountRepository>,
    pub tariff_repo: Arc<dyn TariffRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub tariff_service: Arc<TariffService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub listing_service: Arc<ListingService>,
    pub account_service: Arc<AccountService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(db_pool: SqlitePool, settings: &Settings) -> Self {
        let account_repo: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(db_pool.clone()));
        let tariff_repo: Arc<dyn TariffRepository> =
            Arc::new(SqliteTariffRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let category_repo = Arc::new(SqliteCategoryRepository::new(db_pool.clone()));
        let card_repo = Arc::new(SqliteCardRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            account_repo.clone(),
            settings.auth.session_duration_hours,
        ));
        let tariff_service = Arc::new(TariffService::new(tariff_repo.clone()));
        let subscription_service = Arc::new(SubscriptionService::new(
            account_repo.clone(),
            tariff_repo.clone(),
        ));
        let listing_service = Arc::new(ListingService::new(
            category_repo,
            card_repo,
            subscription_service.clone(),
        ));
        let account_service = Arc::new(AccountService::new(
            account_repo.clone(),
            tariff_repo.clone(),
            subscription_service.clone(),
        ));

        Self {
            account_repo,
            tariff_repo,
            payment_repo,
            auth_service,
            tariff_service,
            subscription_service,
            listing_service,
            account_service,
            db_pool,
        }
    }
}
