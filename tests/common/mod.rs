#![allow(dead_code)]

use std::sync::Arc;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use wedy::{
    config::{Settings, SubscriptionConfig},
    domain::{Account, AccountRole, CreateTariffRequest, NewAccount, Tariff},
    payments::{fake::FakePaymentGateway, PaymentOrchestrator},
    repository::AccountRepository,
    service::ServiceContext,
};

pub const MERCHANT_ID: &str = "merchant-test";
pub const SECRET: &str = "test-secret";

/// One connection so every query sees the same in-memory database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn test_context() -> anyhow::Result<Arc<ServiceContext>> {
    let pool = test_pool().await?;
    let ctx = Arc::new(ServiceContext::new(pool, &Settings::default()));
    ctx.tariff_service
        .ensure_free_plan(&SubscriptionConfig::default())
        .await?;
    Ok(ctx)
}

pub fn orchestrator(ctx: &ServiceContext, gateway: Arc<FakePaymentGateway>) -> PaymentOrchestrator {
    PaymentOrchestrator::new(
        gateway,
        ctx.payment_repo.clone(),
        ctx.account_repo.clone(),
        ctx.tariff_repo.clone(),
        ctx.subscription_service.clone(),
    )
}

pub fn fake_gateway() -> Arc<FakePaymentGateway> {
    Arc::new(FakePaymentGateway::new(MERCHANT_ID, SECRET))
}

pub async fn create_account(
    accounts: &dyn AccountRepository,
    login: &str,
    role: AccountRole,
) -> anyhow::Result<Account> {
    Ok(accounts
        .create(NewAccount {
            login: login.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
        })
        .await?)
}

pub fn tariff_request(name: &str, price: i64, duration_days: i64) -> CreateTariffRequest {
    CreateTariffRequest {
        name: name.to_string(),
        description: None,
        price,
        duration_days,
        search_priority: 0,
        has_website: false,
        max_social_links: 2,
        max_description_chars: 2000,
        max_phone_numbers: 3,
        max_images: 10,
    }
}

pub async fn create_tariff(ctx: &ServiceContext, name: &str, price: i64, duration_days: i64) -> anyhow::Result<Tariff> {
    Ok(ctx
        .tariff_service
        .create(tariff_request(name, price, duration_days))
        .await?)
}
