mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;
use wedy::{
    domain::{AccountRole, PaymentStatus, SubscriptionState, TransitionOutcome},
    error::AppError,
    repository::{
        AccountRepository, PaymentRepository, SqliteAccountRepository, SqlitePaymentRepository,
        SqliteTariffRepository, TariffRepository,
    },
};

use common::{create_account, tariff_request, test_pool};

#[tokio::test]
async fn test_open_creates_pending_record() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let accounts = SqliteAccountRepository::new(pool.clone());
    let ledger = SqlitePaymentRepository::new(pool.clone());
    let owner = create_account(&accounts, "owner", AccountRole::Client).await?;

    let payment = ledger.open(owner.id, 50_000, None).await?;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, 50_000);
    assert!(payment.external_transaction_id.is_none());

    assert!(matches!(
        ledger.open(owner.id, 0, None).await,
        Err(AppError::Validation(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_attach_external_ids_and_lookup() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let accounts = SqliteAccountRepository::new(pool.clone());
    let ledger = SqlitePaymentRepository::new(pool.clone());
    let owner = create_account(&accounts, "owner", AccountRole::Client).await?;

    let first = ledger.open(owner.id, 100, None).await?;
    let second = ledger.open(owner.id, 200, None).await?;

    let attached = ledger.attach_external_ids(first.id, "remote-1", Some("receipt-1")).await?;
    assert_eq!(attached.external_transaction_id.as_deref(), Some("remote-1"));
    assert_eq!(attached.external_receipt_id.as_deref(), Some("receipt-1"));

    let found = ledger.find_by_external_transaction_id("remote-1").await?;
    assert_eq!(found.map(|p| p.id), Some(first.id));
    assert!(ledger.find_by_external_transaction_id("remote-2").await?.is_none());

    // One external transaction never maps to two local payments
    assert!(matches!(
        ledger.attach_external_ids(second.id, "remote-1", None).await,
        Err(AppError::Conflict(_))
    ));

    assert!(matches!(
        ledger.attach_external_ids(Uuid::new_v4(), "remote-3", None).await,
        Err(AppError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_transition_to_paid_is_idempotent() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let accounts = SqliteAccountRepository::new(pool.clone());
    let ledger = SqlitePaymentRepository::new(pool.clone());
    let owner = create_account(&accounts, "owner", AccountRole::Client).await?;
    let payment = ledger.open(owner.id, 100, None).await?;

    let first_paid_at = Utc::now() - Duration::minutes(5);
    let first = ledger.transition_to_paid(payment.id, first_paid_at, Some("r-1")).await?;
    assert!(first.was_applied());
    assert_eq!(first.payment().status, PaymentStatus::Paid);

    let second = ledger
        .transition_to_paid(payment.id, Utc::now(), Some("r-2"))
        .await?;
    assert!(matches!(second, TransitionOutcome::AlreadyApplied(_)));

    // The repeat wrote nothing
    let stored = ledger.find_by_id(payment.id).await?.unwrap();
    assert_eq!(
        stored.paid_at.map(|t| t.timestamp()),
        Some(first_paid_at.timestamp())
    );
    assert_eq!(stored.external_receipt_id.as_deref(), Some("r-1"));

    Ok(())
}

#[tokio::test]
async fn test_terminal_states_are_mutually_exclusive() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let accounts = SqliteAccountRepository::new(pool.clone());
    let ledger = SqlitePaymentRepository::new(pool.clone());
    let owner = create_account(&accounts, "owner", AccountRole::Client).await?;

    let paid = ledger.open(owner.id, 100, None).await?;
    ledger.transition_to_paid(paid.id, Utc::now(), None).await?;

    let cancel = ledger.transition_to_cancelled(paid.id).await?;
    assert!(matches!(cancel, TransitionOutcome::Rejected(_)));
    assert_eq!(cancel.payment().status, PaymentStatus::Paid);

    let cancelled = ledger.open(owner.id, 100, None).await?;
    assert!(ledger.transition_to_cancelled(cancelled.id).await?.was_applied());
    let late_pay = ledger.transition_to_paid(cancelled.id, Utc::now(), None).await?;
    assert!(matches!(late_pay, TransitionOutcome::Rejected(_)));
    assert_eq!(
        ledger.find_by_id(cancelled.id).await?.unwrap().status,
        PaymentStatus::Cancelled
    );

    let failed = ledger.open(owner.id, 100, None).await?;
    let outcome = ledger
        .transition_to_failed(failed.id, Some("PAYME_CREATE_FAILED"), Some("refused"))
        .await?;
    assert!(outcome.was_applied());
    assert_eq!(outcome.payment().error_code.as_deref(), Some("PAYME_CREATE_FAILED"));
    assert!(matches!(
        ledger.transition_to_paid(failed.id, Utc::now(), None).await?,
        TransitionOutcome::Rejected(_)
    ));

    assert!(matches!(
        ledger.transition_to_paid(Uuid::new_v4(), Utc::now(), None).await,
        Err(AppError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_subscription_is_applied_once_with_the_account() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let accounts = SqliteAccountRepository::new(pool.clone());
    let ledger = SqlitePaymentRepository::new(pool.clone());
    let owner = create_account(&accounts, "owner", AccountRole::Client).await?;
    let tariffs = SqliteTariffRepository::new(pool.clone());
    let basic = tariffs.create(tariff_request("Basic", 50_000, 30)).await?;
    let premium = tariffs.create(tariff_request("Premium", 100_000, 60)).await?;
    let payment = ledger.open(owner.id, 50_000, Some(basic.id)).await?;

    let first = SubscriptionState {
        plan_id: Some(basic.id),
        plan_expires_at: Some(Utc::now() + Duration::days(30)),
    };

    // Only paid transactions can be applied
    assert!(!ledger.apply_subscription(payment.id, &first, Utc::now()).await?);
    let untouched = accounts.find_by_id(owner.id).await?.unwrap();
    assert_eq!(untouched.subscription, SubscriptionState::default());

    ledger.transition_to_paid(payment.id, Utc::now(), None).await?;
    assert!(ledger.apply_subscription(payment.id, &first, Utc::now()).await?);

    let stored = ledger.find_by_id(payment.id).await?.unwrap();
    assert!(stored.subscription_applied_at.is_some());
    let account = accounts.find_by_id(owner.id).await?.unwrap();
    assert_eq!(account.subscription.plan_id, first.plan_id);

    // A second application writes nothing
    let second = SubscriptionState {
        plan_id: Some(premium.id),
        plan_expires_at: Some(Utc::now() + Duration::days(60)),
    };
    assert!(!ledger.apply_subscription(payment.id, &second, Utc::now()).await?);
    let account = accounts.find_by_id(owner.id).await?.unwrap();
    assert_eq!(account.subscription.plan_id, first.plan_id);

    Ok(())
}

#[tokio::test]
async fn test_statistics() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let accounts = SqliteAccountRepository::new(pool.clone());
    let ledger = SqlitePaymentRepository::new(pool.clone());
    let alice = create_account(&accounts, "alice", AccountRole::Client).await?;
    let bob = create_account(&accounts, "bob", AccountRole::Client).await?;

    let empty = ledger.statistics(None).await?;
    assert_eq!(empty.count, 0);
    assert_eq!(empty.success_rate, 0.0);

    let a1 = ledger.open(alice.id, 100, None).await?;
    let a2 = ledger.open(alice.id, 300, None).await?;
    ledger.open(alice.id, 500, None).await?;
    let b1 = ledger.open(bob.id, 1_000, None).await?;

    ledger.transition_to_paid(a1.id, Utc::now(), None).await?;
    ledger.transition_to_failed(a2.id, None, None).await?;
    ledger.transition_to_paid(b1.id, Utc::now(), None).await?;

    let all = ledger.statistics(None).await?;
    assert_eq!(all.count, 4);
    assert_eq!(all.total_amount, 1_900);
    assert_eq!(all.paid_count, 2);
    assert_eq!(all.failed_count, 1);
    assert_eq!(all.pending_count, 1);
    assert_eq!(all.success_rate, 50.0);

    let alice_only = ledger.statistics(Some(alice.id)).await?;
    assert_eq!(alice_only.count, 3);
    assert_eq!(alice_only.total_amount, 900);
    assert_eq!(alice_only.paid_count, 1);

    let listed = ledger.list_by_owner(alice.id, 10).await?;
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|p| p.owner_id == alice.id));

    Ok(())
}
