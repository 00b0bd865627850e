mod common;

use axum::{http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use serde_json::json;
use wedy::{
    domain::{AccountRole, PaymentStatus, SubscriptionState, UpdateTariffRequest},
    error::AppError,
    payments::{fake::GatewayCall, GatewayFailureKind, WebhookAck},
};

use common::{create_account, create_tariff, fake_gateway, orchestrator, tariff_request, test_context};

fn paid_webhook(transaction_id: &str, amount_subunits: i64) -> serde_json::Value {
    json!({
        "method": "receipts.pay",
        "params": {
            "id": transaction_id,
            "cheque_id": format!("cheque-{}", transaction_id),
            "amount": amount_subunits,
            "paid_at": Utc::now().timestamp_millis(),
        }
    })
}

#[tokio::test]
async fn test_purchase_then_paid_webhook_activates_plan() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());

    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-a").await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;
    assert!(outcome.success);
    assert_eq!(outcome.transaction_id.as_deref(), Some("remote-a"));
    assert!(outcome.pay_url.is_some());

    let payment_id = outcome.payment_id.unwrap();
    let pending = ctx.payment_repo.find_by_id(payment_id).await?.unwrap();
    assert_eq!(pending.status, PaymentStatus::Pending);
    assert_eq!(pending.external_transaction_id.as_deref(), Some("remote-a"));

    // The provider is asked for subunits, keyed by the local payment id
    assert_eq!(
        gateway.calls().await,
        vec![GatewayCall::Create {
            amount: 50_000,
            order_id: payment_id.to_string(),
        }]
    );

    let (body, signature) = gateway.signed_webhook(&paid_webhook("remote-a", 5_000_000));
    let ack = orchestrator.process_webhook(&body, Some(&signature)).await?;
    assert_eq!(
        ack,
        WebhookAck::Paid {
            payment_id,
            subscription_activated: true,
        }
    );

    let paid = ctx.payment_repo.find_by_id(payment_id).await?.unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert!(paid.webhook_received_at.is_some());
    assert!(paid.subscription_applied_at.is_some());

    let account = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert_eq!(account.subscription.plan_id, Some(tariff.id));
    let expires = account.subscription.plan_expires_at.unwrap();
    let expected = Utc::now() + Duration::days(30);
    assert!((expires - expected).num_seconds().abs() < 60);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_webhook_extends_expiry_once() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());

    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-dup").await;
    orchestrator.initiate_purchase(account.id, tariff.id).await?;

    let (body, signature) = gateway.signed_webhook(&paid_webhook("remote-dup", 5_000_000));
    orchestrator.process_webhook(&body, Some(&signature)).await?;
    let after_first = ctx.account_repo.find_by_id(account.id).await?.unwrap();

    let ack = orchestrator.process_webhook(&body, Some(&signature)).await?;
    assert!(matches!(
        ack,
        WebhookAck::Paid {
            subscription_activated: false,
            ..
        }
    ));

    let after_second = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert_eq!(
        after_first.subscription.plan_expires_at,
        after_second.subscription.plan_expires_at
    );

    Ok(())
}

#[tokio::test]
async fn test_downgrade_while_active_is_denied_without_ledger_row() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());

    let cheap = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let premium = create_tariff(&ctx, "Premium", 100_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    let expires = Utc::now() + Duration::days(10);
    ctx.account_repo
        .set_subscription(
            account.id,
            &SubscriptionState {
                plan_id: Some(premium.id),
                plan_expires_at: Some(expires),
            },
        )
        .await?;

    let result = orchestrator.initiate_purchase(account.id, cheap.id).await;
    match result {
        Err(AppError::BadRequest(reason)) => assert!(reason.contains(&expires.format("%Y-%m-%d").to_string())),
        other => panic!("expected denial, got {:?}", other),
    }

    assert_eq!(ctx.payment_repo.statistics(Some(account.id)).await?.count, 0);
    assert!(gateway.calls().await.is_empty());

    // Once the plan lapses the cheaper plan is allowed
    ctx.account_repo
        .set_subscription(
            account.id,
            &SubscriptionState {
                plan_id: Some(premium.id),
                plan_expires_at: Some(Utc::now() - Duration::days(1)),
            },
        )
        .await?;
    let outcome = orchestrator.initiate_purchase(account.id, cheap.id).await?;
    assert!(outcome.success);

    Ok(())
}

#[tokio::test]
async fn test_inactive_free_and_missing_tariffs_are_rejected() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    let retired = create_tariff(&ctx, "Retired", 10_000, 30).await?;
    ctx.tariff_service
        .update(
            retired.id,
            wedy::domain::UpdateTariffRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;
    assert!(matches!(
        orchestrator.initiate_purchase(account.id, retired.id).await,
        Err(AppError::Validation(_))
    ));

    let free = ctx.tariff_repo.find_free().await?.unwrap();
    assert!(matches!(
        orchestrator.initiate_purchase(account.id, free.id).await,
        Err(AppError::Validation(_))
    ));

    assert!(matches!(
        orchestrator.initiate_purchase(account.id, uuid::Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));

    assert_eq!(ctx.payment_repo.statistics(None).await?.count, 0);
    Ok(())
}

#[tokio::test]
async fn test_gateway_refusal_marks_payment_failed() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway
        .fail_next_create(GatewayFailureKind::Provider, "Merchant is blocked", Some("-31001"))
        .await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Merchant is blocked"));

    let payment = ctx.payment_repo.find_by_id(outcome.payment_id.unwrap()).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.error_code.as_deref(), Some("-31001"));

    gateway
        .fail_next_create(GatewayFailureKind::HttpStatus(502), "HTTP 502", None)
        .await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;
    let payment = ctx.payment_repo.find_by_id(outcome.payment_id.unwrap()).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.error_code.as_deref(), Some("PAYME_CREATE_FAILED"));

    Ok(())
}

#[tokio::test]
async fn test_gateway_timeout_leaves_payment_pending() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway
        .fail_next_create(GatewayFailureKind::Timeout, "Request timeout", None)
        .await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;
    assert!(!outcome.success);

    let payment = ctx.payment_repo.find_by_id(outcome.payment_id.unwrap()).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.error_code.is_none());

    Ok(())
}

#[tokio::test]
async fn test_unknown_transaction_mutates_nothing() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-known").await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;

    let (body, signature) = gateway.signed_webhook(&paid_webhook("remote-unknown", 5_000_000));
    assert!(matches!(
        orchestrator.process_webhook(&body, Some(&signature)).await,
        Err(AppError::NotFound(_))
    ));

    let payment = ctx.payment_repo.find_by_id(outcome.payment_id.unwrap()).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.webhook_received_at.is_none());
    let account = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert!(account.subscription.plan_id.is_none());

    Ok(())
}

#[tokio::test]
async fn test_bad_or_missing_signature_is_rejected() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-sig").await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;

    let (body, _) = gateway.signed_webhook(&paid_webhook("remote-sig", 5_000_000));
    let forged = wedy::payments::RequestSigner::new("merchant-test", "wrong-secret")
        .sign(&serde_json::from_slice(&body)?);

    for signature in [None, Some(""), Some(forged.as_str())] {
        assert!(matches!(
            orchestrator.process_webhook(&body, signature).await,
            Err(AppError::InvalidSignature)
        ));
    }

    let payment = ctx.payment_repo.find_by_id(outcome.payment_id.unwrap()).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.webhook_received_at.is_none());

    Ok(())
}

#[tokio::test]
async fn test_amount_mismatch_is_rejected() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-amt").await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;

    // Whole units instead of subunits
    let (body, signature) = gateway.signed_webhook(&paid_webhook("remote-amt", 50_000));
    assert!(matches!(
        orchestrator.process_webhook(&body, Some(&signature)).await,
        Err(AppError::BadRequest(_))
    ));

    let payment = ctx.payment_repo.find_by_id(outcome.payment_id.unwrap()).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_cancel_after_pay_is_ignored_and_unknown_methods_acknowledged() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-order").await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;
    let payment_id = outcome.payment_id.unwrap();

    let (paid, paid_sig) = gateway.signed_webhook(&paid_webhook("remote-order", 5_000_000));
    orchestrator.process_webhook(&paid, Some(&paid_sig)).await?;
    let first_delivery = ctx
        .payment_repo
        .find_by_id(payment_id)
        .await?
        .unwrap()
        .webhook_received_at
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (cancel, cancel_sig) = gateway.signed_webhook(&json!({
        "method": "receipts.cancel",
        "params": { "id": "remote-order" }
    }));
    assert_eq!(
        orchestrator.process_webhook(&cancel, Some(&cancel_sig)).await?,
        WebhookAck::Ignored
    );

    // Status is untouched, but the ignored delivery is still recorded
    let settled = ctx.payment_repo.find_by_id(payment_id).await?.unwrap();
    assert_eq!(settled.status, PaymentStatus::Paid);
    assert!(settled.webhook_received_at.unwrap() > first_delivery);

    let (unknown, unknown_sig) = gateway.signed_webhook(&json!({
        "method": "receipts.refund_requested",
        "params": { "id": "remote-order" }
    }));
    assert_eq!(
        orchestrator.process_webhook(&unknown, Some(&unknown_sig)).await?,
        WebhookAck::Ignored
    );

    let (malformed, malformed_sig) = gateway.signed_webhook(&json!({
        "method": "receipts.pay",
        "params": { "amount": 100 }
    }));
    assert!(matches!(
        orchestrator.process_webhook(&malformed, Some(&malformed_sig)).await,
        Err(AppError::BadRequest(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_cancel_webhook_settles_pending_payment() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-c").await;
    let outcome = orchestrator.initiate_purchase(account.id, tariff.id).await?;
    let payment_id = outcome.payment_id.unwrap();

    let (cancel, sig) = gateway.signed_webhook(&json!({
        "method": "receipts.cancel",
        "params": { "id": "remote-c" }
    }));
    assert_eq!(
        orchestrator.process_webhook(&cancel, Some(&sig)).await?,
        WebhookAck::Cancelled { payment_id }
    );

    // A late pay for a cancelled payment never activates anything
    let (paid, paid_sig) = gateway.signed_webhook(&paid_webhook("remote-c", 5_000_000));
    assert_eq!(
        orchestrator.process_webhook(&paid, Some(&paid_sig)).await?,
        WebhookAck::Ignored
    );
    let account = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert!(account.subscription.plan_id.is_none());

    Ok(())
}

#[tokio::test]
async fn test_check_status_and_privileged_cancel() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let owner = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;
    let stranger = create_account(ctx.account_repo.as_ref(), "stranger", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-s").await;
    let outcome = orchestrator.initiate_purchase(owner.id, tariff.id).await?;
    let payment_id = outcome.payment_id.unwrap();

    let status = orchestrator.check_status(&owner, "remote-s").await?;
    assert_eq!(status.transaction_id.as_deref(), Some("remote-s"));
    assert!(matches!(
        orchestrator.check_status(&stranger, "remote-s").await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        orchestrator.check_status(&owner, "remote-missing").await,
        Err(AppError::NotFound(_))
    ));

    let cancelled = orchestrator.cancel("remote-s", 5).await?;
    assert_eq!(cancelled.id, payment_id);
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
    assert!(gateway.calls().await.contains(&GatewayCall::Cancel {
        transaction_id: "remote-s".to_string(),
        reason: 5,
    }));

    // Paid transactions cannot be cancelled through this path
    gateway.succeed_next_create("remote-p").await;
    orchestrator.initiate_purchase(owner.id, tariff.id).await?;
    let (paid, sig) = gateway.signed_webhook(&paid_webhook("remote-p", 5_000_000));
    orchestrator.process_webhook(&paid, Some(&sig)).await?;
    assert!(matches!(
        orchestrator.cancel("remote-p", 5).await,
        Err(AppError::Conflict(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_failed_activation_is_retried_on_redelivery() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let orchestrator = orchestrator(&ctx, gateway.clone());

    // Written straight to storage, as rows from before the duration bound were
    let tariff = ctx
        .tariff_repo
        .create(tariff_request("Legacy", 50_000, 1_000_000_000))
        .await?;
    let account = create_account(ctx.account_repo.as_ref(), "buyer", AccountRole::Client).await?;

    gateway.succeed_next_create("remote-retry").await;
    let payment_id = orchestrator
        .initiate_purchase(account.id, tariff.id)
        .await?
        .payment_id
        .unwrap();

    let (body, signature) = gateway.signed_webhook(&paid_webhook("remote-retry", 5_000_000));
    let err = orchestrator
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Paid, but the subscription is not marked so the next delivery retries
    let paid = ctx.payment_repo.find_by_id(payment_id).await?.unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert!(paid.subscription_applied_at.is_none());
    let unchanged = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert_eq!(unchanged.subscription, SubscriptionState::default());

    ctx.tariff_service
        .update(
            tariff.id,
            UpdateTariffRequest {
                duration_days: Some(30),
                ..Default::default()
            },
        )
        .await?;

    let ack = orchestrator.process_webhook(&body, Some(&signature)).await?;
    assert_eq!(
        ack,
        WebhookAck::Paid {
            payment_id,
            subscription_activated: true,
        }
    );

    let activated = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert_eq!(activated.subscription.plan_id, Some(tariff.id));
    let expires = activated.subscription.plan_expires_at.unwrap();
    assert!(((Utc::now() + Duration::days(30)) - expires).num_seconds().abs() < 60);

    // Later deliveries leave the expiry where the retry put it
    let ack = orchestrator.process_webhook(&body, Some(&signature)).await?;
    assert!(matches!(
        ack,
        WebhookAck::Paid {
            subscription_activated: false,
            ..
        }
    ));
    let after = ctx.account_repo.find_by_id(account.id).await?.unwrap();
    assert_eq!(after.subscription.plan_expires_at, Some(expires));

    Ok(())
}
