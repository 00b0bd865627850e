mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wedy::{
    api::create_app,
    config::Settings,
    domain::AccountRole,
    payments::fake::FakePaymentGateway,
    service::ServiceContext,
};

use common::{create_account, create_tariff, fake_gateway, orchestrator, test_context};

struct TestApp {
    router: Router,
    ctx: Arc<ServiceContext>,
    gateway: Arc<FakePaymentGateway>,
}

async fn test_app() -> anyhow::Result<TestApp> {
    let ctx = test_context().await?;
    let gateway = fake_gateway();
    let payments = Arc::new(orchestrator(&ctx, gateway.clone()));
    let router = create_app(ctx.clone(), Some(payments), Arc::new(Settings::default()));
    Ok(TestApp { router, ctx, gateway })
}

async fn bearer_for(ctx: &ServiceContext, login: &str, role: AccountRole) -> anyhow::Result<String> {
    let account = create_account(ctx.account_repo.as_ref(), login, role).await?;
    let (_, token) = ctx.auth_service.create_session(account.id).await?;
    Ok(format!("Bearer {}", token))
}

async fn send(router: &Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn json_request(method: Method, uri: &str, auth: Option<&str>, body: &Value) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    Ok(builder.body(Body::from(serde_json::to_vec(body)?))?)
}

fn webhook_request(body: Vec<u8>, signature: Option<&str>) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("X-Auth-Signature", signature);
    }
    Ok(builder.body(Body::from(body))?)
}

#[tokio::test]
async fn test_health() -> anyhow::Result<()> {
    let app = test_app().await?;
    let request = Request::builder().uri("/health").body(Body::empty())?;

    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    Ok(())
}

#[tokio::test]
async fn test_purchase_requires_session() -> anyhow::Result<()> {
    let app = test_app().await?;
    let tariff = create_tariff(&app.ctx, "Basic", 50_000, 30).await?;

    let request = json_request(
        Method::POST,
        "/api/payments/purchase",
        None,
        &json!({ "tariffId": tariff.id }),
    )?;
    let (status, _) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_purchase_and_signed_webhook_activate_plan() -> anyhow::Result<()> {
    let app = test_app().await?;
    let tariff = create_tariff(&app.ctx, "Basic", 50_000, 30).await?;
    let auth = bearer_for(&app.ctx, "buyer", AccountRole::Client).await?;

    app.gateway.succeed_next_create("remote-api").await;
    let request = json_request(
        Method::POST,
        "/api/payments/purchase",
        Some(&auth),
        &json!({ "tariffId": tariff.id }),
    )?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transactionId"], "remote-api");

    let (payload, signature) = app.gateway.signed_webhook(&json!({
        "method": "receipts.pay",
        "params": { "id": "remote-api", "amount": 5_000_000 }
    }));
    let (status, body) = send(&app.router, webhook_request(payload, Some(&signature))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "result": "ok" }));

    let request = Request::builder()
        .uri("/api/me")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::empty())?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["id"], json!(tariff.id));

    Ok(())
}

#[tokio::test]
async fn test_webhook_signature_and_lookup_errors() -> anyhow::Result<()> {
    let app = test_app().await?;
    let payload = json!({
        "method": "receipts.pay",
        "params": { "id": "remote-unknown", "amount": 100 }
    });

    let (unsigned, _) = app.gateway.signed_webhook(&payload);
    let (status, body) = send(&app.router, webhook_request(unsigned.clone(), None)?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid signature");

    let (status, _) = send(&app.router, webhook_request(unsigned, Some("00ff"))?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (signed, signature) = app.gateway.signed_webhook(&payload);
    let (status, _) = send(&app.router, webhook_request(signed, Some(&signature))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_admin_routes_reject_clients() -> anyhow::Result<()> {
    let app = test_app().await?;
    let client = bearer_for(&app.ctx, "client", AccountRole::Client).await?;
    let admin = bearer_for(&app.ctx, "admin", AccountRole::Admin).await?;

    let request = Request::builder()
        .uri("/api/admin/payments/statistics")
        .header(header::AUTHORIZATION, &client)
        .body(Body::empty())?;
    let (status, _) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/api/admin/payments/statistics")
        .header(header::AUTHORIZATION, &admin)
        .body(Body::empty())?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    Ok(())
}

#[tokio::test]
async fn test_admin_account_management_routes() -> anyhow::Result<()> {
    let app = test_app().await?;
    let tariff = create_tariff(&app.ctx, "Premium", 100_000, 30).await?;
    let admin = bearer_for(&app.ctx, "admin", AccountRole::Admin).await?;
    let client_account =
        create_account(app.ctx.account_repo.as_ref(), "client", AccountRole::Client).await?;

    let request = Request::builder()
        .uri("/api/admin/accounts?page=1&per_page=10")
        .header(header::AUTHORIZATION, &admin)
        .body(Body::empty())?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let uri = format!("/api/admin/accounts/{}/tariff/{}", client_account.id, tariff.id);
    let request = Request::builder()
        .method(Method::PATCH)
        .uri(uri.as_str())
        .header(header::AUTHORIZATION, &admin)
        .body(Body::empty())?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["plan_id"], json!(tariff.id));

    let uri = format!("/api/admin/accounts/{}/role", client_account.id);
    let request = json_request(Method::PATCH, &uri, Some(&admin), &json!({ "role": "Admin" }))?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "Admin");

    // Clients cannot reach the same routes
    let client = bearer_for(&app.ctx, "other", AccountRole::Client).await?;
    let request = json_request(Method::PATCH, &uri, Some(&client), &json!({ "role": "Client" }))?;
    let (status, _) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn test_my_likes_requires_session() -> anyhow::Result<()> {
    let app = test_app().await?;

    let request = Request::builder().uri("/api/me/likes").body(Body::empty())?;
    let (status, _) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let auth = bearer_for(&app.ctx, "fan", AccountRole::Client).await?;
    let request = Request::builder()
        .uri("/api/me/likes")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::empty())?;
    let (status, body) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    Ok(())
}

#[tokio::test]
async fn test_payments_unavailable_without_gateway() -> anyhow::Result<()> {
    let ctx = test_context().await?;
    let router = create_app(ctx.clone(), None, Arc::new(Settings::default()));
    let tariff = create_tariff(&ctx, "Basic", 50_000, 30).await?;
    let auth = bearer_for(&ctx, "buyer", AccountRole::Client).await?;

    let request = json_request(
        Method::POST,
        "/api/payments/purchase",
        Some(&auth),
        &json!({ "tariffId": tariff.id }),
    )?;
    let (status, _) = send(&router, request).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Tariffs stay browsable
    let request = Request::builder().uri("/api/tariffs").body(Body::empty())?;
    let (status, body) = send(&router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    Ok(())
}
