pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put, patch, delete},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    payments::PaymentOrchestrator,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    payments: Option<Arc<PaymentOrchestrator>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, payments, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/auth", auth_routes(app_state.clone()))
        .nest("/api", api_routes(app_state.clone()))

        .with_state(app_state)

        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tariffs", get(handlers::tariffs::list))
        .route("/tariffs/:id", get(handlers::tariffs::get))
        .route("/categories", get(handlers::categories::list))
        .route("/categories/:id", get(handlers::categories::get))
        .route("/categories/:id/cards", get(handlers::categories::list_cards))
        .merge(card_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .merge(
            Router::new()
                .route("/me", get(handlers::auth::me))
                .route("/me/likes", get(handlers::cards::list_liked))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn card_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public reads
        .route("/cards/:id", get(handlers::cards::get))
        .route("/cards/:id/reviews", get(handlers::cards::list_reviews))
        .merge(
            Router::new()
                .route("/cards/:id/view", post(handlers::cards::view))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth::optional_auth,
                )),
        )
        // Owner writes
        .merge(
            Router::new()
                .route("/cards", post(handlers::cards::create))
                .route("/cards/mine", get(handlers::cards::list_mine))
                .route("/cards/:id", put(handlers::cards::update))
                .route("/cards/:id", delete(handlers::cards::delete))
                .route("/cards/:id/reviews", post(handlers::cards::create_review))
                .route("/cards/:id/reviews", put(handlers::cards::update_review))
                .route("/cards/:id/reviews", delete(handlers::cards::delete_review))
                .route("/cards/:id/like", post(handlers::cards::like))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Provider callback, authenticated by signature
        .route("/webhook", post(handlers::payments::webhook))
        .merge(
            Router::new()
                .route("/purchase", post(handlers::payments::purchase))
                .route("/mine", get(handlers::payments::list_mine))
                .route("/status/:transaction_id", get(handlers::payments::status))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tariffs", get(handlers::tariffs::admin_list))
        .route("/tariffs", post(handlers::tariffs::create))
        .route("/tariffs/:id", put(handlers::tariffs::update))
        .route("/tariffs/:id", delete(handlers::tariffs::delete))
        .route("/categories", post(handlers::categories::create))
        .route("/categories/:id", put(handlers::categories::update))
        .route("/categories/:id", delete(handlers::categories::delete))
        .route("/cards/:id/feature", patch(handlers::cards::toggle_featured))
        .route("/accounts", get(handlers::accounts::list))
        .route("/accounts/:id", get(handlers::accounts::get))
        .route("/accounts/:id/role", patch(handlers::accounts::set_role))
        .route("/accounts/:id/tariff/:tariff_id", patch(handlers::accounts::assign_tariff))
        .route("/payments/statistics", get(handlers::payments::statistics))
        .route("/payments/:transaction_id/cancel", post(handlers::payments::cancel))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        .with_state(state)
}
