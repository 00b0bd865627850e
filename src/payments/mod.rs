pub mod gateway;
pub mod orchestrator;
pub mod payme_client;
pub mod signer;
pub mod webhook;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use gateway::{GatewayFailure, GatewayFailureKind, PaymentGateway};
pub use orchestrator::{PaymentOrchestrator, PurchaseOutcome, WebhookAck};
pub use payme_client::PaymeClient;
pub use signer::RequestSigner;
