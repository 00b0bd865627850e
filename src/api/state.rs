use std::sync::Arc;
use crate::{
    config::Settings,
    error::{AppError, Result},
    payments::PaymentOrchestrator,
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    /// Absent when no merchant credentials are configured.
    pub payments: Option<Arc<PaymentOrchestrator>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        payments: Option<Arc<PaymentOrchestrator>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            payments,
            settings,
        }
    }

    pub fn orchestrator(&self) -> Result<&PaymentOrchestrator> {
        self.payments
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("Payments are not configured".to_string()))
    }
}
