use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::SubscriptionConfig,
    domain::{CreateTariffRequest, Tariff, UpdateTariffRequest},
    error::{AppError, Result},
    repository::TariffRepository,
};

const FREE_PLAN_MAX_IMAGES: i32 = 3;
const FREE_PLAN_MAX_PHONE_NUMBERS: i32 = 1;
const FREE_PLAN_MAX_DESCRIPTION_CHARS: i32 = 500;

pub struct TariffService {
    repo: Arc<dyn TariffRepository>,
}

impl TariffService {
    pub fn new(repo: Arc<dyn TariffRepository>) -> Self {
        Self { repo }
    }

    /// List tariffs, cheapest first
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Tariff>> {
        self.repo.list(include_inactive).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Tariff> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tariff not found".to_string()))
    }

    pub async fn create(&self, request: CreateTariffRequest) -> Result<Tariff> {
        request.validate()?;

        let tariff = self.repo.create(request).await?;
        tracing::info!("Created tariff {} ({})", tariff.name, tariff.id);
        Ok(tariff)
    }

    pub async fn update(&self, id: Uuid, request: UpdateTariffRequest) -> Result<Tariff> {
        request.validate()?;

        let existing = self.get(id).await?;

        // The free plan anchors every unsubscribed account.
        if existing.is_free() && request.price.is_some_and(|p| p > 0) {
            return Err(AppError::BadRequest(
                "The free plan cannot be given a price".to_string(),
            ));
        }

        self.repo.update(id, request).await
    }

    /// Delete a tariff nobody references
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let tariff = self.get(id).await?;

        if tariff.is_free() {
            return Err(AppError::Conflict("The free plan cannot be deleted".to_string()));
        }

        let usage_count = self.repo.count_usage(id).await?;
        if usage_count > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete tariff: {} accounts or payments still reference it. Deactivate instead.",
                usage_count
            )));
        }

        self.repo.delete(id).await
    }

    /// Creates the zero-price plan if none exists. Safe to run on every start.
    pub async fn ensure_free_plan(&self, config: &SubscriptionConfig) -> Result<Tariff> {
        if let Some(existing) = self.repo.find_free().await? {
            tracing::debug!("Free plan present: {}", existing.id);
            return Ok(existing);
        }

        let tariff = self
            .repo
            .create(CreateTariffRequest {
                name: config.free_plan_name.clone(),
                description: Some("Default plan for accounts without a subscription".to_string()),
                price: 0,
                duration_days: config.free_plan_duration_days,
                search_priority: 0,
                has_website: false,
                max_social_links: 0,
                max_description_chars: FREE_PLAN_MAX_DESCRIPTION_CHARS,
                max_phone_numbers: FREE_PLAN_MAX_PHONE_NUMBERS,
                max_images: FREE_PLAN_MAX_IMAGES,
            })
            .await?;

        tracing::info!("Created free plan {} ({})", tariff.name, tariff.id);
        Ok(tariff)
    }
}
