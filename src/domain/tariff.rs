use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Longest validity window a tariff may grant, roughly a century.
pub const MAX_DURATION_DAYS: i64 = 36_500;

/// A purchasable subscription plan and the feature caps it grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Whole currency units. Zero marks the free plan.
    pub price: i64,
    pub duration_days: i64,
    pub is_active: bool,
    pub search_priority: i32,
    pub has_website: bool,
    pub max_social_links: i32,
    pub max_description_chars: i32,
    pub max_phone_numbers: i32,
    pub max_images: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tariff {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTariffRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 1, max = 36500))]
    pub duration_days: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub search_priority: i32,
    #[serde(default)]
    pub has_website: bool,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub max_social_links: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub max_description_chars: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub max_phone_numbers: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub max_images: i32,
}

/// The fields an administrator may change on an existing tariff. Anything not
/// listed here is fixed after creation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateTariffRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 1, max = 36500))]
    pub duration_days: Option<i64>,
    pub is_active: Option<bool>,
    #[validate(range(min = 0))]
    pub search_priority: Option<i32>,
    pub has_website: Option<bool>,
    #[validate(range(min = 0))]
    pub max_social_links: Option<i32>,
    #[validate(range(min = 0))]
    pub max_description_chars: Option<i32>,
    #[validate(range(min = 0))]
    pub max_phone_numbers: Option<i32>,
    #[validate(range(min = 0))]
    pub max_images: Option<i32>,
}
