use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

/// Administrator edit of a category. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Region {
    Tashkent,
    Andijan,
    Bukhara,
    Fergana,
    Jizzakh,
    Namangan,
    Navoiy,
    Qashqadaryo,
    Samarkand,
    Sirdaryo,
    Surkhandaryo,
    Xorazm,
    Karakalpakstan,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Tashkent => "Tashkent",
            Region::Andijan => "Andijan",
            Region::Bukhara => "Bukhara",
            Region::Fergana => "Fergana",
            Region::Jizzakh => "Jizzakh",
            Region::Namangan => "Namangan",
            Region::Navoiy => "Navoiy",
            Region::Qashqadaryo => "Qashqadaryo",
            Region::Samarkand => "Samarkand",
            Region::Sirdaryo => "Sirdaryo",
            Region::Surkhandaryo => "Surkhandaryo",
            Region::Xorazm => "Xorazm",
            Region::Karakalpakstan => "Karakalpakstan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Tashkent" => Some(Region::Tashkent),
            "Andijan" => Some(Region::Andijan),
            "Bukhara" => Some(Region::Bukhara),
            "Fergana" => Some(Region::Fergana),
            "Jizzakh" => Some(Region::Jizzakh),
            "Namangan" => Some(Region::Namangan),
            "Navoiy" => Some(Region::Navoiy),
            "Qashqadaryo" => Some(Region::Qashqadaryo),
            "Samarkand" => Some(Region::Samarkand),
            "Sirdaryo" => Some(Region::Sirdaryo),
            "Surkhandaryo" => Some(Region::Surkhandaryo),
            "Xorazm" => Some(Region::Xorazm),
            "Karakalpakstan" => Some(Region::Karakalpakstan),
            _ => None,
        }
    }
}

/// A listing posted by an account under a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub image_urls: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub social_links: BTreeMap<String, String>,
    pub website: Option<String>,
    pub region: Region,
    pub location_lat: f64,
    pub location_long: f64,
    pub rating: f64,
    pub rating_count: i64,
    pub like_count: i64,
    pub view_count: i64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCardRequest {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub discount_price: Option<i64>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
    #[validate(url)]
    pub website: Option<String>,
    pub region: Region,
    #[validate(range(min = -90.0, max = 90.0))]
    pub location_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub location_long: f64,
}

/// Fields the owner may change on a card. Counters and ownership are not
/// updatable through this path.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCardRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    /// `null` clears the discount.
    #[serde(default, deserialize_with = "nullable")]
    #[validate(range(min = 0))]
    pub discount_price: Option<Option<i64>>,
    pub image_urls: Option<Vec<String>>,
    pub phone_numbers: Option<Vec<String>>,
    pub social_links: Option<BTreeMap<String, String>>,
    /// `null` clears the website link.
    #[serde(default, deserialize_with = "nullable")]
    #[validate(url)]
    pub website: Option<Option<String>>,
    pub region: Option<Region>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub location_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub location_long: Option<f64>,
}

/// Tells an explicit `null` (`Some(None)`) apart from an absent field (`None`).
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The publishable shape of a card, checked against the owner's plan caps.
#[derive(Debug, Clone, Copy)]
pub struct CardContent<'a> {
    pub description: &'a str,
    pub image_urls: &'a [String],
    pub phone_numbers: &'a [String],
    pub social_links: &'a BTreeMap<String, String>,
    pub website: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub card_id: Uuid,
    pub account_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub comment: String,
}

/// Rating aggregate of a card: total rating divided by total review count.
pub fn average_rating(rating_sum: i64, review_count: i64) -> f64 {
    if review_count == 0 {
        0.0
    } else {
        rating_sum as f64 / review_count as f64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}
