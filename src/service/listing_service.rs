use std::net::IpAddr;
use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        Account, Card, CardContent, Category, CreateCardRequest, CreateCategoryRequest, LikeState,
        Review, ReviewRequest, Tariff, UpdateCardRequest, UpdateCategoryRequest,
    },
    error::{AppError, Result},
    repository::{CardRepository, CategoryRepository},
    service::subscription_service::SubscriptionService,
};

const VIEW_DEDUP_HOURS: i64 = 24;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Who is looking at a card. Anonymous viewers are told apart by address.
#[derive(Debug, Clone, Copy)]
pub enum Viewer {
    Account(Uuid),
    Anonymous(IpAddr),
}

impl Viewer {
    fn key(&self) -> String {
        match self {
            Viewer::Account(id) => format!("account:{}", id),
            Viewer::Anonymous(ip) => format!("ip:{}", ip),
        }
    }
}

/// Rejects content exceeding what `plan` allows.
pub fn check_card_limits(plan: &Tariff, content: CardContent<'_>) -> Result<()> {
    let description_chars = content.description.chars().count();
    if description_chars > plan.max_description_chars as usize {
        return Err(AppError::Validation(format!(
            "Description is {} characters; your {} plan allows {}",
            description_chars, plan.name, plan.max_description_chars
        )));
    }

    if content.image_urls.len() > plan.max_images as usize {
        return Err(AppError::Validation(format!(
            "Your {} plan allows {} images",
            plan.name, plan.max_images
        )));
    }

    if content.phone_numbers.len() > plan.max_phone_numbers as usize {
        return Err(AppError::Validation(format!(
            "Your {} plan allows {} phone numbers",
            plan.name, plan.max_phone_numbers
        )));
    }

    if content.social_links.len() > plan.max_social_links as usize {
        return Err(AppError::Validation(format!(
            "Your {} plan allows {} social links",
            plan.name, plan.max_social_links
        )));
    }

    if content.website.is_some() && !plan.has_website {
        return Err(AppError::Validation(format!(
            "Your {} plan does not include a website link",
            plan.name
        )));
    }

    Ok(())
}

/// `LIMIT`/`OFFSET` for a 1-based page. Pages below 1 read as the first;
/// pages whose offset would overflow are rejected.
pub fn page_window(page: i64, per_page: i64) -> Result<(i64, i64)> {
    let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
    let offset = (page.max(1) - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::BadRequest(format!("Page {} is out of range", page)))?;

    Ok((per_page, offset))
}

pub struct ListingService {
    categories: Arc<dyn CategoryRepository>,
    cards: Arc<dyn CardRepository>,
    subscriptions: Arc<SubscriptionService>,
}

impl ListingService {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        cards: Arc<dyn CardRepository>,
        subscriptions: Arc<SubscriptionService>,
    ) -> Self {
        Self {
            categories,
            cards,
            subscriptions,
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.categories.list().await
    }

    pub async fn create_category(&self, request: CreateCategoryRequest) -> Result<Category> {
        request.validate()?;

        if self.categories.find_by_name(&request.name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                request.name
            )));
        }

        self.categories.create(request).await
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    pub async fn update_category(&self, id: Uuid, request: UpdateCategoryRequest) -> Result<Category> {
        request.validate()?;

        let existing = self.get_category(id).await?;
        if let Some(name) = request.name.as_deref().filter(|name| *name != existing.name) {
            if self.categories.find_by_name(name).await?.is_some() {
                return Err(AppError::Conflict(format!("Category '{}' already exists", name)));
            }
        }

        self.categories.update(id, request).await
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        let card_count = self.categories.count_cards(id).await?;
        if card_count > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete category: {} cards still belong to it",
                card_count
            )));
        }

        self.categories.delete(id).await
    }

    pub async fn get_card(&self, id: Uuid) -> Result<Card> {
        self.cards
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))
    }

    pub async fn list_category_cards(&self, category_id: Uuid, page: i64, per_page: i64) -> Result<Vec<Card>> {
        self.categories
            .find_by_id(category_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        let (limit, offset) = page_window(page, per_page)?;
        self.cards.list_by_category(category_id, limit, offset).await
    }

    pub async fn list_owner_cards(&self, owner_id: Uuid) -> Result<Vec<Card>> {
        self.cards.list_by_owner(owner_id).await
    }

    pub async fn create_card(&self, owner: &Account, request: CreateCardRequest) -> Result<Card> {
        request.validate()?;

        self.categories
            .find_by_id(request.category_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        let plan = self.subscriptions.effective_plan(owner).await?;
        check_card_limits(
            &plan,
            CardContent {
                description: &request.description,
                image_urls: &request.image_urls,
                phone_numbers: &request.phone_numbers,
                social_links: &request.social_links,
                website: request.website.as_deref(),
            },
        )?;

        let card = self.cards.create(owner.id, request).await?;
        tracing::info!(card_id = %card.id, owner_id = %owner.id, "Card created");
        Ok(card)
    }

    /// Applies the given fields, then rechecks the whole card against the
    /// owner's current plan.
    pub async fn update_card(&self, caller: &Account, id: Uuid, request: UpdateCardRequest) -> Result<Card> {
        request.validate()?;

        let mut card = self.get_card(id).await?;
        if card.owner_id != caller.id {
            return Err(AppError::Forbidden);
        }

        if let Some(category_id) = request.category_id {
            self.categories
                .find_by_id(category_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
            card.category_id = category_id;
        }
        if let Some(name) = request.name {
            card.name = name;
        }
        if let Some(description) = request.description {
            card.description = description;
        }
        if let Some(price) = request.price {
            card.price = price;
        }
        if let Some(discount_price) = request.discount_price {
            card.discount_price = discount_price;
        }
        if let Some(image_urls) = request.image_urls {
            card.image_urls = image_urls;
        }
        if let Some(phone_numbers) = request.phone_numbers {
            card.phone_numbers = phone_numbers;
        }
        if let Some(social_links) = request.social_links {
            card.social_links = social_links;
        }
        if let Some(website) = request.website {
            card.website = website;
        }
        if let Some(region) = request.region {
            card.region = region;
        }
        if let Some(lat) = request.location_lat {
            card.location_lat = lat;
        }
        if let Some(long) = request.location_long {
            card.location_long = long;
        }

        let plan = self.subscriptions.effective_plan(caller).await?;
        check_card_limits(
            &plan,
            CardContent {
                description: &card.description,
                image_urls: &card.image_urls,
                phone_numbers: &card.phone_numbers,
                social_links: &card.social_links,
                website: card.website.as_deref(),
            },
        )?;

        self.cards.update(&card).await
    }

    /// Owners delete their own cards; administrators may delete any.
    pub async fn delete_card(&self, caller: &Account, id: Uuid) -> Result<()> {
        let card = self.get_card(id).await?;
        if card.owner_id != caller.id && !caller.is_admin() {
            return Err(AppError::Forbidden);
        }

        self.cards.delete(id).await?;
        tracing::info!(card_id = %id, deleted_by = %caller.id, "Card deleted");
        Ok(())
    }

    /// Flips the featured flag. Featured cards lead their search-priority tier.
    pub async fn toggle_featured(&self, id: Uuid) -> Result<Card> {
        let card = self.get_card(id).await?;
        let updated = self.cards.set_featured(id, !card.is_featured).await?;

        tracing::info!(card_id = %id, featured = updated.is_featured, "Card featured flag changed");
        Ok(updated)
    }

    pub async fn list_reviews(&self, card_id: Uuid) -> Result<Vec<Review>> {
        self.get_card(card_id).await?;
        self.cards.list_reviews(card_id).await
    }

    pub async fn create_review(&self, author: &Account, card_id: Uuid, request: ReviewRequest) -> Result<Review> {
        request.validate()?;
        self.get_card(card_id).await?;

        self.cards.create_review(card_id, author.id, request).await
    }

    pub async fn update_review(&self, author: &Account, card_id: Uuid, request: ReviewRequest) -> Result<Review> {
        request.validate()?;

        let review = self
            .cards
            .find_review(card_id, author.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        self.cards.update_review(review.id, request).await
    }

    pub async fn delete_review(&self, author: &Account, card_id: Uuid) -> Result<()> {
        let review = self
            .cards
            .find_review(card_id, author.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        self.cards.delete_review(review.id).await
    }

    pub async fn toggle_like(&self, account: &Account, card_id: Uuid) -> Result<LikeState> {
        self.get_card(card_id).await?;
        self.cards.toggle_like(card_id, account.id).await
    }

    pub async fn list_liked_cards(&self, account: &Account) -> Result<Vec<Card>> {
        self.cards.list_liked_by(account.id).await
    }

    /// Returns whether the view was counted.
    pub async fn record_view(&self, card_id: Uuid, viewer: Viewer) -> Result<bool> {
        self.get_card(card_id).await?;
        self.cards
            .record_view(card_id, &viewer.key(), Duration::hours(VIEW_DEDUP_HOURS))
            .await
    }
}
