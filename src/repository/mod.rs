use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod account_repository;
pub mod tariff_repository;
pub mod payment_repository;
pub mod category_repository;
pub mod card_repository;

pub use account_repository::SqliteAccountRepository;
pub use tariff_repository::SqliteTariffRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use category_repository::SqliteCategoryRepository;
pub use card_repository::SqliteCardRepository;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: NewAccount) -> Result<Account>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>>;
    async fn get_password_hash(&self, login: &str) -> Result<Option<(Uuid, String)>>;
    async fn has_admin(&self) -> Result<bool>;
    /// Oldest accounts first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>>;
    async fn count(&self) -> Result<i64>;
    async fn set_role(&self, id: Uuid, role: AccountRole) -> Result<Account>;
    async fn set_subscription(&self, id: Uuid, state: &SubscriptionState) -> Result<Account>;
}

#[async_trait]
pub trait TariffRepository: Send + Sync {
    async fn create(&self, request: CreateTariffRequest) -> Result<Tariff>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tariff>>;
    /// The zero-price plan, oldest first if several exist.
    async fn find_free(&self) -> Result<Option<Tariff>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Tariff>>;
    async fn update(&self, id: Uuid, request: UpdateTariffRequest) -> Result<Tariff>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Accounts assigned to the plan plus payments referencing it.
    async fn count_usage(&self, id: Uuid) -> Result<i64>;
}

/// The payment ledger. It is the only writer of `PaymentTransaction.status`.
///
/// Status transitions are single conditional updates guarded on the source
/// state, so concurrent deliveries of the same event cannot both apply.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn open(&self, owner_id: Uuid, amount: i64, tariff_id: Option<Uuid>) -> Result<PaymentTransaction>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentTransaction>>;
    async fn find_by_external_transaction_id(&self, external_id: &str) -> Result<Option<PaymentTransaction>>;
    async fn list_by_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<PaymentTransaction>>;
    async fn attach_external_ids(
        &self,
        id: Uuid,
        external_transaction_id: &str,
        external_receipt_id: Option<&str>,
    ) -> Result<PaymentTransaction>;
    async fn transition_to_paid(
        &self,
        id: Uuid,
        paid_at: DateTime<Utc>,
        receipt_id: Option<&str>,
    ) -> Result<TransitionOutcome>;
    async fn transition_to_failed(
        &self,
        id: Uuid,
        code: Option<&str>,
        message: Option<&str>,
    ) -> Result<TransitionOutcome>;
    async fn transition_to_cancelled(&self, id: Uuid) -> Result<TransitionOutcome>;
    async fn record_webhook_received(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    /// Writes `state` to the payment owner's account and marks the payment's
    /// subscription as applied, both in one transaction. Returns false without
    /// writing when the payment is not paid or the mark is already set.
    async fn apply_subscription(&self, id: Uuid, state: &SubscriptionState, at: DateTime<Utc>) -> Result<bool>;
    async fn statistics(&self, owner_id: Option<Uuid>) -> Result<PaymentStatistics>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, request: CreateCategoryRequest) -> Result<Category>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>>;
    async fn list(&self) -> Result<Vec<Category>>;
    async fn update(&self, id: Uuid, request: UpdateCategoryRequest) -> Result<Category>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn count_cards(&self, id: Uuid) -> Result<i64>;
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn create(&self, owner_id: Uuid, request: CreateCardRequest) -> Result<Card>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Card>>;
    /// Cards of a category, higher owner search priority first, then newest.
    async fn list_by_category(&self, category_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Card>>;
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Card>>;
    /// Cards the account has liked, most recently liked first.
    async fn list_liked_by(&self, account_id: Uuid) -> Result<Vec<Card>>;
    async fn update(&self, card: &Card) -> Result<Card>;
    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<Card>;
    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn find_review(&self, card_id: Uuid, account_id: Uuid) -> Result<Option<Review>>;
    async fn list_reviews(&self, card_id: Uuid) -> Result<Vec<Review>>;
    async fn create_review(&self, card_id: Uuid, account_id: Uuid, request: ReviewRequest) -> Result<Review>;
    async fn update_review(&self, review_id: Uuid, request: ReviewRequest) -> Result<Review>;
    async fn delete_review(&self, review_id: Uuid) -> Result<()>;

    async fn toggle_like(&self, card_id: Uuid, account_id: Uuid) -> Result<LikeState>;
    /// Counts the view unless the same viewer was counted within `window`.
    async fn record_view(&self, card_id: Uuid, viewer_key: &str, window: chrono::Duration) -> Result<bool>;
}
