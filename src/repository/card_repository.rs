use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{average_rating, Card, CreateCardRequest, LikeState, Region, Review, ReviewRequest},
    error::{AppError, Result},
    repository::CardRepository,
};

const CARD_COLUMNS: &str = r#"
    c.id, c.owner_id, c.category_id, c.name, c.description, c.price, c.discount_price,
    c.image_urls, c.phone_numbers, c.social_links, c.website, c.region,
    c.location_lat, c.location_long, c.rating, c.rating_count, c.like_count, c.view_count,
    c.is_featured, c.created_at, c.updated_at
"#;

#[derive(FromRow)]
struct CardRow {
    id: String,
    owner_id: String,
    category_id: String,
    name: String,
    description: String,
    price: i64,
    discount_price: Option<i64>,
    image_urls: String,
    phone_numbers: String,
    social_links: String,
    website: Option<String>,
    region: String,
    location_lat: f64,
    location_long: f64,
    rating: f64,
    rating_count: i64,
    like_count: i64,
    view_count: i64,
    is_featured: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ReviewRow {
    id: String,
    card_id: String,
    account_id: String,
    rating: i32,
    comment: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteCardRepository {
    pool: SqlitePool,
}

impl SqliteCardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_card(row: CardRow) -> Result<Card> {
        Ok(Card {
            id: parse_uuid(&row.id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            category_id: parse_uuid(&row.category_id)?,
            name: row.name,
            description: row.description,
            price: row.price,
            discount_price: row.discount_price,
            image_urls: from_json_column(&row.image_urls)?,
            phone_numbers: from_json_column(&row.phone_numbers)?,
            social_links: from_json_column(&row.social_links)?,
            website: row.website,
            region: Region::from_str(&row.region)
                .ok_or_else(|| AppError::Database(format!("Invalid region: {}", row.region)))?,
            location_lat: row.location_lat,
            location_long: row.location_long,
            rating: row.rating,
            rating_count: row.rating_count,
            like_count: row.like_count,
            view_count: row.view_count,
            is_featured: row.is_featured != 0,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_review(row: ReviewRow) -> Result<Review> {
        Ok(Review {
            id: parse_uuid(&row.id)?,
            card_id: parse_uuid(&row.card_id)?,
            account_id: parse_uuid(&row.account_id)?,
            rating: row.rating,
            comment: row.comment,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_review_by_id(&self, review_id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, card_id, account_id, rating, comment, created_at, updated_at FROM reviews WHERE id = ?"
        )
        .bind(review_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_review).transpose()
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn from_json_column<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AppError::Database(format!("Invalid JSON column: {}", e)))
}

fn to_json_column<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))
}

/// Recomputes rating as total rating over total review count.
async fn refresh_rating(conn: &mut SqliteConnection, card_id: &str) -> Result<()> {
    let (rating_sum, review_count): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(rating), 0), COUNT(*) FROM reviews WHERE card_id = ?"
    )
    .bind(card_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE cards SET rating = ?, rating_count = ? WHERE id = ?")
        .bind(average_rating(rating_sum, review_count))
        .bind(review_count)
        .bind(card_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[async_trait]
impl CardRepository for SqliteCardRepository {
    async fn create(&self, owner_id: Uuid, request: CreateCardRequest) -> Result<Card> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO cards (
                id, owner_id, category_id, name, description, price, discount_price,
                image_urls, phone_numbers, social_links, website, region,
                location_lat, location_long, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(request.category_id.to_string())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(request.discount_price)
        .bind(to_json_column(&request.image_urls)?)
        .bind(to_json_column(&request.phone_numbers)?)
        .bind(to_json_column(&request.social_links)?)
        .bind(&request.website)
        .bind(request.region.as_str())
        .bind(request.location_lat)
        .bind(request.location_long)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created card".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Card>> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {} FROM cards c WHERE c.id = ?",
            CARD_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_card).transpose()
    }

    async fn list_by_category(&self, category_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Card>> {
        // Plans are joined only while unexpired, so lapsed owners sort as free.
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            SELECT {}
            FROM cards c
            JOIN accounts a ON a.id = c.owner_id
            LEFT JOIN tariffs t ON t.id = a.plan_id AND a.plan_expires_at > ?
            WHERE c.category_id = ?
            ORDER BY COALESCE(t.search_priority, 0) DESC, c.is_featured DESC, c.created_at DESC
            LIMIT ? OFFSET ?
            "#,
            CARD_COLUMNS
        ))
        .bind(Utc::now().naive_utc())
        .bind(category_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_card).collect()
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Card>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {} FROM cards c WHERE c.owner_id = ? ORDER BY c.created_at DESC",
            CARD_COLUMNS
        ))
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_card).collect()
    }

    async fn list_liked_by(&self, account_id: Uuid) -> Result<Vec<Card>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            SELECT {}
            FROM likes l
            JOIN cards c ON c.id = l.card_id
            WHERE l.account_id = ?
            ORDER BY l.created_at DESC
            "#,
            CARD_COLUMNS
        ))
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_card).collect()
    }

    async fn update(&self, card: &Card) -> Result<Card> {
        let result = sqlx::query(
            r#"
            UPDATE cards
            SET category_id = ?, name = ?, description = ?, price = ?, discount_price = ?,
                image_urls = ?, phone_numbers = ?, social_links = ?, website = ?, region = ?,
                location_lat = ?, location_long = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(card.category_id.to_string())
        .bind(&card.name)
        .bind(&card.description)
        .bind(card.price)
        .bind(card.discount_price)
        .bind(to_json_column(&card.image_urls)?)
        .bind(to_json_column(&card.phone_numbers)?)
        .bind(to_json_column(&card.social_links)?)
        .bind(&card.website)
        .bind(card.region.as_str())
        .bind(card.location_lat)
        .bind(card.location_long)
        .bind(Utc::now().naive_utc())
        .bind(card.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Card not found".to_string()));
        }

        self.find_by_id(card.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated card".to_string()))
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<Card> {
        let result = sqlx::query("UPDATE cards SET is_featured = ?, updated_at = ? WHERE id = ?")
            .bind(featured)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Card not found".to_string()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated card".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_review(&self, card_id: Uuid, account_id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, card_id, account_id, rating, comment, created_at, updated_at
            FROM reviews
            WHERE card_id = ? AND account_id = ?
            "#
        )
        .bind(card_id.to_string())
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_review).transpose()
    }

    async fn list_reviews(&self, card_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, card_id, account_id, rating, comment, created_at, updated_at
            FROM reviews
            WHERE card_id = ?
            ORDER BY created_at DESC
            "#
        )
        .bind(card_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_review).collect()
    }

    async fn create_review(&self, card_id: Uuid, account_id: Uuid, request: ReviewRequest) -> Result<Review> {
        let id = Uuid::new_v4();
        let card_id_str = card_id.to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reviews (id, card_id, account_id, rating, comment, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&card_id_str)
        .bind(account_id.to_string())
        .bind(request.rating)
        .bind(&request.comment)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AppError::Conflict("You have already reviewed this card".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

        refresh_rating(&mut tx, &card_id_str).await?;
        tx.commit().await?;

        self.find_review_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created review".to_string()))
    }

    async fn update_review(&self, review_id: Uuid, request: ReviewRequest) -> Result<Review> {
        let review = self
            .find_review_by_id(review_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE reviews SET rating = ?, comment = ?, updated_at = ? WHERE id = ?")
            .bind(request.rating)
            .bind(&request.comment)
            .bind(Utc::now().naive_utc())
            .bind(review_id.to_string())
            .execute(&mut *tx)
            .await?;

        refresh_rating(&mut tx, &review.card_id.to_string()).await?;
        tx.commit().await?;

        self.find_review_by_id(review_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated review".to_string()))
    }

    async fn delete_review(&self, review_id: Uuid) -> Result<()> {
        let review = self
            .find_review_by_id(review_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review_id.to_string())
            .execute(&mut *tx)
            .await?;

        refresh_rating(&mut tx, &review.card_id.to_string()).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn toggle_like(&self, card_id: Uuid, account_id: Uuid) -> Result<LikeState> {
        let card_id_str = card_id.to_string();
        let account_id_str = account_id.to_string();

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE card_id = ? AND account_id = ?")
            .bind(&card_id_str)
            .bind(&account_id_str)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query("INSERT INTO likes (card_id, account_id, created_at) VALUES (?, ?, ?)")
                .bind(&card_id_str)
                .bind(&account_id_str)
                .bind(Utc::now().naive_utc())
                .execute(&mut *tx)
                .await?;
        }

        let like_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE card_id = ?")
            .bind(&card_id_str)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE cards SET like_count = ? WHERE id = ?")
            .bind(like_count)
            .bind(&card_id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(LikeState {
            liked: removed == 0,
            like_count,
        })
    }

    async fn record_view(&self, card_id: Uuid, viewer_key: &str, window: chrono::Duration) -> Result<bool> {
        let card_id_str = card_id.to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM views WHERE card_id = ? AND viewer_key = ? AND created_at > ?"
        )
        .bind(&card_id_str)
        .bind(viewer_key)
        .bind((now - window).naive_utc())
        .fetch_one(&mut *tx)
        .await?;

        if recent > 0 {
            return Ok(false);
        }

        sqlx::query("INSERT INTO views (id, card_id, viewer_key, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(&card_id_str)
            .bind(viewer_key)
            .bind(now.naive_utc())
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE cards SET view_count = view_count + 1 WHERE id = ?")
            .bind(&card_id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
