use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateTariffRequest, Tariff, UpdateTariffRequest},
    error::{AppError, Result},
    repository::TariffRepository,
};

const TARIFF_COLUMNS: &str = r#"
    id, name, description, price, duration_days, is_active,
    search_priority, has_website, max_social_links, max_description_chars,
    max_phone_numbers, max_images, created_at, updated_at
"#;

#[derive(FromRow)]
struct TariffRow {
    id: String,
    name: String,
    description: Option<String>,
    price: i64,
    duration_days: i64,
    is_active: i32,
    search_priority: i32,
    has_website: i32,
    max_social_links: i32,
    max_description_chars: i32,
    max_phone_numbers: i32,
    max_images: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteTariffRepository {
    pool: SqlitePool,
}

impl SqliteTariffRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_tariff(row: TariffRow) -> Result<Tariff> {
        Ok(Tariff {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            description: row.description,
            price: row.price,
            duration_days: row.duration_days,
            is_active: row.is_active != 0,
            search_priority: row.search_priority,
            has_website: row.has_website != 0,
            max_social_links: row.max_social_links,
            max_description_chars: row.max_description_chars,
            max_phone_numbers: row.max_phone_numbers,
            max_images: row.max_images,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl TariffRepository for SqliteTariffRepository {
    async fn create(&self, request: CreateTariffRequest) -> Result<Tariff> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO tariffs (
                id, name, description, price, duration_days, is_active,
                search_priority, has_website, max_social_links, max_description_chars,
                max_phone_numbers, max_images, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(request.duration_days)
        .bind(request.search_priority)
        .bind(if request.has_website { 1i32 } else { 0i32 })
        .bind(request.max_social_links)
        .bind(request.max_description_chars)
        .bind(request.max_phone_numbers)
        .bind(request.max_images)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created tariff".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tariff>> {
        let row = sqlx::query_as::<_, TariffRow>(&format!(
            "SELECT {} FROM tariffs WHERE id = ?",
            TARIFF_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_tariff).transpose()
    }

    async fn find_free(&self) -> Result<Option<Tariff>> {
        let row = sqlx::query_as::<_, TariffRow>(&format!(
            "SELECT {} FROM tariffs WHERE price = 0 ORDER BY created_at ASC LIMIT 1",
            TARIFF_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_tariff).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Tariff>> {
        let query = if include_inactive {
            format!("SELECT {} FROM tariffs ORDER BY price ASC, name ASC", TARIFF_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM tariffs WHERE is_active = 1 ORDER BY price ASC, name ASC",
                TARIFF_COLUMNS
            )
        };

        let rows = sqlx::query_as::<_, TariffRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_tariff).collect()
    }

    async fn update(&self, id: Uuid, request: UpdateTariffRequest) -> Result<Tariff> {
        let existing = self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Tariff not found".to_string())
        })?;

        let now = Utc::now().naive_utc();

        let name = request.name.unwrap_or(existing.name);
        let description = request.description.or(existing.description);
        let price = request.price.unwrap_or(existing.price);
        let duration_days = request.duration_days.unwrap_or(existing.duration_days);
        let is_active = request.is_active.unwrap_or(existing.is_active);
        let search_priority = request.search_priority.unwrap_or(existing.search_priority);
        let has_website = request.has_website.unwrap_or(existing.has_website);
        let max_social_links = request.max_social_links.unwrap_or(existing.max_social_links);
        let max_description_chars = request
            .max_description_chars
            .unwrap_or(existing.max_description_chars);
        let max_phone_numbers = request.max_phone_numbers.unwrap_or(existing.max_phone_numbers);
        let max_images = request.max_images.unwrap_or(existing.max_images);

        sqlx::query(
            r#"
            UPDATE tariffs
            SET name = ?, description = ?, price = ?, duration_days = ?, is_active = ?,
                search_priority = ?, has_website = ?, max_social_links = ?,
                max_description_chars = ?, max_phone_numbers = ?, max_images = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(price)
        .bind(duration_days)
        .bind(if is_active { 1i32 } else { 0i32 })
        .bind(search_priority)
        .bind(if has_website { 1i32 } else { 0i32 })
        .bind(max_social_links)
        .bind(max_description_chars)
        .bind(max_phone_numbers)
        .bind(max_images)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated tariff".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM tariffs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn count_usage(&self, id: Uuid) -> Result<i64> {
        let id_str = id.to_string();

        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM accounts WHERE plan_id = ?1)
                 + (SELECT COUNT(*) FROM payments WHERE tariff_id = ?1)
            "#,
        )
        .bind(&id_str)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.0)
    }
}
