use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Account, AccountRole, NewAccount, SubscriptionState},
    error::{AppError, Result},
    repository::AccountRepository,
};

#[derive(FromRow)]
struct AccountRow {
    id: String,
    login: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: i32,
    plan_id: Option<String>,
    plan_expires_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_account(row: AccountRow) -> Result<Account> {
        Ok(Account {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            login: row.login,
            first_name: row.first_name,
            last_name: row.last_name,
            role: AccountRole::from_str(&row.role)
                .ok_or_else(|| AppError::Database(format!("Invalid account role: {}", row.role)))?,
            is_active: row.is_active != 0,
            subscription: SubscriptionState {
                plan_id: row
                    .plan_id
                    .map(|id| Uuid::parse_str(&id))
                    .transpose()
                    .map_err(|e| AppError::Database(e.to_string()))?,
                plan_expires_at: row
                    .plan_expires_at
                    .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            },
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, login, password_hash, first_name, last_name,
                role, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&account.login)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AppError::Conflict("Login already exists".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created account".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, login, first_name, last_name, role, is_active,
                   plan_id, plan_expires_at, created_at, updated_at
            FROM accounts
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_account).transpose()
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, login, first_name, last_name, role, is_active,
                   plan_id, plan_expires_at, created_at, updated_at
            FROM accounts
            WHERE login = ?
            "#
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_account).transpose()
    }

    async fn get_password_hash(&self, login: &str) -> Result<Option<(Uuid, String)>> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT id, password_hash FROM accounts WHERE login = ?"
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((id, hash)) => {
                let id = Uuid::parse_str(&id).map_err(|e| AppError::Database(e.to_string()))?;
                Ok(Some((id, hash)))
            }
            None => Ok(None),
        }
    }

    async fn has_admin(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE role = ?")
            .bind(AccountRole::Admin.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, login, first_name, last_name, role, is_active,
                   plan_id, plan_expires_at, created_at, updated_at
            FROM accounts
            ORDER BY created_at ASC
            LIMIT ? OFFSET ?
            "#
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_account).collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn set_role(&self, id: Uuid, role: AccountRole) -> Result<Account> {
        let result = sqlx::query("UPDATE accounts SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated account".to_string())
        })
    }

    async fn set_subscription(&self, id: Uuid, state: &SubscriptionState) -> Result<Account> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE accounts SET plan_id = ?, plan_expires_at = ?, updated_at = ? WHERE id = ?"
        )
        .bind(state.plan_id.map(|p| p.to_string()))
        .bind(state.plan_expires_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated account".to_string())
        })
    }
}
