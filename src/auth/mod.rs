use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AdminConfig,
    domain::{Account, AccountRole, LoginRequest, NewAccount, RegisterAccountRequest},
    error::{AppError, Result},
    repository::AccountRepository,
};

pub mod session;

use session::{Session, SessionStore};

pub const SESSION_COOKIE: &str = "session";

pub struct AuthService {
    session_store: SessionStore,
    accounts: Arc<dyn AccountRepository>,
    session_duration_hours: i64,
}

impl AuthService {
    pub fn new(
        pool: SqlitePool,
        accounts: Arc<dyn AccountRepository>,
        session_duration_hours: i64,
    ) -> Self {
        Self {
            session_store: SessionStore::new(pool),
            accounts,
            session_duration_hours,
        }
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Creates a client account. New accounts start without a plan and fall
    /// back to the free plan until they buy one.
    pub async fn register(&self, request: RegisterAccountRequest) -> Result<Account> {
        request.validate()?;

        let password_hash = Self::hash_password(&request.password).await?;
        let account = self
            .accounts
            .create(NewAccount {
                login: request.login,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                role: AccountRole::Client,
            })
            .await?;

        tracing::info!("Registered account {} ({})", account.id, account.login);
        Ok(account)
    }

    /// Checks credentials and opens a session. Returns the raw token, which
    /// is never stored.
    pub async fn login(&self, request: LoginRequest) -> Result<(Account, String)> {
        request.validate()?;

        let (account_id, hash) = self
            .accounts
            .get_password_hash(&request.login)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !Self::verify_password(&request.password, &hash).await? {
            tracing::debug!("Failed login for {}", request.login);
            return Err(AppError::Unauthorized);
        }

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !account.is_active {
            return Err(AppError::Forbidden);
        }

        let (_, token) = self.create_session(account.id).await?;
        Ok((account, token))
    }

    pub async fn create_session(&self, account_id: Uuid) -> Result<(Session, String)> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(self.session_duration_hours);

        let session = self.session_store.create(account_id, &token, expires_at).await?;

        Ok((session, token))
    }

    /// Resolves a session token to its active account.
    pub async fn authenticate(&self, token: &str) -> Result<Option<Account>> {
        let Some(session) = self.session_store.find_by_token(token).await? else {
            return Ok(None);
        };

        let account = self.accounts.find_by_id(session.account_id).await?;
        Ok(account.filter(|a| a.is_active))
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.session_store.delete_by_token(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.session_store.cleanup_expired().await
    }

    /// Creates the configured administrator unless one already exists.
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> Result<Option<Account>> {
        if self.accounts.has_admin().await? {
            return Ok(None);
        }

        let password_hash = Self::hash_password(&admin.password).await?;
        let account = self
            .accounts
            .create(NewAccount {
                login: admin.login.clone(),
                password_hash,
                first_name: admin.first_name.clone(),
                last_name: admin.last_name.clone(),
                role: AccountRole::Admin,
            })
            .await?;

        tracing::info!("Created administrator account {}", account.login);
        Ok(Some(account))
    }

    pub fn create_session_cookie(&self, token: &str, secure: bool) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(secure)
            .max_age(cookie::time::Duration::hours(self.session_duration_hours))
            .build()
    }

    pub fn create_logout_cookie() -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
