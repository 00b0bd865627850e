use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub role: AccountRole,
    pub is_active: bool,
    pub subscription: SubscriptionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountRole {
    Admin,
    Client,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Admin => "Admin",
            AccountRole::Client => "Client",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Admin" => Some(AccountRole::Admin),
            "Client" => Some(AccountRole::Client),
            _ => None,
        }
    }
}

/// Plan assignment stored on the account row.
///
/// Expiry is evaluated lazily: nothing sweeps expired plans, callers ask
/// [`SubscriptionState::active_plan`] with the current time instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionState {
    pub plan_id: Option<Uuid>,
    pub plan_expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        matches!((self.plan_id, self.plan_expires_at), (Some(_), Some(expires)) if expires > now)
    }

    /// The assigned plan if it has not expired yet.
    pub fn active_plan(&self, now: DateTime<Utc>) -> Option<Uuid> {
        if self.is_active_at(now) {
            self.plan_id
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterAccountRequest {
    #[validate(length(min = 3, max = 128))]
    pub login: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub login: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: AccountRole,
}

/// One page of the administrator's account listing.
#[derive(Debug, Clone, Serialize)]
pub struct AccountPage {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub accounts: Vec<Account>,
}

/// Account row as inserted by the repository. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: AccountRole,
}
