pub mod accounts;
pub mod auth;
pub mod cards;
pub mod categories;
pub mod payments;
pub mod root;
pub mod tariffs;
