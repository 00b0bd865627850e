pub mod account;
pub mod tariff;
pub mod payment;
pub mod listing;

pub use account::*;
pub use tariff::*;
pub use payment::*;
pub use listing::*;
