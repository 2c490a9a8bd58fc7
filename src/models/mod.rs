pub mod common;
pub mod fraud;
pub mod notification;
pub mod pagination;
pub mod product;
pub mod referral;
pub mod transaction;
pub mod user;
pub mod withdrawal;

pub use common::*;
pub use fraud::*;
pub use notification::*;
pub use pagination::*;
pub use product::*;
pub use referral::*;
pub use transaction::*;
pub use user::*;
pub use withdrawal::*;
