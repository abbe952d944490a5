pub mod reset_token;
pub mod user;

pub use reset_token::{ResetToken, TokenDigest};
pub use user::User;
