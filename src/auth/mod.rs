pub mod claims;
pub mod extractors;
pub mod jwt;
pub mod password;

pub use claims::{KeyPurpose, TokenClaims};
pub use extractors::{require_token, CurrentUser};
pub use jwt::JwtKeys;
