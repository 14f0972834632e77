use serde::{Deserialize, Serialize};

/// Bearer token payload. `admin_password` gates the whole API; the optional
/// `email`/`password` pair identifies the user acting through it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub admin_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
}

/// What an access key may be redeemed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    ConfirmEmail,
    ResetPassword,
}

impl KeyPurpose {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "confirm_email" => Some(Self::ConfirmEmail),
            "reset_password" => Some(Self::ResetPassword),
            _ => None,
        }
    }
}

/// Time-limited access key payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKeyClaims {
    pub email: String,
    pub purpose: KeyPurpose,
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
}
