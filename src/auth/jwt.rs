use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use subtle::ConstantTimeEq;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{AccessKeyClaims, KeyPurpose, TokenClaims};
use crate::{config::AuthConfig, state::AppState};

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    api_pass: String,
    access_key_ttl: TimeDuration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.auth)
    }
}

impl JwtKeys {
    pub fn new(auth: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(auth.secret.as_bytes()),
            decoding: DecodingKey::from_secret(auth.secret.as_bytes()),
            api_pass: auth.api_pass.clone(),
            access_key_ttl: TimeDuration::minutes(auth.access_key_ttl_minutes),
        }
    }

    pub fn sign(&self, claims: &TokenClaims) -> anyhow::Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Verifies signature, optional expiry and the shared admin password.
    pub fn decode_token(&self, token: &str) -> anyhow::Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // bearer tokens carry no registered claims; `exp` is still checked when present
        validation.required_spec_claims.clear();
        let data = decode::<TokenClaims>(token, &self.decoding, &validation)?;

        let matches: bool = data
            .claims
            .admin_password
            .as_bytes()
            .ct_eq(self.api_pass.as_bytes())
            .into();
        if !matches {
            anyhow::bail!("admin password mismatch");
        }
        debug!(user = ?data.claims.email, "token accepted");
        Ok(data.claims)
    }

    pub fn issue_access_key(&self, email: &str, purpose: KeyPurpose) -> anyhow::Result<String> {
        self.sign_access_key(email, purpose, self.access_key_ttl)
    }

    fn sign_access_key(
        &self,
        email: &str,
        purpose: KeyPurpose,
        ttl: TimeDuration,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = AccessKeyClaims {
            email: email.to_string(),
            purpose,
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let key = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(%email, ?purpose, "access key issued");
        Ok(key)
    }

    /// Returns the email embedded in a live key issued for `purpose`.
    pub fn verify_access_key(&self, key: &str, purpose: KeyPurpose) -> anyhow::Result<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        let data = decode::<AccessKeyClaims>(key, &self.decoding, &validation)?;
        if data.claims.purpose != purpose {
            anyhow::bail!("access key issued for {:?}", data.claims.purpose);
        }
        Ok(data.claims.email)
    }
}
