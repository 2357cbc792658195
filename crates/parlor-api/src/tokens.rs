use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a capability token authorizes. The purpose travels inside the
/// signed claims, so a token minted for one action never verifies for
/// another even when the payload shape matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    ApproveRoom,
    DenyRoom,
    EmailConfirm,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApproveRoom => "approve-room",
            Self::DenyRoom => "deny-room",
            Self::EmailConfirm => "email-confirm",
        }
    }

    /// Maximum accepted token age in seconds.
    pub fn max_age(self) -> i64 {
        match self {
            Self::ApproveRoom | Self::DenyRoom => 24 * 3600,
            Self::EmailConfirm => 3600,
        }
    }
}

/// Everything a token carries. Tokens are self-contained bearer
/// capabilities: nothing here is persisted server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    purpose: String,
    #[serde(flatten)]
    payload: TokenPayload,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature invalid")]
    BadSignature,
}

/// Issues and verifies purpose-scoped, time-boxed signed tokens (HS256
/// over the configured secret).
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn sign(&self, payload: TokenPayload, purpose: TokenPurpose) -> anyhow::Result<String> {
        self.sign_at(payload, purpose, Utc::now().timestamp())
    }

    fn sign_at(
        &self,
        payload: TokenPayload,
        purpose: TokenPurpose,
        issued_at: i64,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            purpose: purpose.as_str().to_string(),
            payload,
            iat: issued_at,
            exp: issued_at + purpose.max_age(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verifies signature, purpose, and age. The `exp` claim is minted
    /// from the purpose's max age; the `iat` check re-caps the age at
    /// verification time so a token never outlives its purpose.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, purpose, Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        token: &str,
        purpose: TokenPurpose,
        now: i64,
    ) -> Result<TokenPayload, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::BadSignature,
            })?;

        if data.claims.purpose != purpose.as_str() {
            return Err(TokenError::BadSignature);
        }
        if data.claims.iat + purpose.max_age() < now {
            return Err(TokenError::Expired);
        }
        Ok(data.claims.payload)
    }
}
