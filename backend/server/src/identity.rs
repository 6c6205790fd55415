//! # Identity Issuer
//!
//! Turns a self-declared display name into a bearer credential.
//!
//! ## Credential
//!
//! `base64url(claims) "." base64url(HMAC-SHA256(secret, base64url(claims)))`
//!
//! - Claims: `sub` (UUID v4 credential id), `name`, `iat`, `exp` in Unix seconds
//! - Self-contained, no session table on the server
//! - Every login mints a fresh `sub`, so the same name twice means two voting slots
//! - Signature check is constant time, expiry is checked on every verification
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub credential_id: Uuid,
    pub display_name: String,
    pub expires_at: i64,
}

#[derive(Debug)]
pub struct Issued {
    pub identity: Identity,
    pub credential: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    name: String,
    iat: i64,
    exp: i64,
}

pub struct IdentityIssuer {
    key: Vec<u8>,
    ttl_secs: i64,
}

impl IdentityIssuer {
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    pub fn issue(&self, display_name: &str) -> Result<Issued, AppError> {
        self.issue_at(display_name, Utc::now().timestamp())
    }

    pub fn verify(&self, credential: &str) -> Result<Identity, AppError> {
        self.verify_at(credential, Utc::now().timestamp())
    }

    fn issue_at(&self, display_name: &str, now: i64) -> Result<Issued, AppError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput);
        }

        let claims = Claims {
            sub: Uuid::new_v4(),
            name: name.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };

        let payload = serde_json::to_vec(&claims).map_err(|e| AppError::InternalError(e.into()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(Issued {
            identity: Identity {
                credential_id: claims.sub,
                display_name: claims.name,
                expires_at: claims.exp,
            },
            credential: format!("{payload}.{signature}"),
        })
    }

    fn verify_at(&self, credential: &str, now: i64) -> Result<Identity, AppError> {
        let (payload, signature) = credential
            .trim()
            .split_once('.')
            .ok_or(AppError::InvalidCredential)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AppError::InvalidCredential)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::InvalidCredential)?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(AppError::InvalidCredential)?;

        if now >= claims.exp {
            return Err(AppError::InvalidCredential);
        }

        Ok(Identity {
            credential_id: claims.sub,
            display_name: claims.name,
            expires_at: claims.exp,
        })
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| AppError::InternalError(e.to_string().into()))
    }
}
