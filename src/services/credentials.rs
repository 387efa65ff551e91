use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::utils::auth::validate_jwt;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Session,
    ApiKey,
}

/// The identity shape every credential kind resolves to. Handlers read this
/// from request extensions and never branch on the kind unless they must.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub kind: CredentialKind,
}

pub struct CredentialService;

impl CredentialService {
    /// Ordered chain: the cheap, local session check first; only on failure
    /// the API-key storage lookup. Every failure mode collapses to `None` so
    /// callers cannot tell malformed from expired from unknown.
    pub async fn validate(
        db: &DatabaseConnection,
        jwt_secret: &str,
        bearer: &str,
    ) -> Result<Option<Identity>, AppError> {
        if let Some(identity) = Self::validate_session(db, jwt_secret, bearer).await? {
            return Ok(Some(identity));
        }
        Self::validate_api_key(db, bearer).await
    }

    /// Session tokens verify without storage access; the user row is then
    /// confirmed to still exist.
    pub async fn validate_session(
        db: &DatabaseConnection,
        jwt_secret: &str,
        bearer: &str,
    ) -> Result<Option<Identity>, AppError> {
        let Ok(claims) = validate_jwt(bearer, jwt_secret) else {
            return Ok(None);
        };

        let user = Users::find_by_id(&claims.sub).one(db).await?;
        Ok(user.map(|user| Identity {
            user_id: user.id,
            username: user.username,
            kind: CredentialKind::Session,
        }))
    }

    /// API keys are high-entropy, so a fast deterministic digest is enough
    /// for the lookup; no adaptive hashing on this hot path.
    pub async fn validate_api_key(
        db: &DatabaseConnection,
        key: &str,
    ) -> Result<Option<Identity>, AppError> {
        let key_hash = hash_api_key(key);

        let Some(record) = ApiKeys::find()
            .filter(api_keys::Column::KeyHash.eq(key_hash))
            .one(db)
            .await?
        else {
            return Ok(None);
        };

        if let Some(expires_at) = record.expires_at {
            if Utc::now() > expires_at {
                return Ok(None);
            }
        }

        let Some(user) = Users::find_by_id(&record.user_id).one(db).await? else {
            return Ok(None);
        };

        // Usage stamp is best-effort; the authentication decision stands
        // even if it cannot be recorded.
        let mut active: api_keys::ActiveModel = record.into();
        active.last_used_at = Set(Some(Utc::now()));
        if let Err(e) = active.update(db).await {
            tracing::warn!("Failed to stamp API key last_used_at: {}", e);
        }

        Ok(Some(Identity {
            user_id: user.id,
            username: user.username,
            kind: CredentialKind::ApiKey,
        }))
    }
}

/// 32 random bytes, hex encoded: the plaintext handed to the user once.
pub fn generate_api_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_hex_and_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_hash_is_deterministic_sha256() {
        assert_eq!(hash_api_key("abc"), hash_api_key("abc"));
        assert_ne!(hash_api_key("abc"), hash_api_key("abd"));
        // SHA-256 of "abc"
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
