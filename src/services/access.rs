use crate::services::resolver::ResolvedResource;
use argon2::{Argon2, PasswordVerifier};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// The resource is reachable but a password must be supplied. A distinct
    /// protocol step for the client, not a denial.
    ChallengePassword,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Expired,
    /// Private file with no password set: unreachable by design.
    PrivateNoPassword,
    BadPassword,
}

/// Decides whether a resolved resource may be served. Pure: mutates nothing;
/// counter increments and analytics happen caller-side on Allow only.
///
/// Expiry is compared in UTC against the same clock the timestamps were
/// stored with.
pub fn evaluate(
    resource: &ResolvedResource,
    now: DateTime<Utc>,
    supplied_password: Option<&str>,
) -> AccessDecision {
    let expires_at = match resource {
        ResolvedResource::Link(link) => link.expires_at,
        ResolvedResource::File(file) => file.expires_at,
    };
    if let Some(expires_at) = expires_at {
        if now > expires_at {
            return AccessDecision::Deny(DenyReason::Expired);
        }
    }

    let file = match resource {
        // Links carry no visibility or password gate
        ResolvedResource::Link(_) => return AccessDecision::Allow,
        ResolvedResource::File(file) => file,
    };

    if file.is_public {
        return AccessDecision::Allow;
    }

    match (&file.password_hash, supplied_password) {
        (None, _) => AccessDecision::Deny(DenyReason::PrivateNoPassword),
        (Some(_), None) => AccessDecision::ChallengePassword,
        (Some(hash), Some(password)) => {
            if verify_password(password, hash) {
                AccessDecision::Allow
            } else {
                AccessDecision::Deny(DenyReason::BadPassword)
            }
        }
    }
}

/// Argon2 comparison, same adaptive scheme as user passwords. A hash that
/// fails to parse denies rather than erroring: stored data problems must not
/// open access.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match argon2::PasswordHash::new(hash) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("Unparseable password hash in store: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
