//! Verification token model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How long an issued token stays redeemable
pub const TOKEN_TTL_DAYS: i64 = 14;

/// Single-use, time-limited credential proving control of an email address
///
/// Issued on registration and on account-deletion requests. Consumed
/// (deleted) on successful redemption; issuing a new token does not
/// invalidate outstanding ones.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationToken {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Mint a fresh token for an email address
    pub fn issue(email: &str) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            expires_at: now + Duration::days(TOKEN_TTL_DAYS),
            created_at: now,
        }
    }

    /// Whether the token is still redeemable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_sets_expiry_two_weeks_out() {
        let token = VerificationToken::issue("a@x.com");
        assert_eq!(token.email, "a@x.com");
        assert_eq!(token.token.len(), 32);
        assert!(token.token.chars().all(|c| c.is_ascii_hexdigit()));

        let lifetime = token.expires_at - token.created_at;
        assert_eq!(lifetime.num_days(), TOKEN_TTL_DAYS);
    }

    #[test]
    fn test_validity_window() {
        let token = VerificationToken::issue("a@x.com");
        assert!(token.is_valid_at(Utc::now()));
        assert!(!token.is_valid_at(Utc::now() + Duration::days(TOKEN_TTL_DAYS + 1)));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = VerificationToken::issue("a@x.com");
        let b = VerificationToken::issue("a@x.com");
        assert_ne!(a.token, b.token);
    }
}
