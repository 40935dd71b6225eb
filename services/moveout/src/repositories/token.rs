//! Verification token repository

use anyhow::Result;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;

use crate::models::VerificationToken;

/// Verification token repository
#[derive(Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    /// Create a new token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a freshly issued token
    ///
    /// Outstanding tokens for the same email stay valid; nothing is
    /// invalidated on re-issue.
    pub async fn insert(&self, token: &VerificationToken) -> Result<()> {
        info!("Issuing verification token for {}", token.email);

        sqlx::query(
            r#"
            INSERT INTO verification_tokens (token, email, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token)
        .bind(&token.email)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find a matching, unexpired token
    pub async fn find_valid(&self, token: &str, email: &str) -> Result<Option<VerificationToken>> {
        let row = sqlx::query(
            r#"
            SELECT token, email, expires_at, created_at
            FROM verification_tokens
            WHERE token = $1 AND email = $2
            "#,
        )
        .bind(token)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| VerificationToken {
                token: row.get("token"),
                email: row.get("email"),
                expires_at: row.get("expires_at"),
                created_at: row.get("created_at"),
            })
            .filter(|token| token.is_valid_at(chrono::Utc::now())))
    }

    /// Consume a token after successful redemption
    pub async fn consume(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM verification_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Consume a token inside an open transaction
    pub async fn consume_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM verification_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
