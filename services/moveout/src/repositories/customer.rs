//! Customer repository for database operations

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::info;

use crate::models::{Customer, CustomerStatus, NewCustomer, Role};

const CUSTOMER_COLUMNS: &str =
    "customer_id, email, password_hash, status, role, created_at, updated_at";

fn map_customer(row: &PgRow) -> Result<Customer> {
    let status: String = row.get("status");
    let role: String = row.get("role");

    Ok(Customer {
        customer_id: row.get("customer_id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        status: CustomerStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("Unknown customer status: {}", status))?,
        role: Role::parse(&role).ok_or_else(|| anyhow::anyhow!("Unknown role: {}", role))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Customer repository
#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    /// Create a new customer repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new unverified customer with a hashed password
    pub async fn create(&self, new_customer: &NewCustomer) -> Result<Customer> {
        info!("Creating new customer: {}", new_customer.email);

        let password_hash = hash_password(&new_customer.password)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customer (email, password_hash, status)
            VALUES ($1, $2, 'unverified')
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&new_customer.email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        map_customer(&row)
    }

    /// Create a customer through the federated login path
    ///
    /// No password hash is stored and the account starts out verified.
    pub async fn create_verified(&self, email: &str) -> Result<Customer> {
        info!("Creating verified customer: {}", email);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customer (email, status)
            VALUES ($1, 'verified')
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        map_customer(&row)
    }

    /// Find a customer by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_customer).transpose()
    }

    /// Find a customer by ID
    pub async fn find_by_id(&self, customer_id: i64) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_customer).transpose()
    }

    /// List every customer, oldest first
    pub async fn list_all(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY customer_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_customer).collect()
    }

    /// Verified, role=user customers addressed by marketing broadcasts
    pub async fn list_marketing_recipients(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customer
            WHERE status = 'verified' AND role = 'user'
            ORDER BY customer_id
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_customer).collect()
    }

    /// Verify a customer's password against the stored hash
    ///
    /// Federated accounts without a hash never match.
    pub fn verify_password(&self, customer: &Customer, password: &str) -> Result<bool> {
        let Some(stored) = customer.password_hash.as_deref() else {
            return Ok(false);
        };

        let parsed_hash = PasswordHash::new(stored)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Transition a customer to verified by email
    pub async fn mark_verified(&self, email: &str) -> Result<()> {
        sqlx::query("UPDATE customer SET status = 'verified', updated_at = now() WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Set the account status
    pub async fn set_status(&self, customer_id: i64, status: CustomerStatus) -> Result<()> {
        sqlx::query("UPDATE customer SET status = $1, updated_at = now() WHERE customer_id = $2")
            .bind(status.as_str())
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Set the account role
    pub async fn set_role(&self, customer_id: i64, role: Role) -> Result<()> {
        sqlx::query("UPDATE customer SET role = $1, updated_at = now() WHERE customer_id = $2")
            .bind(role.as_str())
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Replace the stored password hash
    pub async fn update_password(&self, customer_id: i64, new_password: &str) -> Result<()> {
        info!("Updating password for customer {}", customer_id);

        let password_hash = hash_password(new_password)?;

        sqlx::query(
            "UPDATE customer SET password_hash = $1, updated_at = now() WHERE customer_id = $2",
        )
        .bind(&password_hash)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Hard-delete a customer row inside the account-deletion transaction
    pub async fn delete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        customer_id: i64,
    ) -> Result<()> {
        info!("Deleting customer {}", customer_id);

        sqlx::query("DELETE FROM customer WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("Passw0rd1").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();

        assert!(
            Argon2::default()
                .verify_password(b"Passw0rd1", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"WrongPass1", &parsed)
                .is_err()
        );
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Passw0rd1").unwrap();
        let b = hash_password("Passw0rd1").unwrap();
        assert_ne!(a, b);
    }
}
