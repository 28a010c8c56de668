//! # Customer Repository
//!
//! The subject directory documents are attached to.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use tally_core::Customer;

use crate::error::DbResult;
use crate::store::CustomerDirectory;

/// Repository for customer operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer. Duplicate codes fail with `UniqueViolation`.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(code = %customer.code, "Inserting customer");

        sqlx::query("INSERT INTO customers (code, name, tax_id, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&customer.code)
            .bind(&customer.name)
            .bind(&customer.tax_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Counts customers (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl CustomerDirectory for CustomerRepository {
    async fn find_customer(&self, code: &str) -> DbResult<Option<Customer>> {
        let customer: Option<Customer> =
            sqlx::query_as("SELECT code, name, tax_id FROM customers WHERE code = ?1")
                .bind(code.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(customer)
    }
}
