/*
 * Responsibility
 * - products の永続化契約 (ProductRepository) と Postgres 実装
 * - 削除は soft delete (deleted_at)。削除済みは一覧/取得/更新の対象外
 * - name は未削除の行の中で一意
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::error::RepoError;

pub type Result<T> = std::result::Result<T, RepoError>;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn save(&self, name: &str, price: f64) -> Result<ProductRow>;

    /// `page` starts at 1. Ordered by id.
    async fn find_all(&self, page: u32, page_size: u32) -> Result<Vec<ProductRow>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRow>>;

    /// `None` when the product does not exist (or was deleted).
    async fn update(&self, id: i64, name: &str) -> Result<Option<ProductRow>>;

    /// `false` when there was nothing to delete.
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the table and indexes if they are missing.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                price DOUBLE PRECISION NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                deleted_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS products_name_live_key
            ON products (name)
            WHERE deleted_at IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn save(&self, name: &str, price: f64) -> Result<ProductRow> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (name, price)
            VALUES ($1, $2)
            RETURNING id, name, price, created_at, updated_at, deleted_at
            "#,
        )
        .bind(name)
        .bind(price)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn find_all(&self, page: u32, page_size: u32) -> Result<Vec<ProductRow>> {
        let limit = i64::from(page_size);
        let offset = i64::from(page.saturating_sub(1)) * limit;

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, price, created_at, updated_at, deleted_at
            FROM products
            WHERE deleted_at IS NULL
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRow>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, price, created_at, updated_at, deleted_at
            FROM products
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update(&self, id: i64, name: &str) -> Result<Option<ProductRow>> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE products
            SET name = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, price, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
