/*
 * Responsibility
 * - products の業務ルール (名前の検証, ページングの正規化)
 * - 永続化は ProductRepository 経由 (実装には依存しない)
 */
use std::sync::Arc;

use thiserror::Error;

use crate::repos::{ProductRepository, ProductRow, RepoError};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("price must be a non-negative number")]
    InvalidPrice,
    #[error("product not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Normalized pagination: `page >= 1`, `page_size` in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page
            .filter(|p| *p >= 1)
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(1);
        let page_size = page_size
            .filter(|s| (1..=i64::from(MAX_PAGE_SIZE)).contains(s))
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }
}

#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
}

impl std::fmt::Debug for ProductService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductService").finish_non_exhaustive()
    }
}

fn validated_name(name: &str) -> Result<&str, ProductError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProductError::EmptyName);
    }
    Ok(name)
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, name: &str, price: f64) -> Result<ProductRow, ProductError> {
        let name = validated_name(name)?;
        if !price.is_finite() || price < 0.0 {
            return Err(ProductError::InvalidPrice);
        }
        Ok(self.repo.save(name, price).await?)
    }

    pub async fn list(&self, page: Page) -> Result<Vec<ProductRow>, ProductError> {
        Ok(self.repo.find_all(page.page, page.page_size).await?)
    }

    pub async fn get(&self, id: i64) -> Result<ProductRow, ProductError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(ProductError::NotFound)
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<ProductRow, ProductError> {
        let name = validated_name(name)?;
        self.repo
            .update(id, name)
            .await?
            .ok_or(ProductError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ProductError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(ProductError::NotFound)
        }
    }
}
