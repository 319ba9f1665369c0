/*
 * Responsibility
 * - DATABASE_URL 未設定時 (開発 / テスト) の ProductRepository 実装
 * - Postgres 実装と同じ契約 (soft delete / name 一意 / id 昇順) を守る
 */
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::error::RepoError;
use super::product_repo::{ProductRepository, ProductRow, Result};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    rows: Vec<ProductRow>,
}

impl Store {
    fn name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.rows
            .iter()
            .any(|r| r.deleted_at.is_none() && r.name == name && Some(r.id) != except)
    }

    fn live_mut(&mut self, id: i64) -> Option<&mut ProductRow> {
        self.rows
            .iter_mut()
            .find(|r| r.id == id && r.deleted_at.is_none())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    store: RwLock<Store>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn save(&self, name: &str, price: f64) -> Result<ProductRow> {
        let mut store = self.store.write().await;
        if store.name_taken(name, None) {
            return Err(RepoError::Conflict);
        }

        store.next_id += 1;
        let now = Utc::now();
        let row = ProductRow {
            id: store.next_id,
            name: name.to_string(),
            price,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        store.rows.push(row.clone());
        Ok(row)
    }

    async fn find_all(&self, page: u32, page_size: u32) -> Result<Vec<ProductRow>> {
        let store = self.store.read().await;
        let skip = page.saturating_sub(1) as usize * page_size as usize;

        Ok(store
            .rows
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRow>> {
        let store = self.store.read().await;
        Ok(store
            .rows
            .iter()
            .find(|r| r.id == id && r.deleted_at.is_none())
            .cloned())
    }

    async fn update(&self, id: i64, name: &str) -> Result<Option<ProductRow>> {
        let mut store = self.store.write().await;
        if store.live_mut(id).is_none() {
            return Ok(None);
        }
        if store.name_taken(name, Some(id)) {
            return Err(RepoError::Conflict);
        }

        Ok(store.live_mut(id).map(|row| {
            row.name = name.to_string();
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut store = self.store.write().await;
        Ok(store
            .live_mut(id)
            .map(|row| row.deleted_at = Some(Utc::now()))
            .is_some())
    }
}
