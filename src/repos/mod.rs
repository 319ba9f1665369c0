/*
 * Responsibility
 * - 永続化層の公開窓口 (契約 + 実装)
 */
pub mod error;
pub mod memory;
pub mod product_repo;

pub use error::RepoError;
pub use memory::InMemoryProductRepository;
pub use product_repo::{PgProductRepository, ProductRepository, ProductRow};
