//! Narrow catalog surface used by seeding, tests and the order paths.

use common::{Product, ProductId};
use store::Store;

use crate::error::DomainError;

/// Catalog maintenance over the inventory store.
///
/// Products are never deleted. Deactivation keeps the stock counter so
/// cancellations of old orders can still restore into it.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, DomainError> {
        Ok(self.store.get_product(id).await?)
    }

    /// Inserts a product or edits its catalog fields. Stock of an existing
    /// product is left alone; use [`CatalogService::restock`].
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn upsert_product(&self, product: Product) -> Result<Product, DomainError> {
        Ok(self.store.upsert_product(product).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<Product, DomainError> {
        Ok(self.store.deactivate_product(id).await?)
    }

    /// Adds units to a product's stock. Returns the new stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, id: ProductId, quantity: u32) -> Result<u32, DomainError> {
        let stock = self.store.increment_stock(id, quantity).await?;
        tracing::info!(%id, quantity, stock, "product restocked");
        Ok(stock)
    }
}
