//! Demo catalog for local runs against the in-memory store.

use common::{Money, Product};
use domain::{CatalogService, DomainError};
use store::Store;

const DEMO_PRODUCTS: &[(&str, i64, u32, &str)] = &[
    ("Ceramic Mug", 1_200, 40, "/images/mug.jpg"),
    ("Canvas Tote", 1_850, 25, "/images/tote.jpg"),
    ("Desk Lamp", 4_999, 10, "/images/lamp.jpg"),
    ("Notebook Set", 950, 60, "/images/notebooks.jpg"),
    ("Wireless Mouse", 2_999, 15, "/images/mouse.jpg"),
];

/// Inserts the demo products and returns them.
pub async fn seed_demo_catalog<S: Store>(
    catalog: &CatalogService<S>,
) -> Result<Vec<Product>, DomainError> {
    let mut products = Vec::with_capacity(DEMO_PRODUCTS.len());
    for (name, cents, stock, image) in DEMO_PRODUCTS {
        let product = Product::new(*name, Money::from_cents(*cents), *stock)
            .with_images(vec![image.to_string()]);
        products.push(catalog.upsert_product(product).await?);
    }
    tracing::info!(count = products.len(), "seeded demo catalog");
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    #[tokio::test]
    async fn test_seed_inserts_active_products() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let products = seed_demo_catalog(&catalog).await.unwrap();

        assert_eq!(products.len(), DEMO_PRODUCTS.len());
        assert!(products.iter().all(|p| p.is_active && p.stock > 0));
        assert_eq!(products[0].primary_image(), Some("/images/mug.jpg"));
    }
}
