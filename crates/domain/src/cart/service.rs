//! Cart service operating on the principal's own cart.

use common::{Cart, Principal, ProductId, Role};
use store::{Store, StoreError};

use super::{CartError, CartLineView, CartView};
use crate::error::DomainError;

/// Service for managing carts.
///
/// Every operation acts on the cart owned by the calling principal and
/// returns the resulting cart priced against the live catalog.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product, merging with an existing line. A customer's first add
    /// registers them for the dashboard count; admins are never counted.
    #[tracing::instrument(skip(self, principal), fields(customer_id = %principal.id))]
    pub async fn add(
        &self,
        principal: &Principal,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        ensure_quantity(quantity)?;

        let cart = self
            .store
            .add_cart_item(principal.id, product_id, quantity)
            .await
            .map_err(|e| match e {
                StoreError::ProductNotFound(id) => CartError::ProductNotFound(id).into(),
                other => DomainError::Store(other),
            })?;
        if principal.role == Role::Customer {
            self.store.register_customer(principal.id).await?;
        }

        self.price(&cart).await
    }

    /// Removes a product. Removing an absent product is not an error.
    #[tracing::instrument(skip(self, principal), fields(customer_id = %principal.id))]
    pub async fn remove(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> Result<CartView, DomainError> {
        let cart = self.store.remove_cart_item(principal.id, product_id).await?;
        self.price(&cart).await
    }

    /// Overwrites the quantity of a product already in the cart.
    #[tracing::instrument(skip(self, principal), fields(customer_id = %principal.id))]
    pub async fn set_quantity(
        &self,
        principal: &Principal,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        ensure_quantity(quantity)?;

        let cart = self
            .store
            .set_cart_item_quantity(principal.id, product_id, quantity)
            .await
            .map_err(|e| match e {
                StoreError::CartItemNotFound { product_id } => {
                    CartError::ItemNotFound(product_id).into()
                }
                other => DomainError::Store(other),
            })?;

        self.price(&cart).await
    }

    /// Returns the cart with live names, prices and totals.
    #[tracing::instrument(skip(self, principal), fields(customer_id = %principal.id))]
    pub async fn view(&self, principal: &Principal) -> Result<CartView, DomainError> {
        let cart = self.store.get_cart(principal.id).await?;
        self.price(&cart).await
    }

    async fn price(&self, cart: &Cart) -> Result<CartView, DomainError> {
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = self.store.get_product(item.product_id).await?;
            lines.push(CartLineView::new(
                item.product_id,
                item.quantity,
                product.as_ref(),
            ));
        }
        Ok(CartView::new(cart, lines))
    }
}

fn ensure_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::InvalidQuantity { quantity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, Product, UserId};
    use store::{CartStore, InMemoryStore, InventoryStore};

    async fn setup() -> (CartService<InMemoryStore>, InMemoryStore, Principal, Product) {
        let store = InMemoryStore::new();
        let product = store
            .upsert_product(Product::new("Notebook", Money::from_cents(450), 20))
            .await
            .unwrap();
        (
            CartService::new(store.clone()),
            store,
            Principal::customer(UserId::new()),
            product,
        )
    }

    #[tokio::test]
    async fn test_add_merges_quantities() {
        let (service, _, principal, product) = setup().await;

        service.add(&principal, product.id, 2).await.unwrap();
        let view = service.add(&principal, product.id, 3).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 5);
        assert_eq!(view.items[0].item_total, Money::from_cents(2_250));
        assert_eq!(view.total_price, Money::from_cents(2_250));
    }

    #[tokio::test]
    async fn test_add_rejects_zero_and_unknown_products() {
        let (service, _, principal, product) = setup().await;

        let err = service.add(&principal, product.id, 0).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Cart(CartError::InvalidQuantity { quantity: 0 })
        ));

        let unknown = ProductId::new();
        let err = service.add(&principal, unknown, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Cart(CartError::ProductNotFound(id)) if id == unknown
        ));
    }

    #[tokio::test]
    async fn test_set_quantity_requires_existing_line() {
        let (service, _, principal, product) = setup().await;

        let err = service
            .set_quantity(&principal, product.id, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Cart(CartError::ItemNotFound(_))
        ));

        service.add(&principal, product.id, 1).await.unwrap();
        let view = service.set_quantity(&principal, product.id, 4).await.unwrap();
        assert_eq!(view.items[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (service, _, principal, product) = setup().await;

        service.add(&principal, product.id, 1).await.unwrap();
        assert!(service.remove(&principal, product.id).await.unwrap().is_empty());
        assert!(service.remove(&principal, product.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_customers_are_registered() {
        let (service, store, principal, product) = setup().await;
        let admin = Principal::admin(UserId::new());

        service.add(&admin, product.id, 1).await.unwrap();
        assert_eq!(store.customer_count().await.unwrap(), 0);

        service.add(&principal, ProductId::new(), 1).await.unwrap_err();
        assert_eq!(store.customer_count().await.unwrap(), 0);

        service.add(&principal, product.id, 1).await.unwrap();
        service.add(&principal, product.id, 1).await.unwrap();
        assert_eq!(store.customer_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_view_uses_live_prices() {
        let (service, store, principal, mut product) = setup().await;

        service.add(&principal, product.id, 2).await.unwrap();
        product.price = Money::from_cents(500);
        store.upsert_product(product.clone()).await.unwrap();

        let view = service.view(&principal).await.unwrap();
        assert_eq!(view.items[0].price, Some(Money::from_cents(500)));
        assert_eq!(view.total_price, Money::from_cents(1_000));
    }
}
