use common::{Cart, Money, Product, ProductId};
use serde::Serialize;

/// One cart line priced against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub price: Option<Money>,
    pub image: Option<String>,
    pub quantity: u32,
    pub item_total: Money,
    /// False when the product is gone or deactivated. Such lines add
    /// nothing to the total.
    pub available: bool,
}

impl CartLineView {
    pub(crate) fn new(product_id: ProductId, quantity: u32, product: Option<&Product>) -> Self {
        match product {
            Some(product) => {
                let available = product.is_active;
                Self {
                    product_id,
                    name: Some(product.name.clone()),
                    price: Some(product.price),
                    image: product.primary_image().map(str::to_string),
                    quantity,
                    item_total: if available {
                        product.price.multiply(quantity)
                    } else {
                        Money::zero()
                    },
                    available,
                }
            }
            None => Self {
                product_id,
                name: None,
                price: None,
                image: None,
                quantity,
                item_total: Money::zero(),
                available: false,
            },
        }
    }
}

/// A cart as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_price: Money,
    pub version: u64,
}

impl CartView {
    pub(crate) fn new(cart: &Cart, items: Vec<CartLineView>) -> Self {
        let total_price = items.iter().map(|line| line.item_total).sum();
        Self {
            items,
            total_price,
            version: cart.version,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
