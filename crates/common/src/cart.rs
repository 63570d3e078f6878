//! Per-customer shopping cart.

use serde::{Deserialize, Serialize};

use crate::{ProductId, UserId};

/// A product reference and the quantity the customer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A customer's cart.
///
/// Items are unique per product and kept in insertion order, which is the
/// order placement validates them in. `version` increases on every mutation
/// so placement can commit against exactly the cart it validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub customer_id: UserId,
    pub items: Vec<CartItem>,
    pub version: u64,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new(customer_id: UserId) -> Self {
        Self {
            customer_id,
            items: Vec::new(),
            version: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds a quantity of a product, merging into an existing line.
    ///
    /// Returns the line's new quantity.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> u32 {
        let new_quantity = match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = item.quantity.saturating_add(quantity);
                item.quantity
            }
            None => {
                self.items.push(CartItem {
                    product_id,
                    quantity,
                });
                quantity
            }
        };
        self.version += 1;
        new_quantity
    }

    /// Removes a product. Removing an absent product is a no-op.
    pub fn remove(&mut self, product_id: ProductId) {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() != before {
            self.version += 1;
        }
    }

    /// Overwrites the quantity of a product already in the cart.
    ///
    /// Returns false if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                self.version += 1;
                true
            }
            None => false,
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.version += 1;
    }
}
