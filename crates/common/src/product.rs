//! Catalog product record as seen by the order core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId};

/// A sellable product with its stock counter.
///
/// The catalog owns name, images, price and the active flag. The order core
/// only reads those and mutates `stock` through the inventory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub images: Vec<String>,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product with no images.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            name: name.into(),
            images: Vec::new(),
            price,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// The image reference captured into order snapshots.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Returns true if the product can be sold in the given quantity right now.
    pub fn can_fulfil(&self, quantity: u32) -> bool {
        self.is_active && self.stock >= quantity
    }
}
