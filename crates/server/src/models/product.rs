//! Product catalogue.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{Money, ProductId};

/// A product a tenant sells.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
