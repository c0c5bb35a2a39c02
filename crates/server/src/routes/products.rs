//! Product catalog.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use parley_core::{Money, ProductId};

use super::{optional, required};
use crate::db::ProductRepository;
use crate::db::products::ProductFields;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::Product;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Only list active products.
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductRequest {
    fn into_fields(self) -> Result<ProductFields, AppError> {
        Ok(ProductFields {
            name: required("name", &self.name)?,
            description: optional(self.description),
            price: self.price,
            sku: optional(self.sku),
            image_url: optional(self.image_url),
            active: self.active,
        })
    }
}

/// GET /api/products
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = ProductRepository::new(state.pool())
        .list(tenant.id, query.active.unwrap_or(false))
        .await?;
    Ok(Json(products))
}

/// POST /api/products
///
/// # Errors
///
/// 400 for invalid fields (a negative price fails to deserialize).
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let fields = body.into_fields()?;
    let product = ProductRepository::new(state.pool())
        .create(tenant.id, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/products/{id}
///
/// # Errors
///
/// 404 for an unknown product.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get(tenant.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(product))
}

/// PUT /api/products/{id}
///
/// # Errors
///
/// 400 for invalid fields, 404 for an unknown product.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    let fields = body.into_fields()?;
    let product = ProductRepository::new(state.pool())
        .update(tenant.id, id, &fields)
        .await?;
    Ok(Json(product))
}

/// DELETE /api/products/{id}
///
/// # Errors
///
/// 404 for an unknown product.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    ProductRepository::new(state.pool())
        .delete(tenant.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
