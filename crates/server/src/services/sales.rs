//! Line-item pricing for quotations and orders.

use std::collections::HashMap;

use sqlx::PgPool;

use parley_core::{ProductId, UserId};

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::{NewLineItem, PricedLine, Product};

/// Largest quantity accepted on one line.
pub const MAX_QUANTITY: i64 = 100_000;

/// Most lines accepted on one document.
pub const MAX_LINES: usize = 200;

/// Resolve requested lines into priced lines.
///
/// A line naming a product takes its description and price from the catalog
/// unless the request overrides them. Free-form lines need both.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an empty or oversized list, a quantity
/// outside `1..=MAX_QUANTITY`, a missing description or price, a product
/// that does not belong to the tenant, or a line or document total above
/// `Money::MAX`.
pub async fn price_lines(
    pool: &PgPool,
    user_id: UserId,
    items: &[NewLineItem],
) -> Result<Vec<PricedLine>, AppError> {
    check_shape(items)?;

    let products = ProductRepository::new(pool);
    let mut catalog: HashMap<ProductId, Product> = HashMap::new();
    for id in items.iter().filter_map(|item| item.product_id) {
        if catalog.contains_key(&id) {
            continue;
        }
        let product = products
            .get(user_id, id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("unknown product {id}")))?;
        catalog.insert(id, product);
    }

    let lines = items
        .iter()
        .enumerate()
        .map(|(i, item)| price_line(i, item, item.product_id.and_then(|id| catalog.get(&id))))
        .collect::<Result<Vec<_>, _>>()?;
    PricedLine::total(&lines)?;
    Ok(lines)
}

fn check_shape(items: &[NewLineItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest("at least one item is required".to_owned()));
    }
    if items.len() > MAX_LINES {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_LINES} items are allowed"
        )));
    }
    Ok(())
}

fn price_line(
    index: usize,
    item: &NewLineItem,
    product: Option<&Product>,
) -> Result<PricedLine, AppError> {
    let line = index + 1;

    if !(1..=MAX_QUANTITY).contains(&item.quantity) {
        return Err(AppError::BadRequest(format!(
            "item {line}: quantity must be between 1 and {MAX_QUANTITY}"
        )));
    }
    let quantity = u32::try_from(item.quantity)
        .map_err(|_| AppError::BadRequest(format!("item {line}: quantity out of range")))?;

    let description = item
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned)
        .or_else(|| product.map(|p| p.name.clone()))
        .ok_or_else(|| AppError::BadRequest(format!("item {line}: description is required")))?;

    let unit_price = item
        .unit_price
        .or_else(|| product.map(|p| p.price))
        .ok_or_else(|| AppError::BadRequest(format!("item {line}: unit_price is required")))?;

    let priced = PricedLine {
        product_id: item.product_id,
        description,
        quantity,
        unit_price,
    };
    priced
        .line_total()
        .map_err(|e| AppError::BadRequest(format!("item {line}: {e}")))?;
    Ok(priced)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use parley_core::Money;

    use super::*;

    fn money(s: &str) -> Money {
        Money::new(s.parse().unwrap()).unwrap()
    }

    fn product() -> Product {
        Product {
            id: ProductId::new(3),
            name: "Mango crate".to_string(),
            description: None,
            price: money("12.50"),
            sku: Some("MG-1".to_string()),
            image_url: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(product_id: Option<i32>, description: Option<&str>, qty: i64, price: Option<&str>) -> NewLineItem {
        NewLineItem {
            product_id: product_id.map(ProductId::new),
            description: description.map(str::to_string),
            quantity: qty,
            unit_price: price.map(money),
        }
    }

    #[test]
    fn test_product_line_uses_catalog_defaults() {
        let p = product();
        let line = price_line(0, &item(Some(3), None, 2, None), Some(&p)).unwrap();
        assert_eq!(line.description, "Mango crate");
        assert_eq!(line.unit_price, money("12.50"));
        assert_eq!(line.line_total().unwrap(), money("25.00"));
    }

    #[test]
    fn test_request_overrides_catalog() {
        let p = product();
        let line = price_line(0, &item(Some(3), Some("Discounted"), 1, Some("10")), Some(&p)).unwrap();
        assert_eq!(line.description, "Discounted");
        assert_eq!(line.unit_price, money("10"));
    }

    #[test]
    fn test_free_form_line_needs_description_and_price() {
        assert!(price_line(0, &item(None, None, 1, Some("1")), None).is_err());
        assert!(price_line(0, &item(None, Some("   "), 1, Some("1")), None).is_err());
        assert!(price_line(0, &item(None, Some("Delivery"), 1, None), None).is_err());
        assert!(price_line(0, &item(None, Some("Delivery"), 1, Some("0")), None).is_ok());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(price_line(0, &item(None, Some("x"), 0, Some("1")), None).is_err());
        assert!(price_line(0, &item(None, Some("x"), -4, Some("1")), None).is_err());
        assert!(price_line(0, &item(None, Some("x"), MAX_QUANTITY + 1, Some("1")), None).is_err());
        assert!(price_line(0, &item(None, Some("x"), MAX_QUANTITY, Some("1")), None).is_ok());
    }

    #[test]
    fn test_line_total_past_bound_rejected() {
        let err = price_line(
            0,
            &item(None, Some("x"), MAX_QUANTITY, Some("9999999999.99")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("item 1:")));
    }

    #[test]
    fn test_empty_list_rejected() {
        assert!(matches!(check_shape(&[]), Err(AppError::BadRequest(_))));
    }
}
