//! Catalog edits that must not race with checkout.

use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductPatch};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::error::{AppError, AppResult};
use crate::repository::{categories, products};
use crate::state::AppState;

/// Applies an admin patch while holding the product row, so a sale that
/// decrements stock in the meantime is waited for instead of overwritten.
#[tracing::instrument(skip(state, patch))]
pub async fn update(state: &AppState, id: Uuid, patch: ProductPatch) -> AppResult<Product> {
    if let Some(category_id) = patch.category_id {
        if categories::find(&state.db, category_id).await?.is_none() {
            return Err(AppError::not_found("Category not found"));
        }
    }
    let stock_changed = patch.stock.is_some();

    let mut tx = state.db.begin().await?;
    let mut product = products::lock(&mut tx, id).await?.ok_or_else(|| AppError::not_found("Product not found"))?;
    product.apply(patch)?;
    let product = products::save(&mut tx, &product).await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, stock = product.stock, "product updated");
    if stock_changed {
        state
            .events
            .publish(vec![DomainEvent::Product(ProductEvent::StockAdjusted { product_id: product.id, stock: product.stock })])
            .await;
    }
    Ok(product)
}
