//! Stock lookup by variant SKU.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{ok, AppState, Envelope, ProxyError};

#[derive(Debug, Deserialize)]
pub(super) struct StockQuery {
    sku: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StockStatus {
    is_in_stock: bool,
    product_id: String,
}

pub(super) async fn check(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
) -> Result<Json<Envelope<StockStatus>>, ProxyError> {
    let variant = state
        .spree
        .variant_from_sku(&query.sku)
        .await
        .map_err(|e| ProxyError::new("stock check", &e))?;

    tracing::info!(sku = %query.sku, variant = %variant.data.id, "variant found");
    Ok(ok(StockStatus {
        is_in_stock: variant.data.attr_bool("in_stock").unwrap_or(false),
        product_id: variant.data.id.clone(),
    }))
}
