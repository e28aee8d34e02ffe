//! Cart endpoints: create, pull, update, delete, payment methods.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use svb_spree::{find_included, find_included_of_type, JsonApiDocument, JsonApiSingle};

use super::{ok, order_token, AppState, Envelope, ProxyError};

/// Side-loads needed to rebuild storefront line items from a cart response.
const CART_INCLUDES: &str =
    "line_items,line_items.variant,line_items.variant.product,line_items.variant.product.option_types";

#[derive(Debug, Deserialize)]
pub(super) struct CartQuery {
    #[serde(rename = "cartId")]
    cart_id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CartItemBody {
    #[serde(rename = "cartItem")]
    cart_item: CartItem,
}

#[derive(Debug, Deserialize)]
struct CartItem {
    sku: Option<String>,
    #[serde(default)]
    qty: u32,
    item_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct PaymentMethod {
    code: String,
    title: String,
}

pub(super) async fn create(
    State(state): State<AppState>,
) -> Result<Json<Envelope<String>>, ProxyError> {
    tracing::info!("fetching new cart token for guest user");
    let cart = state
        .spree
        .create_cart()
        .await
        .map_err(|e| ProxyError::new("cart create", &e))?;
    let token = cart
        .data
        .attr_str("token")
        .ok_or_else(|| ProxyError("cart response carries no token".to_string()))?;
    Ok(ok(token.to_string()))
}

pub(super) async fn pull(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
) -> Result<Json<Envelope<Vec<Value>>>, ProxyError> {
    let token = order_token(&headers, query.token.as_deref())?;
    let cart_id = query.cart_id.unwrap_or_default();

    let cart = state
        .spree
        .show_cart(&token, Some(CART_INCLUDES))
        .await
        .map_err(|e| ProxyError::new("cart pull", &e))?;

    let line_items = find_included_of_type(&cart.included, &cart.data, "line_items");
    let result = line_items
        .iter()
        .filter_map(|line_item| convert_line_item(&cart, line_item, &cart_id))
        .collect();
    Ok(ok(result))
}

pub(super) async fn payment_methods(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
) -> Result<Json<Envelope<Vec<PaymentMethod>>>, ProxyError> {
    let token = order_token(&headers, query.token.as_deref())?;
    let page = state
        .spree
        .payment_methods(&token)
        .await
        .map_err(|e| ProxyError::new("payment methods", &e))?;

    let methods = page
        .data
        .iter()
        .map(|method| PaymentMethod {
            code: method.id.clone(),
            title: method.attr_str("name").unwrap_or_default().to_string(),
        })
        .collect();
    Ok(ok(methods))
}

pub(super) async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
    Json(body): Json<CartItemBody>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let token = order_token(&headers, query.token.as_deref())?;
    let cart_id = query.cart_id.unwrap_or_default();
    let item = body.cart_item;

    let cart = if let Some(line_item_id) = &item.item_id {
        tracing::info!(line_item_id, qty = item.qty, "updating line item quantity");
        state
            .spree
            .set_quantity(&token, line_item_id, item.qty, Some(CART_INCLUDES))
            .await
            .map_err(|e| ProxyError::new("cart update", &e))?
    } else {
        let sku = item
            .sku
            .as_deref()
            .ok_or_else(|| ProxyError("cart update without sku or item_id".to_string()))?;
        tracing::info!(sku, qty = item.qty, "adding variant to cart");
        let variant = state
            .spree
            .variant_from_sku(sku)
            .await
            .map_err(|e| ProxyError::new("variant lookup", &e))?;
        state
            .spree
            .add_item(&token, &variant.data.id, item.qty, Some(CART_INCLUDES))
            .await
            .map_err(|e| ProxyError::new("cart add item", &e))?
    };

    // Answer with the line item that was touched, identified by its variant
    // SKU (set_quantity responses carry it on the line item itself).
    let line_items = find_included_of_type(&cart.included, &cart.data, "line_items");
    let touched = line_items
        .iter()
        .find(|line_item| match (&item.sku, &item.item_id) {
            (_, Some(line_item_id)) => &line_item.id == line_item_id,
            (Some(sku), None) => line_item_variant(&cart, line_item)
                .is_some_and(|variant| variant.attr_str("sku") == Some(sku)),
            (None, None) => false,
        })
        .and_then(|line_item| convert_line_item(&cart, line_item, &cart_id))
        .ok_or_else(|| ProxyError("updated line item not present in cart response".to_string()))?;

    Ok(ok(touched))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
    Json(body): Json<CartItemBody>,
) -> Result<Json<Envelope<bool>>, ProxyError> {
    let token = order_token(&headers, query.token.as_deref())?;
    let line_item_id = body
        .cart_item
        .item_id
        .ok_or_else(|| ProxyError("cart delete without item_id".to_string()))?;

    state
        .spree
        .remove_line_item(&token, &line_item_id)
        .await
        .map_err(|e| ProxyError::new("cart delete", &e))?;
    tracing::info!(line_item_id, "removed line item from cart");
    Ok(ok(true))
}

fn line_item_variant<'a>(
    cart: &'a JsonApiSingle,
    line_item: &JsonApiDocument,
) -> Option<&'a JsonApiDocument> {
    let variant_ref = line_item.relationship_ref("variant")?;
    find_included(&cart.included, &variant_ref.kind, &variant_ref.id)
}

/// Rebuilds one storefront line item from a cart response.
fn convert_line_item(
    cart: &JsonApiSingle,
    line_item: &JsonApiDocument,
    cart_id: &str,
) -> Option<Value> {
    let variant = line_item_variant(cart, line_item)?;
    let product_ref = variant.relationship_ref("product")?;
    let product = find_included(&cart.included, &product_ref.kind, &product_ref.id)?;
    let option_types = find_included_of_type(&cart.included, product, "option_types");

    let price = line_item.attr_f64("price");
    let mut item = json!({
        "item_id": line_item.id,
        "name": line_item.attr_str("name"),
        "price": price,
        "price_incl_tax": price,
        "discount_amount": line_item.attr_f64("promo_total").map(f64::abs),
        "row_total": price,
        "row_total_incl_tax": price,
        "product_type": if product.relationship_refs("variants").is_empty() {
            "simple"
        } else {
            "configurable"
        },
        "qty": line_item.attr_i64("quantity"),
        "quote_id": cart_id,
        "sku": variant.attr_str("sku"),
    });

    // Selected option values, for configurable products.
    let selections: Vec<Value> = variant
        .relationship_refs("option_values")
        .iter()
        .filter_map(|value_ref| {
            let option_type = option_types.iter().find(|option_type| {
                option_type
                    .relationship_refs("option_values")
                    .iter()
                    .any(|candidate| candidate.id == value_ref.id)
            })?;
            Some(json!({
                "option_id": option_type.id,
                "option_value": value_ref.id
            }))
        })
        .collect();
    if !selections.is_empty() {
        item["extension_attributes"] = json!({"configurable_item_options": selections});
    }

    Some(item)
}
