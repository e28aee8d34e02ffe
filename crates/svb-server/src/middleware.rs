//! Multi-store request middleware.
//!
//! `resolve_store` maps the `storeCode` query parameter onto the configured
//! store list (default store when absent) and stores the result as a request
//! extension. `ensure_store_currency` then makes the order's currency match
//! the resolved store before the handler proxies anything, switching the
//! cart currency upstream when it differs.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use svb_core::StoreConfig;

use crate::api::{AppState, ProxyError};

/// The store a request resolved to. `store` is `None` in single-store
/// deployments.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub store: Option<StoreConfig>,
    pub multi_store: bool,
}

fn query_param(request: &Request, name: &str) -> Option<String> {
    let query = request.uri().query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

fn store_error(message: &str) -> Response {
    tracing::error!(message, "store resolution failed");
    ProxyError(message.to_string()).into_response()
}

pub async fn resolve_store(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let store_code = query_param(&request, "storeCode");

    let context = match store_code {
        None => {
            if state.stores.is_multi_store() {
                match state.stores.default_store() {
                    Ok(Some(store)) => StoreContext {
                        store: Some(store.clone()),
                        multi_store: true,
                    },
                    Ok(None) | Err(_) => {
                        return store_error(
                            "a default store identifier is required when using multi store",
                        );
                    }
                }
            } else {
                StoreContext {
                    store: None,
                    multi_store: false,
                }
            }
        }
        Some(code) => {
            if !state.stores.is_multi_store() {
                return store_error("storeCode given but no multi store configuration exists");
            }
            match state.stores.find(&code) {
                Some(store) => StoreContext {
                    store: Some(store.clone()),
                    multi_store: true,
                },
                None => return store_error("storeCode not recognized"),
            }
        }
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

pub async fn ensure_store_currency(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(context) = request.extensions().get::<StoreContext>().cloned() else {
        return next.run(request).await;
    };
    if !context.multi_store {
        return next.run(request).await;
    }
    let Some(store_currency) = context.store.as_ref().and_then(|s| s.spree_currency.clone())
    else {
        return next.run(request).await;
    };

    // Requests without a token (cart creation) have no order to align yet.
    let token = query_param(&request, "token").or_else(|| {
        request
            .headers()
            .get("X-Spree-Order-Token")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });
    let Some(token) = token else {
        return next.run(request).await;
    };

    let cart = match state.spree.show_cart(&token, None).await {
        Ok(cart) => cart,
        Err(error) => {
            tracing::error!(%error, "cannot retrieve cart for currency check");
            return ProxyError("cart currency check failed".to_string()).into_response();
        }
    };

    let cart_currency = cart.data.attr_str("currency").unwrap_or_default();
    if cart_currency != store_currency {
        tracing::info!(
            cart_currency,
            store_currency,
            "cart currency differs from store, updating"
        );
        if let Err(error) = state.spree.set_currency(&token, &store_currency).await {
            tracing::error!(%error, "currency update failed");
            return ProxyError("currency update failed".to_string()).into_response();
        }
    }

    next.run(request).await
}
