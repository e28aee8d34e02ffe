//! Cart/checkout proxy surface.
//!
//! Every endpoint forwards to the Spree storefront API and wraps the result
//! in the `{code, result}` envelope the storefront expects. Failures keep the
//! envelope with `code = 500` and a null result.

mod cart;
mod stock;

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use svb_core::StoresFile;
use svb_spree::{SpreeClient, SpreeError};

use crate::middleware::{ensure_store_currency, resolve_store};

#[derive(Clone)]
pub struct AppState {
    pub spree: Arc<SpreeClient>,
    pub stores: Arc<StoresFile>,
}

/// The response envelope used by every proxy endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: u16,
    pub result: Option<T>,
}

pub(crate) fn ok<T: Serialize>(result: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: 200,
        result: Some(result),
    })
}

/// A proxy failure: logged, then rendered as a 500 with a null result.
#[derive(Debug)]
pub struct ProxyError(pub String);

impl ProxyError {
    pub(crate) fn new(context: &str, error: &SpreeError) -> Self {
        tracing::error!(context, %error, "upstream request failed");
        ProxyError(context.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Envelope::<serde_json::Value> {
                code: 500,
                result: None,
            }),
        )
            .into_response()
    }
}

/// Pulls the guest order token from the `token` query parameter, falling
/// back to the `X-Spree-Order-Token` header.
pub(crate) fn order_token(
    headers: &HeaderMap,
    token_param: Option<&str>,
) -> Result<String, ProxyError> {
    if let Some(token) = token_param {
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }
    headers
        .get("X-Spree-Order-Token")
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            tracing::error!("request carries no order token");
            ProxyError("missing order token".to_string())
        })
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-spree-order-token"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/cart/create", post(cart::create))
        .route("/api/cart/pull", get(cart::pull))
        .route("/api/cart/payment-methods", get(cart::payment_methods))
        .route("/api/cart/update", post(cart::update))
        .route("/api/cart/delete", post(cart::delete))
        .route("/api/stock/check", get(stock::check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    resolve_store,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    ensure_store_currency,
                )),
        )
        .with_state(state)
}
