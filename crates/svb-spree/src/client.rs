//! HTTP client for the Spree storefront API (v2).
//!
//! Covers the two surfaces the bridge needs: paginated catalog listings
//! (taxons, products) feeding the importers, and the cart/checkout endpoints
//! proxied by the server. Listing requests are idempotent per
//! `(page, per_page)` and retried with exponential backoff on transient
//! failures; cart mutations are never retried.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;

use crate::error::SpreeError;
use crate::retry::retry_with_backoff;
use crate::types::{JsonApiPage, JsonApiSingle};

/// Header carrying the guest order token on cart requests.
const ORDER_TOKEN_HEADER: &str = "X-Spree-Order-Token";

/// The `include` set used when resolving a variant by SKU.
const VARIANT_LOOKUP_INCLUDES: &str = "default_variant,variants";

pub struct SpreeClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl SpreeClient {
    /// Creates a client for the Spree instance at `base_url`.
    ///
    /// `max_retries` bounds the additional attempts after the first failure
    /// of a catalog listing request; set to `0` to disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`SpreeError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`SpreeError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, SpreeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise: a single trailing slash so joined paths extend the URL
        // instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SpreeError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches one page of the taxon (category) listing.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] after retries are exhausted.
    pub async fn list_taxons(&self, page: u32, per_page: u32) -> Result<JsonApiPage, SpreeError> {
        let url = self.storefront_url(
            "taxons",
            &[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
        );
        self.fetch_page(url).await
    }

    /// Fetches one page of the product listing with the given `include` set.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] after retries are exhausted.
    pub async fn list_products(
        &self,
        page: u32,
        per_page: u32,
        include: &str,
    ) -> Result<JsonApiPage, SpreeError> {
        let url = self.storefront_url(
            "products",
            &[
                ("include", include.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
        );
        self.fetch_page(url).await
    }

    /// Resolves a variant by SKU via the product listing filter.
    ///
    /// Returns the matching variant as the primary resource, with the
    /// product response's `included` set carried along so callers can chase
    /// relationships.
    ///
    /// # Errors
    ///
    /// Returns [`SpreeError::MissingResource`] when no product or no variant
    /// carries the SKU.
    pub async fn variant_from_sku(&self, sku: &str) -> Result<JsonApiSingle, SpreeError> {
        let url = self.storefront_url(
            "products",
            &[
                ("filter[skus]", sku.to_string()),
                ("include", VARIANT_LOOKUP_INCLUDES.to_string()),
                ("page", "1".to_string()),
                ("per_page", "1".to_string()),
            ],
        );
        let page = self.request_page(url).await?;

        if page.data.is_empty() {
            return Err(SpreeError::MissingResource {
                context: format!("no product with sku = {sku}"),
            });
        }

        let variant = page
            .included
            .iter()
            .find(|resource| resource.kind == "variant" && resource.attr_str("sku") == Some(sku))
            .cloned()
            .ok_or_else(|| SpreeError::MissingResource {
                context: format!("no variant with sku = {sku}"),
            })?;

        Ok(JsonApiSingle {
            data: variant,
            included: page.included,
        })
    }

    /// Creates a new guest cart. The order token is in
    /// `data.attributes.token` of the response.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn create_cart(&self) -> Result<JsonApiSingle, SpreeError> {
        let url = self.storefront_url("cart", &[]);
        self.request_single(Method::POST, url, None, None).await
    }

    /// Fetches the cart for `order_token`, optionally side-loading `include`.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn show_cart(
        &self,
        order_token: &str,
        include: Option<&str>,
    ) -> Result<JsonApiSingle, SpreeError> {
        let mut query = Vec::new();
        if let Some(include) = include {
            query.push(("include", include.to_string()));
        }
        let url = self.storefront_url("cart", &query);
        self.request_single(Method::GET, url, Some(order_token), None)
            .await
    }

    /// Adds `quantity` of `variant_id` to the cart.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn add_item(
        &self,
        order_token: &str,
        variant_id: &str,
        quantity: u32,
        include: Option<&str>,
    ) -> Result<JsonApiSingle, SpreeError> {
        let mut query = Vec::new();
        if let Some(include) = include {
            query.push(("include", include.to_string()));
        }
        let url = self.storefront_url("cart/add_item", &query);
        let body = serde_json::json!({
            "variant_id": variant_id,
            "quantity": quantity,
        });
        self.request_single(Method::POST, url, Some(order_token), Some(body))
            .await
    }

    /// Sets the quantity of an existing line item.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn set_quantity(
        &self,
        order_token: &str,
        line_item_id: &str,
        quantity: u32,
        include: Option<&str>,
    ) -> Result<JsonApiSingle, SpreeError> {
        let mut query = Vec::new();
        if let Some(include) = include {
            query.push(("include", include.to_string()));
        }
        let url = self.storefront_url("cart/set_quantity", &query);
        let body = serde_json::json!({
            "line_item_id": line_item_id,
            "quantity": quantity,
        });
        self.request_single(Method::PATCH, url, Some(order_token), Some(body))
            .await
    }

    /// Removes a line item from the cart.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn remove_line_item(
        &self,
        order_token: &str,
        line_item_id: &str,
    ) -> Result<JsonApiSingle, SpreeError> {
        let url = self.storefront_url(&format!("cart/remove_line_item/{line_item_id}"), &[]);
        self.request_single(Method::DELETE, url, Some(order_token), None)
            .await
    }

    /// Lists the payment methods available for the cart.
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn payment_methods(&self, order_token: &str) -> Result<JsonApiPage, SpreeError> {
        let url = self.storefront_url("checkout/payment_methods", &[]);
        let response = self
            .client
            .get(url.clone())
            .header(ORDER_TOKEN_HEADER, order_token)
            .send()
            .await?;
        let body = Self::check_status(url, response).await?;
        Self::parse_json(&body, "checkout/payment_methods")
    }

    /// Switches the cart to `currency` (multi-currency extension endpoint).
    ///
    /// # Errors
    ///
    /// Propagates [`SpreeError`] on any failure.
    pub async fn set_currency(
        &self,
        order_token: &str,
        currency: &str,
    ) -> Result<JsonApiSingle, SpreeError> {
        let url = self.storefront_url("cart/set_currency", &[("currency", currency.to_string())]);
        self.request_single(Method::GET, url, Some(order_token), None)
            .await
    }

    /// Catalog page fetch with bounded retry around the idempotent request.
    async fn fetch_page(&self, url: Url) -> Result<JsonApiPage, SpreeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move { self.request_page(url).await }
        })
        .await
    }

    async fn request_page(&self, url: Url) -> Result<JsonApiPage, SpreeError> {
        let context = url.path().to_owned();
        let response = self.client.get(url.clone()).send().await?;
        let body = Self::check_status(url, response).await?;
        Self::parse_json(&body, &context)
    }

    async fn request_single(
        &self,
        method: Method,
        url: Url,
        order_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<JsonApiSingle, SpreeError> {
        let context = url.path().to_owned();
        let mut request = self.client.request(method, url.clone());
        if let Some(token) = order_token {
            request = request.header(ORDER_TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let text = Self::check_status(url, response).await?;
        Self::parse_json(&text, &context)
    }

    /// Maps non-2xx statuses to typed errors and returns the body text.
    async fn check_status(url: Url, response: reqwest::Response) -> Result<String, SpreeError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(SpreeError::RateLimited { retry_after_secs });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(SpreeError::NotFound {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(SpreeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    fn parse_json<T: serde::de::DeserializeOwned>(
        body: &str,
        context: &str,
    ) -> Result<T, SpreeError> {
        serde_json::from_str(body).map_err(|e| SpreeError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }

    /// Builds `{base}/api/v2/storefront/{path}` with percent-encoded query
    /// parameters.
    fn storefront_url(&self, path: &str, query: &[(&str, String)]) -> Url {
        let mut url = self
            .base_url
            .join(&format!("api/v2/storefront/{path}"))
            .unwrap_or_else(|_| self.base_url.clone());
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        url
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
