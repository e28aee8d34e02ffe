//! Integration tests for `SpreeClient` against a wiremock server.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use svb_spree::{SpreeClient, SpreeError};

fn test_client(base_url: &str) -> SpreeClient {
    SpreeClient::new(base_url, 5, "svb-test/0.1", 0, 0).expect("failed to build SpreeClient")
}

fn test_client_with_retries(base_url: &str, max_retries: u32) -> SpreeClient {
    SpreeClient::new(base_url, 5, "svb-test/0.1", max_retries, 0)
        .expect("failed to build SpreeClient")
}

fn taxon_page(ids: &[&str], total_pages: u32) -> serde_json::Value {
    let data: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "type": "taxon",
                "attributes": {"name": format!("Taxon {id}"), "depth": 0},
                "relationships": {}
            })
        })
        .collect();
    json!({"data": data, "meta": {"total_pages": total_pages}})
}

#[tokio::test]
async fn list_taxons_sends_pagination_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&taxon_page(&["5"], 3)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let page = client.list_taxons(2, 25).await.unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, "5");
    assert_eq!(page.meta.total_pages, 3);
}

#[tokio::test]
async fn list_products_sends_include_param() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/products"))
        .and(query_param("include", "default_variant,images"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&json!({"data": [], "meta": {"total_pages": 0}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let page = client
        .list_products(1, 50, "default_variant,images")
        .await
        .unwrap();
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn list_taxons_retries_rate_limit_then_succeeds() {
    let server = MockServer::start().await;

    // First request: 429; mock is consumed after one match.
    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&taxon_page(&["1"], 1)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let page = client.list_taxons(1, 50).await.unwrap();
    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn list_taxons_retries_server_error_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&taxon_page(&["1"], 1)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let page = client.list_taxons(1, 50).await.unwrap();
    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn list_taxons_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 3);
    let err = client.list_taxons(1, 50).await.unwrap_err();
    assert!(
        matches!(err, SpreeError::UnexpectedStatus { status: 422, .. }),
        "expected UnexpectedStatus(422), got: {err:?}"
    );
}

#[tokio::test]
async fn list_taxons_rejects_invalid_json() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/taxons"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.list_taxons(1, 50).await.unwrap_err();
    assert!(matches!(err, SpreeError::Deserialize { .. }));
}

#[tokio::test]
async fn variant_from_sku_returns_matching_variant() {
    let server = MockServer::start().await;

    let body = json!({
        "data": [{
            "id": "1",
            "type": "product",
            "attributes": {"name": "Shirt"},
            "relationships": {"variants": {"data": [{"id": "11", "type": "variant"}]}}
        }],
        "included": [{
            "id": "11",
            "type": "variant",
            "attributes": {"sku": "SHIRT-M", "in_stock": true},
            "relationships": {}
        }],
        "meta": {"total_pages": 1}
    });

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/products"))
        .and(query_param("filter[skus]", "SHIRT-M"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let single = client.variant_from_sku("SHIRT-M").await.unwrap();
    assert_eq!(single.data.id, "11");
    assert_eq!(single.data.attr_str("sku"), Some("SHIRT-M"));
}

#[tokio::test]
async fn variant_from_sku_errors_when_no_product_matches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&json!({"data": [], "meta": {"total_pages": 0}})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.variant_from_sku("GONE").await.unwrap_err();
    assert!(matches!(err, SpreeError::MissingResource { .. }));
}

#[tokio::test]
async fn create_cart_posts_and_parses_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/storefront/cart"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&json!({
            "data": {
                "id": "1",
                "type": "cart",
                "attributes": {"token": "guest-token-123", "currency": "USD"},
                "relationships": {}
            }
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let cart = client.create_cart().await.unwrap();
    assert_eq!(cart.data.attr_str("token"), Some("guest-token-123"));
}

#[tokio::test]
async fn show_cart_sends_order_token_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/cart"))
        .and(header("X-Spree-Order-Token", "tok-1"))
        .and(query_param("include", "line_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"id": "1", "type": "cart", "attributes": {}, "relationships": {}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    client.show_cart("tok-1", Some("line_items")).await.unwrap();
}

#[tokio::test]
async fn add_item_posts_variant_and_quantity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/storefront/cart/add_item"))
        .and(header("X-Spree-Order-Token", "tok-1"))
        .and(wiremock::matchers::body_json(&json!({
            "variant_id": "42",
            "quantity": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"id": "1", "type": "cart", "attributes": {}, "relationships": {}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    client.add_item("tok-1", "42", 2, None).await.unwrap();
}

#[tokio::test]
async fn cart_not_found_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/storefront/cart"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.show_cart("stale-token", None).await.unwrap_err();
    assert!(matches!(err, SpreeError::NotFound { .. }));
}
