//! Integration tests for `ElasticClient` against a wiremock server.

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use svb_elastic::{BulkOperation, DocType, ElasticClient, ElasticError, OpKind};

fn test_client(base_url: &str) -> ElasticClient {
    ElasticClient::new(base_url, "catalog", 5).expect("failed to build ElasticClient")
}

fn ndjson_lines(request: &Request) -> Vec<Value> {
    std::str::from_utf8(&request.body)
        .expect("bulk body was not UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("bulk line was not JSON"))
        .collect()
}

#[tokio::test]
async fn bulk_sends_ndjson_with_per_type_indices() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(header("Content-Type", "application/x-ndjson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "errors": false,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"update": {"_id": "2", "status": 200}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let ops = vec![
        BulkOperation::index(DocType::Product, json!({"id": 1, "name": "Shirt"})).unwrap(),
        BulkOperation::update(DocType::Category, json!({"id": 2, "cursor": "1000"})).unwrap(),
    ];
    let failures = client.bulk(&ops).await.unwrap();
    assert!(failures.is_empty());

    let requests = server.received_requests().await.unwrap();
    let lines = ndjson_lines(&requests[0]);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["index"]["_index"], "catalog_product");
    assert_eq!(lines[1]["name"], "Shirt");
    assert_eq!(lines[2]["update"]["_index"], "catalog_category");
    assert_eq!(lines[3]["doc"]["cursor"], "1000");
}

#[tokio::test]
async fn bulk_surfaces_item_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"update": {"_id": "2", "status": 404, "error": {
                    "type": "document_missing_exception",
                    "reason": "[2]: document missing"
                }}}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let ops = vec![
        BulkOperation::index(DocType::Product, json!({"id": 1})).unwrap(),
        BulkOperation::update(DocType::Product, json!({"id": 2, "cursor": "c"})).unwrap(),
    ];
    let failures = client.bulk(&ops).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, OpKind::Update);
    assert!(failures[0].is_missing_update_target());
}

#[tokio::test]
async fn bulk_skips_request_when_empty() {
    let server = MockServer::start().await;
    // No mock mounted: any request would fail the test via unwrap below.
    let client = test_client(&server.uri());
    let failures = client.bulk(&[]).await.unwrap();
    assert!(failures.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn bulk_propagates_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let ops = vec![BulkOperation::index(DocType::Product, json!({"id": 1})).unwrap()];
    let err = client.bulk(&ops).await.unwrap_err();
    assert!(matches!(
        err,
        ElasticError::UnexpectedStatus { status: 503, .. }
    ));
}

#[tokio::test]
async fn delete_stale_queries_on_cursor_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/catalog_product/_delete_by_query"))
        .and(query_param("conflicts", "proceed"))
        .and(body_json(&json!({
            "query": {"bool": {"must_not": {"term": {"cursor": "1000"}}}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "deleted": 7,
            "failures": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let outcome = client.delete_stale(DocType::Product, "1000").await.unwrap();
    assert_eq!(outcome.total_deleted, 7);
    assert!(outcome.failures.is_empty());
}

#[tokio::test]
async fn delete_stale_reports_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/catalog_category/_delete_by_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "deleted": 2,
            "failures": [{"id": "9", "cause": {"reason": "boom"}}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let outcome = client
        .delete_stale(DocType::Category, "2000")
        .await
        .unwrap();
    assert_eq!(outcome.total_deleted, 2);
    assert_eq!(outcome.failures.len(), 1);
}

#[tokio::test]
async fn delete_catalog_drops_all_three_indices() {
    let server = MockServer::start().await;

    for index in ["catalog_category", "catalog_product", "catalog_attribute"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/{index}")))
            .and(query_param("ignore_unavailable", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = test_client(&server.uri());
    client.delete_catalog().await.unwrap();
}
