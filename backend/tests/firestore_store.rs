use jersey_orders::backend::storage::document::{Query, SetOptions};
use jersey_orders::backend::storage::{DocumentStore, FirestoreConfig, FirestoreStore, Record};
use serde_json::json;
use shared::SortDirection;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCS: &str = "/projects/jersey-test/databases/(default)/documents";

fn store(server: &MockServer) -> FirestoreStore {
    FirestoreStore::new(FirestoreConfig::new("jersey-test", "api-key").with_base_url(server.uri()))
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn get_document_decodes_fields_and_maps_404_to_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/orders/ORD-1", DOCS)))
        .and(query_param("key", "api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-1",
            "fields": {
                "customerName": { "stringValue": "Jamie Rivera" },
                "quantity": { "integerValue": "3" }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/orders/ORD-2", DOCS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": { "code": 404 } })))
        .mount(&server)
        .await;

    let store = store(&server);

    let found = store.get_document("orders", "ORD-1").await.unwrap();
    assert!(found.exists);
    assert_eq!(found.data()["customerName"], json!("Jamie Rivera"));
    assert_eq!(found.data()["quantity"], json!(3));
    assert_eq!(found.data()["id"], json!("ORD-1"));

    let missing = store.get_document("orders", "ORD-2").await.unwrap();
    assert!(!missing.exists);
    assert!(missing.data().is_empty());
}

#[tokio::test]
async fn merge_writes_send_an_update_mask_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/orders/ORD-1", DOCS)))
        .and(query_param("updateMask.fieldPaths", "status"))
        .and(header("authorization", "Bearer id-token-1"))
        .and(body_partial_json(json!({
            "fields": { "status": { "stringValue": "shipped" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    store.set_id_token(Some("id-token-1".to_string()));
    store
        .set_document("orders", "ORD-1", record(json!({ "status": "shipped" })), SetOptions::merge())
        .await
        .unwrap();
}

#[tokio::test]
async fn server_errors_surface_as_backend_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let error = store(&server)
        .set_document("orders", "ORD-1", record(json!({ "status": "pending" })), SetOptions::default())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("403"));
}

#[tokio::test]
async fn run_query_posts_structured_query_and_skips_metadata_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "orders" }],
                "orderBy": [{ "field": { "fieldPath": "quantity" }, "direction": "DESCENDING" }],
                "limit": 2
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "document": {
                    "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-9",
                    "fields": { "quantity": { "integerValue": "9" } }
                }
            },
            {
                "document": {
                    "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-4",
                    "fields": { "quantity": { "integerValue": "4" } }
                }
            },
            { "readTime": "2026-01-01T00:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let mut query = Query::new("orders");
    query.order_by = Some(("quantity".to_string(), SortDirection::Desc));
    query.limit = Some(2);

    let snapshot = store(&server).run_query(&query).await.unwrap();
    let ids: Vec<_> = snapshot
        .records()
        .iter()
        .map(|r| r["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(ids, vec!["ORD-9", "ORD-4"]);
}

#[tokio::test]
async fn delete_reports_whether_the_document_existed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/orders/ORD-1", DOCS)))
        .and(query_param("currentDocument.exists", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/orders/ORD-2", DOCS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": { "code": 404 } })))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.delete_document("orders", "ORD-1").await.unwrap());
    assert!(!store.delete_document("orders", "ORD-2").await.unwrap());
}

#[tokio::test]
async fn replace_collection_commits_deletes_and_updates_together() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "document": {
                    "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-1",
                    "fields": { "quantity": { "integerValue": "1" } }
                }
            },
            {
                "document": {
                    "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-2",
                    "fields": { "quantity": { "integerValue": "2" } }
                }
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .and(body_partial_json(json!({
            "writes": [
                { "delete": "projects/jersey-test/databases/(default)/documents/orders/ORD-1" },
                {
                    "update": {
                        "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-2",
                        "fields": { "quantity": { "integerValue": "20" } }
                    }
                },
                { "update": { "name": "projects/jersey-test/databases/(default)/documents/orders/ORD-3" } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}, {}, {}] })))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .replace_collection(
            "orders",
            vec![record(json!({ "id": "ORD-2", "quantity": 20 })), record(json!({ "id": "ORD-3", "quantity": 3 }))],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn replace_collection_rejects_duplicate_ids_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let error = store(&server)
        .replace_collection("orders", vec![record(json!({ "id": "ORD-1" })), record(json!({ "id": "ORD-1" }))])
        .await
        .unwrap_err();
    assert!(error.to_string().contains("duplicate id"));
}
