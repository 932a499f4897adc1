//! Invoker and endpoint behaviour against a real HTTP server (wiremock).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use weft_api::{
    ApiError, FabricClient, Invoker, ReqwestTransport, StaticTokenCredential, TokenCache,
    WorkspaceClient,
};
use weft_core::WorkspaceId;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn invoker() -> Arc<Invoker> {
    let tokens = Arc::new(TokenCache::new(Arc::new(StaticTokenCredential::new("abc"))));
    Arc::new(
        Invoker::new(Arc::new(ReqwestTransport::default()), tokens)
            .with_poll_interval(Duration::from_millis(0)),
    )
}

fn client(server: &MockServer) -> FabricClient {
    FabricClient::new(invoker(), &server.uri(), WorkspaceId("ws".into()))
}

/// Serves `first` once, then `rest` forever.
struct Sequence {
    hits: AtomicU32,
    first: ResponseTemplate,
    rest: ResponseTemplate,
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.hits.fetch_add(1, Ordering::SeqCst) == 0 {
            self.first.clone()
        } else {
            self.rest.clone()
        }
    }
}

#[tokio::test]
async fn sends_bearer_token_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let items = client(&server).list_items().await.unwrap();
    assert!(items.is_empty());

    let received = server.received_requests().await.unwrap();
    let ua = received[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(ua.starts_with("weft/"), "user agent was {ua}");
}

#[tokio::test]
async fn create_item_follows_long_running_operation() {
    let server = MockServer::start().await;
    let operation = format!("{}/v1/operations/op-1", server.uri());

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items"))
        .and(body_json(json!({"displayName": "nb", "type": "Notebook"})))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", operation.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/op-1"))
        .respond_with(Sequence {
            hits: AtomicU32::new(0),
            first: ResponseTemplate::new(200)
                .insert_header("Location", operation.as_str())
                .set_body_json(json!({"status": "Running"})),
            rest: ResponseTemplate::new(200)
                .set_body_json(json!({"status": "Succeeded", "id": "guid-1"})),
        })
        .expect(2)
        .mount(&server)
        .await;

    let id = client(&server)
        .create_item(json!({"displayName": "nb", "type": "Notebook"}), 5)
        .await
        .unwrap();
    assert_eq!(id, "guid-1");
}

#[tokio::test]
async fn expired_token_is_refreshed_transparently() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/workspaces/ws/items/i-1"))
        .respond_with(Sequence {
            hits: AtomicU32::new(0),
            first: ResponseTemplate::new(401)
                .insert_header("x-ms-public-api-error-code", "TokenExpired"),
            rest: ResponseTemplate::new(200),
        })
        .expect(2)
        .mount(&server)
        .await;

    client(&server).delete_item("i-1").await.unwrap();
}

#[tokio::test]
async fn forbidden_is_a_status_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/workspaces/ws/items/i-1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("InsufficientPrivileges"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .patch_item("i-1", json!({"displayName": "x"}), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 403, .. }), "got: {err}");
    assert!(err.to_string().contains("InsufficientPrivileges"));
}

#[tokio::test]
async fn update_definition_sets_update_metadata_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items/i-1/updateDefinition"))
        .and(query_param("updateMetadata", "True"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .update_definition("i-1", json!({"definition": {"parts": []}}), 5)
        .await
        .unwrap();
}

#[tokio::test]
async fn workspace_name_resolves_to_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "w-1", "displayName": "Dev"},
                {"id": "w-2", "displayName": "Prod"}
            ]
        })))
        .mount(&server)
        .await;

    let inv = invoker();
    let id = weft_api::resolve_workspace_id(&inv, &server.uri(), "Prod")
        .await
        .unwrap();
    assert_eq!(id, Some(WorkspaceId("w-2".into())));
    let missing = weft_api::resolve_workspace_id(&inv, &server.uri(), "Test")
        .await
        .unwrap();
    assert_eq!(missing, None);
}
