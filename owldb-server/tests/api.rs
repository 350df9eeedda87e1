//! End-to-end coverage of the `/auth` and `/v1/*` routes, driven straight
//! through the axum `Router` with `tower::ServiceExt::oneshot` rather than
//! a bound socket, the way a router built with `axum::Router::with_state`
//! is conventionally exercised in tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use owldb_server::routes::build_router;
use owldb_server::state::AppState;
use owldb_storage::schema::Schema;
use serde_json::{json, Value};
use tower::ServiceExt;

fn open_schema() -> Schema {
    Schema::compile(json!({"type": "object"})).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    builder.header("Content-Type", "application/json").body(body).unwrap()
}

async fn issue_token(app: &axum::Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(request("POST", "/auth", None, Some(json!({ "username": username }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let app = build_router(AppState::new(open_schema()));
    let response = app.oneshot(request("GET", "/v1/db1/", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn database_document_lifecycle() {
    let app = build_router(AppState::new(open_schema()));
    let token = issue_token(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/v1/db1/doc1",
            Some(&token),
            Some(json!({"name": "widget"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/db1/doc1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["doc"], json!({"name": "widget"}));

    let response = app
        .clone()
        .oneshot(request("DELETE", "/v1/db1/doc1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/db1/doc1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn collection_get_honors_interval_bound() {
    let app = build_router(AppState::new(open_schema()));
    let token = issue_token(&app, "alice").await;
    app.clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();
    for name in ["a", "b", "c"] {
        let status = app
            .clone()
            .oneshot(request(
                "PUT",
                &format!("/v1/db1/{name}"),
                Some(&token),
                Some(json!({"name": name})),
            ))
            .await
            .unwrap()
            .status();
        assert_eq!(status, StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/db1/?interval=[a,b]", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn post_creates_document_with_generated_name() {
    let app = build_router(AppState::new(open_schema()));
    let token = issue_token(&app, "alice").await;
    app.clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request("POST", "/v1/db1/", Some(&token), Some(json!({"v": 1}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let uri = body["uri"].as_str().unwrap();
    assert!(uri.starts_with("/v1/db1/"));
}

#[tokio::test]
async fn patch_applies_then_reports_in_band_failure() {
    let app = build_router(AppState::new(open_schema()));
    let token = issue_token(&app, "alice").await;
    app.clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "PUT",
            "/v1/db1/doc1",
            Some(&token),
            Some(json!({"tags": []})),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            "/v1/db1/doc1",
            Some(&token),
            Some(json!([{"op": "ArrayAdd", "path": "/tags", "value": "blue"}])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["patchFailed"], json!(false));

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            "/v1/db1/doc1",
            Some(&token),
            Some(json!([{"op": "ObjectAdd", "path": "/missing/child", "value": 1}])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["patchFailed"], json!(true));

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/db1/doc1", Some(&token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["doc"], json!({"tags": ["blue"]}));
}

#[tokio::test]
async fn revoked_token_is_rejected() {
    let app = build_router(AppState::new(open_schema()));
    let token = issue_token(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(request("DELETE", "/auth", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/db1/", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn schema_violation_rejects_document_write() {
    let schema = Schema::compile(json!({
        "type": "object",
        "properties": { "name": { "type": "string" } },
        "required": ["name"]
    }))
    .unwrap();
    let app = build_router(AppState::new(schema));
    let token = issue_token(&app, "alice").await;
    app.clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request("PUT", "/v1/db1/doc1", Some(&token), Some(json!({"age": 5}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn timestamp_precondition_guards_replace() {
    let app = build_router(AppState::new(open_schema()));
    let token = issue_token(&app, "alice").await;
    app.clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/v1/db1/doc1?timestamp=123",
            Some(&token),
            Some(json!({"v": 1})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(request("PUT", "/v1/db1/doc1", Some(&token), Some(json!({"v": 1}))))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(request("GET", "/v1/db1/doc1", Some(&token), None))
        .await
        .unwrap();
    let meta = body_json(response).await;
    let actual_ts = meta["meta"]["lastModifiedAt"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/v1/db1/doc1?timestamp=1",
            Some(&token),
            Some(json!({"v": 2})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/v1/db1/doc1?timestamp={actual_ts}"),
            Some(&token),
            Some(json!({"v": 2})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_notification_payload_is_relative_to_database() {
    let state = AppState::new(open_schema());
    let app = build_router(state.clone());
    let token = issue_token(&app, "alice").await;

    app.clone()
        .oneshot(request("PUT", "/v1/db1", Some(&token), None))
        .await
        .unwrap();
    app.clone()
        .oneshot(request("PUT", "/v1/db1/doc1", Some(&token), Some(json!({"v": 1}))))
        .await
        .unwrap();
    app.clone()
        .oneshot(request("PUT", "/v1/db1/doc1/col1", Some(&token), None))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "PUT",
            "/v1/db1/doc1/col1/doc2",
            Some(&token),
            Some(json!({"v": 2})),
        ))
        .await
        .unwrap();

    // A nested-collection delete reports its payload relative to the
    // database, not just the deleted node's bare name. The listener has to
    // sit on the deleted collection's parent path (`/db1/doc1/`, trailing
    // slash), the same path `notify`'s non-slash branch fans a document-ish
    // delete out to.
    let mut doc1_sub = state.subscriptions.subscribe("/db1/doc1/", None, None);
    let response = app
        .clone()
        .oneshot(request("DELETE", "/v1/db1/doc1/col1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let frame = doc1_sub.receiver.recv().await.unwrap();
    assert!(frame.contains("data: \"/doc1/col1\""));

    // Deleting the whole database collapses the payload to "/".
    app.clone()
        .oneshot(request("PUT", "/v1/db1/doc1b", Some(&token), Some(json!({"v": 3}))))
        .await
        .unwrap();
    let mut db_sub = state.subscriptions.subscribe("/db1/", None, None);
    let response = app
        .clone()
        .oneshot(request("DELETE", "/v1/db1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let frame = db_sub.receiver.recv().await.unwrap();
    assert!(frame.contains("data: \"/\""));
}
