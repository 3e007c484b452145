//! Integration tests for the OpenAPI bridge
//!
//! Every scenario drives the compiled bridge through its public surface
//! against a mock transport; no network is involved.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use openapi_bridge::Error;
use openapi_bridge::client::{ApiRequest, ApiResponse, Transport};
use openapi_bridge::compiler::{ApiBridge, Compiler, Outcome, SpecDocument};
use openapi_bridge::config::Config;

/// Transport double that records requests and replays a canned response
struct MockTransport {
    status: u16,
    body: String,
    fail: bool,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_string(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            status: 0,
            body: String::new(),
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, request: ApiRequest) -> openapi_bridge::Result<ApiResponse> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(ApiResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

fn widget_spec() -> SpecDocument {
    SpecDocument::from_value(json!({
        "openapi": "3.0.0",
        "info": {"title": "Widgets API", "version": "1.0"},
        "servers": [{"url": "https://api.test.com"}],
        "paths": {
            "/v1/widgets/{id}": {
                "get": {
                    "operationId": "getWidget",
                    "summary": "Fetch a widget by id",
                    "tags": ["widgets"],
                    "parameters": [
                        {"name": "id", "in": "path", "required": true,
                         "schema": {"type": "string"}},
                        {"name": "verbose", "in": "query",
                         "schema": {"type": "boolean"}}
                    ]
                }
            },
            "/v1/widgets": {
                "post": {
                    "operationId": "createWidget",
                    "tags": ["widgets", "admin"],
                    "requestBody": {"content": {"application/json": {"schema": {
                        "type": "object",
                        "properties": {"name": {"type": "string"}},
                        "required": ["name"]
                    }}}}
                }
            }
        }
    }))
    .unwrap()
}

fn compile(transport: Arc<MockTransport>) -> ApiBridge {
    Compiler::new(Config::default())
        .compile(&widget_spec(), transport)
        .unwrap()
}

// ── Scenario A: successful GET ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn operation_call_returns_payload_and_debits_one_token() {
    let transport = MockTransport::replying(200, r#"{"id":"42","name":"gear"}"#);
    let bridge = compile(Arc::clone(&transport));

    let before = bridge.pacer().available();
    let result = bridge
        .call_operation("getwidget", json!({"id": "42"}))
        .await
        .unwrap();

    assert!(!result.is_error);
    let text = result.content[0].as_text();
    assert!(text.contains("\"name\": \"gear\""), "payload: {text}");
    assert!(text.contains("\"id\": \"42\""), "payload: {text}");

    let after = bridge.pacer().available();
    assert!(
        (before - after - 1.0).abs() < 1e-6,
        "token count must drop by exactly one (before {before}, after {after})"
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "https://api.test.com/v1/widgets/42");
}

// ── Scenario B: soft failure ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_operation_call_returns_soft_error() {
    let transport = MockTransport::replying(400, r#"{"error":"Bad Request"}"#);
    let bridge = compile(transport);

    let result = bridge
        .call_operation("getwidget", json!({"id": "42"}))
        .await
        .unwrap();

    assert!(result.is_error);
    let text = result.content[0].as_text();
    assert!(text.contains("API Error (400)"), "message: {text}");
    assert!(text.contains("Bad Request"), "message: {text}");
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_a_soft_upstream_error() {
    let transport = MockTransport::failing();
    let bridge = compile(transport);

    let result = bridge
        .call_operation("getwidget", json!({"id": "42"}))
        .await
        .unwrap();

    assert!(result.is_error);
    let text = result.content[0].as_text();
    assert!(text.contains("API Error (transport)"), "message: {text}");
    assert!(text.contains("connection refused"), "message: {text}");
}

// ── Scenario C: pacing under concurrency ────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn five_concurrent_calls_at_two_per_second_are_paced() {
    let transport = MockTransport::replying(200, "{}");
    let config = Config {
        rate_limit: openapi_bridge::config::RateLimitConfig {
            requests_per_second: 2.0,
        },
        ..Default::default()
    };
    let bridge = Compiler::new(config)
        .compile(&widget_spec(), transport)
        .unwrap();

    let start = tokio::time::Instant::now();
    let calls = (0..5).map(|i| bridge.call_operation("getwidget", json!({"id": i.to_string()})));
    let results = futures::future::join_all(calls).await;
    for result in results {
        assert!(!result.unwrap().is_error);
    }

    let elapsed = start.elapsed();
    assert!(
        elapsed >= std::time::Duration::from_millis(1800),
        "five calls at 2/s must take at least ~1.8s, took {elapsed:?}"
    );
}

// ── Resource reads raise instead of soft-failing ────────────────────────────

#[tokio::test(start_paused = true)]
async fn resource_read_returns_contents_on_success() {
    let transport = MockTransport::replying(200, r#"{"id":"7"}"#);
    let bridge = compile(Arc::clone(&transport));

    let contents = bridge
        .read_resource("getwidget", json!({"id": "7"}))
        .await
        .unwrap();

    assert_eq!(contents.uri, "https://api.test.com/v1/widgets/7");
    assert!(contents.text.contains("\"id\": \"7\""));
    assert_eq!(contents.mime_type.as_deref(), Some("application/json"));
}

#[tokio::test(start_paused = true)]
async fn resource_read_raises_classified_error_on_404() {
    let transport = MockTransport::replying(404, "no such widget");
    let bridge = compile(transport);

    let err = bridge
        .read_resource("getwidget", json!({"id": "7"}))
        .await
        .unwrap_err();

    match err {
        Error::Api {
            outcome, status, ..
        } => {
            assert_eq!(outcome, Outcome::ValidationFailure);
            assert_eq!(status, Some(404));
        }
        other => panic!("expected Error::Api, got {other:?}"),
    }
    assert!(err.to_string().contains("ValidationFailure (404)"));
}

// ── Argument handling ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn undeclared_arguments_are_dropped_from_the_request() {
    let transport = MockTransport::replying(200, "{}");
    let bridge = compile(Arc::clone(&transport));

    bridge
        .call_operation(
            "getwidget",
            json!({"id": "7", "verbose": true, "extra": "ignored"}),
        )
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://api.test.com/v1/widgets/7");
    assert_eq!(
        requests[0].query,
        vec![("verbose".to_string(), "true".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_arguments_fail_softly_before_any_http_call() {
    let transport = MockTransport::replying(200, "{}");
    let bridge = compile(Arc::clone(&transport));

    let result = bridge
        .call_operation("getwidget", json!({"id": 42}))
        .await
        .unwrap();

    assert!(result.is_error);
    let text = result.content[0].as_text();
    assert!(text.contains("Tool call validation failed"), "message: {text}");
    assert!(transport.requests().is_empty(), "no HTTP call may happen");
}

#[tokio::test(start_paused = true)]
async fn body_fields_are_routed_into_the_json_body() {
    let transport = MockTransport::replying(201, r#"{"ok":true}"#);
    let bridge = compile(Arc::clone(&transport));

    bridge
        .call_operation("createwidget", json!({"name": "gear"}))
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].body, Some(json!({"name": "gear"})));
}

// ── Synthetic operations ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn list_tags_reports_distinct_tags_without_http() {
    let transport = MockTransport::replying(500, "must not be called");
    let bridge = compile(Arc::clone(&transport));

    let result = bridge.call_operation("list_tags", Value::Null).await.unwrap();
    assert!(!result.is_error);
    let tags: Value = serde_json::from_str(result.content[0].as_text()).unwrap();
    assert_eq!(tags["tags"], json!(["admin", "widgets"]));
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn server_info_reports_counts_and_base_url() {
    let transport = MockTransport::replying(500, "must not be called");
    let bridge = compile(Arc::clone(&transport));

    let result = bridge
        .call_operation("server_info", Value::Null)
        .await
        .unwrap();
    let info: Value = serde_json::from_str(result.content[0].as_text()).unwrap();
    assert_eq!(info["base_url"], "https://api.test.com");
    assert_eq!(info["operation_count"], 2);
    assert_eq!(info["resource_count"], 1);
    assert!(transport.requests().is_empty());
}

// ── Tag filtering ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tag_allow_list_skips_untagged_operations() {
    let transport = MockTransport::replying(200, "{}");
    let config = Config {
        enabled_tags: vec!["admin".to_string()],
        ..Default::default()
    };
    let bridge = Compiler::new(config)
        .compile(&widget_spec(), transport)
        .unwrap();

    assert!(bridge.table().operations.contains_key("createwidget"));
    assert!(!bridge.table().operations.contains_key("getwidget"));
    // Synthetic operations are always present.
    assert!(bridge.table().operations.contains_key("list_tags"));
    assert!(bridge.table().operations.contains_key("server_info"));
}

// ── Determinism ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn compiling_twice_yields_identical_tables() {
    let build = || {
        Compiler::new(Config::default())
            .compile(&widget_spec(), MockTransport::replying(200, "{}"))
            .unwrap()
    };
    let first = build();
    let second = build();

    let names = |bridge: &ApiBridge| -> Vec<String> {
        let mut n: Vec<String> = bridge.table().operations.keys().cloned().collect();
        n.sort();
        n
    };
    assert_eq!(names(&first), names(&second));

    for (a, b) in first.tools().iter().zip(second.tools().iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.input_schema, b.input_schema);
    }

    let resources = |bridge: &ApiBridge| -> Vec<String> {
        bridge.table().resources.keys().cloned().collect()
    };
    assert_eq!(resources(&first), resources(&second));
}

// ── Protocol surface ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tools_expose_input_schemas_with_required_markers() {
    let transport = MockTransport::replying(200, "{}");
    let bridge = compile(transport);

    let tools = bridge.tools();
    let get_widget = tools.iter().find(|t| t.name == "getwidget").unwrap();
    assert_eq!(get_widget.input_schema["properties"]["id"]["type"], "string");
    assert_eq!(get_widget.input_schema["required"], json!(["id"]));

    // Spliced body fields are forced optional.
    let create = tools.iter().find(|t| t.name == "createwidget").unwrap();
    assert!(create.input_schema.get("required").is_none());

    let templates = bridge.resource_templates();
    assert_eq!(templates.len(), 1);
    assert_eq!(
        templates[0].uri_template,
        "https://api.test.com/v1/widgets/{id}"
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_operation_name_is_a_hard_error() {
    let transport = MockTransport::replying(200, "{}");
    let bridge = compile(transport);
    let err = bridge.call_operation("ghost", Value::Null).await.unwrap_err();
    assert!(matches!(err, Error::OperationNotFound(_)));
}
