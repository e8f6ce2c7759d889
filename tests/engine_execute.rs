use async_trait::async_trait;
use probeflex::engine::{
    EngineSettings, ExecutionRecord, HistoryRecorder, HttpMethod, Invocation, RequestEngine,
    RequestTemplate,
};
use probeflex::errors::EngineError;
use probeflex::services::logger::Logger;
use probeflex::stores::memory_history_store::MemoryHistoryStore;
use probeflex::stores::memory_template_store::MemoryTemplateStore;
use probeflex::stores::{HistoryStore, TemplateStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    engine: RequestEngine,
    history: Arc<MemoryHistoryStore>,
    template_id: Uuid,
}

async fn harness() -> Harness {
    let history = Arc::new(MemoryHistoryStore::new());
    let templates = Arc::new(MemoryTemplateStore::new());
    let template = templates
        .put(RequestTemplate::new("col", "probe", "https://example.test"))
        .await
        .unwrap();
    let recorder = HistoryRecorder::new(history.clone()).with_templates(templates);
    Harness {
        engine: RequestEngine::new(Logger::new("test"), EngineSettings::default(), recorder),
        history,
        template_id: template.id,
    }
}

fn header_of(request: &wiremock::Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[tokio::test]
async fn bearer_get_returns_normalized_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({
                "url": format!("{}/ok", server.uri()),
                "method": "GET",
                "auth": {"type": "bearer", "token": "abc"},
            }),
            None,
        )
        .await;

    assert_eq!(out["status_code"], 200);
    assert_eq!(out["body"], json!({"ok": true}));
    assert!(out["headers"].is_object());
    assert!(out["time"].as_f64().unwrap() >= 0.0);
    assert!(out.get("error").is_none());
}

#[tokio::test]
async fn default_headers_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let h = harness().await;
    let invocation = Invocation::new(format!("{}/items", server.uri()), HttpMethod::Post);
    let execution = h.engine.execute(invocation, None).await.unwrap();
    assert_eq!(execution.response.status_code, 201);
    assert_eq!(execution.response.body, Value::String(String::new()));

    let received = server.received_requests().await.unwrap();
    let request = &received[0];
    assert_eq!(header_of(request, "content-type").as_deref(), Some("application/json"));
    assert_eq!(
        header_of(request, "accept").as_deref(),
        Some("application/json, text/plain, */*")
    );
    assert!(header_of(request, "user-agent")
        .unwrap()
        .starts_with("probeflex/"));
    assert_eq!(request.body, b"{}".to_vec());
}

#[tokio::test]
async fn caller_authorization_header_suppresses_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Token mine"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({
                "url": server.uri(),
                "headers": {"authorization": "Token mine"},
                "auth": {"type": "bearer", "token": "abc"},
            }),
            None,
        )
        .await;
    assert_eq!(out["status_code"], 200);
}

#[tokio::test]
async fn basic_auth_is_sent_as_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic dTpw"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({
                "url": server.uri(),
                "auth": {"type": "basic", "username": "u", "password": "p"},
            }),
            None,
        )
        .await;
    assert_eq!(out["status_code"], 204);
}

#[tokio::test]
async fn apikey_in_query_is_appended_to_the_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api_key", "k1"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({
                "url": server.uri(),
                "params": {"page": "2"},
                "auth": {"type": "apikey", "key": "api_key", "value": "k1", "location": "query"},
            }),
            None,
        )
        .await;
    assert_eq!(out["status_code"], 200);
    assert_eq!(out["body"], "plain");
}

#[tokio::test]
async fn get_body_becomes_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("x", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({"url": server.uri(), "method": "GET", "body": {"x": 1}}),
            None,
        )
        .await;
    assert_eq!(out["status_code"], 200);

    let received = server.received_requests().await.unwrap();
    assert!(received[0].body.is_empty());
    assert!(header_of(&received[0], "content-type").is_none());
}

#[tokio::test]
async fn post_with_empty_object_sends_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(&json!({"url": server.uri(), "method": "POST", "body": {}}), None)
        .await;
    assert_eq!(out["status_code"], 200);
}

#[tokio::test]
async fn missing_url_fails_validation_without_a_record() {
    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({"url": "", "method": "GET", "api_request_id": h.template_id.to_string()}),
            None,
        )
        .await;
    assert_eq!(out["kind"], "validation");
    assert_eq!(out["error"], "URL is required");
    assert!(h.history.recent(h.template_id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_host_is_a_transport_failure_and_is_recorded() {
    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({
                "url": "http://127.0.0.1:1/",
                "method": "GET",
                "api_request_id": h.template_id.to_string(),
            }),
            Some("alice"),
        )
        .await;
    assert_eq!(out["kind"], "transport");
    assert_eq!(out["status"], 502);
    assert!(out["error"].as_str().unwrap().starts_with("Connection failed"));

    let records = h.history.recent(h.template_id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.response_status, None);
    assert_eq!(record.response_body, None);
    assert!(record.error.is_some());
    assert_eq!(record.executed_by.as_deref(), Some("alice"));
}

#[tokio::test]
async fn transport_failures_do_not_echo_query_api_keys() {
    let h = harness().await;
    let out = h
        .engine
        .execute_value(
            &json!({
                "url": "http://127.0.0.1:1/x",
                "auth": {"type": "apikey", "key": "x-key", "value": "s3c", "location": "query"},
                "api_request_id": h.template_id.to_string(),
            }),
            None,
        )
        .await;
    assert_eq!(out["kind"], "transport");
    let message = out["error"].as_str().unwrap();
    assert!(!message.contains("s3c"), "{}", message);

    let records = h.history.recent(h.template_id, 10).await.unwrap();
    assert!(!records[0].error.as_deref().unwrap_or_default().contains("s3c"));
}

#[tokio::test]
async fn slow_responses_time_out_at_the_caller_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let h = harness().await;
    let out = h
        .engine
        .execute_value(&json!({"url": server.uri(), "timeout": 200}), None)
        .await;
    assert_eq!(out["kind"], "transport");
    assert_eq!(out["error"], "HTTP request timed out");
}

#[tokio::test]
async fn records_capture_the_request_as_sent_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;

    let h = harness().await;
    let mut ids = Vec::new();
    for n in 0..2 {
        let mut invocation = Invocation::new(format!("{}/items", server.uri()), HttpMethod::Post);
        invocation.body = json!({"n": n});
        invocation.auth = json!({"type": "bearer", "token": "secret-token"});
        invocation.api_request_id = Some(h.template_id);
        let execution = h.engine.execute(invocation, Some("bob")).await.unwrap();
        ids.push(execution.record_id.expect("record id"));
    }

    let records: Vec<ExecutionRecord> = h.engine.recent_history(h.template_id, None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, ids[1]);
    assert_eq!(records[1].id, ids[0]);

    let latest = &records[0];
    assert_eq!(latest.method, "POST");
    assert_eq!(latest.body, json!({"n": 1}));
    assert_eq!(
        latest.headers.get("Authorization").map(String::as_str),
        Some("Bearer secret-token")
    );
    assert_eq!(
        latest.headers.get("Content-Type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(latest.response_status, Some(201));
    assert_eq!(latest.response_body, Some(json!({"id": 7})));
    assert_eq!(latest.executed_by.as_deref(), Some("bob"));
}

#[tokio::test]
async fn invocations_without_template_id_are_not_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = harness().await;
    let execution = h
        .engine
        .execute(Invocation::new(server.uri(), HttpMethod::Get), None)
        .await
        .unwrap();
    assert!(execution.record_id.is_none());
    assert_eq!(h.history.stats()["records"], 0);
}

struct BrokenHistory;

#[async_trait]
impl HistoryStore for BrokenHistory {
    async fn append(&self, _record: ExecutionRecord) -> Result<(), EngineError> {
        Err(EngineError::persistence("disk full"))
    }

    async fn recent(&self, _: Uuid, _: usize) -> Result<Vec<ExecutionRecord>, EngineError> {
        Err(EngineError::persistence("disk full"))
    }

    async fn delete_for_template(&self, _: Uuid) -> Result<usize, EngineError> {
        Ok(0)
    }

    fn stats(&self) -> Value {
        json!({"store": "broken"})
    }
}

#[tokio::test]
async fn history_failures_do_not_mask_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let engine = RequestEngine::new(
        Logger::new("test"),
        EngineSettings::default(),
        HistoryRecorder::new(Arc::new(BrokenHistory)),
    );
    let mut invocation = Invocation::new(server.uri(), HttpMethod::Get);
    invocation.api_request_id = Some(Uuid::new_v4());
    let execution = engine.execute(invocation, None).await.unwrap();
    assert_eq!(execution.response.status_code, 200);
    assert_eq!(execution.response.body, json!({"ok": true}));
    assert!(execution.record_id.is_none());
}

#[tokio::test]
async fn unknown_template_ids_still_return_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = harness().await;
    let stray = Uuid::new_v4();
    let mut invocation = Invocation::new(server.uri(), HttpMethod::Get);
    invocation.api_request_id = Some(stray);
    let execution = h.engine.execute(invocation, None).await.unwrap();
    assert_eq!(execution.response.status_code, 200);
    assert!(execution.record_id.is_none());
    assert!(h.history.recent(stray, 5).await.unwrap().is_empty());
}
