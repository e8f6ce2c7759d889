use probeflex::app::App;
use probeflex::engine::EngineSettings;
use probeflex::mcp::server::McpServer;
use probeflex::services::access::{AccessPolicy, AllowAll, OwnershipPolicy};
use probeflex::services::logger::Logger;
use probeflex::stores::memory_history_store::MemoryHistoryStore;
use probeflex::stores::memory_template_store::MemoryTemplateStore;
use probeflex::stores::TemplateStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::BufReader;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_with(templates: Arc<MemoryTemplateStore>, access: Arc<dyn AccessPolicy>) -> App {
    App::build(
        Logger::new("test"),
        EngineSettings::default(),
        Arc::new(MemoryHistoryStore::new()),
        templates,
        access,
    )
    .expect("app")
}

fn app() -> App {
    app_with(Arc::new(MemoryTemplateStore::new()), Arc::new(AllowAll))
}

async fn call(app: &App, args: Value) -> Result<Value, probeflex::errors::ToolError> {
    app.tool_executor.execute("probe_request", args).await
}

#[tokio::test]
async fn template_flow_records_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
        .mount(&server)
        .await;

    let app = app();
    let saved = call(
        &app,
        json!({
            "action": "template_put",
            "template": {
                "collection_id": "c1",
                "name": "Create item",
                "url": format!("{}/items", server.uri()),
                "method": "POST",
                "body": {"name": "widget"},
            }
        }),
    )
    .await
    .unwrap();
    let template_id = saved["id"].as_str().unwrap().to_string();

    let mut invocation = call(
        &app,
        json!({"action": "template_invocation", "template_id": template_id}),
    )
    .await
    .unwrap();
    assert_eq!(invocation["api_request_id"], template_id.as_str());
    invocation["action"] = json!("send");
    invocation["actor"] = json!("alice");

    let sent = call(&app, invocation).await.unwrap();
    assert_eq!(sent["status_code"], 201);
    let history_id = sent["history_id"].as_str().unwrap().to_string();

    let history = call(
        &app,
        json!({"action": "history", "template_id": template_id, "limit": 5}),
    )
    .await
    .unwrap();
    assert_eq!(history["count"], 1);
    assert_eq!(history["records"][0]["id"], history_id.as_str());
    assert_eq!(history["records"][0]["executed_by"], "alice");
    assert_eq!(history["records"][0]["body"], json!({"name": "widget"}));

    let listed = call(&app, json!({"action": "template_list", "collection_id": "c1"}))
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);

    let deleted = call(&app, json!({"action": "template_delete", "template_id": template_id}))
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], true);
    assert_eq!(deleted["history_removed"], 1);

    let missing = call(&app, json!({"action": "template_get", "template_id": template_id}))
        .await
        .unwrap_err();
    assert_eq!(missing.code, "NOT_FOUND");
}

#[tokio::test]
async fn send_is_denied_for_actors_outside_the_project() {
    let templates = Arc::new(MemoryTemplateStore::new());
    let template = templates
        .put(probeflex::engine::RequestTemplate::new(
            "c1",
            "Ping",
            "http://127.0.0.1:1/",
        ))
        .await
        .unwrap();
    let policy = OwnershipPolicy::new(templates.clone());
    policy.add_project("p1", "owner");
    policy.assign_collection("c1", "p1");
    let app = app_with(templates, Arc::new(policy));

    let err = call(
        &app,
        json!({
            "action": "send",
            "url": "http://127.0.0.1:1/",
            "api_request_id": template.id.to_string(),
            "actor": "mallory",
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, "DENIED");

    let history = app.engine.recent_history(template.id, None).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn engine_failures_carry_the_boundary_payload() {
    let app = app();
    let err = call(&app, json!({"action": "send", "url": "", "method": "GET"}))
        .await
        .unwrap_err();
    assert_eq!(err.code, "INVALID_PARAMS");
    let details = err.details.expect("details");
    assert_eq!(details["kind"], "validation");
    assert_eq!(details["status"], 400);
}

#[tokio::test]
async fn unknown_actions_list_the_known_ones() {
    let app = app();
    let err = call(&app, json!({"action": "explode"})).await.unwrap_err();
    assert_eq!(err.code, "INVALID_PARAMS");
    assert!(err.hint.unwrap().contains("template_invocation"));
}

#[tokio::test]
async fn stdio_server_answers_initialize_list_and_call() {
    let server = McpServer::with_app(Arc::new(app()));
    let input = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
               "params": {"name": "probe_request", "arguments": {"action": "send", "url": "http://127.0.0.1:1/"}}}),
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
               "params": {"name": "probe_request", "arguments": {"action": "send", "nope": 1}}}),
        json!({"jsonrpc": "2.0", "id": 5, "method": "bogus"}),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n")
        + "\nnot json\n";

    let mut output: Vec<u8> = Vec::new();
    server
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 6);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "probeflex");

    assert_eq!(responses[1]["result"]["tools"][0]["name"], "probe_request");

    let call = &responses[2]["result"];
    assert_eq!(call["isError"], true);
    let payload: Value = serde_json::from_str(call["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["kind"], "transport");
    assert_eq!(payload["status"], 502);

    assert_eq!(responses[3]["error"]["code"], -32602);
    assert_eq!(responses[4]["error"]["code"], -32601);
    assert_eq!(responses[5]["error"]["code"], -32700);
    assert!(responses[5]["id"].is_null());
}
