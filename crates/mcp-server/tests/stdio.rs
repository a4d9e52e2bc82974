//! Drives the server through the line transport with in-memory buffers.

use std::sync::Arc;

use serde_json::{json, Value};
use tm_domain::config::{AuthMethod, Credentials};
use tm_mcp::{serve, McpServer, MAX_LINE_BYTES};
use tm_sessions::SessionManager;
use tm_tableau::MockTableau;
use tm_tools::{Dispatcher, ResourceProvider, ToolRegistry};

fn server(mock: &Arc<MockTableau>) -> McpServer {
    let credentials = Credentials {
        server_url: "https://x.example.com".into(),
        site_id: "finance".into(),
        auth: AuthMethod::Token {
            name: "a".into(),
            value: "b".into(),
        },
    };
    let sessions = Arc::new(SessionManager::new(mock.clone(), credentials));
    McpServer::new(
        Dispatcher::new(ToolRegistry::global(), sessions.clone()),
        ResourceProvider::new(sessions),
    )
}

/// Feed `input` lines through the transport and parse every output line.
async fn exchange(server: &McpServer, input: &[Value]) -> Vec<Value> {
    let mut raw = String::new();
    for msg in input {
        raw.push_str(&msg.to_string());
        raw.push('\n');
    }
    let mut out = Vec::new();
    serve(server, raw.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn handshake_then_tool_listing() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let out = exchange(
        &server,
        &[
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05", "capabilities": {},
                "clientInfo": { "name": "test", "version": "0" } } }),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
            json!({ "jsonrpc": "2.0", "id": "p", "method": "ping" }),
        ],
    )
    .await;

    // the notification gets no response
    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(out[0]["result"]["serverInfo"]["name"], "tableau-mcp");
    assert!(out[0]["result"]["capabilities"]["tools"].is_object());

    let tools = out[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 15);
    assert!(tools.iter().any(|t| t["name"] == "get_view_data"));

    assert_eq!(out[2]["id"], "p");
    assert_eq!(out[2]["result"], json!({}));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn tool_call_returns_text_and_embedded_csv() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let out = exchange(
        &server,
        &[json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": { "name": "get_view_data", "arguments": { "view_id": "view-3" } } })],
    )
    .await;

    let result = &out[0]["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][0]["type"], "text");
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Stock Levels"));
    assert_eq!(result["content"][1]["type"], "resource");
    assert_eq!(
        result["content"][1]["resource"]["uri"],
        "tableau://views/view-3/data"
    );
    assert_eq!(result["content"][1]["resource"]["mimeType"], "text/csv");
}

#[tokio::test]
async fn tool_failures_are_results_not_protocol_errors() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let out = exchange(
        &server,
        &[
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": { "name": "get_view_data", "arguments": { "view_id": "missing-id" } } }),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": { "name": "nope" } }),
        ],
    )
    .await;

    assert_eq!(out[0]["result"]["isError"], true);
    let text = out[0]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("NotFound:"));

    assert_eq!(out[1]["result"]["isError"], true);
    let text = out[1]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("UnknownTool:"));
}

#[tokio::test]
async fn protocol_errors_use_jsonrpc_codes() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let mut out = Vec::new();
    let input = "{not json\n\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"sampling/createMessage\"}\n{\"jsonrpc\":\"2.0\",\"id\":4,\"method\":\"tools/call\",\"params\":{}}\n";
    serve(&server, input.as_bytes(), &mut out).await.unwrap();
    let out: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["id"], Value::Null);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert_eq!(out[1]["id"], 3);
    assert_eq!(out[1]["error"]["code"], -32601);
    assert_eq!(out[2]["error"]["code"], -32602);
}

fn parse_lines(out: Vec<u8>) -> Vec<Value> {
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn invalid_utf8_line_is_a_parse_error_and_serving_continues() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec();
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"\xff\"}\n");
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n");

    let mut out = Vec::new();
    serve(&server, input.as_slice(), &mut out).await.unwrap();
    let out = parse_lines(out);

    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[1]["id"], Value::Null);
    assert_eq!(out[1]["error"]["code"], -32700);
    assert_eq!(out[2]["id"], 3);
    assert_eq!(out[2]["result"], json!({}));
}

#[tokio::test]
async fn oversized_line_is_skipped_without_losing_the_next() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let mut input = vec![b'x'; MAX_LINE_BYTES + 10];
    input.push(b'\n');
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}");

    let mut out = Vec::new();
    serve(&server, input.as_slice(), &mut out).await.unwrap();
    let out = parse_lines(out);

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert!(out[0]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("exceeds"));
    assert_eq!(out[1]["id"], 7);
}

#[tokio::test]
async fn resources_are_listed_and_read() {
    let mock = Arc::new(MockTableau::sample());
    let server = server(&mock);

    let out = exchange(
        &server,
        &[
            json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/templates/list" }),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "resources/read",
                "params": { "uri": "tableau://views/view-1/data" } }),
            json!({ "jsonrpc": "2.0", "id": 4, "method": "resources/read",
                "params": { "uri": "tableau://nowhere" } }),
            json!({ "jsonrpc": "2.0", "id": 5, "method": "resources/read",
                "params": { "uri": "tableau://workbooks/wb-404" } }),
            json!({ "jsonrpc": "2.0", "id": 6, "method": "prompts/list" }),
        ],
    )
    .await;

    let resources = out[0]["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[1]["name"], "Workbook: Warehouse Ops");
    assert_eq!(resources[1]["mimeType"], "application/json");

    assert_eq!(
        out[1]["result"]["resourceTemplates"][0]["uriTemplate"],
        "tableau://workbooks/{id}"
    );

    let contents = &out[2]["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "text/csv");
    assert!(contents["text"].as_str().unwrap().starts_with("Region,Revenue"));

    assert_eq!(out[3]["error"]["code"], -32602);
    assert_eq!(out[3]["error"]["data"]["kind"], "InvalidURI");
    assert_eq!(out[4]["error"]["code"], -32002);
    assert_eq!(out[5]["result"]["prompts"], json!([]));
}
