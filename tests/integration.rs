//! End-to-end tests driving the fixture script in `tests/fixtures/` through
//! the real process supervisor, router, and protocol driver.

use mcp_aegis_rs::types::{Expectation, McpRequest, ServerDescriptor, Suite, TestCase};
use mcp_aegis_rs::{ProtocolDriver, TestRunner};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

fn fixture_descriptor() -> ServerDescriptor {
    let script = format!("{}/tests/fixtures/fake_server.sh", env!("CARGO_MANIFEST_DIR"));
    ServerDescriptor {
        name: "fake-server".to_string(),
        command: "bash".to_string(),
        args: vec![script],
        cwd: None,
        env: HashMap::new(),
        startup_timeout_ms: 2000,
        ready_pattern: Some("READY".to_string()),
    }
}

#[tokio::test]
async fn handshake_and_list_tools() {
    let driver = ProtocolDriver::new();
    driver.connect(&fixture_descriptor()).await.expect("connect");

    let tools = driver.list_tools(Duration::from_secs(2)).await.expect("list_tools");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");

    driver.disconnect().await;
}

#[tokio::test]
async fn call_tool_round_trip() {
    let driver = ProtocolDriver::new();
    driver.connect(&fixture_descriptor()).await.expect("connect");

    let result = driver
        .call_tool("echo", json!({"text": "hi"}), Duration::from_secs(2))
        .await
        .expect("call_tool");
    assert_eq!(result["content"][0]["text"], "ok");

    driver.disconnect().await;
}

#[tokio::test]
async fn runner_reports_pass_for_matching_suite() {
    let suite = Suite {
        description: "tools/list shape".to_string(),
        tests: vec![TestCase {
            it: "lists exactly one tool".to_string(),
            request: McpRequest::new(json!("t1"), "tools/list", Some(json!({}))),
            expect: Expectation {
                response: Some(json!({
                    "result": {
                        "tools": "match:arrayLength:1"
                    }
                })),
                stderr: None,
            },
        }],
    };

    let runner = TestRunner::new();
    let result = runner.run_suite(&fixture_descriptor(), &suite).await;

    assert!(result.all_passed(), "suite should pass: {:?}", result.results);
    assert_eq!(result.pass_count(), 1);
}

#[tokio::test]
async fn runner_aborts_suite_when_server_dies() {
    let suite = Suite {
        description: "crash mid-suite".to_string(),
        tests: vec![
            TestCase {
                it: "first call succeeds".to_string(),
                request: McpRequest::new(
                    json!("t1"),
                    "tools/call",
                    Some(json!({"name": "echo", "arguments": {}})),
                ),
                expect: Expectation::default(),
            },
            TestCase {
                it: "crashes the server".to_string(),
                request: McpRequest::new(
                    json!("t2"),
                    "tools/call",
                    Some(json!({"name": "crash", "arguments": {}})),
                ),
                expect: Expectation::default(),
            },
            TestCase {
                it: "never runs".to_string(),
                request: McpRequest::new(json!("t3"), "tools/list", Some(json!({}))),
                expect: Expectation::default(),
            },
        ],
    };

    let runner = TestRunner::new();
    let result = runner.run_suite(&fixture_descriptor(), &suite).await;

    assert!(result.aborted.is_some(), "suite should have aborted");
    assert_eq!(result.results.len(), 3, "every declared test gets a result");
    assert!(
        matches!(
            &result.results[2].status,
            mcp_aegis_rs::runner::outcome::TestStatus::Error { kind, .. } if kind == "serverDied"
        ),
        "the never-run third test should be recorded as error{{serverDied}}: {:?}",
        result.results[2]
    );
}
