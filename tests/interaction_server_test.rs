//! Integration tests for the interaction server over real HTTP.
//!
//! An agent-side client (reqwest) calls tools while the test plays the human
//! by answering the pending interactions the server hands out.

use std::sync::Arc;
use std::time::Duration;

use lookout::mcp::protocol::tool_payload;
use lookout::mcp::{InteractionPayload, InteractionResult, InteractionServer, ServerState};
use lookout::models::Answer;
use lookout::storage::SessionStore;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

fn server() -> (
    InteractionServer,
    tokio::sync::mpsc::UnboundedReceiver<lookout::mcp::PendingInteraction>,
) {
    InteractionServer::new(Arc::new(SessionStore::in_memory()), "demo", None)
}

async fn rpc(url: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn call_tool(url: &str, name: &str, arguments: Value) -> Value {
    let response = rpc(
        url,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
        }),
    )
    .await;
    let body: Value = response.json().await.unwrap();
    body["result"].clone()
}

async fn wait_for_pending(server: &InteractionServer) {
    for _ in 0..200 {
        if server.pending_interaction().is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no interaction became pending");
}

#[tokio::test]
async fn test_ask_questions_round_trip() {
    let (server, mut requests) = server();
    let cancel = CancellationToken::new();
    server.start(&cancel).await.unwrap();
    let url = server.url().unwrap();

    let human = tokio::spawn(async move {
        let pending = requests.recv().await.unwrap();
        match &pending.ticket().payload {
            InteractionPayload::Questions(questions) => {
                assert_eq!(questions[0].question, "Pick a color");
                assert_eq!(questions[0].options.len(), 2);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        pending
            .respond(InteractionResult::Answers(vec![Answer::Text("Red".into())]))
            .unwrap();
    });

    let result = call_tool(
        &url,
        "ask_questions",
        json!({ "questions": [{ "question": "Pick a color", "options": ["Red", "Blue"] }] }),
    )
    .await;
    human.await.unwrap();

    assert_eq!(result["isError"], false);
    assert_eq!(tool_payload(&result).unwrap(), json!({ "answers": ["Red"] }));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_store_tools_share_session_state() {
    let store = Arc::new(SessionStore::in_memory());
    let (server, _requests) = InteractionServer::new(Arc::clone(&store), "demo", None);
    let cancel = CancellationToken::new();
    server.start(&cancel).await.unwrap();
    let url = server.url().unwrap();

    let result = call_tool(&url, "task_add", json!({ "content": "write docs" })).await;
    assert_eq!(result["isError"], true);
    assert_eq!(tool_payload(&result).unwrap()["kind"], "missing_parameter");

    let result = call_tool(
        &url,
        "task_add",
        json!({ "content": "write docs", "iteration": 1 }),
    )
    .await;
    assert_eq!(result["isError"], false);
    let task = tool_payload(&result).unwrap();
    assert_eq!(task["status"], "remaining");
    assert_eq!(task["iteration"], 1);

    let buckets = store.task_list("demo").unwrap();
    assert_eq!(buckets.remaining.len(), 1);

    store.inbox_send("demo", "please hurry").unwrap();
    let result = call_tool(&url, "inbox_list", json!({})).await;
    let messages = tool_payload(&result).unwrap();
    assert_eq!(messages[0]["body"], "please hurry");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_synchronous_call_is_refused() {
    let (server, mut requests) = server();
    let cancel = CancellationToken::new();
    server.start(&cancel).await.unwrap();
    let url = server.url().unwrap();

    let first = {
        let url = url.clone();
        tokio::spawn(async move {
            call_tool(
                &url,
                "ask_questions",
                json!({ "questions": [{ "question": "First?" }] }),
            )
            .await
        })
    };
    wait_for_pending(&server).await;

    let second = call_tool(&url, "finish_spec", json!({ "content": "# Spec" })).await;
    assert_eq!(second["isError"], true);
    assert_eq!(
        tool_payload(&second).unwrap()["kind"],
        "single_flight_violation"
    );

    let pending = requests.recv().await.unwrap();
    pending
        .respond(InteractionResult::Answers(vec![Answer::Text("yes".into())]))
        .unwrap();
    let first = first.await.unwrap();
    assert_eq!(first["isError"], false);
    assert!(server.pending_interaction().is_none());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_cancels_blocked_call() {
    let (server, _requests) = server();
    let cancel = CancellationToken::new();
    server.start(&cancel).await.unwrap();
    let url = server.url().unwrap();

    let blocked = {
        let url = url.clone();
        tokio::spawn(
            async move { call_tool(&url, "finish_spec", json!({ "content": "# Spec" })).await },
        )
    };
    wait_for_pending(&server).await;

    server.stop().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), blocked)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result["isError"], true);
    assert_eq!(tool_payload(&result).unwrap()["kind"], "cancelled");
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_lifecycle_errors_and_restart() {
    let (server, _requests) = server();
    let cancel = CancellationToken::new();

    assert!(server.url().is_err());
    server.start(&cancel).await.unwrap();
    let err = server.start(&cancel).await.unwrap_err();
    assert_eq!(err.kind(), "already_started");

    server.stop().await.unwrap();
    assert!(server.url().is_err());
    server.stop().await.unwrap();

    server.start(&cancel).await.unwrap();
    let url = server.url().unwrap();
    let response = rpc(&url, json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" })).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], 7);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_tools_list_and_notifications() {
    let (server, _requests) = server();
    let cancel = CancellationToken::new();
    server.start(&cancel).await.unwrap();
    let url = server.url().unwrap();

    let response = rpc(&url, json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" })).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 10);

    let response = rpc(
        &url,
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let response = rpc(
        &url,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "launch_rockets", "arguments": {} },
        }),
    )
    .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32602);

    server.stop().await.unwrap();
}

#[test]
fn test_parent_shutdown_answers_blocked_call_before_runtime_exits() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let (server, _requests) = server();
    let parent = CancellationToken::new();
    let url = runtime.block_on(async {
        server.start(&parent).await.unwrap();
        server.url().unwrap()
    });

    // The agent lives in its own process; give it its own runtime.
    let agent = std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(async {
                reqwest::Client::new()
                    .post(&url)
                    .json(&json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "method": "tools/call",
                        "params": { "name": "finish_spec", "arguments": { "content": "# Spec" } },
                    }))
                    .send()
                    .await?
                    .json::<Value>()
                    .await
            })
    });

    runtime.block_on(async {
        wait_for_pending(&server).await;
        parent.cancel();
        server.stop().await.unwrap();
    });
    drop(runtime);

    let body = agent.join().unwrap().expect("blocked call got a response");
    assert_eq!(body["result"]["isError"], true);
    assert_eq!(
        tool_payload(&body["result"]).unwrap()["kind"],
        "cancelled"
    );
}
