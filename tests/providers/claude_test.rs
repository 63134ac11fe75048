use llm_stream::core::{accumulate_stream, normalize_stream, StreamError};
use llm_stream::providers::claude::types::{MessageResponse, StreamEvent};
use llm_stream::providers::claude::decode_response;
use llm_stream::providers::{
    ClaudeChunkProcessor, ContentPart, FinishReason, ProcessorOptions, ReasoningMode,
};
use serde_json::{json, Value};

use crate::common::{assert_equivalent, events, replay};

fn stream() -> Vec<Value> {
    vec![
        json!({"type": "message_start", "message": {
            "id": "msg_01", "type": "message", "role": "assistant", "model": "claude-sonnet-4-5",
            "content": [], "stop_reason": null, "stop_sequence": null,
            "usage": {"input_tokens": 42, "output_tokens": 1, "cache_read_input_tokens": 30}
        }}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": "", "signature": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "The user wants "}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "a lookup."}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "EqQBCgIYAh"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "ping"}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Checking"}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": " now."}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "content_block_start", "index": 2, "content_block": {"type": "tool_use", "id": "toolu_01", "name": "lookup", "input": {}}}),
        json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": ""}}),
        json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "{\"q\": "}}),
        json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "\"rust\", \"limit\": 5}"}}),
        json!({"type": "content_block_stop", "index": 2}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use", "stop_sequence": null}, "usage": {"output_tokens": 57}}),
        json!({"type": "message_stop"}),
    ]
}

fn response() -> MessageResponse {
    serde_json::from_value(json!({
        "id": "msg_01", "type": "message", "role": "assistant", "model": "claude-sonnet-4-5",
        "content": [
            {"type": "thinking", "thinking": "The user wants a lookup.", "signature": "EqQBCgIYAh"},
            {"type": "text", "text": "Checking now."},
            {"type": "tool_use", "id": "toolu_01", "name": "lookup", "input": {"q": "rust", "limit": 5}}
        ],
        "stop_reason": "tool_use", "stop_sequence": null,
        "usage": {"input_tokens": 42, "output_tokens": 57, "cache_read_input_tokens": 30}
    }))
    .unwrap()
}

#[test]
fn test_claude_stream_matches_response() {
    let (_, streamed) = replay(ClaudeChunkProcessor::default(), events(stream()));
    let decoded = decode_response(&response(), &ProcessorOptions::default()).unwrap();

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::reasoning("The user wants a lookup."),
            ContentPart::text("Checking now."),
            ContentPart::tool_call("toolu_01", "lookup", "{\"q\": \"rust\", \"limit\": 5}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));
    assert_eq!(streamed.usage.cache_read_tokens, 30);
    assert_equivalent(&streamed, &decoded);

    // The signature only reaches the native snapshot.
    let raw = streamed.message.raw_message.unwrap();
    assert_eq!(raw["content"][0]["signature"], "EqQBCgIYAh");
    assert_eq!(raw["content"][2]["input"], json!({"q": "rust", "limit": 5}));
}

#[test]
fn test_claude_reasoning_as_text() {
    let options = ProcessorOptions::default().with_reasoning(ReasoningMode::AsText);
    let (chunks, streamed) = replay(ClaudeChunkProcessor::new(options.clone()), events(stream()));
    let decoded = decode_response(&response(), &options).unwrap();

    assert!(!chunks.iter().any(|c| matches!(c, llm_stream::Chunk::ReasoningStart)));
    assert_eq!(streamed.message.content[0], ContentPart::text("The user wants a lookup."));
    assert_equivalent(&streamed, &decoded);
}

#[test]
fn test_claude_error_event_is_upstream() {
    let mut values = stream();
    values.truncate(3);
    values.push(json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}));

    let result: Result<Vec<_>, _> = llm_stream::normalize(
        ClaudeChunkProcessor::default(),
        events::<StreamEvent>(values).into_iter().map(Ok),
    )
    .collect();
    match result {
        Err(StreamError::Upstream { message, .. }) => {
            assert_eq!(message, "overloaded_error: Overloaded");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_claude_async_driver() {
    let events = futures::stream::iter(events::<StreamEvent>(stream()).into_iter().map(Ok));
    let chunks = Box::pin(normalize_stream(ClaudeChunkProcessor::default(), events));
    let streamed = accumulate_stream(chunks).await.unwrap();
    let decoded = decode_response(&response(), &ProcessorOptions::default()).unwrap();
    assert_equivalent(&streamed, &decoded);
}

fn message_start() -> Value {
    json!({"type": "message_start", "message": {
        "id": "msg_02", "type": "message", "role": "assistant", "model": "claude-sonnet-4-5",
        "content": [], "stop_reason": null, "stop_sequence": null,
        "usage": {"input_tokens": 10, "output_tokens": 1}
    }})
}

#[test]
fn test_claude_tool_without_arguments() {
    let (_, streamed) = replay(
        ClaudeChunkProcessor::default(),
        events(vec![
            message_start(),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_02", "name": "list_files", "input": {}}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": ""}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_03", "name": "read_file", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"path\": \"src/lib.rs\", "}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"lines\": [1, 20]}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use", "stop_sequence": null}, "usage": {"output_tokens": 30}}),
            json!({"type": "message_stop"}),
        ]),
    );
    let response: MessageResponse = serde_json::from_value(json!({
        "id": "msg_02", "type": "message", "role": "assistant", "model": "claude-sonnet-4-5",
        "content": [
            {"type": "tool_use", "id": "toolu_02", "name": "list_files", "input": {}},
            {"type": "tool_use", "id": "toolu_03", "name": "read_file", "input": {"path": "src/lib.rs", "lines": [1, 20]}}
        ],
        "stop_reason": "tool_use", "stop_sequence": null,
        "usage": {"input_tokens": 10, "output_tokens": 30}
    }))
    .unwrap();
    let decoded = decode_response(&response, &ProcessorOptions::default()).unwrap();

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::tool_call("toolu_02", "list_files", ""),
            ContentPart::tool_call("toolu_03", "read_file", "{\"path\": \"src/lib.rs\", \"lines\": [1, 20]}"),
        ]
    );
    assert_equivalent(&streamed, &decoded);
}

#[test]
fn test_claude_stream_cut_before_message_delta() {
    let (chunks, streamed) = replay(
        ClaudeChunkProcessor::default(),
        events(vec![
            message_start(),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Half of it"}}),
        ]),
    );
    assert_eq!(streamed.message.content, vec![ContentPart::text("Half of it")]);
    assert_eq!(streamed.finish_reason, None);
    assert!(matches!(chunks.last(), Some(llm_stream::Chunk::RawMessage { .. })));
}
