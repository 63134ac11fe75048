use llm_stream::providers::openai::completions::decode_response;
use llm_stream::providers::openai::completions::types::ChatCompletionObject;
use llm_stream::providers::{
    Chunk, ContentPart, FinishReason, OpenAIChunkProcessor, ProcessorOptions, UNKNOWN_TOOL_ID,
};
use serde_json::{json, Value};

use crate::common::{assert_equivalent, events, replay};

fn chunk(delta: Value, finish_reason: Value) -> Value {
    json!({
        "id": "chatcmpl-9", "object": "chat.completion.chunk", "created": 1_717_000_000,
        "model": "gpt-4o-mini", "system_fingerprint": "fp_1",
        "choices": [{"index": 0, "delta": delta, "logprobs": null, "finish_reason": finish_reason}],
        "usage": null
    })
}

fn usage_chunk() -> Value {
    json!({
        "id": "chatcmpl-9", "object": "chat.completion.chunk", "created": 1_717_000_000,
        "model": "gpt-4o-mini", "choices": [],
        "usage": {"prompt_tokens": 20, "completion_tokens": 35, "total_tokens": 55,
                  "completion_tokens_details": {"reasoning_tokens": 12}}
    })
}

fn completion(message: Value, finish_reason: &str) -> ChatCompletionObject {
    serde_json::from_value(json!({
        "id": "chatcmpl-9", "object": "chat.completion", "created": 1_717_000_000,
        "model": "gpt-4o-mini",
        "choices": [{"index": 0, "message": message, "logprobs": null, "finish_reason": finish_reason}],
        "usage": {"prompt_tokens": 20, "completion_tokens": 35, "total_tokens": 55,
                  "completion_tokens_details": {"reasoning_tokens": 12}}
    }))
    .unwrap()
}

#[test]
fn test_openai_parallel_tool_calls() {
    let stream = vec![
        chunk(json!({"role": "assistant", "reasoning_content": "Two cities, "}), Value::Null),
        chunk(json!({"reasoning_content": "two calls."}), Value::Null),
        chunk(json!({"content": "Looking up both."}), Value::Null),
        chunk(
            json!({"tool_calls": [{"index": 0, "id": "call_a", "type": "function",
                                   "function": {"name": "weather", "arguments": ""}}]}),
            Value::Null,
        ),
        chunk(json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"city\":\"Oslo\"}"}}]}), Value::Null),
        chunk(
            json!({"tool_calls": [{"index": 1, "id": "call_b", "type": "function",
                                   "function": {"name": "weather", "arguments": "{\"city\":"}}]}),
            Value::Null,
        ),
        chunk(json!({"tool_calls": [{"index": 1, "function": {"arguments": "\"Rome\"}"}}]}), Value::Null),
        chunk(json!({}), json!("tool_calls")),
        usage_chunk(),
    ];
    let (chunks, streamed) = replay(OpenAIChunkProcessor::default(), events(stream));

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::reasoning("Two cities, two calls."),
            ContentPart::text("Looking up both."),
            ContentPart::tool_call("call_a", "weather", "{\"city\":\"Oslo\"}"),
            ContentPart::tool_call("call_b", "weather", "{\"city\":\"Rome\"}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));
    assert_eq!(streamed.usage.reasoning_tokens, 12);
    // The usage chunk trails the finish signal, so the finish reason waits for flush.
    assert_eq!(chunks.last(), Some(&Chunk::finish(FinishReason::ToolUse)));

    let decoded = decode_response(
        &completion(
            json!({
                "role": "assistant",
                "reasoning_content": "Two cities, two calls.",
                "content": "Looking up both.",
                "tool_calls": [
                    {"id": "call_a", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}},
                    {"id": "call_b", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Rome\"}"}}
                ]
            }),
            "tool_calls",
        ),
        &ProcessorOptions::default(),
    )
    .unwrap();
    assert_equivalent(&streamed, &decoded);
}

#[test]
fn test_openai_format_tool_is_text() {
    let stream = vec![
        chunk(
            json!({"role": "assistant", "tool_calls": [{"index": 0, "id": "call_f", "type": "function",
                   "function": {"name": "__format_output__", "arguments": "{\"answer\":"}}]}),
            Value::Null,
        ),
        chunk(json!({"tool_calls": [{"index": 0, "function": {"arguments": "42}"}}]}), Value::Null),
        chunk(json!({}), json!("tool_calls")),
        usage_chunk(),
    ];
    let (_, streamed) = replay(OpenAIChunkProcessor::default(), events(stream));

    assert_eq!(streamed.message.content, vec![ContentPart::text("{\"answer\":42}")]);
    assert_eq!(streamed.finish_reason, Some(FinishReason::Stop));

    let decoded = decode_response(
        &completion(
            json!({
                "role": "assistant", "content": null,
                "tool_calls": [{"id": "call_f", "type": "function",
                                "function": {"name": "__format_output__", "arguments": "{\"answer\":42}"}}]
            }),
            "tool_calls",
        ),
        &ProcessorOptions::default(),
    )
    .unwrap();
    assert_equivalent(&streamed, &decoded);
}

#[test]
fn test_openai_refusal_and_content_filter() {
    let stream = vec![
        chunk(json!({"role": "assistant", "refusal": "I can't help "}), Value::Null),
        chunk(json!({"refusal": "with that."}), Value::Null),
        chunk(json!({}), json!("stop")),
        usage_chunk(),
    ];
    let (_, streamed) = replay(OpenAIChunkProcessor::default(), events(stream));
    assert_eq!(streamed.message.text(), "I can't help with that.");
    assert_eq!(streamed.finish_reason, Some(FinishReason::Refusal));

    let (_, filtered) = replay(
        OpenAIChunkProcessor::default(),
        events(vec![
            chunk(json!({"role": "assistant", "content": "Partial"}), Value::Null),
            chunk(json!({}), json!("content_filter")),
        ]),
    );
    assert_eq!(filtered.finish_reason, Some(FinishReason::Refusal));
}

#[test]
fn test_openai_truncated_stream_has_no_finish() {
    let (chunks, streamed) = replay(
        OpenAIChunkProcessor::default(),
        events(vec![chunk(json!({"role": "assistant", "content": "Cut o"}), Value::Null)]),
    );
    assert_eq!(streamed.message.text(), "Cut o");
    assert_eq!(streamed.finish_reason, None);
    assert_eq!(streamed.finish_reason_or_unknown(), FinishReason::Unknown);
    assert!(matches!(chunks.last(), Some(Chunk::RawMessage { .. })));
}

#[test]
fn test_openai_parallel_calls_without_ids() {
    let stream = vec![
        chunk(
            json!({"role": "assistant", "tool_calls": [{"index": 0, "type": "function",
                   "function": {"name": "weather", "arguments": ""}}]}),
            Value::Null,
        ),
        chunk(
            json!({"tool_calls": [{"index": 1, "type": "function",
                   "function": {"name": "time", "arguments": ""}}]}),
            Value::Null,
        ),
        chunk(json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"city\": "}}]}), Value::Null),
        chunk(json!({"tool_calls": [{"index": 1, "function": {"arguments": "{}"}}]}), Value::Null),
        chunk(json!({"tool_calls": [{"index": 0, "function": {"arguments": "\"Oslo\"}"}}]}), Value::Null),
        chunk(json!({}), json!("tool_calls")),
        usage_chunk(),
    ];
    let (chunks, streamed) = replay(OpenAIChunkProcessor::default(), events(stream));

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "weather", "{\"city\": \"Oslo\"}"),
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "time", "{}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));
    let starts: Vec<usize> = chunks
        .iter()
        .filter_map(|c| match c {
            Chunk::ToolCallStart { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec![0, 1]);
}

#[test]
fn test_openai_format_tool_after_visible_call() {
    let stream = vec![
        chunk(
            json!({"role": "assistant", "tool_calls": [{"index": 0, "id": "call_a", "type": "function",
                   "function": {"name": "lookup", "arguments": "{\"q\": \"rust\"}"}}]}),
            Value::Null,
        ),
        chunk(
            json!({"tool_calls": [{"index": 1, "id": "call_f", "type": "function",
                   "function": {"name": "__format_output__", "arguments": "{\"answer\": "}}]}),
            Value::Null,
        ),
        chunk(json!({"tool_calls": [{"index": 1, "function": {"arguments": "42}"}}]}), Value::Null),
        chunk(json!({}), json!("tool_calls")),
        usage_chunk(),
    ];
    let (_, streamed) = replay(OpenAIChunkProcessor::default(), events(stream));

    // Format arguments after a visible call form a trailing text part.
    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::tool_call("call_a", "lookup", "{\"q\": \"rust\"}"),
            ContentPart::text("{\"answer\": 42}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));

    let decoded = decode_response(
        &completion(
            json!({
                "role": "assistant", "content": null,
                "tool_calls": [
                    {"id": "call_a", "type": "function", "function": {"name": "lookup", "arguments": "{\"q\": \"rust\"}"}},
                    {"id": "call_f", "type": "function", "function": {"name": "__format_output__", "arguments": "{\"answer\": 42}"}}
                ]
            }),
            "tool_calls",
        ),
        &ProcessorOptions::default(),
    )
    .unwrap();
    assert_equivalent(&streamed, &decoded);
}
