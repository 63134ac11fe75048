use llm_stream::core::StreamError;
use llm_stream::providers::openai::responses::decode_response;
use llm_stream::providers::openai::responses::types::{Response, ResponseEvent};
use llm_stream::providers::{
    Chunk, ContentPart, FinishReason, ProcessorOptions, ResponsesChunkProcessor, UNKNOWN_TOOL_ID,
};
use serde_json::{json, Value};

use crate::common::{assert_equivalent, events, replay};

fn output() -> Value {
    json!([
        {"type": "reasoning", "id": "rs_1", "summary": [{"type": "summary_text", "text": "Compare both files."}]},
        {"type": "message", "id": "msg_1", "role": "assistant", "status": "completed",
         "content": [{"type": "output_text", "text": "Reading the first file.", "annotations": []}]},
        {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "read_file",
         "arguments": "{\"path\":\"a.rs\"}", "status": "completed"}
    ])
}

fn usage() -> Value {
    json!({"input_tokens": 80, "output_tokens": 25, "total_tokens": 105,
           "input_tokens_details": {"cached_tokens": 64},
           "output_tokens_details": {"reasoning_tokens": 10}})
}

fn stream() -> Vec<Value> {
    let output = output();
    vec![
        json!({"type": "response.created", "response": {"id": "resp_1", "status": "in_progress", "output": []}}),
        json!({"type": "response.in_progress", "response": {"id": "resp_1", "status": "in_progress", "output": []}}),
        json!({"type": "response.output_item.added", "output_index": 0, "item": {"type": "reasoning", "id": "rs_1", "summary": []}}),
        json!({"type": "response.reasoning_summary_part.added", "item_id": "rs_1", "output_index": 0, "summary_index": 0, "part": {"type": "summary_text", "text": ""}}),
        json!({"type": "response.reasoning_summary_text.delta", "item_id": "rs_1", "output_index": 0, "summary_index": 0, "delta": "Compare "}),
        json!({"type": "response.reasoning_summary_text.delta", "item_id": "rs_1", "output_index": 0, "summary_index": 0, "delta": "both files."}),
        json!({"type": "response.reasoning_summary_text.done", "item_id": "rs_1", "output_index": 0, "summary_index": 0, "text": "Compare both files."}),
        json!({"type": "response.output_item.done", "output_index": 0, "item": output[0]}),
        json!({"type": "response.output_item.added", "output_index": 1, "item": {"type": "message", "id": "msg_1", "role": "assistant", "status": "in_progress", "content": []}}),
        json!({"type": "response.content_part.added", "item_id": "msg_1", "output_index": 1, "content_index": 0, "part": {"type": "output_text", "text": ""}}),
        json!({"type": "response.output_text.delta", "item_id": "msg_1", "output_index": 1, "content_index": 0, "delta": "Reading the "}),
        json!({"type": "response.output_text.delta", "item_id": "msg_1", "output_index": 1, "content_index": 0, "delta": "first file."}),
        json!({"type": "response.output_text.done", "item_id": "msg_1", "output_index": 1, "content_index": 0, "text": "Reading the first file."}),
        json!({"type": "response.content_part.done", "item_id": "msg_1", "output_index": 1, "content_index": 0, "part": {"type": "output_text", "text": "Reading the first file."}}),
        json!({"type": "response.output_item.done", "output_index": 1, "item": output[1]}),
        json!({"type": "response.output_item.added", "output_index": 2, "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "read_file", "arguments": "", "status": "in_progress"}}),
        json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "output_index": 2, "delta": "{\"path\":"}),
        json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "output_index": 2, "delta": "\"a.rs\"}"}),
        json!({"type": "response.function_call_arguments.done", "item_id": "fc_1", "output_index": 2, "arguments": "{\"path\":\"a.rs\"}"}),
        json!({"type": "response.output_item.done", "output_index": 2, "item": output[2]}),
        json!({"type": "response.completed", "response": {"id": "resp_1", "status": "completed", "output": output, "usage": usage()}}),
    ]
}

#[test]
fn test_responses_stream_matches_response() {
    let (_, streamed) = replay(ResponsesChunkProcessor::default(), events(stream()));
    let response: Response = serde_json::from_value(json!({
        "id": "resp_1", "status": "completed", "output": output(), "usage": usage()
    }))
    .unwrap();
    let decoded = decode_response(&response, &ProcessorOptions::default()).unwrap();

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::reasoning("Compare both files."),
            ContentPart::text("Reading the first file."),
            ContentPart::tool_call("call_1", "read_file", "{\"path\":\"a.rs\"}"),
        ]
    );
    // "completed" with a visible function call is a tool-use turn.
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));
    assert_eq!(streamed.usage.cache_read_tokens, 64);
    assert_equivalent(&streamed, &decoded);
    assert_eq!(streamed.message.raw_message, Some(output()));
}

#[test]
fn test_responses_incomplete_is_max_tokens() {
    let (_, streamed) = replay(
        ResponsesChunkProcessor::default(),
        events(vec![
            json!({"type": "response.output_item.added", "output_index": 0, "item": {"type": "message", "id": "msg_1", "role": "assistant", "content": []}}),
            json!({"type": "response.output_text.delta", "item_id": "msg_1", "output_index": 0, "content_index": 0, "delta": "Trunc"}),
            json!({"type": "response.incomplete", "response": {
                "id": "resp_2", "status": "incomplete", "output": [],
                "incomplete_details": {"reason": "max_output_tokens"}
            }}),
        ]),
    );
    assert_eq!(streamed.message.text(), "Trunc");
    assert_eq!(streamed.finish_reason, Some(FinishReason::MaxTokens));
}

#[test]
fn test_responses_failed_is_upstream() {
    let result: Result<Vec<_>, _> = llm_stream::normalize(
        ResponsesChunkProcessor::default(),
        events::<ResponseEvent>(vec![json!({"type": "response.failed", "response": {
            "id": "resp_3", "status": "failed", "output": [],
            "error": {"code": "server_error", "message": "The model crashed"}
        }})])
        .into_iter()
        .map(Ok),
    )
    .collect();
    assert!(matches!(
        result,
        Err(StreamError::Upstream { ref message, .. }) if message == "The model crashed"
    ));
}

#[test]
fn test_responses_overlapping_calls_without_call_ids() {
    let output = json!([
        {"type": "function_call", "id": "fc_1", "name": "read_file", "arguments": "{\"path\": \"a.rs\"}", "status": "completed"},
        {"type": "function_call", "id": "fc_2", "name": "read_file", "arguments": "{\"path\": \"b.rs\"}", "status": "completed"}
    ]);
    let (_, streamed) = replay(
        ResponsesChunkProcessor::default(),
        events(vec![
            json!({"type": "response.output_item.added", "output_index": 0, "item": {"type": "function_call", "id": "fc_1", "name": "read_file", "arguments": "", "status": "in_progress"}}),
            json!({"type": "response.output_item.added", "output_index": 1, "item": {"type": "function_call", "id": "fc_2", "name": "read_file", "arguments": "", "status": "in_progress"}}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "output_index": 0, "delta": "{\"path\": "}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_2", "output_index": 1, "delta": "{\"path\": \"b.rs\"}"}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "output_index": 0, "delta": "\"a.rs\"}"}),
            json!({"type": "response.output_item.done", "output_index": 0, "item": output[0]}),
            json!({"type": "response.output_item.done", "output_index": 1, "item": output[1]}),
            json!({"type": "response.completed", "response": {"id": "resp_4", "status": "completed", "output": output, "usage": usage()}}),
        ]),
    );

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "read_file", "{\"path\": \"a.rs\"}"),
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "read_file", "{\"path\": \"b.rs\"}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));

    let response: Response = serde_json::from_value(json!({
        "id": "resp_4", "status": "completed", "output": output, "usage": usage()
    }))
    .unwrap();
    let decoded = decode_response(&response, &ProcessorOptions::default()).unwrap();
    assert_equivalent(&streamed, &decoded);
}

#[test]
fn test_responses_stream_without_terminal_event() {
    let (chunks, streamed) = replay(
        ResponsesChunkProcessor::default(),
        events(vec![
            json!({"type": "response.output_item.added", "output_index": 0, "item": {"type": "message", "id": "msg_1", "role": "assistant", "content": []}}),
            json!({"type": "response.output_text.delta", "item_id": "msg_1", "output_index": 0, "content_index": 0, "delta": "Half an ans"}),
        ]),
    );
    assert_eq!(streamed.message.content, vec![ContentPart::text("Half an ans")]);
    assert_eq!(streamed.finish_reason, None);
    assert_eq!(streamed.finish_reason_or_unknown(), FinishReason::Unknown);
    assert!(matches!(chunks.last(), Some(Chunk::RawMessage { .. })));
}
