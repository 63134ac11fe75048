use llm_stream::providers::mlx::decode_response;
use llm_stream::providers::mlx::types::GenerationResponse;
use llm_stream::providers::{
    ContentPart, FinishReason, MlxChunkProcessor, ProcessorOptions, ReasoningMode, UNKNOWN_TOOL_ID,
};

use crate::common::{assert_equivalent, replay};

const TOKENS: &[&str] = &[
    "<th", "ink>", "User wants", " a search.", "</think>", "Searching", ".", "<tool_",
    "call>\n{\"name\": \"search\", ", "\"arguments\": {\"query\": \"mlx\"}}\n", "</tool_call>",
];

fn stream() -> Vec<GenerationResponse> {
    let last = TOKENS.len() - 1;
    TOKENS
        .iter()
        .enumerate()
        .map(|(i, text)| GenerationResponse {
            text: text.to_string(),
            token: Some(i as u32),
            finish_reason: (i == last).then(|| "stop".to_string()),
            prompt_tokens: 18,
            generation_tokens: i as u64 + 1,
            generation_tps: Some(41.5),
            ..GenerationResponse::default()
        })
        .collect()
}

fn response() -> GenerationResponse {
    GenerationResponse {
        text: TOKENS.concat(),
        finish_reason: Some("stop".to_string()),
        prompt_tokens: 18,
        generation_tokens: TOKENS.len() as u64,
        ..GenerationResponse::default()
    }
}

#[test]
fn test_mlx_stream_matches_response() {
    let (_, streamed) = replay(MlxChunkProcessor::default(), stream());
    let decoded = decode_response(&response(), &ProcessorOptions::default()).unwrap();

    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::reasoning("User wants a search."),
            ContentPart::text("Searching."),
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "search", "{\"query\":\"mlx\"}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));
    assert_eq!(streamed.usage.output_tokens, TOKENS.len() as u64);
    assert_equivalent(&streamed, &decoded);
    assert_eq!(
        streamed.message.raw_message,
        Some(serde_json::Value::String(TOKENS.concat()))
    );
}

#[test]
fn test_mlx_think_tags_stay_text() {
    let options = ProcessorOptions::default().with_reasoning(ReasoningMode::AsText);
    let (chunks, streamed) = replay(MlxChunkProcessor::new(options.clone()), stream());
    let decoded = decode_response(&response(), &options).unwrap();

    assert!(!chunks.iter().any(|c| matches!(c, llm_stream::Chunk::ReasoningStart)));
    assert_eq!(
        streamed.message.content[0],
        ContentPart::text("<think>User wants a search.</think>Searching.")
    );
    assert_equivalent(&streamed, &decoded);
}

fn generation(tokens: &[&str], finish_reason: Option<&str>) -> Vec<GenerationResponse> {
    let last = tokens.len() - 1;
    tokens
        .iter()
        .enumerate()
        .map(|(i, text)| GenerationResponse {
            text: text.to_string(),
            token: Some(i as u32),
            finish_reason: finish_reason.filter(|_| i == last).map(str::to_string),
            prompt_tokens: 9,
            generation_tokens: i as u64 + 1,
            ..GenerationResponse::default()
        })
        .collect()
}

#[test]
fn test_mlx_two_tool_calls() {
    let tokens = [
        "<tool_call>\n{\"name\": \"read_file\", ",
        "\"arguments\": {\"path\": \"b.rs\", \"lines\": 10}}\n</tool_",
        "call><tool_call>\n{\"name\": \"read_file\", \"arguments\": ",
        "\"{\\\"path\\\": \\\"a.rs\\\"}\"}\n</tool_call>",
    ];
    let (_, streamed) = replay(MlxChunkProcessor::default(), generation(&tokens, Some("stop")));
    let decoded = decode_response(
        &GenerationResponse {
            text: tokens.concat(),
            finish_reason: Some("stop".to_string()),
            prompt_tokens: 9,
            generation_tokens: tokens.len() as u64,
            ..GenerationResponse::default()
        },
        &ProcessorOptions::default(),
    )
    .unwrap();

    // Object arguments are re-serialized, string arguments pass through.
    assert_eq!(
        streamed.message.content,
        vec![
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "read_file", "{\"path\":\"b.rs\",\"lines\":10}"),
            ContentPart::tool_call(UNKNOWN_TOOL_ID, "read_file", "{\"path\": \"a.rs\"}"),
        ]
    );
    assert_eq!(streamed.finish_reason, Some(FinishReason::ToolUse));
    assert_equivalent(&streamed, &decoded);
}

#[test]
fn test_mlx_generation_without_finish_reason() {
    let (chunks, streamed) = replay(
        MlxChunkProcessor::default(),
        generation(&["Still ", "<think>going"], None),
    );
    assert_eq!(
        streamed.message.content,
        vec![ContentPart::text("Still "), ContentPart::reasoning("going")]
    );
    assert_eq!(streamed.finish_reason, None);
    assert!(matches!(chunks.last(), Some(llm_stream::Chunk::RawMessage { .. })));
}
