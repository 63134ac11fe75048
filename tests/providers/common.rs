use llm_stream::core::{accumulate, Accumulated};
use llm_stream::providers::{Chunk, ChunkProcessor, ContentPart, Decoded};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn events<E: DeserializeOwned>(values: Vec<Value>) -> Vec<E> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap())
        .collect()
}

/// Feeds every event through the processor, checks the chunk grammar and
/// returns the chunks with what they accumulate to.
pub fn replay<P: ChunkProcessor>(mut processor: P, events: Vec<P::Event>) -> (Vec<Chunk>, Accumulated) {
    let mut chunks = Vec::new();
    for event in events {
        let batch = processor.process(event).unwrap();
        assert!(
            matches!(batch.first(), Some(Chunk::RawEvent { .. })),
            "batch does not start with the raw event: {batch:?}"
        );
        chunks.extend(batch);
    }
    chunks.extend(processor.flush().unwrap());

    assert_well_formed(&chunks);
    let accumulated = accumulate(chunks.iter().cloned().map(Ok)).unwrap();
    assert_deltas_round_trip(&chunks, &accumulated);
    (chunks, accumulated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Simple {
    Text,
    Reasoning,
}

/// Starts and ends pair up, deltas only land in open channels, and at most
/// one finish reason closes the sequence.
pub fn assert_well_formed(chunks: &[Chunk]) {
    let mut simple = None;
    let mut tools: Vec<(usize, &str)> = Vec::new();
    let mut finished = false;

    for (i, chunk) in chunks.iter().enumerate() {
        assert!(!finished, "chunk {i} ({chunk:?}) after the finish reason");
        match chunk {
            Chunk::TextStart | Chunk::ReasoningStart => {
                assert!(simple.is_none(), "chunk {i}: nested text/reasoning run");
                simple = Some(if chunk == &Chunk::TextStart {
                    Simple::Text
                } else {
                    Simple::Reasoning
                });
            }
            Chunk::TextDelta { .. } => assert_eq!(simple, Some(Simple::Text), "chunk {i}"),
            Chunk::ReasoningDelta { .. } => {
                assert_eq!(simple, Some(Simple::Reasoning), "chunk {i}");
            }
            Chunk::TextEnd => {
                assert_eq!(simple.take(), Some(Simple::Text), "chunk {i}");
            }
            Chunk::ReasoningEnd => {
                assert_eq!(simple.take(), Some(Simple::Reasoning), "chunk {i}");
            }
            Chunk::ToolCallStart { index, id, .. } => {
                assert!(
                    tools.iter().all(|(open, _)| open != index),
                    "chunk {i}: tool call #{index} opened twice"
                );
                tools.push((*index, id));
            }
            Chunk::ToolCallDelta { index, id, .. } => {
                assert!(
                    tools.contains(&(*index, id.as_str())),
                    "chunk {i}: tool call #{index} ({id}) is not open"
                );
            }
            Chunk::ToolCallEnd { index, id } => {
                let position = tools.iter().position(|open| *open == (*index, id.as_str()));
                assert!(position.is_some(), "chunk {i}: tool call #{index} ({id}) is not open");
                tools.retain(|open| *open != (*index, id.as_str()));
            }
            Chunk::FinishReason { .. } => {
                assert!(simple.is_none() && tools.is_empty(), "finish with open channels");
                finished = true;
            }
            Chunk::RawEvent { .. } | Chunk::RawMessage { .. } | Chunk::UsageDelta { .. } => {}
        }
    }
    assert!(simple.is_none() && tools.is_empty(), "channels left open");
}

fn concat<T>(items: &[T], pick: impl Fn(&T) -> Option<&str>) -> String {
    items.iter().filter_map(pick).collect()
}

/// Concatenated deltas reproduce the accumulated content exactly
pub fn assert_deltas_round_trip(chunks: &[Chunk], accumulated: &Accumulated) {
    let parts = &accumulated.message.content;
    assert_eq!(
        concat(chunks, |c| match c {
            Chunk::TextDelta { delta } => Some(delta.as_str()),
            _ => None,
        }),
        concat(parts, |p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
    );
    assert_eq!(
        concat(chunks, |c| match c {
            Chunk::ReasoningDelta { delta } => Some(delta.as_str()),
            _ => None,
        }),
        concat(parts, |p| match p {
            ContentPart::Reasoning { text } => Some(text.as_str()),
            _ => None,
        })
    );
    assert_eq!(
        concat(chunks, |c| match c {
            Chunk::ToolCallDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        }),
        concat(parts, |p| match p {
            ContentPart::ToolCall { args, .. } => Some(args.as_str()),
            _ => None,
        })
    );
}

/// The streamed and one-shot paths agree on content, finish reason and usage
pub fn assert_equivalent(streamed: &Accumulated, decoded: &Decoded) {
    assert_eq!(streamed.message.content, decoded.message.content);
    assert_eq!(streamed.finish_reason, decoded.finish_reason);
    assert_eq!(streamed.usage, decoded.usage);
}
