use serde_json::Value;

use super::processor::{apply_segment, tag_parser, ToolCalls};
use super::types::GenerationResponse;
use crate::core::{Provider, StreamError};
use crate::providers::{
    AssistantMessage, ChannelState, Decoded, FinishContext, FinishReasonTranslator,
    ProcessorOptions, Usage,
};

/// Decodes a complete generation. The whole text goes through the same tag
/// parser the streaming path uses.
pub fn decode_response(
    response: &GenerationResponse,
    options: &ProcessorOptions,
) -> Result<Decoded, StreamError> {
    let mut state = ChannelState::new(Provider::Mlx, options.reasoning);
    let mut parser = tag_parser(options);
    let mut tools = ToolCalls::default();
    let mut discarded = Vec::new();

    let segments = parser.feed(&response.text).into_iter().chain(parser.finish());
    for segment in segments {
        apply_segment(&mut state, &mut discarded, segment, options, &mut tools)?;
    }
    state.close_all(&mut discarded);

    let finish_reason = response.finish_reason.as_deref().map(|reason| {
        FinishReasonTranslator::new(Provider::Mlx).resolve(
            Some(reason),
            FinishContext {
                visible_tool_calls: state.visible_tool_calls(),
                format_tool_used: tools.format_tool_used,
                refusal_seen: false,
            },
        )
    });

    Ok(Decoded {
        message: AssistantMessage {
            content: state.finished_parts().to_vec(),
            raw_message: Some(Value::String(response.text.clone())),
        },
        finish_reason,
        usage: Usage::from(response),
    })
}
