use super::types::ChatCompletionObject;
use crate::core::{Provider, StreamError};
use crate::providers::{
    AssistantMessage, ContentPart, Decoded, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ReasoningMode, Usage,
};

/// Decodes a complete chat completion into the parts the streaming path
/// accumulates.
///
/// Text, refusal and format-tool arguments share one text run, which a
/// visible tool call ends; visible tool calls close in order after it.
/// Format-tool arguments that follow a visible call form a trailing text
/// part, which is where the stream reports them when calls arrive one
/// after another.
pub fn decode_response(
    response: &ChatCompletionObject,
    options: &ProcessorOptions,
) -> Result<Decoded, StreamError> {
    if response.choices.len() > 1 {
        return Err(StreamError::unsupported(Provider::OpenAI, "multiple choices"));
    }
    let usage: Usage = response.usage.as_ref().map(Into::into).unwrap_or_default();
    let Some(choice) = response.choices.first() else {
        return Ok(Decoded {
            message: AssistantMessage::default(),
            finish_reason: None,
            usage,
        });
    };
    let message = &choice.message;

    let mut content = Vec::new();
    let mut context = FinishContext::default();

    if let Some(reasoning) = message.reasoning_content.as_deref().filter(|r| !r.is_empty()) {
        content.push(match options.reasoning {
            ReasoningMode::Separate => ContentPart::reasoning(reasoning),
            ReasoningMode::AsText => ContentPart::text(reasoning),
        });
    }

    let mut leading = String::new();
    leading.push_str(message.content.as_deref().unwrap_or_default());
    if let Some(refusal) = message.refusal.as_deref().filter(|r| !r.is_empty()) {
        context.refusal_seen = true;
        leading.push_str(refusal);
    }

    let mut tools = Vec::new();
    let mut trailing = String::new();
    for call in message.tool_calls.iter().flatten() {
        let function = &call.function;
        if options.is_format_tool(&function.name) {
            context.format_tool_used = true;
            if tools.is_empty() {
                leading.push_str(&function.arguments);
            } else {
                trailing.push_str(&function.arguments);
            }
        } else {
            tools.push(ContentPart::tool_call(
                call.id.as_str(),
                function.name.as_str(),
                function.arguments.as_str(),
            ));
        }
    }
    context.visible_tool_calls = tools.len();

    if !leading.is_empty() {
        content.push(ContentPart::text(leading));
    }
    content.extend(tools);
    if !trailing.is_empty() {
        content.push(ContentPart::text(trailing));
    }

    let finish_reason = choice.finish_reason.as_deref().map(|reason| {
        FinishReasonTranslator::new(Provider::OpenAI).resolve(Some(reason), context)
    });

    Ok(Decoded {
        message: AssistantMessage {
            content,
            raw_message: Some(serde_json::to_value(message)?),
        },
        finish_reason,
        usage,
    })
}
