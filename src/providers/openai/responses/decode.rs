use super::types::{OutputContent, OutputItem, Response, SummaryPart};
use crate::core::{Provider, StreamError};
use crate::providers::{
    AssistantMessage, ContentPart, Decoded, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ReasoningMode, Usage, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::OpenAIResponses;

/// Decodes a complete Responses API response object.
///
/// Each output item becomes at most one part, in output order.
pub fn decode_response(
    response: &Response,
    options: &ProcessorOptions,
) -> Result<Decoded, StreamError> {
    let mut content = Vec::new();
    let mut context = FinishContext::default();

    for item in &response.output {
        match item {
            OutputItem::Message { content: parts, .. } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        OutputContent::OutputText { text: delta, .. } => text.push_str(delta),
                        OutputContent::Refusal { refusal } => {
                            context.refusal_seen = true;
                            text.push_str(refusal);
                        }
                        OutputContent::Unsupported => {
                            return Err(StreamError::unsupported(PROVIDER, "message content type"));
                        }
                    }
                }
                if !text.is_empty() {
                    content.push(ContentPart::text(text));
                }
            }
            OutputItem::FunctionCall { name, arguments, .. } if options.is_format_tool(name) => {
                context.format_tool_used = true;
                if !arguments.is_empty() {
                    content.push(ContentPart::text(arguments.as_str()));
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => {
                context.visible_tool_calls += 1;
                content.push(ContentPart::tool_call(
                    call_id.as_deref().unwrap_or(UNKNOWN_TOOL_ID),
                    name.as_str(),
                    arguments.as_str(),
                ));
            }
            OutputItem::Reasoning { summary, .. } => {
                let text: String = summary
                    .iter()
                    .filter_map(|part| match part {
                        SummaryPart::SummaryText { text } => Some(text.as_str()),
                        SummaryPart::Unsupported => None,
                    })
                    .collect();
                if !text.is_empty() {
                    content.push(match options.reasoning {
                        ReasoningMode::Separate => ContentPart::reasoning(text),
                        ReasoningMode::AsText => ContentPart::text(text),
                    });
                }
            }
            OutputItem::Unsupported => {
                return Err(StreamError::unsupported(PROVIDER, "output item type"));
            }
        }
    }

    let translator = FinishReasonTranslator::new(PROVIDER);
    let finish_reason = match response.status.as_deref() {
        Some("completed") => Some(translator.resolve(Some("completed"), context)),
        Some("incomplete") => {
            let reason = response
                .incomplete_details
                .as_ref()
                .and_then(|details| details.reason.as_deref());
            Some(translator.resolve(reason, context))
        }
        _ => None,
    };

    Ok(Decoded {
        message: AssistantMessage {
            content,
            raw_message: Some(serde_json::to_value(&response.output)?),
        },
        finish_reason,
        usage: response.usage.as_ref().map(Usage::from).unwrap_or_default(),
    })
}
