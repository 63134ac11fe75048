use super::types::{GenerateContentResponse, PartKind};
use crate::core::{Provider, StreamError};
use crate::providers::{
    AssistantMessage, ContentPart, Decoded, FinishContext, FinishReasonTranslator,
    ProcessorOptions, ReasoningMode, Usage, UNKNOWN_TOOL_ID,
};

const PROVIDER: Provider = Provider::Google;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    None,
    Text,
    Reasoning,
}

/// Collects parts the way the streaming channels close them: consecutive
/// text (or thought) parts form one run, ended by any change of channel.
struct Parts {
    reasoning: ReasoningMode,
    content: Vec<ContentPart>,
    run: Run,
}

impl Parts {
    fn push_run(&mut self, run: Run, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.run == run {
            if let Some(ContentPart::Text { text: buffer } | ContentPart::Reasoning { text: buffer }) =
                self.content.last_mut()
            {
                buffer.push_str(text);
                return;
            }
        }
        self.content.push(match (run, self.reasoning) {
            (Run::Reasoning, ReasoningMode::Separate) => ContentPart::reasoning(text),
            _ => ContentPart::text(text),
        });
        self.run = run;
    }

    fn push_tool_call(&mut self, part: ContentPart) {
        self.content.push(part);
        self.run = Run::None;
    }
}

/// Decodes a complete `generateContent` response.
pub fn decode_response(
    response: &GenerateContentResponse,
    options: &ProcessorOptions,
) -> Result<Decoded, StreamError> {
    if response.candidates.len() > 1 {
        return Err(StreamError::unsupported(PROVIDER, "multiple candidates"));
    }
    let mut parts = Parts {
        reasoning: options.reasoning,
        content: Vec::new(),
        run: Run::None,
    };
    let mut context = FinishContext::default();
    let candidate = response.candidates.first();

    for part in candidate
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default()
    {
        match part.kind() {
            PartKind::Text(text) => parts.push_run(Run::Text, text),
            PartKind::Thought(text) => parts.push_run(Run::Reasoning, text),
            PartKind::FunctionCall(call) if options.is_format_tool(&call.name) => {
                context.format_tool_used = true;
                parts.push_run(Run::Text, &serde_json::to_string(&call.args)?);
            }
            PartKind::FunctionCall(call) => {
                context.visible_tool_calls += 1;
                parts.push_tool_call(ContentPart::tool_call(
                    call.id.as_deref().unwrap_or(UNKNOWN_TOOL_ID),
                    call.name.as_str(),
                    serde_json::to_string(&call.args)?,
                ));
            }
            PartKind::Empty => {}
            PartKind::Unsupported(feature) => {
                return Err(StreamError::unsupported(PROVIDER, feature));
            }
        }
    }

    let finish_reason = candidate
        .and_then(|c| c.finish_reason.as_deref())
        .map(|reason| FinishReasonTranslator::new(PROVIDER).resolve(Some(reason), context));
    let raw_message = candidate
        .and_then(|c| c.content.as_ref())
        .map(serde_json::to_value)
        .transpose()?;

    Ok(Decoded {
        message: AssistantMessage {
            content: parts.content,
            raw_message,
        },
        finish_reason,
        usage: response
            .usage_metadata
            .as_ref()
            .map(Usage::from)
            .unwrap_or_default(),
    })
}
