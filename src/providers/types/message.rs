use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One finished piece of assistant content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// The tool arguments exactly as the model produced them (JSON text)
        args: String,
    },
    Reasoning {
        text: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: impl Into<String>) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            args: args.into(),
        }
    }

    /// The part's text, or the arguments of a tool call
    pub fn into_content(self) -> String {
        match self {
            Self::Text { text } | Self::Reasoning { text } => text,
            Self::ToolCall { args, .. } => args,
        }
    }
}

impl fmt::Display for ContentPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text } => write!(f, "{text}"),
            Self::Reasoning { text } => write!(f, "<reasoning>{text}</reasoning>"),
            Self::ToolCall { name, args, .. } => write!(f, "{name}({args})"),
        }
    }
}

/// The assistant message reconstructed from a response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssistantMessage {
    /// Finished content parts, in the order they completed
    pub content: Vec<ContentPart>,
    /// Provider-native form of the message, for reuse without re-encoding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<Value>,
}

impl AssistantMessage {
    pub const fn new(content: Vec<ContentPart>) -> Self {
        Self {
            content,
            raw_message: None,
        }
    }

    /// All text parts joined together
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ContentPart> {
        self.content
            .iter()
            .filter(|part| matches!(part, ContentPart::ToolCall { .. }))
    }
}

impl fmt::Display for AssistantMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.content.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}
