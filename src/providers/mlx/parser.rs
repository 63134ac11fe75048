use log::warn;

use crate::providers::MlxTags;

/// A classified piece of generated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Think(String),
    /// The think span was closed
    ThinkEnd,
    /// The complete body between the tool-call tags
    ToolCall(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Think,
    ToolCall,
}

/// Incremental splitter for a flat token stream with inline tags.
///
/// Text that could be the beginning of a tag is held back until the next
/// token decides it, so tags split across tokens are still recognised.
/// Tool-call bodies are buffered until their closing tag.
#[derive(Debug)]
pub struct TagParser {
    tags: MlxTags,
    parse_think: bool,
    mode: Mode,
    pending: String,
    tool_body: String,
}

impl TagParser {
    /// With `parse_think` unset, think tags are ordinary text.
    pub const fn new(tags: MlxTags, parse_think: bool) -> Self {
        Self {
            tags,
            parse_think,
            mode: Mode::Text,
            pending: String::new(),
            tool_body: String::new(),
        }
    }

    pub fn feed(&mut self, text: &str) -> Vec<Segment> {
        self.pending.push_str(text);
        let mut segments = Vec::new();
        while self.step(&mut segments) {}
        segments
    }

    /// Drains everything still held back at end of stream
    pub fn finish(&mut self) -> Vec<Segment> {
        let rest = std::mem::take(&mut self.pending);
        let mut segments = Vec::new();
        match self.mode {
            Mode::Text => push_text(&mut segments, Segment::Text(rest)),
            Mode::Think => {
                push_text(&mut segments, Segment::Think(rest));
                segments.push(Segment::ThinkEnd);
            }
            Mode::ToolCall => {
                warn!("tool call left unterminated at end of generation, reported as text");
                let body = std::mem::take(&mut self.tool_body);
                let literal = format!("{}{body}{rest}", self.tags.tool_call_start);
                push_text(&mut segments, Segment::Text(literal));
            }
        }
        self.mode = Mode::Text;
        segments
    }

    /// Consumes up to the next tag. Returns whether a tag was found.
    fn step(&mut self, segments: &mut Vec<Segment>) -> bool {
        let tags = tags_for_mode(&self.tags, self.mode, self.parse_think);
        let found = tags
            .iter()
            .filter(|tag| !tag.is_empty())
            .filter_map(|tag| self.pending.find(*tag).map(|at| (at, tag.len(), *tag)))
            .min_by_key(|(at, _, _)| *at)
            .map(|(at, len, tag)| (at, len, tag.to_string()));

        let Some((at, len, tag)) = found else {
            let keep = held_back(&self.pending, &tags);
            let ready: String = self.pending.drain(..self.pending.len() - keep).collect();
            self.emit(segments, ready);
            return false;
        };

        let before: String = self.pending.drain(..at).collect();
        self.pending.drain(..len);
        self.emit(segments, before);

        self.mode = match self.mode {
            Mode::Text if tag == self.tags.tool_call_start => Mode::ToolCall,
            Mode::Text => Mode::Think,
            Mode::Think => {
                segments.push(Segment::ThinkEnd);
                Mode::Text
            }
            Mode::ToolCall => {
                segments.push(Segment::ToolCall(std::mem::take(&mut self.tool_body)));
                Mode::Text
            }
        };
        true
    }

    fn emit(&mut self, segments: &mut Vec<Segment>, text: String) {
        match self.mode {
            Mode::Text => push_text(segments, Segment::Text(text)),
            Mode::Think => push_text(segments, Segment::Think(text)),
            Mode::ToolCall => self.tool_body.push_str(&text),
        }
    }
}

/// Tags that can end the current mode
fn tags_for_mode(tags: &MlxTags, mode: Mode, parse_think: bool) -> Vec<&str> {
    match mode {
        Mode::Text if parse_think => {
            vec![tags.tool_call_start.as_str(), tags.think_start.as_str()]
        }
        Mode::Text => vec![tags.tool_call_start.as_str()],
        Mode::Think => vec![tags.think_end.as_str()],
        Mode::ToolCall => vec![tags.tool_call_end.as_str()],
    }
}

fn push_text(segments: &mut Vec<Segment>, segment: Segment) {
    match &segment {
        Segment::Text(text) | Segment::Think(text) if text.is_empty() => {}
        _ => segments.push(segment),
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of a tag
fn held_back(text: &str, tags: &[&str]) -> usize {
    let longest = tags.iter().map(|tag| tag.len()).max().unwrap_or(0);
    (1..longest.min(text.len() + 1))
        .rev()
        .find(|&keep| {
            let start = text.len() - keep;
            text.is_char_boundary(start)
                && tags
                    .iter()
                    .any(|tag| tag.len() > keep && tag.starts_with(&text[start..]))
        })
        .unwrap_or(0)
}
