//! Message and Context domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the context builder assembles a `Context`, the LLM call appends messages
//! to it, and the compaction manager replaces its oldest prefix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A plain text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

/// User and tool-result content: either a bare string or a list of text blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<TextBlock>),
}

impl MessageContent {
    /// All text joined with newlines.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Total characters across all text, without separators.
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Blocks(blocks) => blocks.iter().map(|b| b.text.chars().count()).sum(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A block inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantBlock {
    Text {
        text: String,
    },
    ToolCall {
        /// Unique ID for this tool call
        id: String,
        /// Name of the tool to invoke
        name: String,
        /// Arguments as JSON
        #[serde(default)]
        arguments: serde_json::Value,
    },
}

/// A single message in a conversation.
///
/// Closed over the three roles the model sees. Every `ToolResult` must refer
/// to a `ToolCall` block emitted by an earlier `Assistant` message in the same
/// sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: MessageContent,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    Assistant {
        content: Vec<AssistantBlock>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ToolResult {
        tool_call_id: String,
        content: MessageContent,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant message with a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![AssistantBlock::Text { text: text.into() }],
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant message that requests a single tool call.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::Assistant {
            content: vec![AssistantBlock::ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<MessageContent>,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Replace the timestamp.
    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        match &mut self {
            Self::User { timestamp, .. }
            | Self::Assistant { timestamp, .. }
            | Self::ToolResult { timestamp, .. } => *timestamp = at,
        }
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::User { timestamp, .. }
            | Self::Assistant { timestamp, .. }
            | Self::ToolResult { timestamp, .. } => *timestamp,
        }
    }

    /// Human-readable role label.
    pub fn role_label(&self) -> &'static str {
        match self {
            Self::User { .. } => "User",
            Self::Assistant { .. } => "Assistant",
            Self::ToolResult { .. } => "Tool result",
        }
    }

    /// The message's text. Tool-call blocks are not included.
    pub fn text(&self) -> String {
        match self {
            Self::User { content, .. } | Self::ToolResult { content, .. } => content.text(),
            Self::Assistant { content, .. } => content
                .iter()
                .filter_map(|block| match block {
                    AssistantBlock::Text { text } => Some(text.as_str()),
                    AssistantBlock::ToolCall { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// IDs of the tool calls this message emits (assistant messages only).
    pub fn tool_call_ids(&self) -> impl Iterator<Item = &str> {
        let blocks: &[AssistantBlock] = match self {
            Self::Assistant { content, .. } => content,
            _ => &[],
        };
        blocks.iter().filter_map(|block| match block {
            AssistantBlock::ToolCall { id, .. } => Some(id.as_str()),
            AssistantBlock::Text { .. } => None,
        })
    }

    /// The tool call this message answers, if it is a tool result.
    pub fn answered_tool_call(&self) -> Option<&str> {
        match self {
            Self::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

/// The full conversation state submitted to the LLM for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Context {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system_prompt: None,
            messages,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
