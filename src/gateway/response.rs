use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured result returned for every dispatched command.
///
/// Serialises to the MCP tool-result shape:
/// `{"content": [{"type": "text", "text": "..."}], "isError": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Pretty-printed JSON payload under a heading.
    pub fn json(heading: &str, value: &Value) -> Self {
        let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(format!("{}\n\n{}", heading, body))
    }

    /// All text blocks joined by newlines.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|Content::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
