//! Type definitions for the agent-facing protocol surface
//!
//! The bridge itself never frames wire messages; it hands these values to an
//! external protocol layer which exposes each compiled operation as a
//! callable tool and each resource template as a readable resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition presented to the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (unique, `[a-z0-9_]`, max 64 chars)
    pub name: String,
    /// Tool description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input JSON Schema
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Readable resource template presented to the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplateInfo {
    /// URI template, e.g. `https://api.example.com/v1/items/{id}`
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    /// Resource name (unique within the resource namespace)
    pub name: String,
    /// Resource description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of read results
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Content item in a tool call response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// Text value
        text: String,
    },
}

impl Content {
    /// Borrow the text of a text content item
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// Result of a tool call
///
/// Failed calls set `is_error` and carry the formatted failure message as
/// their content; the session is expected to keep running either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallResult {
    /// Content items
    pub content: Vec<Content>,
    /// Whether the result is an error
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolsCallResult {
    /// Successful result with a single text content item
    #[must_use]
    pub fn text(text: String) -> Self {
        Self {
            content: vec![Content::Text { text }],
            is_error: false,
        }
    }

    /// Soft-failure result with a single text content item
    #[must_use]
    pub fn error(text: String) -> Self {
        Self {
            content: vec![Content::Text { text }],
            is_error: true,
        }
    }
}

/// Contents returned by a resource read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContents {
    /// URI the read resolved to (variables substituted)
    pub uri: String,
    /// MIME type
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Text content
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_serializes_with_camel_case_schema_key() {
        let tool = Tool {
            name: "get_user".to_string(),
            description: Some("Fetch a user".to_string()),
            input_schema: serde_json::json!({"type": "object"}),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("\"inputSchema\""));
    }

    #[test]
    fn error_result_sets_is_error_flag() {
        let result = ToolsCallResult::error("API Error (400): Bad Request".to_string());
        assert!(result.is_error);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"isError\":true"));
    }

    #[test]
    fn is_error_defaults_to_false_on_deserialize() {
        let result: ToolsCallResult =
            serde_json::from_str(r#"{"content":[{"type":"text","text":"ok"}]}"#).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), "ok");
    }
}
