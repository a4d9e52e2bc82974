use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// A decoded tool invocation, independent of the wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Convenience for tools that take no arguments.
    pub fn bare(tool_name: impl Into<String>) -> Self {
        Self::new(tool_name, Value::Object(Map::new()))
    }
}

/// Category of a failed dispatch, as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigError,
    AuthError,
    UnknownTool,
    InvalidArguments,
    NotFound,
    RemoteError,
    #[serde(rename = "InvalidURI")]
    InvalidUri,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "ConfigError",
            Self::AuthError => "AuthError",
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArguments => "InvalidArguments",
            Self::NotFound => "NotFound",
            Self::RemoteError => "RemoteError",
            Self::InvalidUri => "InvalidURI",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed payload block of a successful tool response.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Markdown text meant for the assistant to read.
    Text(String),
    /// A CSV document. `name` is its path under `tableau://`, e.g.
    /// `views/{id}/data`.
    Csv { name: String, body: String },
    Image { mime_type: String, data: Vec<u8> },
    /// An opaque file, e.g. a downloaded `.tdsx` archive. `name` is a
    /// path under `tableau://` ending in the file name.
    Binary {
        name: String,
        mime_type: String,
        data: Vec<u8>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::Image {
            mime_type: "image/png".into(),
            data,
        }
    }

    /// The text of a `Text` block, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Outcome of a dispatch. Every failure is captured here rather than
/// propagated, so a bad request never takes the server down.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    Content(Vec<ContentBlock>),
    Error { kind: ErrorKind, message: String },
}

impl ToolResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            Self::Content(_) => None,
        }
    }

    /// Concatenated text of all `Text` blocks (empty for errors).
    pub fn text(&self) -> String {
        match self {
            Self::Content(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Error { .. } => String::new(),
        }
    }
}

impl From<Error> for ToolResponse {
    fn from(err: Error) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_serializes_with_wire_names() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidUri).unwrap(),
            "\"InvalidURI\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotFound).unwrap(),
            "\"NotFound\""
        );
    }

    #[test]
    fn response_from_error_keeps_kind_and_message() {
        let resp: ToolResponse = Error::NotFound("view missing-id".into()).into();
        assert_eq!(resp.error_kind(), Some(ErrorKind::NotFound));
        match resp {
            ToolResponse::Error { message, .. } => assert!(message.contains("missing-id")),
            ToolResponse::Content(_) => panic!("expected error"),
        }
    }

    #[test]
    fn bare_request_has_empty_object_arguments() {
        let req = ToolRequest::bare("list_workbooks");
        assert_eq!(req.arguments, serde_json::json!({}));
    }
}
