use std::fmt;

/// A single rule a map document or edit violated, addressed by its JSON path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every issue found while validating a map, in document order.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_issues(.issues))]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![SchemaIssue::new(path, message)],
        }
    }

    /// True if any issue is reported at exactly `path`.
    pub fn mentions(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

fn render_issues(issues: &[SchemaIssue]) -> String {
    match issues {
        [] => "schema validation failed".to_owned(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Errors produced by the graph model and the view filter.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The document or graph is malformed or inconsistent.
    #[error("invalid map: {0}")]
    Schema(#[from] SchemaError),

    /// The document is not parseable JSON, or a field has the wrong JSON type.
    #[error("map document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The graph has no nodes to focus.
    #[error("map has no nodes")]
    EmptyGraph,

    /// The view filter was asked to center on a node that does not exist.
    #[error("focus node `{id}` does not exist in the map")]
    UnknownFocus { id: String },

    #[error("node `{id}` does not exist in the map")]
    UnknownNode { id: String },

    #[error("node `{id}` already exists in the map")]
    DuplicateNode { id: String },

    #[error("node `{id}` cannot be linked to itself")]
    SelfLink { id: String },
}
