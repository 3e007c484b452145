//! Parsed OpenAPI document model
//!
//! The bridge consumes an already-parsed document. The raw
//! `serde_json::Value` tree is kept alongside the typed views so `$ref`
//! pointers can be resolved against the whole document; individual
//! operations are deserialized lazily so one malformed entry never takes
//! down the rest of the document.

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

use super::schema::resolve_pointer;

/// HTTP methods recognized as operation keys under a path item.
///
/// Everything else under a path (`parameters`, `summary`, `description`) is
/// a non-operation key.
pub const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// An OpenAPI document plus its raw tree for reference resolution
#[derive(Debug, Clone)]
pub struct SpecDocument {
    raw: Value,
}

impl SpecDocument {
    /// Wrap an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the value carries no `paths` object at all; any
    /// finer-grained malformation degrades during compilation instead.
    pub fn from_value(raw: Value) -> Result<Self> {
        if raw.get("paths").and_then(Value::as_object).is_none() {
            return Err(Error::Spec("document has no paths object".to_string()));
        }
        Ok(Self { raw })
    }

    /// Parse a document from YAML or JSON text (YAML tried first)
    pub fn parse(content: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(content)
            .or_else(|_| serde_json::from_str(content))
            .map_err(|e| Error::Spec(format!("failed to parse spec document: {e}")))?;
        Self::from_value(raw)
    }

    /// The raw document tree (`$ref` resolution context)
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The document title, when present
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.raw.get("info")?.get("title")?.as_str()
    }

    /// The first server URL declared by the document
    #[must_use]
    pub fn server_url(&self) -> Option<&str> {
        self.raw
            .get("servers")?
            .as_array()?
            .first()?
            .get("url")?
            .as_str()
    }

    /// Iterate path items in a deterministic (key-sorted) order
    pub fn paths(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.raw
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
    }
}

/// One operation object under a (path, method) pair
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    /// Spec-supplied operation identifier
    #[serde(default)]
    pub operation_id: Option<String>,
    /// Short summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Parameter entries, possibly `$ref`s (resolved lazily)
    #[serde(default)]
    pub parameters: Vec<Value>,
    /// Request body, when declared
    #[serde(default)]
    pub request_body: Option<RequestBodyObject>,
    /// Tag values
    #[serde(default)]
    pub tags: Vec<String>,
}

impl OperationObject {
    /// Deserialize an operation leniently; `None` when the shape is hopeless
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// A resolved parameter entry
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterObject {
    /// Parameter name
    pub name: String,
    /// Location: `path`, `query`, `header`, or `cookie`
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the spec marks the parameter required
    #[serde(default)]
    pub required: bool,
    /// Parameter description
    #[serde(default)]
    pub description: Option<String>,
    /// Schema node for the parameter value
    #[serde(default)]
    pub schema: Option<Value>,
}

impl ParameterObject {
    /// Resolve a parameter entry, following a `$ref` into the document first.
    ///
    /// Returns `None` for entries that are unresolvable or lack a name;
    /// callers skip those rather than failing the compile.
    #[must_use]
    pub fn resolve(entry: &Value, root: &Value) -> Option<Self> {
        let target = match entry.get("$ref").and_then(Value::as_str) {
            Some(pointer) => resolve_pointer(root, pointer)?,
            None => entry,
        };
        serde_json::from_value(target.clone()).ok()
    }
}

/// A request body declaration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBodyObject {
    /// Whether the body as a whole is required
    #[serde(default)]
    pub required: bool,
    /// Media type entries
    #[serde(default)]
    pub content: serde_json::Map<String, Value>,
}

impl RequestBodyObject {
    /// The schema node of the JSON media type (or the first media type)
    #[must_use]
    pub fn schema(&self) -> Option<&Value> {
        self.content
            .get("application/json")
            .or_else(|| self.content.values().next())?
            .get("schema")
    }
}
